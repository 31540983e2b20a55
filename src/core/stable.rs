/// One emission of a reactive query subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEmission<T, E> {
    /// The subscription is (re)computing.
    Loading,
    /// A settled value.
    Ready(T),
    /// The subscription failed.
    Failed(E),
}

/// Single-slot state holding the last settled result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState<T> {
    /// Nothing observed yet.
    Empty,
    /// A newer result is loading; `last_settled` stays visible meanwhile.
    Pending {
        /// Most recent settled value, if any was ever observed.
        last_settled: Option<T>,
    },
    /// The latest emission settled.
    Settled(T),
}

impl<T> Default for SlotState<T> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<T> SlotState<T> {
    /// Value a consumer should render.
    pub fn current(&self) -> Option<&T> {
        match self {
            Self::Empty | Self::Pending { last_settled: None } => None,
            Self::Pending {
                last_settled: Some(v),
            }
            | Self::Settled(v) => Some(v),
        }
    }

    /// True while a newer result is being computed.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Carries the last settled value forward across a loading emission.
///
/// `next` is `Some` for a settled emission and `None` for a loading one.
pub fn carry_forward<T>(prev: SlotState<T>, next: Option<T>) -> SlotState<T> {
    match (prev, next) {
        (_, Some(value)) => SlotState::Settled(value),
        (SlotState::Empty, None) => SlotState::Pending { last_settled: None },
        (SlotState::Pending { last_settled }, None) => SlotState::Pending { last_settled },
        (SlotState::Settled(value), None) => SlotState::Pending {
            last_settled: Some(value),
        },
    }
}

/// Consumer-facing view of a stabilized query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableView<'a, T> {
    /// Last settled value; `None` only before the first settle.
    pub current: Option<&'a T>,
    /// True while newer arguments are loading behind `current`.
    pub is_loading_new: bool,
}

/// Keeps the previous settled value visible while a query recomputes.
///
/// The slot has no notion of argument identity. After an argument change the
/// old value remains visible until the new one settles, even if it belongs to
/// a different resource; callers that need a hard cut call [`Self::reset`].
#[derive(Debug, Clone)]
pub struct StableQuery<T> {
    state: SlotState<T>,
}

impl<T> Default for StableQuery<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StableQuery<T> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            state: SlotState::Empty,
        }
    }

    /// Feeds one emission through the slot.
    ///
    /// Errors pass through unchanged and leave the slot untouched.
    pub fn observe<E>(&mut self, emission: QueryEmission<T, E>) -> Result<StableView<'_, T>, E> {
        let next = match emission {
            QueryEmission::Loading => None,
            QueryEmission::Ready(value) => Some(value),
            QueryEmission::Failed(err) => return Err(err),
        };
        self.state = carry_forward(std::mem::take(&mut self.state), next);
        Ok(self.view())
    }

    /// Current view without feeding an emission.
    pub fn view(&self) -> StableView<'_, T> {
        StableView {
            current: self.state.current(),
            is_loading_new: self.state.is_pending(),
        }
    }

    /// Underlying state machine.
    pub fn state(&self) -> &SlotState<T> {
        &self.state
    }

    /// Drops the held value, e.g. when the owner switches to another user.
    pub fn reset(&mut self) {
        self.state = SlotState::Empty;
    }
}
