use serde::{Deserialize, Serialize};

use super::stable::{SlotState, carry_forward};

/// Status reported alongside a cursor-paginated result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaginationStatus {
    /// No page has arrived for the current arguments.
    LoadingFirstPage,
    /// A further page was requested and is in flight.
    LoadingMore,
    /// More pages exist on the server.
    CanLoadMore,
    /// Every page has been loaded.
    Exhausted,
}

impl PaginationStatus {
    /// True for the two in-flight states.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::LoadingFirstPage | Self::LoadingMore)
    }
}

/// One emission of a paginated reactive query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEmission<T> {
    /// Accumulated items across all loaded pages, in server order.
    pub results: Vec<T>,
    /// Pagination status at the time of the emission.
    pub status: PaginationStatus,
}

impl<T> PageEmission<T> {
    /// Shorthand for a settled emission.
    pub fn settled(results: Vec<T>, status: PaginationStatus) -> Self {
        Self { results, status }
    }

    /// Shorthand for an in-flight emission carrying no results.
    pub fn loading(status: PaginationStatus) -> Self {
        Self {
            results: Vec::new(),
            status,
        }
    }
}

/// Consumer-facing view of a stabilized paginated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginatedView<'a, T> {
    /// Last settled result set.
    pub results: &'a [T],
    /// Live status, which may be a loading state while `results` is carried.
    pub status: PaginationStatus,
    /// True while `results` are carried across a loading emission.
    pub is_loading_new: bool,
}

/// Paginated counterpart of [`super::stable::StableQuery`].
///
/// Loading emissions never replace the accumulated result set, and the
/// requested item budget only grows within a pagination session.
#[derive(Debug, Clone)]
pub struct StablePaginatedQuery<T> {
    slot: SlotState<PageEmission<T>>,
    live_status: PaginationStatus,
    requested_items: usize,
}

impl<T> StablePaginatedQuery<T> {
    /// Starts a session that first asks for `initial_num_items`.
    pub fn new(initial_num_items: usize) -> Self {
        Self {
            slot: SlotState::Empty,
            live_status: PaginationStatus::LoadingFirstPage,
            requested_items: initial_num_items,
        }
    }

    /// Feeds one emission through the slot.
    pub fn observe(&mut self, emission: PageEmission<T>) -> PaginatedView<'_, T> {
        self.live_status = emission.status;
        let next = (!emission.status.is_loading()).then_some(emission);
        self.slot = carry_forward(std::mem::take(&mut self.slot), next);
        self.view()
    }

    /// Current view without feeding an emission.
    pub fn view(&self) -> PaginatedView<'_, T> {
        PaginatedView {
            results: self.results(),
            status: self.live_status,
            is_loading_new: self.slot.is_pending(),
        }
    }

    /// Last settled result set, empty before the first settle.
    pub fn results(&self) -> &[T] {
        self.slot
            .current()
            .map(|page| page.results.as_slice())
            .unwrap_or(&[])
    }

    /// True once any page has settled during this query's lifetime.
    pub fn has_settled(&self) -> bool {
        self.slot.current().is_some()
    }

    /// Live pagination status.
    pub fn status(&self) -> PaginationStatus {
        self.live_status
    }

    /// Total items requested so far in this session.
    pub fn requested_items(&self) -> usize {
        self.requested_items
    }

    /// Asks for `num_items` more; returns the new total budget.
    ///
    /// Ignored unless the server reported more pages and nothing is in flight.
    pub fn load_more(&mut self, num_items: usize) -> Option<usize> {
        if num_items == 0 || self.live_status != PaginationStatus::CanLoadMore {
            return None;
        }
        self.requested_items = self.requested_items.saturating_add(num_items);
        self.live_status = PaginationStatus::LoadingMore;
        Some(self.requested_items)
    }

    /// Begins a new pagination session for changed arguments.
    ///
    /// The settled results stay visible until the new session settles.
    pub fn restart(&mut self, initial_num_items: usize) {
        self.requested_items = initial_num_items;
        self.live_status = PaginationStatus::LoadingFirstPage;
        if !self.slot.is_pending() {
            self.slot = carry_forward(std::mem::take(&mut self.slot), None);
        }
    }
}
