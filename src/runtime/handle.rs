use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::{
    cache::{DEFAULT_MAX_AGE_MINUTES, OfflineFeedCache},
    core::paginated::{PageEmission, PaginationStatus, StablePaginatedQuery},
    event::Event,
    retry::{QueryError, RetryDecision, RetryPolicy, SyncRetry},
    types::{EpochMs, FeedQueryArgs},
};

use super::{
    events::{FeedView, SessionEvent, SyncStatus, ViewSource},
    timer::DelayedTask,
};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("feed session closed")]
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub page_size: usize,
    pub cache_enabled: bool,
    pub cache_max_age_minutes: u64,
    pub retry: RetryPolicy,
    pub command_queue_bound: usize,
    pub request_queue_bound: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            cache_enabled: true,
            cache_max_age_minutes: DEFAULT_MAX_AGE_MINUTES,
            retry: RetryPolicy::default(),
            command_queue_bound: 256,
            request_queue_bound: 64,
        }
    }
}

/// Requests for the external reactive query source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    /// (Re)subscribe with these arguments, asking for `num_items` items.
    Subscribe {
        /// Query arguments.
        args: FeedQueryArgs,
        /// Item budget for the subscription.
        num_items: usize,
    },
    /// Extend the current subscription by `num_items`.
    LoadMore {
        /// Additional items.
        num_items: usize,
    },
    /// Stop issuing the query until the next `Subscribe`.
    Pause,
}

/// Cloneable handle to a running feed session.
#[derive(Clone)]
pub struct FeedSessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<FeedView>,
    events_tx: broadcast::Sender<SessionEvent>,
}

enum Command {
    Deliver {
        args: Option<FeedQueryArgs>,
        result: Result<PageEmission<Event>, QueryError>,
    },
    SetArgs {
        args: FeedQueryArgs,
        resp: oneshot::Sender<()>,
    },
    LoadMore {
        num_items: usize,
        resp: oneshot::Sender<bool>,
    },
    RetryFired {
        generation: u64,
    },
    Snapshot {
        resp: oneshot::Sender<FeedView>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Starts a feed session for `args`.
///
/// The session seeds its view from `cache` (when given), then asks the source
/// for the first page through the returned request receiver. Results are fed
/// back with [`FeedSessionHandle::deliver`]. When `timestamps` is given, each
/// advance of the stable timestamp starts a new pagination session.
pub fn spawn_feed_session(
    args: FeedQueryArgs,
    cache: Option<Arc<OfflineFeedCache>>,
    timestamps: Option<watch::Receiver<EpochMs>>,
    config: SessionConfig,
) -> (FeedSessionHandle, mpsc::Receiver<SourceRequest>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound);
    let (requests_tx, requests_rx) = mpsc::channel::<SourceRequest>(config.request_queue_bound);
    let (events_tx, _) = broadcast::channel::<SessionEvent>(256);
    let (view_tx, view_rx) = watch::channel(FeedView {
        args: args.clone(),
        items: Vec::new(),
        status: PaginationStatus::LoadingFirstPage,
        source: ViewSource::Empty,
        sync: SyncStatus::Ok,
    });

    let mut session = Session {
        query: StablePaginatedQuery::new(config.page_size),
        retry: SyncRetry::new(config.retry.clone()),
        retry_timer: None,
        generation: 0,
        seed: None,
        sync: SyncStatus::Ok,
        cache,
        requests_tx,
        view_tx,
        events_tx: events_tx.clone(),
        cmd_tx: cmd_tx.downgrade(),
        args,
        config,
    };
    let mut timestamps = timestamps;

    tokio::spawn(async move {
        session.seed_from_cache().await;
        session.subscribe();
        session.publish();

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if session.handle_command(cmd).await {
                        break;
                    }
                }
                ts = next_timestamp(&mut timestamps) => {
                    match ts {
                        Some(ts) => session.on_stable_timestamp(ts),
                        None => timestamps = None,
                    }
                }
            }
        }

        session.retry_timer = None;
        debug!(feed = %session.args.feed_id, "feed session stopped");
    });

    (
        FeedSessionHandle {
            cmd_tx,
            view_rx,
            events_tx,
        },
        requests_rx,
    )
}

impl FeedSessionHandle {
    /// Latest published view.
    pub fn view(&self) -> FeedView {
        self.view_rx.borrow().clone()
    }

    /// Receiver notified on every published view.
    pub fn watch(&self) -> watch::Receiver<FeedView> {
        self.view_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Feeds one source emission or failure for the current subscription.
    pub async fn deliver(
        &self,
        result: Result<PageEmission<Event>, QueryError>,
    ) -> Result<(), RuntimeError> {
        self.send_delivery(None, result).await
    }

    /// Like [`Self::deliver`], for a result produced by the subscription for
    /// `args`. Results for arguments the session has since moved away from
    /// are dropped, so they never reach the view or the cache.
    pub async fn deliver_for(
        &self,
        args: FeedQueryArgs,
        result: Result<PageEmission<Event>, QueryError>,
    ) -> Result<(), RuntimeError> {
        self.send_delivery(Some(args), result).await
    }

    async fn send_delivery(
        &self,
        args: Option<FeedQueryArgs>,
        result: Result<PageEmission<Event>, QueryError>,
    ) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(Command::Deliver { args, result })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn deliver_page(&self, emission: PageEmission<Event>) -> Result<(), RuntimeError> {
        self.deliver(Ok(emission)).await
    }

    pub async fn deliver_error(&self, error: QueryError) -> Result<(), RuntimeError> {
        self.deliver(Err(error)).await
    }

    /// Switches to new arguments; a no-op if they are unchanged.
    pub async fn set_args(&self, args: FeedQueryArgs) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetArgs { args, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Requests `num_items` more; returns false if the request was ignored.
    pub async fn load_more(&self, num_items: usize) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::LoadMore { num_items, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// View after every previously sent command was handled.
    pub async fn snapshot(&self) -> Result<FeedView, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

struct Session {
    args: FeedQueryArgs,
    config: SessionConfig,
    query: StablePaginatedQuery<Event>,
    retry: SyncRetry,
    retry_timer: Option<DelayedTask>,
    // Bumped on every argument change; stale retry timers are ignored.
    generation: u64,
    seed: Option<(Vec<Event>, bool)>,
    sync: SyncStatus,
    cache: Option<Arc<OfflineFeedCache>>,
    requests_tx: mpsc::Sender<SourceRequest>,
    view_tx: watch::Sender<FeedView>,
    events_tx: broadcast::Sender<SessionEvent>,
    cmd_tx: mpsc::WeakSender<Command>,
}

impl Session {
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Deliver { args, result } => {
                if args.as_ref().is_some_and(|args| *args != self.args) {
                    debug!(feed = %self.args.feed_id, "dropping result for superseded arguments");
                    return false;
                }
                match result {
                    Ok(emission) => self.on_emission(emission).await,
                    Err(error) => self.on_error(error),
                }
            }
            Command::SetArgs { args, resp } => {
                self.on_set_args(args);
                let _ = resp.send(());
            }
            Command::LoadMore { num_items, resp } => {
                let _ = resp.send(self.on_load_more(num_items));
            }
            Command::RetryFired { generation } => self.on_retry_fired(generation),
            Command::Snapshot { resp } => {
                let _ = resp.send(self.view());
            }
            Command::Shutdown { resp } => {
                self.retry_timer = None;
                let _ = resp.send(());
                return true;
            }
        }

        false
    }

    async fn seed_from_cache(&mut self) {
        if !self.config.cache_enabled {
            return;
        }
        let Some(cache) = self.cache.clone() else {
            return;
        };

        let feed_id = self.args.feed_id.clone();
        let max_age = self.config.cache_max_age_minutes;
        let loaded = tokio::task::spawn_blocking(move || {
            let page = cache.load(&feed_id)?;
            let fresh = cache.is_fresh(&page, max_age);
            Some((page, fresh))
        })
        .await;

        match loaded {
            Ok(Some((page, fresh))) if !page.items.is_empty() => {
                debug!(feed = %self.args.feed_id, items = page.items.len(), fresh, "seeding feed from cache");
                let _ = self.events_tx.send(SessionEvent::CacheSeeded {
                    items: page.items.len(),
                    last_updated: page.last_updated,
                });
                self.seed = Some((page.items, fresh));
            }
            Ok(_) => {}
            Err(err) => warn!(feed = %self.args.feed_id, %err, "feed cache: load task failed"),
        }
    }

    async fn on_emission(&mut self, emission: PageEmission<Event>) {
        // A loading emission is not a result; any pending backoff stays armed.
        let settled = !emission.status.is_loading();
        if settled {
            if self.retry.is_suppressed() {
                debug!(feed = %self.args.feed_id, "query settled during backoff, cancelling retry");
                self.retry_timer = None;
            }
            self.retry.on_success();
            self.sync = SyncStatus::Ok;
        }

        self.query.observe(emission);

        if settled {
            self.seed = None;
            let items = self.query.results().to_vec();
            let _ = self.events_tx.send(SessionEvent::LiveSettled { items: items.len() });
            if !items.is_empty() {
                self.write_cache(items).await;
            }
        }
        self.publish();
    }

    fn on_error(&mut self, error: QueryError) {
        match self.retry.on_error(error) {
            RetryDecision::Schedule { attempt, delay } => {
                self.request(SourceRequest::Pause);
                let generation = self.generation;
                let cmd_tx = self.cmd_tx.clone();
                // Replacing the slot aborts any timer still pending.
                self.retry_timer = Some(DelayedTask::spawn(delay, async move {
                    if let Some(tx) = cmd_tx.upgrade() {
                        let _ = tx.send(Command::RetryFired { generation }).await;
                    }
                }));
                self.sync = SyncStatus::SettingUpAccount { attempt };
                let _ = self.events_tx.send(SessionEvent::RetryScheduled {
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                });
            }
            RetryDecision::Surface(error) => {
                warn!(feed = %self.args.feed_id, %error, "feed query failed");
                self.sync = SyncStatus::Failed(error);
                let _ = self.events_tx.send(SessionEvent::QueryFailed { terminal: false });
            }
            RetryDecision::Exhausted(error) => {
                self.retry_timer = None;
                self.sync = SyncStatus::Failed(error);
                let _ = self.events_tx.send(SessionEvent::QueryFailed { terminal: true });
            }
            RetryDecision::Ignore => return,
        }
        self.publish();
    }

    fn on_retry_fired(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        self.retry_timer = None;
        if self.retry.on_timer_fired() {
            debug!(feed = %self.args.feed_id, attempt = self.retry.attempt(), "re-issuing feed query");
            self.subscribe();
        }
    }

    fn on_set_args(&mut self, args: FeedQueryArgs) {
        if args == self.args {
            return;
        }
        info!(
            feed = %args.feed_id,
            stable_timestamp = args.stable_timestamp,
            "feed query arguments changed"
        );
        self.args = args;
        self.generation += 1;
        self.retry.reset();
        self.retry_timer = None;
        self.sync = SyncStatus::Ok;
        self.query.restart(self.config.page_size);
        self.subscribe();
        let _ = self.events_tx.send(SessionEvent::ArgsChanged {
            stable_timestamp: self.args.stable_timestamp,
        });
        self.publish();
    }

    fn on_stable_timestamp(&mut self, stable_timestamp: EpochMs) {
        let args = FeedQueryArgs {
            stable_timestamp,
            ..self.args.clone()
        };
        self.on_set_args(args);
    }

    fn on_load_more(&mut self, num_items: usize) -> bool {
        if self.retry.is_suppressed() {
            return false;
        }
        if self.query.load_more(num_items).is_none() {
            return false;
        }
        self.request(SourceRequest::LoadMore { num_items });
        self.publish();
        true
    }

    async fn write_cache(&self, items: Vec<Event>) {
        if !self.config.cache_enabled {
            return;
        }
        let Some(cache) = self.cache.clone() else {
            return;
        };

        let feed_id = self.args.feed_id.clone();
        let synced = self.args.stable_timestamp;
        match tokio::task::spawn_blocking(move || cache.save(&feed_id, items, synced)).await {
            Ok(Some(outcome)) => {
                let _ = self.events_tx.send(SessionEvent::CacheWritten {
                    items: outcome.stored_items,
                });
            }
            Ok(None) => {}
            Err(err) => warn!(feed = %self.args.feed_id, %err, "feed cache: save task failed"),
        }
    }

    fn subscribe(&self) {
        self.request(SourceRequest::Subscribe {
            args: self.args.clone(),
            num_items: self.query.requested_items(),
        });
    }

    fn request(&self, req: SourceRequest) {
        if let Err(err) = self.requests_tx.try_send(req) {
            warn!(feed = %self.args.feed_id, %err, "source request dropped");
        }
    }

    fn view(&self) -> FeedView {
        let (items, source) = if self.query.has_settled() {
            (self.query.results().to_vec(), ViewSource::Live)
        } else if let Some((items, fresh)) = &self.seed {
            (items.clone(), ViewSource::Cache { fresh: *fresh })
        } else {
            (Vec::new(), ViewSource::Empty)
        };

        FeedView {
            args: self.args.clone(),
            items,
            status: self.query.status(),
            source,
            sync: self.sync.clone(),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}

async fn next_timestamp(rx: &mut Option<watch::Receiver<EpochMs>>) -> Option<EpochMs> {
    match rx {
        Some(rx) => {
            rx.changed().await.ok()?;
            Some(*rx.borrow_and_update())
        }
        None => std::future::pending().await,
    }
}
