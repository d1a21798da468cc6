use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::database::ItemStore;
use crate::models::{NotificationEvent, PriceDelta, PriceObservation, TrackedItem};
use crate::notifier::Notifier;
use crate::price_fetcher::PriceFetcher;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Fetching,
    Reconciling,
    Sleeping,
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub items_loaded: usize,
    pub fetch_failures: usize,
    pub changes_detected: usize,
    pub prices_updated: usize,
    pub store_failures: usize,
    pub notifications_sent: usize,
    pub delivery_failures: usize,
    pub elapsed: Duration,
}

/// Periodically re-checks every tracked item and reports price changes.
pub struct PriceTracker {
    store: Arc<dyn ItemStore>,
    fetcher: Arc<dyn PriceFetcher>,
    notifier: Arc<dyn Notifier>,
    config: TrackerConfig,
    state: watch::Sender<TrackerState>,
}

impl PriceTracker {
    pub fn new(
        store: Arc<dyn ItemStore>,
        fetcher: Arc<dyn PriceFetcher>,
        notifier: Arc<dyn Notifier>,
        config: TrackerConfig,
    ) -> Self {
        let (state, _) = watch::channel(TrackerState::Idle);
        Self {
            store,
            fetcher,
            notifier,
            config,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TrackerState {
        *self.state.borrow()
    }

    fn set_state(&self, state: TrackerState) {
        self.state.send_replace(state);
    }

    /// Runs cycles until `shutdown` is cancelled.
    ///
    /// The next cycle starts one interval after the previous one started. A
    /// cycle that overruns the interval is followed immediately by the next.
    pub async fn run(&self, shutdown: CancellationToken) {
        let interval = self.config.poll_interval();
        tracing::info!(
            interval_secs = interval.as_secs(),
            concurrency = self.config.max_concurrent_fetches,
            "Price tracker started"
        );

        loop {
            let wake_at = Instant::now() + interval;
            let cycle_token = shutdown.child_token();
            let span = tracing::info_span!("cycle", id = %Uuid::new_v4());

            match self.run_cycle(&cycle_token).instrument(span).await {
                Ok(report) => tracing::info!(
                    items = report.items_loaded,
                    changes = report.changes_detected,
                    fetch_failures = report.fetch_failures,
                    store_failures = report.store_failures,
                    delivery_failures = report.delivery_failures,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Cycle complete"
                ),
                Err(AppError::Cancelled) => tracing::info!("Cycle cancelled"),
                Err(e) => tracing::error!("Cycle aborted: {}", e),
            }

            if shutdown.is_cancelled() {
                break;
            }

            self.set_state(TrackerState::Sleeping);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep_until(wake_at) => {}
            }
        }

        self.set_state(TrackerState::Idle);
        tracing::info!("Price tracker stopped");
    }

    /// One full pass over all tracked items.
    ///
    /// Fails only when the item list cannot be loaded or `token` is
    /// cancelled. Per-item failures are logged and counted in the report.
    pub async fn run_cycle(&self, token: &CancellationToken) -> Result<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        let items = match self.store.get_all().await {
            Ok(items) => items,
            Err(e) => {
                self.set_state(TrackerState::Idle);
                return Err(e);
            }
        };
        report.items_loaded = items.len();
        tracing::debug!(items = items.len(), "Loaded tracked items");

        self.set_state(TrackerState::Fetching);
        let prices = self.fetch_all(&items, token, &mut report).await;
        if token.is_cancelled() {
            self.set_state(TrackerState::Idle);
            return Err(AppError::Cancelled);
        }

        self.set_state(TrackerState::Reconciling);
        self.reconcile(&items, &prices, token, &mut report).await;
        self.set_state(TrackerState::Idle);

        report.elapsed = started.elapsed();
        if token.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(report)
    }

    /// Fetches every item, returning prices in item order.
    ///
    /// Dispatch starts are spaced by the pacing delay and in-flight fetches
    /// are capped by the semaphore. Waits for every dispatched fetch.
    async fn fetch_all(
        &self,
        items: &[TrackedItem],
        token: &CancellationToken,
        report: &mut CycleReport,
    ) -> Vec<Option<f64>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let pacing = self.config.pacing_delay();
        let mut tasks = JoinSet::new();
        let mut last_dispatch: Option<Instant> = None;

        for (index, item) in items.iter().enumerate() {
            let permit = tokio::select! {
                _ = token.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if let Some(previous) = last_dispatch {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep_until(previous + pacing) => {}
                }
            }
            last_dispatch = Some(Instant::now());

            let fetcher = Arc::clone(&self.fetcher);
            let url = item.item_url.clone();
            let task_token = token.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = tokio::select! {
                    _ = task_token.cancelled() => Err(AppError::Cancelled),
                    result = fetcher.fetch(&url) => result,
                };
                (index, result)
            });
        }

        let mut prices = vec![None; items.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(price))) => prices[index] = Some(price),
                Ok((_, Err(AppError::Cancelled))) => {}
                Ok((index, Err(e))) => {
                    let item = &items[index];
                    report.fetch_failures += 1;
                    tracing::warn!(
                        user_id = item.user_id,
                        url = %item.item_url,
                        "Price fetch failed: {}",
                        e
                    );
                }
                Err(e) => {
                    report.fetch_failures += 1;
                    tracing::error!("Fetch task failed: {}", e);
                }
            }
        }

        prices
    }

    async fn reconcile(
        &self,
        items: &[TrackedItem],
        prices: &[Option<f64>],
        token: &CancellationToken,
        report: &mut CycleReport,
    ) {
        let mut user_lists: HashMap<i64, Vec<TrackedItem>> = HashMap::new();

        for (item, price) in items.iter().zip(prices) {
            if token.is_cancelled() {
                return;
            }
            let Some(price) = *price else { continue };

            let observation = PriceObservation {
                item_url: item.item_url.clone(),
                price,
            };
            let Some(delta) = PriceDelta::detect(item, &observation) else {
                continue;
            };
            report.changes_detected += 1;

            if let Err(e) = self
                .store
                .update_price(delta.user_id, &delta.item_url, delta.new_price)
                .await
            {
                report.store_failures += 1;
                tracing::warn!(
                    user_id = delta.user_id,
                    url = %delta.item_url,
                    "Price update not persisted, skipping notification: {}",
                    e
                );
                continue;
            }
            report.prices_updated += 1;

            let position = self.position_of(&mut user_lists, &delta).await;
            let event = NotificationEvent::price_changed(&delta, position, &self.config.currency);

            match self
                .notifier
                .send(event.recipient_user_id, &event.rendered_message)
                .await
            {
                Ok(()) => report.notifications_sent += 1,
                Err(e) => {
                    report.delivery_failures += 1;
                    tracing::warn!(
                        user_id = delta.user_id,
                        url = %delta.item_url,
                        "Notification failed: {}",
                        e
                    );
                }
            }
        }
    }

    /// 1-based display position of the changed item, 0 if it is gone.
    async fn position_of(
        &self,
        cache: &mut HashMap<i64, Vec<TrackedItem>>,
        delta: &PriceDelta,
    ) -> usize {
        if !cache.contains_key(&delta.user_id) {
            match self.store.get_for_user(delta.user_id).await {
                Ok(list) => {
                    cache.insert(delta.user_id, list);
                }
                Err(e) => {
                    tracing::warn!(user_id = delta.user_id, "Could not load item list: {}", e);
                    return 0;
                }
            }
        }

        cache
            .get(&delta.user_id)
            .map(|list| TrackedItem::position_in(list, &delta.item_url))
            .unwrap_or(0)
    }
}
