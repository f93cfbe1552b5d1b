use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::StreamExt;
use prometheus::IntGauge;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::timeline::TimeFormatter;
use crate::engine::tracker::{TimelineTracker, TrackerState};
use crate::feeds::{
    DeliveryFeed, DriverDirectory, DriverLocationFeed, FeedError, FeedItem, Subscription,
};
use crate::models::delivery::{DeliveryRecord, RawDeliveryRecord};
use crate::models::driver::DriverProfile;
use crate::models::location::DriverLocation;
use crate::observability::metrics::Metrics;

type ProfileFetch = BoxFuture<'static, Result<DriverProfile, FeedError>>;

/// Attaches timeline trackers to live deliveries.
#[derive(Clone)]
pub struct DeliveryTimelineTracker {
    deliveries: Arc<dyn DeliveryFeed>,
    driver_locations: Arc<dyn DriverLocationFeed>,
    drivers: Arc<dyn DriverDirectory>,
    formatter: TimeFormatter,
    metrics: Metrics,
}

impl DeliveryTimelineTracker {
    pub fn new(
        deliveries: Arc<dyn DeliveryFeed>,
        driver_locations: Arc<dyn DriverLocationFeed>,
        drivers: Arc<dyn DriverDirectory>,
        formatter: TimeFormatter,
        metrics: Metrics,
    ) -> Self {
        Self {
            deliveries,
            driver_locations,
            drivers,
            formatter,
            metrics,
        }
    }

    /// Subscribes to `delivery_id` and calls `on_update` after every state
    /// change until the returned handle is detached or dropped. Must be called
    /// from within a Tokio runtime.
    pub fn attach<F>(&self, delivery_id: &str, on_update: F) -> TrackerHandle
    where
        F: FnMut(&TrackerState) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let session_id = Uuid::new_v4();
        let session = Session {
            session_id,
            tracker: TimelineTracker::new(delivery_id, self.formatter),
            deliveries: self.deliveries.subscribe_delivery(delivery_id),
            driver_locations: self.driver_locations.clone(),
            drivers: self.drivers.clone(),
            location: None,
            profile: None,
            metrics: self.metrics.clone(),
        };

        info!(delivery_id = %delivery_id, session_id = %session_id, "tracker attached");
        let active = ActiveTracker::new(self.metrics.active_trackers.clone());
        let task = tokio::spawn(session.run(on_update, shutdown_rx, active));

        TrackerHandle {
            delivery_id: delivery_id.to_string(),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Owns a running tracker. Dropping it aborts the tracker; [`detach`]
/// additionally waits until every subscription has been released.
///
/// [`detach`]: TrackerHandle::detach
pub struct TrackerHandle {
    delivery_id: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TrackerHandle {
    pub fn delivery_id(&self) -> &str {
        &self.delivery_id
    }

    pub async fn detach(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(delivery_id = %self.delivery_id, error = %err, "tracker task failed");
                }
            }
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ActiveTracker(IntGauge);

impl ActiveTracker {
    fn new(gauge: IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for ActiveTracker {
    fn drop(&mut self) {
        self.0.dec();
    }
}

struct Session {
    session_id: Uuid,
    tracker: TimelineTracker,
    deliveries: Subscription<RawDeliveryRecord>,
    driver_locations: Arc<dyn DriverLocationFeed>,
    drivers: Arc<dyn DriverDirectory>,
    location: Option<Subscription<DriverLocation>>,
    profile: Option<ProfileFetch>,
    metrics: Metrics,
}

impl Session {
    async fn run<F>(
        mut self,
        mut on_update: F,
        mut shutdown: oneshot::Receiver<()>,
        _active: ActiveTracker,
    ) where
        F: FnMut(&TrackerState) + Send + 'static,
    {
        let mut deliveries_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                item = self.deliveries.next(), if deliveries_open => match item {
                    Some(item) => {
                        if self.on_delivery(item) {
                            on_update(&self.tracker.state());
                        }
                    }
                    None => {
                        deliveries_open = false;
                        warn!(
                            delivery_id = %self.tracker.delivery_id(),
                            "delivery feed ended; holding last state"
                        );
                    }
                },
                item = next_location(&mut self.location) => {
                    if self.on_location(item) {
                        on_update(&self.tracker.state());
                    }
                }
                result = resolve_profile(&mut self.profile) => {
                    self.profile = None;
                    match result {
                        Ok(profile) => {
                            self.tracker.set_driver_profile(profile);
                            on_update(&self.tracker.state());
                        }
                        Err(err) => warn!(
                            delivery_id = %self.tracker.delivery_id(),
                            error = %err,
                            "driver profile fetch failed"
                        ),
                    }
                }
            }
        }

        info!(
            delivery_id = %self.tracker.delivery_id(),
            session_id = %self.session_id,
            "tracker detached"
        );
    }

    /// Returns whether the state changed.
    fn on_delivery(&mut self, item: FeedItem<RawDeliveryRecord>) -> bool {
        let raw = match item {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.count("missing_record");
                debug!(delivery_id = %self.tracker.delivery_id(), "delivery record missing");
                return false;
            }
            Err(err) => {
                self.count("feed_error");
                warn!(
                    delivery_id = %self.tracker.delivery_id(),
                    error = %err,
                    "delivery subscription error; keeping last state"
                );
                return false;
            }
        };

        let outcome = self.tracker.apply_snapshot(&DeliveryRecord::from(raw));
        self.count(outcome.status.outcome_label());

        if let Some(driver_id) = outcome.follow_driver {
            info!(
                delivery_id = %self.tracker.delivery_id(),
                driver_id = %driver_id,
                "following driver"
            );
            self.location = Some(self.driver_locations.subscribe_driver_location(&driver_id));

            let drivers = self.drivers.clone();
            let fetch: ProfileFetch = Box::pin(async move { drivers.get_profile(&driver_id).await });
            self.profile = Some(fetch);
        }

        true
    }

    fn on_location(&mut self, item: Option<FeedItem<DriverLocation>>) -> bool {
        match item {
            Some(Ok(Some(location))) => {
                self.tracker.set_driver_location(location);
                true
            }
            Some(Ok(None)) => false,
            Some(Err(err)) => {
                warn!(
                    delivery_id = %self.tracker.delivery_id(),
                    error = %err,
                    "driver location subscription error"
                );
                false
            }
            None => {
                debug!(delivery_id = %self.tracker.delivery_id(), "driver location feed ended");
                self.location = None;
                false
            }
        }
    }

    fn count(&self, outcome: &str) {
        self.metrics
            .snapshots_total
            .with_label_values(&[outcome])
            .inc();
    }
}

async fn next_location(
    subscription: &mut Option<Subscription<DriverLocation>>,
) -> Option<FeedItem<DriverLocation>> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => future::pending().await,
    }
}

async fn resolve_profile(fetch: &mut Option<ProfileFetch>) -> Result<DriverProfile, FeedError> {
    match fetch {
        Some(fetch) => fetch.await,
        None => future::pending().await,
    }
}
