use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::feeds::{
    DeliveryFeed, DriverDirectory, DriverLocationFeed, FeedError, FeedItem, Subscription,
};
use crate::models::delivery::RawDeliveryRecord;
use crate::models::driver::DriverProfile;
use crate::models::location::DriverLocation;
use crate::observability::metrics::Metrics;

struct Channel<T> {
    tx: broadcast::Sender<T>,
    latest: Option<T>,
}

impl<T: Clone> Channel<T> {
    fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { tx, latest: None }
    }

    /// Nothing published and nobody listening.
    fn is_idle(&self) -> bool {
        self.latest.is_none() && self.tx.receiver_count() == 0
    }
}

type Channels<T> = Arc<DashMap<String, Channel<T>>>;

/// In-process record store feeds. New subscribers get the latest value
/// first, then every later publish. Channels for ids that were only ever
/// subscribed to are dropped with their last subscriber.
pub struct FeedHub {
    deliveries: Channels<RawDeliveryRecord>,
    driver_locations: Channels<DriverLocation>,
    profiles: DashMap<String, DriverProfile>,
    buffer_size: usize,
    metrics: Metrics,
}

impl FeedHub {
    pub fn new(buffer_size: usize, metrics: Metrics) -> Self {
        Self {
            deliveries: Arc::new(DashMap::new()),
            driver_locations: Arc::new(DashMap::new()),
            profiles: DashMap::new(),
            buffer_size,
            metrics,
        }
    }

    pub fn publish_delivery(&self, record: RawDeliveryRecord) {
        publish(&self.deliveries, &record.id.clone(), record, self.buffer_size);
    }

    pub fn latest_delivery(&self, delivery_id: &str) -> Option<RawDeliveryRecord> {
        self.deliveries
            .get(delivery_id)
            .and_then(|channel| channel.latest.clone())
    }

    pub fn publish_driver_location(&self, driver_id: &str, location: DriverLocation) {
        publish(&self.driver_locations, driver_id, location, self.buffer_size);
    }

    pub fn put_driver_profile(&self, profile: DriverProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    fn open<T>(
        &self,
        channels: &Channels<T>,
        key: &str,
        feed: &str,
    ) -> Subscription<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let (latest, rx) = {
            let channel = channels
                .entry(key.to_string())
                .or_insert_with(|| Channel::new(self.buffer_size));
            (channel.latest.clone(), channel.tx.subscribe())
        };

        let replay = stream::iter(latest.map(|value| Ok(Some(value))));
        let live = BroadcastStream::new(rx).map(|item| -> FeedItem<T> {
            match item {
                Ok(value) => Ok(Some(value)),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => Err(FeedError::Lagged(skipped)),
            }
        });

        let gauge = self.metrics.active_subscriptions.with_label_values(&[feed]);
        gauge.inc();

        let channels = Arc::clone(channels);
        let key = key.to_string();
        Subscription::new(replay.chain(live).boxed(), move || {
            gauge.dec();
            channels.remove_if(&key, |_, channel| channel.is_idle());
        })
    }
}

fn publish<T: Clone>(
    channels: &DashMap<String, Channel<T>>,
    key: &str,
    value: T,
    buffer_size: usize,
) {
    let mut channel = channels
        .entry(key.to_string())
        .or_insert_with(|| Channel::new(buffer_size));
    channel.latest = Some(value.clone());
    // No receivers is fine; the latest value is replayed on subscribe.
    let _ = channel.tx.send(value);
}

impl DeliveryFeed for FeedHub {
    fn subscribe_delivery(&self, delivery_id: &str) -> Subscription<RawDeliveryRecord> {
        self.open(&self.deliveries, delivery_id, "delivery")
    }
}

impl DriverLocationFeed for FeedHub {
    fn subscribe_driver_location(&self, driver_id: &str) -> Subscription<DriverLocation> {
        self.open(&self.driver_locations, driver_id, "driver_location")
    }
}

impl DriverDirectory for FeedHub {
    fn get_profile<'a>(
        &'a self,
        driver_id: &'a str,
    ) -> BoxFuture<'a, Result<DriverProfile, FeedError>> {
        let profile = self
            .profiles
            .get(driver_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FeedError::NotFound(format!("driver {driver_id}")));
        Box::pin(future::ready(profile))
    }
}
