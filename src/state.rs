use std::sync::Arc;

use crate::config::Config;
use crate::engine::fare::FareEngine;
use crate::engine::session::DeliveryTimelineTracker;
use crate::engine::timeline::TimeFormatter;
use crate::feeds::memory::FeedHub;
use crate::geo::{DistanceProvider, HaversineDistance};
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub fares: FareEngine,
    pub feeds: Arc<FeedHub>,
    pub tracker: DeliveryTimelineTracker,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_distance_provider(config, Arc::new(HaversineDistance))
    }

    pub fn with_distance_provider(config: &Config, distance: Arc<dyn DistanceProvider>) -> Self {
        let metrics = Metrics::new();
        let feeds = Arc::new(FeedHub::new(config.event_buffer_size, metrics.clone()));

        let tracker = DeliveryTimelineTracker::new(
            feeds.clone(),
            feeds.clone(),
            feeds.clone(),
            TimeFormatter::new(config.timeline_utc_offset_minutes),
            metrics.clone(),
        );

        Self {
            fares: FareEngine::new(distance, config.default_distance_km, metrics.clone()),
            feeds,
            tracker,
            metrics,
        }
    }
}
