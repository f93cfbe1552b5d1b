//! Live-update contracts the tracker consumes, plus an in-memory hub that
//! implements them.

pub mod memory;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use thiserror::Error;

use crate::models::delivery::RawDeliveryRecord;
use crate::models::driver::DriverProfile;
use crate::models::location::DriverLocation;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeedError {
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("subscriber lagged, {0} updates skipped")]
    Lagged(u64),
}

/// One push from a live feed. `Ok(None)` means the watched document does not
/// exist (yet).
pub type FeedItem<T> = Result<Option<T>, FeedError>;

/// Live feed handle. Dropping it unsubscribes.
pub struct Subscription<T> {
    stream: Option<BoxStream<'static, FeedItem<T>>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> Subscription<T> {
    pub fn new(
        stream: BoxStream<'static, FeedItem<T>>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            stream: Some(stream),
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached(stream: BoxStream<'static, FeedItem<T>>) -> Self {
        Self {
            stream: Some(stream),
            release: None,
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = FeedItem<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => stream.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            // Close the underlying stream first so release sees it gone.
            drop(self.stream.take());
            release();
        }
    }
}

pub trait DeliveryFeed: Send + Sync {
    fn subscribe_delivery(&self, delivery_id: &str) -> Subscription<RawDeliveryRecord>;
}

pub trait DriverLocationFeed: Send + Sync {
    fn subscribe_driver_location(&self, driver_id: &str) -> Subscription<DriverLocation>;
}

pub trait DriverDirectory: Send + Sync {
    fn get_profile<'a>(
        &'a self,
        driver_id: &'a str,
    ) -> BoxFuture<'a, Result<DriverProfile, FeedError>>;
}
