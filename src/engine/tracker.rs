use serde::Serialize;
use tracing::debug;

use crate::engine::eta::{self, DriverEta, EtaTarget};
use crate::engine::status::can_transition;
use crate::engine::timeline::{merge_timeline, TimeFormatter};
use crate::models::delivery::{DeliveryRecord, DeliveryStatus, TimelineEntry};
use crate::models::driver::DriverProfile;
use crate::models::fare::VehicleClass;
use crate::models::location::{Coordinates, DriverLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// First status seen; accepted as-is.
    Seeded(DeliveryStatus),
    Advanced {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },
    Unchanged,
    /// Not a valid next status; the remembered status is kept.
    Rejected {
        current: DeliveryStatus,
        reported: DeliveryStatus,
    },
    /// Snapshot carried no usable status.
    Missing,
}

impl StatusChange {
    pub fn outcome_label(&self) -> &'static str {
        match self {
            StatusChange::Seeded(_) => "seeded",
            StatusChange::Advanced { .. } => "advanced",
            StatusChange::Unchanged => "unchanged",
            StatusChange::Rejected { .. } => "rejected",
            StatusChange::Missing => "missing_status",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOutcome {
    pub status: StatusChange,
    pub new_entries: usize,
    /// Driver to start following. Set at most once per tracker.
    pub follow_driver: Option<String>,
}

/// What the tracking screen renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerState {
    pub delivery_id: String,
    pub status: Option<DeliveryStatus>,
    pub status_message: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub driver_profile: Option<DriverProfile>,
    pub driver_location: Option<DriverLocation>,
    pub driver_eta: Option<DriverEta>,
}

/// Status and timeline of one delivery, folded from its snapshots.
#[derive(Debug, Clone)]
pub struct TimelineTracker {
    delivery_id: String,
    status: Option<DeliveryStatus>,
    entries: Vec<TimelineEntry>,
    driver_profile: Option<DriverProfile>,
    driver_location: Option<DriverLocation>,
    driver_eta: Option<DriverEta>,
    pickup: Option<Coordinates>,
    dropoff: Option<Coordinates>,
    vehicle: VehicleClass,
    driver_followed: bool,
    formatter: TimeFormatter,
}

impl TimelineTracker {
    pub fn new(delivery_id: impl Into<String>, formatter: TimeFormatter) -> Self {
        Self {
            delivery_id: delivery_id.into(),
            status: None,
            entries: Vec::new(),
            driver_profile: None,
            driver_location: None,
            driver_eta: None,
            pickup: None,
            dropoff: None,
            vehicle: VehicleClass::default(),
            driver_followed: false,
            formatter,
        }
    }

    /// Folds one snapshot in. The timeline is merged even when the reported
    /// status is rejected.
    pub fn apply_snapshot(&mut self, record: &DeliveryRecord) -> SnapshotOutcome {
        let status = match (self.status, record.status) {
            (_, None) => StatusChange::Missing,
            (None, Some(first)) => {
                self.status = Some(first);
                StatusChange::Seeded(first)
            }
            (Some(current), Some(reported)) if current == reported => StatusChange::Unchanged,
            (Some(current), Some(reported)) if can_transition(current, reported) => {
                self.status = Some(reported);
                StatusChange::Advanced {
                    from: current,
                    to: reported,
                }
            }
            (Some(current), Some(reported)) => {
                debug!(
                    delivery_id = %self.delivery_id,
                    current = %current,
                    reported = %reported,
                    "ignoring invalid status transition"
                );
                StatusChange::Rejected { current, reported }
            }
        };

        let (merged, new_entries) = merge_timeline(&self.entries, &record.timeline, &self.formatter);
        self.entries = merged;

        if let Some(pickup) = &record.pickup_location {
            self.pickup = Some(pickup.coordinates);
        }
        if let Some(dropoff) = &record.dropoff_location {
            self.dropoff = Some(dropoff.coordinates);
        }
        self.vehicle = record.vehicle;
        self.refresh_eta();

        let follow_driver = match status {
            StatusChange::Advanced {
                to: DeliveryStatus::Accepted,
                ..
            } => self.claim_driver(record),
            StatusChange::Seeded(seeded) if seeded.has_driver() => self.claim_driver(record),
            _ => None,
        };

        SnapshotOutcome {
            status,
            new_entries,
            follow_driver,
        }
    }

    fn claim_driver(&mut self, record: &DeliveryRecord) -> Option<String> {
        if self.driver_followed {
            return None;
        }
        let driver_id = record.driver_id.clone()?;
        self.driver_followed = true;
        Some(driver_id)
    }

    pub fn set_driver_profile(&mut self, profile: DriverProfile) {
        self.driver_profile = Some(profile);
    }

    pub fn set_driver_location(&mut self, location: DriverLocation) {
        self.driver_location = Some(location);
        self.refresh_eta();
    }

    pub fn driver_eta(&self) -> Option<&DriverEta> {
        self.driver_eta.as_ref()
    }

    fn refresh_eta(&mut self) {
        self.driver_eta = self.compute_eta();
    }

    fn compute_eta(&self) -> Option<DriverEta> {
        let driver = self.driver_location?.coordinates();
        let target = eta::eta_target(self.status?)?;
        let destination = match target {
            EtaTarget::Pickup => self.pickup?,
            EtaTarget::Dropoff => self.dropoff?,
        };
        eta::estimate(target, &driver, &destination, self.vehicle)
    }

    pub fn delivery_id(&self) -> &str {
        &self.delivery_id
    }

    /// The remembered status, used for transition checks.
    pub fn status(&self) -> Option<DeliveryStatus> {
        self.status
    }

    pub fn display_status(&self) -> Option<DeliveryStatus> {
        self.status.map(DeliveryStatus::display_alias)
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn state(&self) -> TrackerState {
        let status = self.display_status();

        TrackerState {
            delivery_id: self.delivery_id.clone(),
            status,
            status_message: status.map(|status| status.tracking_message().to_string()),
            timeline: self.entries.clone(),
            driver_profile: self.driver_profile.clone(),
            driver_location: self.driver_location,
            driver_eta: self.driver_eta.clone(),
        }
    }
}
