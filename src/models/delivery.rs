use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::fare::VehicleClass;
use crate::models::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Searching,
    Accepted,
    ArrivedPickup,
    PickedUp,
    InTransit,
    ArrivedDropoff,
    Delivered,
    Cancelled,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Searching => "searching",
            DeliveryStatus::Accepted => "accepted",
            DeliveryStatus::ArrivedPickup => "arrived_pickup",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::ArrivedDropoff => "arrived_dropoff",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn display_label(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::Searching => "Searching for Driver",
            DeliveryStatus::Accepted => "Accepted",
            DeliveryStatus::ArrivedPickup => "Arrived at Pickup",
            DeliveryStatus::PickedUp => "Picked Up",
            DeliveryStatus::InTransit => "In Transit",
            DeliveryStatus::ArrivedDropoff => "Arrived at Dropoff",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Cancelled => "Cancelled",
            DeliveryStatus::Failed => "Failed",
        }
    }

    /// Customers never see `pending`; it reads as still searching.
    pub fn display_alias(self) -> Self {
        match self {
            DeliveryStatus::Pending => DeliveryStatus::Searching,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Cancelled | DeliveryStatus::Failed
        )
    }

    /// Whether a driver is attached to the delivery at this point.
    pub fn has_driver(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Accepted
                | DeliveryStatus::ArrivedPickup
                | DeliveryStatus::PickedUp
                | DeliveryStatus::InTransit
                | DeliveryStatus::ArrivedDropoff
        )
    }

    pub fn tracking_message(self) -> &'static str {
        match self {
            DeliveryStatus::Accepted => "Driver assigned to your delivery",
            DeliveryStatus::ArrivedPickup => "Driver has arrived at pickup location",
            DeliveryStatus::PickedUp => "Package picked up successfully",
            DeliveryStatus::InTransit => "Package is on its way to destination",
            DeliveryStatus::ArrivedDropoff => "Driver has arrived at dropoff location",
            DeliveryStatus::Delivered => "Your package has been delivered successfully",
            _ => "Tracking your delivery",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown delivery status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let status = match raw {
            "pending" => DeliveryStatus::Pending,
            "searching" => DeliveryStatus::Searching,
            "accepted" => DeliveryStatus::Accepted,
            "arrived_pickup" => DeliveryStatus::ArrivedPickup,
            "picked_up" => DeliveryStatus::PickedUp,
            "in_transit" => DeliveryStatus::InTransit,
            "arrived_dropoff" => DeliveryStatus::ArrivedDropoff,
            "delivered" => DeliveryStatus::Delivered,
            "cancelled" => DeliveryStatus::Cancelled,
            "failed" => DeliveryStatus::Failed,
            other => return Err(UnknownStatus(other.to_string())),
        };
        Ok(status)
    }
}

/// Label for any timeline key, including ones outside the status enum.
pub fn label_for_key(key: &str) -> String {
    if let Ok(status) = key.parse::<DeliveryStatus>() {
        return status.display_label().to_string();
    }

    let mut chars = key.chars();
    let capitalised = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => return String::new(),
    };
    capitalised.replacen('_', " ", 1)
}

/// A delivery document exactly as the record store pushes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeliveryRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timeline: HashMap<String, Value>,
    #[serde(default, alias = "driverId")]
    pub driver_id: Option<String>,
    #[serde(default, alias = "pickupLocation")]
    pub pickup_location: Option<Location>,
    #[serde(default, alias = "dropoffLocation")]
    pub dropoff_location: Option<Location>,
    #[serde(default, alias = "vehicleType")]
    pub vehicle_type: Option<String>,
}

/// A snapshot after boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRecord {
    pub id: String,
    pub status: Option<DeliveryStatus>,
    pub timeline: BTreeMap<String, DateTime<Utc>>,
    pub driver_id: Option<String>,
    pub pickup_location: Option<Location>,
    pub dropoff_location: Option<Location>,
    pub vehicle: VehicleClass,
}

impl From<RawDeliveryRecord> for DeliveryRecord {
    fn from(raw: RawDeliveryRecord) -> Self {
        let status = match raw.status.as_deref().map(str::parse::<DeliveryStatus>) {
            Some(Ok(status)) => Some(status),
            Some(Err(err)) => {
                tracing::warn!(delivery_id = %raw.id, error = %err, "ignoring snapshot status");
                None
            }
            None => None,
        };

        let timeline = raw
            .timeline
            .into_iter()
            .filter_map(|(key, value)| parse_timestamp(&value).map(|at| (key, at)))
            .collect();

        Self {
            id: raw.id,
            status,
            timeline,
            driver_id: raw.driver_id.filter(|id| !id.trim().is_empty()),
            pickup_location: raw.pickup_location,
            dropoff_location: raw.dropoff_location,
            vehicle: VehicleClass::parse_or_default(raw.vehicle_type.as_deref()),
        }
    }
}

/// Accepts RFC 3339 strings, epoch milliseconds, and `{seconds, nanoseconds}`
/// objects with or without leading underscores.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| at.with_timezone(&Utc)),
        Value::Number(millis) => millis
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(fields) => {
            let seconds = fields
                .get("seconds")
                .or_else(|| fields.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = fields
                .get("nanoseconds")
                .or_else(|| fields.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let nanos = u32::try_from(nanos).ok()?;
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }
}

/// One rendered row of a delivery's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
    pub status_key: String,
    pub display_label: String,
    pub time: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}
