use serde::Serialize;

use crate::geo::haversine_km;
use crate::models::delivery::DeliveryStatus;
use crate::models::fare::VehicleClass;
use crate::models::location::Coordinates;

/// Where the driver is heading next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EtaTarget {
    Pickup,
    Dropoff,
}

/// Straight-line arrival estimate for the driver's current leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverEta {
    pub target: EtaTarget,
    pub distance_km: f64,
    pub minutes: i64,
    pub formatted_time: String,
}

/// Pickup while the driver is on the way to collect, dropoff once they have
/// reached the pickup. Other statuses have no leg to estimate.
pub fn eta_target(status: DeliveryStatus) -> Option<EtaTarget> {
    match status {
        DeliveryStatus::Accepted => Some(EtaTarget::Pickup),
        DeliveryStatus::ArrivedPickup | DeliveryStatus::PickedUp | DeliveryStatus::InTransit => {
            Some(EtaTarget::Dropoff)
        }
        _ => None,
    }
}

pub fn estimate(
    target: EtaTarget,
    driver: &Coordinates,
    destination: &Coordinates,
    vehicle: VehicleClass,
) -> Option<DriverEta> {
    let distance_km = haversine_km(driver, destination);
    if !distance_km.is_finite() {
        return None;
    }

    let hours = distance_km / vehicle.rates().average_speed_kmh;
    let minutes = ((hours * 60.0).ceil() as i64).max(1);

    Some(DriverEta {
        target,
        distance_km: (distance_km * 10.0).round() / 10.0,
        minutes,
        formatted_time: format_minutes(minutes),
    })
}

/// `"7 min"`, `"1 h 05 min"`.
pub fn format_minutes(minutes: i64) -> String {
    if minutes < 60 {
        return format!("{minutes} min");
    }
    format!("{} h {:02} min", minutes / 60, minutes % 60)
}
