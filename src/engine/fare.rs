use std::sync::Arc;

use tracing::{debug, warn};

use crate::geo::DistanceProvider;
use crate::models::fare::{FareQuote, Money, PackageSize, VehicleClass, VehicleRates};
use crate::models::location::Coordinates;
use crate::observability::metrics::Metrics;

/// Distance covered by the base fare.
pub const FREE_DISTANCE_KM: f64 = 3.0;
pub const SERVICE_FEE_RATE: f64 = 0.18;
/// Longest distance priced: once around the equator. Longer inputs are
/// clamped here.
pub const MAX_DISTANCE_KM: f64 = 40_075.0;
const HANDLING_MINUTES: f64 = 10.0;
const MIN_ETA_MINUTES: i64 = 10;

/// Prices deliveries. Distances come from the injected provider; everything
/// after that is pure.
pub struct FareEngine {
    distance: Arc<dyn DistanceProvider>,
    default_distance_km: f64,
    metrics: Metrics,
}

impl FareEngine {
    pub fn new(
        distance: Arc<dyn DistanceProvider>,
        default_distance_km: f64,
        metrics: Metrics,
    ) -> Self {
        Self {
            distance,
            default_distance_km,
            metrics,
        }
    }

    /// Resolves the trip distance and prices it. Never fails: missing
    /// coordinates or an unusable distance fall back to the default distance,
    /// and a provider failure yields [`fallback_quote`].
    pub async fn calculate_fare(
        &self,
        pickup: Option<&Coordinates>,
        dropoff: Option<&Coordinates>,
        vehicle: VehicleClass,
        size: PackageSize,
    ) -> FareQuote {
        let distance_km = match (pickup, dropoff) {
            (Some(pickup), Some(dropoff)) => {
                match self.distance.distance_km(pickup, dropoff).await {
                    Ok(km) if km.is_finite() && km >= 0.0 => km,
                    Ok(km) => {
                        warn!(distance_km = km, "unusable distance from provider; using default");
                        self.default_distance_km
                    }
                    Err(err) => {
                        warn!(error = %err, "distance lookup failed; returning fallback quote");
                        self.metrics
                            .fare_quotes_total
                            .with_label_values(&[vehicle.as_str(), "fallback"])
                            .inc();
                        return fallback_quote();
                    }
                }
            }
            _ => {
                warn!("missing location coordinates; using default distance");
                self.default_distance_km
            }
        };

        let quote = quote(distance_km, vehicle, size);
        self.metrics
            .fare_quotes_total
            .with_label_values(&[vehicle.as_str(), "priced"])
            .inc();
        debug!(
            vehicle_class = vehicle.as_str(),
            distance_km = quote.distance_km,
            total = quote.total,
            "fare quoted"
        );

        quote
    }
}

pub fn quote(distance_km: f64, vehicle: VehicleClass, size: PackageSize) -> FareQuote {
    let distance_km = sanitize_distance(distance_km);
    let rates = vehicle.rates();
    let multiplier = size.multiplier();

    let distance_fare_raw = billable_km(distance_km) * rates.per_km as f64;
    let subtotal_raw = pre_multiplier_total(distance_km, &rates) * multiplier;
    // Ties go to even hundreds: 8250 prices at 8200.
    let subtotal = ((subtotal_raw / 100.0).round_ties_even() * 100.0) as Money;
    let service_fee = service_fee(subtotal);

    FareQuote {
        base_fare: rates.base_rate,
        distance_fare: (distance_fare_raw * multiplier).round() as Money,
        package_size_multiplier: multiplier,
        subtotal,
        service_fee,
        discount: None,
        total: subtotal.saturating_add(service_fee),
        distance_km: (distance_km * 10.0).round() / 10.0,
        estimated_time_range: estimate_time_range(distance_km, vehicle),
    }
}

/// Base plus distance charge, floored at the vehicle minimum. The floor is
/// applied before the package size multiplier.
pub fn pre_multiplier_total(distance_km: f64, rates: &VehicleRates) -> f64 {
    let distance_fare = billable_km(sanitize_distance(distance_km)) * rates.per_km as f64;
    (rates.base_rate as f64 + distance_fare).max(rates.min_fare as f64)
}

pub fn service_fee(subtotal: Money) -> Money {
    (subtotal as f64 * SERVICE_FEE_RATE).round() as Money
}

/// Formats the ETA band, e.g. `"16-24 min"`.
pub fn estimate_time_range(distance_km: f64, vehicle: VehicleClass) -> String {
    let rates = vehicle.rates();
    let travel_minutes = (sanitize_distance(distance_km) / rates.average_speed_kmh) * 60.0;
    let total_minutes = HANDLING_MINUTES + travel_minutes;

    let min_time = ((total_minutes * 0.8).round() as i64).max(MIN_ETA_MINUTES);
    let max_time = (total_minutes * 1.2).round() as i64;

    format!("{min_time}-{max_time} min")
}

/// Quote shown when the distance provider itself fails.
pub fn fallback_quote() -> FareQuote {
    FareQuote {
        base_fare: 3500,
        distance_fare: 1500,
        package_size_multiplier: 1.0,
        subtotal: 5000,
        service_fee: 750,
        discount: None,
        total: 5750,
        distance_km: 5.0,
        estimated_time_range: "20-30 min".to_string(),
    }
}

/// `"TZS 12,500"`.
pub fn format_price(amount: Money) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("TZS {sign}{grouped}")
}

pub fn format_distance(distance_km: f64) -> String {
    if distance_km < 1.0 {
        return format!("{} m", (distance_km * 1000.0).round() as i64);
    }
    format!("{distance_km:.1} km")
}

fn billable_km(distance_km: f64) -> f64 {
    (distance_km - FREE_DISTANCE_KM).max(0.0)
}

fn sanitize_distance(distance_km: f64) -> f64 {
    if distance_km.is_finite() {
        distance_km.clamp(0.0, MAX_DISTANCE_KM)
    } else {
        0.0
    }
}
