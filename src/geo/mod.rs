use futures::future::{self, BoxFuture};

use crate::error::AppError;
use crate::models::location::Coordinates;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Source of trip distances for pricing. Implementations may call out to a
/// routing service; they report its failures as [`AppError::Upstream`].
pub trait DistanceProvider: Send + Sync {
    fn distance_km<'a>(
        &'a self,
        origin: &'a Coordinates,
        destination: &'a Coordinates,
    ) -> BoxFuture<'a, Result<f64, AppError>>;
}

/// Great-circle distance, computed in process.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineDistance;

impl DistanceProvider for HaversineDistance {
    fn distance_km<'a>(
        &'a self,
        origin: &'a Coordinates,
        destination: &'a Coordinates,
    ) -> BoxFuture<'a, Result<f64, AppError>> {
        Box::pin(future::ready(Ok(haversine_km(origin, destination))))
    }
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, DistanceProvider, HaversineDistance};
    use crate::models::location::Coordinates;

    #[test]
    fn zero_distance_for_same_point() {
        let p = Coordinates {
            latitude: -6.7924,
            longitude: 39.2083,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn dar_es_salaam_to_bagamoyo_is_around_51_km() {
        let dar = Coordinates {
            latitude: -6.7924,
            longitude: 39.2083,
        };
        let bagamoyo = Coordinates {
            latitude: -6.4422,
            longitude: 38.9048,
        };
        let distance = haversine_km(&dar, &bagamoyo);
        assert!((distance - 51.5).abs() < 5.0);
    }

    #[tokio::test]
    async fn haversine_provider_never_fails() {
        let a = Coordinates {
            latitude: -6.80,
            longitude: 39.28,
        };
        let b = Coordinates {
            latitude: -6.77,
            longitude: 39.24,
        };
        let distance = HaversineDistance.distance_km(&a, &b).await.unwrap();
        assert!(distance > 0.0);
    }
}
