use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use courier_core::api::rest::router;
use courier_core::config::Config;
use courier_core::error::AppError;
use courier_core::geo::DistanceProvider;
use courier_core::models::delivery::DeliveryStatus;
use courier_core::models::location::Coordinates;
use courier_core::state::AppState;
use futures::future::{self, BoxFuture};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

struct FixedDistance(f64);

impl DistanceProvider for FixedDistance {
    fn distance_km<'a>(
        &'a self,
        _origin: &'a Coordinates,
        _destination: &'a Coordinates,
    ) -> BoxFuture<'a, Result<f64, AppError>> {
        Box::pin(future::ready(Ok(self.0)))
    }
}

struct BrokenDistance;

impl DistanceProvider for BrokenDistance {
    fn distance_km<'a>(
        &'a self,
        _origin: &'a Coordinates,
        _destination: &'a Coordinates,
    ) -> BoxFuture<'a, Result<f64, AppError>> {
        Box::pin(future::ready(Err(AppError::Upstream(
            "distance matrix quota exceeded".to_string(),
        ))))
    }
}

fn setup() -> axum::Router {
    router(Arc::new(AppState::new(&Config::default())))
}

fn setup_with(distance: Arc<dyn DistanceProvider>) -> axum::Router {
    router(Arc::new(AppState::with_distance_provider(
        &Config::default(),
        distance,
    )))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn trip() -> Value {
    json!({
        "pickup": { "latitude": -6.8161, "longitude": 39.2803 },
        "dropoff": { "latitude": -6.7735, "longitude": 39.2395 }
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_trackers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_trackers"));
}

#[tokio::test]
async fn quote_prices_provider_distance() {
    let app = setup_with(Arc::new(FixedDistance(10.0)));
    let mut request = trip();
    request["vehicle_type"] = json!("boda");
    request["package_size"] = json!("medium");

    let response = app
        .oneshot(json_request("POST", "/fares/quote", request))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["quote"]["base_fare"], 2000);
    assert_eq!(body["quote"]["distance_fare"], 5250);
    assert_eq!(body["quote"]["package_size_multiplier"], 1.5);
    assert_eq!(body["quote"]["subtotal"], 8200);
    assert_eq!(body["quote"]["service_fee"], 1476);
    assert_eq!(body["quote"]["total"], 9676);
    assert_eq!(body["quote"]["distance_km"], 10.0);
    assert_eq!(body["quote"]["estimated_time_range"], "24-36 min");
    assert!(body["quote"].get("discount").is_none());
    assert_eq!(body["formatted_total"], "TZS 9,676");
    assert_eq!(body["formatted_distance"], "10.0 km");
}

#[tokio::test]
async fn quote_without_coordinates_uses_default_distance() {
    let app = setup();
    let response = app
        .oneshot(json_request("POST", "/fares/quote", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["quote"]["distance_km"], 5.0);
    assert_eq!(body["quote"]["subtotal"], 3000);
    assert_eq!(body["quote"]["service_fee"], 540);
    assert_eq!(body["quote"]["total"], 3540);
}

#[tokio::test]
async fn unknown_vehicle_and_size_price_like_small_boda() {
    let app = setup_with(Arc::new(FixedDistance(8.0)));

    let mut odd = trip();
    odd["vehicle_type"] = json!("helicopter");
    odd["package_size"] = json!("enormous");
    let odd_quote = body_json(
        app.clone()
            .oneshot(json_request("POST", "/fares/quote", odd))
            .await
            .unwrap(),
    )
    .await;

    let mut plain = trip();
    plain["vehicle_type"] = json!("boda");
    plain["package_size"] = json!("small");
    let plain_quote = body_json(
        app.oneshot(json_request("POST", "/fares/quote", plain))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(odd_quote, plain_quote);
    assert_eq!(odd_quote["quote"]["package_size_multiplier"], 1.0);
}

#[tokio::test]
async fn failing_distance_provider_returns_fallback_quote() {
    let app = setup_with(Arc::new(BrokenDistance));
    let response = app
        .oneshot(json_request("POST", "/fares/quote", trip()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["quote"]["subtotal"], 5000);
    assert_eq!(body["quote"]["service_fee"], 750);
    assert_eq!(body["quote"]["total"], 5750);
    assert_eq!(body["quote"]["distance_km"], 5.0);
    assert_eq!(body["quote"]["estimated_time_range"], "20-30 min");
}

#[tokio::test]
async fn promo_discounts_subtotal_but_not_service_fee() {
    let app = setup_with(Arc::new(FixedDistance(10.0)));
    let mut request = trip();
    request["package_size"] = json!("medium");

    let quoted = body_json(
        app.clone()
            .oneshot(json_request("POST", "/fares/quote", request))
            .await
            .unwrap(),
    )
    .await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/fares/promo",
            json!({ "quote": quoted["quote"], "code": "welcome50" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["quote"]["subtotal"], 8200);
    assert_eq!(body["quote"]["discount"], 4100);
    assert_eq!(body["quote"]["service_fee"], 1476);
    assert_eq!(body["quote"]["total"], 5576);
    assert_eq!(body["formatted_total"], "TZS 5,576");
}

#[tokio::test]
async fn invalid_promo_code_returns_400() {
    let app = setup_with(Arc::new(FixedDistance(4.0)));
    let quoted = body_json(
        app.clone()
            .oneshot(json_request("POST", "/fares/quote", trip()))
            .await
            .unwrap(),
    )
    .await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/fares/promo",
            json!({ "quote": quoted["quote"], "code": "FREESTUFF" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid promo code");
}

#[tokio::test]
async fn promo_rejects_quotes_with_impossible_amounts() {
    let app = setup_with(Arc::new(FixedDistance(4.0)));
    let mut quoted = body_json(
        app.clone()
            .oneshot(json_request("POST", "/fares/quote", trip()))
            .await
            .unwrap(),
    )
    .await;
    quoted["quote"]["subtotal"] = json!(i64::MAX);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/fares/promo",
            json!({ "quote": quoted["quote"], "code": "WELCOME50" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    quoted["quote"]["subtotal"] = json!(3000);
    quoted["quote"]["service_fee"] = json!(-540);
    let response = app
        .oneshot(json_request(
            "POST",
            "/fares/promo",
            json!({ "quote": quoted["quote"], "code": "WELCOME50" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn published_snapshot_is_readable() {
    let app = setup();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/deliveries/d-100/snapshots",
            json!({
                "status": "searching",
                "timeline": { "pending": "2024-05-10T08:00:00Z" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app.oneshot(get_request("/deliveries/d-100")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["id"], "d-100");
    assert_eq!(body["status"], "searching");
}

#[tokio::test]
async fn get_unknown_delivery_returns_404() {
    let app = setup();
    let response = app.oneshot(get_request("/deliveries/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn snapshot_for_another_delivery_returns_400() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/deliveries/d-1/snapshots",
            json!({ "id": "d-2", "status": "searching" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn driver_profile_rating_is_clamped() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "PUT",
            "/drivers/drv-1/profile",
            json!({ "name": "Neema", "rating": 7.5 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["id"], "drv-1");
    assert_eq!(body["rating"], 5.0);
}

#[tokio::test]
async fn driver_profile_without_name_returns_400() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "PUT",
            "/drivers/drv-1/profile",
            json!({ "name": " " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn driver_location_out_of_range_returns_400() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers/drv-1/location",
            json!({ "latitude": 123.0, "longitude": 39.2 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn snapshots_published_over_http_reach_an_attached_tracker() {
    let state = Arc::new(AppState::new(&Config::default()));
    let app = router(state.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = state.tracker.attach("d-7", move |update| {
        let _ = tx.send(update.clone());
    });

    let snapshots = [
        json!({
            "status": "in_transit",
            "driverId": "drv-5",
            "timeline": {
                "searching": "2024-05-10T08:00:00Z",
                "accepted": "2024-05-10T08:04:00Z",
                "picked_up": "2024-05-10T08:20:00Z",
                "in_transit": "2024-05-10T08:21:00Z"
            }
        }),
        json!({
            "status": "accepted",
            "driverId": "drv-5",
            "timeline": {
                "searching": "2024-05-10T08:00:00Z",
                "accepted": "2024-05-10T08:04:00Z",
                "arrived_pickup": "2024-05-10T08:12:00Z"
            }
        }),
    ];

    for snapshot in snapshots {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/deliveries/d-7/snapshots", snapshot))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let state_with_all_entries = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let update = rx.recv().await.unwrap();
            if update.timeline.len() == 5 {
                return update;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(state_with_all_entries.status, Some(DeliveryStatus::InTransit));
    let keys: Vec<&str> = state_with_all_entries
        .timeline
        .iter()
        .map(|entry| entry.status_key.as_str())
        .collect();
    assert_eq!(
        keys,
        ["searching", "accepted", "arrived_pickup", "picked_up", "in_transit"]
    );
    assert_eq!(state_with_all_entries.timeline[0].time, "11:00");

    handle.detach().await;

    let response = app.oneshot(get_request("/health")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["active_trackers"], 0);
}
