use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::engine::fare::{format_distance, format_price};
use crate::engine::promo::{apply_discount, validate_quote, PromoCode};
use crate::error::AppError;
use crate::models::fare::{FareQuote, PackageSize, VehicleClass};
use crate::models::location::Coordinates;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fares/quote", post(quote_fare))
        .route("/fares/promo", post(apply_promo))
}

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub pickup: Option<Coordinates>,
    pub dropoff: Option<Coordinates>,
    pub vehicle_type: Option<String>,
    pub package_size: Option<String>,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    pub quote: FareQuote,
    pub formatted_total: String,
    pub formatted_distance: String,
}

impl From<FareQuote> for QuoteResponse {
    fn from(quote: FareQuote) -> Self {
        Self {
            formatted_total: format_price(quote.total),
            formatted_distance: format_distance(quote.distance_km),
            quote,
        }
    }
}

#[derive(Deserialize)]
pub struct PromoRequest {
    pub quote: FareQuote,
    pub code: String,
}

async fn quote_fare(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuoteRequest>,
) -> Json<QuoteResponse> {
    let vehicle = VehicleClass::parse_or_default(payload.vehicle_type.as_deref());
    let size = PackageSize::parse_or_default(payload.package_size.as_deref());

    let quote = state
        .fares
        .calculate_fare(payload.pickup.as_ref(), payload.dropoff.as_ref(), vehicle, size)
        .await;

    Json(quote.into())
}

async fn apply_promo(Json(payload): Json<PromoRequest>) -> Result<Json<QuoteResponse>, AppError> {
    let code = PromoCode::parse(&payload.code)
        .ok_or_else(|| AppError::BadRequest("invalid promo code".to_string()))?;

    if payload.quote.discount.is_some() {
        return Err(AppError::BadRequest("a promo code is already applied".to_string()));
    }
    validate_quote(&payload.quote)?;

    let discounted = apply_discount(&payload.quote, code.discount_rate());
    Ok(Json(discounted.into()))
}
