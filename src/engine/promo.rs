use crate::error::AppError;
use crate::models::fare::{FareQuote, Money};

/// Largest subtotal or fee a client-supplied quote may carry.
pub const MAX_QUOTE_AMOUNT: Money = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoCode {
    Welcome50,
}

impl PromoCode {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "WELCOME50" => Some(PromoCode::Welcome50),
            _ => None,
        }
    }

    pub fn discount_rate(self) -> f64 {
        match self {
            PromoCode::Welcome50 => 0.5,
        }
    }
}

/// Rejects client-supplied quotes whose amounts no fare could produce.
pub fn validate_quote(quote: &FareQuote) -> Result<(), AppError> {
    for (field, amount) in [("subtotal", quote.subtotal), ("service_fee", quote.service_fee)] {
        if !(0..=MAX_QUOTE_AMOUNT).contains(&amount) {
            return Err(AppError::BadRequest(format!(
                "{field} must be between 0 and {MAX_QUOTE_AMOUNT}"
            )));
        }
    }
    Ok(())
}

/// Discounts the subtotal only. The service fee stays the fee charged on the
/// undiscounted subtotal.
pub fn apply_discount(quote: &FareQuote, rate: f64) -> FareQuote {
    let rate = rate.clamp(0.0, 1.0);
    let subtotal = quote.subtotal as f64;

    FareQuote {
        discount: Some((subtotal * rate).round() as Money),
        total: ((subtotal * (1.0 - rate)).round() as Money).saturating_add(quote.service_fee),
        ..quote.clone()
    }
}
