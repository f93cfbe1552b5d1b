pub mod eta;
pub mod fare;
pub mod promo;
pub mod session;
pub mod status;
pub mod timeline;
pub mod tracker;
