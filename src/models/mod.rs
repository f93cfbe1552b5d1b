pub mod delivery;
pub mod driver;
pub mod fare;
pub mod location;
