use serde::{Deserialize, Serialize};

/// Whole currency units (TZS has no minor unit in practice).
pub type Money = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    #[default]
    Boda,
    Bajaji,
    Guta,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleRates {
    pub base_rate: Money,
    pub per_km: Money,
    pub min_fare: Money,
    pub average_speed_kmh: f64,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 3] = [VehicleClass::Boda, VehicleClass::Bajaji, VehicleClass::Guta];

    pub fn rates(self) -> VehicleRates {
        match self {
            VehicleClass::Boda => VehicleRates {
                base_rate: 2000,
                per_km: 500,
                min_fare: 1000,
                average_speed_kmh: 30.0,
            },
            VehicleClass::Bajaji => VehicleRates {
                base_rate: 3000,
                per_km: 750,
                min_fare: 2000,
                average_speed_kmh: 25.0,
            },
            VehicleClass::Guta => VehicleRates {
                base_rate: 5000,
                per_km: 1000,
                min_fare: 5000,
                average_speed_kmh: 20.0,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleClass::Boda => "boda",
            VehicleClass::Bajaji => "bajaji",
            VehicleClass::Guta => "guta",
        }
    }

    /// Unknown or missing labels price as a boda.
    pub fn parse_or_default(label: Option<&str>) -> Self {
        match label.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("bajaji") => VehicleClass::Bajaji,
            Some("guta") => VehicleClass::Guta,
            _ => VehicleClass::Boda,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackageSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl PackageSize {
    pub const ALL: [PackageSize; 3] = [PackageSize::Small, PackageSize::Medium, PackageSize::Large];

    pub fn multiplier(self) -> f64 {
        match self {
            PackageSize::Small => 1.0,
            PackageSize::Medium => 1.5,
            PackageSize::Large => 1.8,
        }
    }

    /// Unknown or missing labels carry no surcharge.
    pub fn parse_or_default(label: Option<&str>) -> Self {
        match label.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("medium") => PackageSize::Medium,
            Some("large") => PackageSize::Large,
            _ => PackageSize::Small,
        }
    }
}

/// Priced estimate for a prospective delivery.
///
/// `distance_fare` is a display decomposition only and is not expected to
/// reconcile with `subtotal - base_fare`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareQuote {
    pub base_fare: Money,
    pub distance_fare: Money,
    pub package_size_multiplier: f64,
    pub subtotal: Money,
    pub service_fee: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Money>,
    pub total: Money,
    pub distance_km: f64,
    pub estimated_time_range: String,
}

#[cfg(test)]
mod tests {
    use super::{PackageSize, VehicleClass};

    #[test]
    fn unknown_vehicle_label_falls_back_to_boda() {
        assert_eq!(VehicleClass::parse_or_default(Some("truck")), VehicleClass::Boda);
        assert_eq!(VehicleClass::parse_or_default(None), VehicleClass::Boda);
        assert_eq!(VehicleClass::parse_or_default(Some(" Guta ")), VehicleClass::Guta);
    }

    #[test]
    fn unknown_package_size_has_unit_multiplier() {
        let size = PackageSize::parse_or_default(Some("huge"));
        assert_eq!(size, PackageSize::Small);
        assert_eq!(size.multiplier(), 1.0);
        assert_eq!(PackageSize::parse_or_default(Some("LARGE")).multiplier(), 1.8);
    }
}
