use crate::models::delivery::DeliveryStatus;

/// Statuses a delivery may move to next. Terminal statuses have none.
pub fn allowed_transitions(from: DeliveryStatus) -> &'static [DeliveryStatus] {
    use DeliveryStatus::*;

    match from {
        Pending => &[Searching],
        Searching => &[Accepted, Cancelled],
        Accepted => &[ArrivedPickup, Cancelled],
        ArrivedPickup => &[PickedUp, Cancelled],
        PickedUp => &[InTransit, Cancelled],
        InTransit => &[ArrivedDropoff, Cancelled],
        ArrivedDropoff => &[Delivered],
        Delivered | Cancelled | Failed => &[],
    }
}

pub fn can_transition(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    allowed_transitions(from).contains(&to)
}
