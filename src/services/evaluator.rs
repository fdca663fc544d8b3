use crate::models::AlertCondition;

/// Absorbs floating point noise from the cross-rate division so a rate sitting
/// on the threshold does not flap.
pub const TOLERANCE: f64 = 1e-4;

pub fn evaluate(condition: AlertCondition, target_rate: f64, current_rate: f64) -> bool {
    match condition {
        AlertCondition::Above => current_rate > target_rate + TOLERANCE,
        AlertCondition::Below => current_rate < target_rate - TOLERANCE,
    }
}
