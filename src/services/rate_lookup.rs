use crate::models::RateSnapshot;

/// Cross rate `from -> to` derived from each leg's rate against the
/// snapshot base. `None` means the pair cannot be priced this cycle.
pub fn cross_rate(from: &str, to: &str, snapshot: &RateSnapshot) -> Option<f64> {
    let from_rate = snapshot.rate(from)?;
    let to_rate = snapshot.rate(to)?;

    if from_rate == 0.0 {
        return None;
    }

    let rate = to_rate / from_rate;
    rate.is_finite().then_some(rate)
}
