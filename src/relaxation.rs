//! Relaxation index: theta / alpha power on the first channel.
//!
//! Only the first channel's band group is read. The index is floored at 0 when
//! there is no first group or when alpha power is exactly zero.

/// Theta / alpha of the first five-element band group.
///
/// Returns 0 when `features` holds fewer than five values or alpha is 0.
pub fn relaxation_index(features: &[f64]) -> f64 {
    if features.len() < 5 {
        return 0.0;
    }
    let theta = features[1];
    let alpha = features[2];
    if alpha == 0.0 {
        return 0.0;
    }
    theta / alpha
}
