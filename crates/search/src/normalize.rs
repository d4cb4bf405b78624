use std::f32::consts::FRAC_PI_2;

/// Map a raw backend distance onto a `[0, 1]` relevance score.
///
/// `0` maps to `1.0`, growing distances decay towards `0.0` along an arctan
/// curve, and anything that would exceed `1.0` (negative distances) is
/// clamped. NaN is treated as the worst possible distance.
#[must_use]
pub fn normalize_distance(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    ((FRAC_PI_2 - distance.atan()) / FRAC_PI_2).clamp(0.0, 1.0)
}
