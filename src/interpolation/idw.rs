//! Inverse-distance weighting of per-station estimates.

/// Distance below which a station is taken to be at the query point.
pub const EXACT_MATCH_KM: f64 = 0.1;
pub const DEFAULT_POWER: f64 = 2.0;

/// Fuses `(value, distance_km)` pairs into one estimate.
///
/// Rules, checked in order:
/// 1. no samples gives `None`;
/// 2. a single sample is returned as is;
/// 3. the first sample closer than `exact_match_km` is returned as is;
/// 4. otherwise `Σ v·d⁻ᵖ / Σ d⁻ᵖ`.
///
/// Rule 3 runs before any division, so a zero distance never divides.
pub fn idw_with(samples: &[(f64, f64)], power: f64, exact_match_km: f64) -> Option<f64> {
    match samples {
        [] => return None,
        [(value, _)] => return Some(*value),
        _ => {}
    }
    if let Some((value, _)) = samples.iter().find(|(_, d)| *d < exact_match_km) {
        return Some(*value);
    }

    let (weighted, total) = samples
        .iter()
        .fold((0.0, 0.0), |(weighted, total), (value, distance)| {
            let w = 1.0 / distance.powf(power);
            (weighted + value * w, total + w)
        });
    Some(weighted / total)
}

/// [`idw_with`] using the default power and exact-match distance.
pub fn idw(samples: &[(f64, f64)]) -> Option<f64> {
    idw_with(samples, DEFAULT_POWER, EXACT_MATCH_KM)
}
