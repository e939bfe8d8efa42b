//! Great-circle angular distance and nearest-match selection

/// Angular distance between two sky positions, in radians.
///
/// Spherical law of cosines:
/// `d = arccos(sin φ1·sin φ2 + cos φ1·cos φ2·cos Δλ)`.
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let cos_d = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lon2 - lon1).cos();
    // rounding can push cos_d a hair outside [-1, 1]
    cos_d.clamp(-1.0, 1.0).acos()
}

/// Index of the candidate closest to the reference point.
///
/// Ties break in favor of the first-encountered candidate. Returns
/// `None` when the candidate set is empty. Candidates are `(lat, lon)`
/// pairs in radians.
pub fn nearest_match(lat: f64, lon: f64, candidates: &[(f64, f64)]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, (clat, clon)) in candidates.iter().enumerate() {
        let d = great_circle_distance(lat, lon, *clat, *clon);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const DEG: f64 = PI / 180.0;

    #[test]
    fn test_distance_along_equator() {
        let d = great_circle_distance(0.0, 0.0, 0.0, 10.0 * DEG);
        assert!((d - 10.0 * DEG).abs() < 1e-12);
    }

    #[test]
    fn test_distance_identical_points() {
        let d = great_circle_distance(0.3, 1.2, 0.3, 1.2);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_nearest_match_picks_closest() {
        // candidates at 1, 5 and 0.1 degrees from the reference
        let candidates = vec![
            (0.0, 1.0 * DEG),
            (0.0, 5.0 * DEG),
            (0.1 * DEG, 0.0),
        ];
        assert_eq!(nearest_match(0.0, 0.0, &candidates), Some(2));
    }

    #[test]
    fn test_nearest_match_tie_breaks_first() {
        let candidates = vec![(0.0, 1.0 * DEG), (0.0, -1.0 * DEG)];
        assert_eq!(nearest_match(0.0, 0.0, &candidates), Some(0));
    }

    #[test]
    fn test_nearest_match_empty() {
        assert_eq!(nearest_match(0.0, 0.0, &[]), None);
    }
}
