//! Signal metrics for verification and run statistics.

/// Root-mean-square level.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Linear amplitude to dB relative to `reference`, floored at `-top_db`.
pub fn amplitude_to_db(amplitude: f32, reference: f32, top_db: f32) -> f32 {
    if reference <= 0.0 || amplitude <= 0.0 {
        return -top_db;
    }
    (20.0 * (amplitude / reference).log10()).max(-top_db)
}

/// dB to linear gain.
#[inline]
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Energy of `test - reference` relative to `reference`, in dB.
///
/// Compares the common prefix. Returns `f32::NEG_INFINITY` for an exact
/// match and 0 dB when the reference is silent but the test is not.
pub fn relative_error_db(reference: &[f32], test: &[f32]) -> f32 {
    let n = reference.len().min(test.len());
    let mut err = 0.0f64;
    let mut energy = 0.0f64;
    for i in 0..n {
        let d = (test[i] - reference[i]) as f64;
        err += d * d;
        energy += (reference[i] as f64) * (reference[i] as f64);
    }
    if err == 0.0 {
        return f32::NEG_INFINITY;
    }
    if energy == 0.0 {
        return 0.0;
    }
    (10.0 * (err / energy).log10()) as f32
}

/// Click detector for frame-rate discontinuities.
///
/// Ratio of the largest absolute second difference found at hop boundaries
/// (`offset + k * hop`) to the largest found anywhere else. A smooth signal
/// reads about 1 or less; a click at every boundary reads well above it.
pub fn boundary_discontinuity(samples: &[f32], hop: usize, offset: usize) -> f32 {
    if samples.len() < 3 || hop == 0 {
        return 0.0;
    }
    let mut at_boundary = 0.0f32;
    let mut elsewhere = 0.0f32;
    for n in 1..samples.len() - 1 {
        let d2 = (samples[n + 1] - 2.0 * samples[n] + samples[n - 1]).abs();
        // A step between n-1 and n shows in the second difference at both
        let boundary = n >= offset && {
            let phase = (n - offset) % hop;
            phase == 0 || phase == hop - 1
        };
        if boundary {
            at_boundary = at_boundary.max(d2);
        } else {
            elsewhere = elsewhere.max(d2);
        }
    }
    at_boundary / (elsewhere + 1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    #[test]
    fn test_rms_of_sine() {
        let sine: Vec<f32> = (0..16000)
            .map(|i| (2.0 * PI * 100.0 * i as f32 / 16000.0).sin())
            .collect();
        assert_abs_diff_eq!(rms(&sine), std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-3);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_db_conversions() {
        assert_abs_diff_eq!(amplitude_to_db(1.0, 1.0, 80.0), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(amplitude_to_db(0.1, 1.0, 80.0), -20.0, epsilon = 1e-4);
        assert_eq!(amplitude_to_db(0.0, 1.0, 80.0), -80.0);
        assert_eq!(amplitude_to_db(1e-9, 1.0, 80.0), -80.0);
        assert_abs_diff_eq!(db_to_amplitude(-6.0206), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_relative_error() {
        let reference = vec![1.0, -1.0, 1.0, -1.0];
        assert_eq!(relative_error_db(&reference, &reference), f32::NEG_INFINITY);

        let test: Vec<f32> = reference.iter().map(|s| s * 1.001).collect();
        assert_abs_diff_eq!(relative_error_db(&reference, &test), -60.0, epsilon = 0.01);

        assert_eq!(relative_error_db(&[0.0; 4], &[1.0; 4]), 0.0);
    }

    #[test]
    fn test_boundary_discontinuity_detects_steps() {
        let hop = 64;
        let smooth: Vec<f32> = (0..1024)
            .map(|i| (2.0 * PI * 3.0 * i as f32 / 1024.0).sin())
            .collect();
        assert!(boundary_discontinuity(&smooth, hop, 0) < 1.5);

        // Level step every hop
        let stepped: Vec<f32> = smooth
            .iter()
            .enumerate()
            .map(|(i, s)| s + 0.05 * ((i / hop) % 2) as f32)
            .collect();
        assert!(boundary_discontinuity(&stepped, hop, 0) > 10.0);
    }

    #[test]
    fn test_boundary_discontinuity_degenerate() {
        assert_eq!(boundary_discontinuity(&[1.0, 2.0], 4, 0), 0.0);
        assert_eq!(boundary_discontinuity(&[1.0; 16], 0, 0), 0.0);
    }
}
