//! Spectral envelope estimation.
//!
//! Two estimators: cepstral smoothing of the log-magnitude spectrum (any
//! frame) and log-linear interpolation between harmonic peaks (voiced
//! frames with a known F0).

use crate::fft::{Complex32, RealFft};

/// A measured harmonic partial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicPeak {
    pub harmonic: u32,
    pub frequency: f32,
    pub amplitude: f32,
}

const LOG_FLOOR: f32 = 1e-12;

#[inline]
fn ln_floor(x: f32) -> f32 {
    x.max(LOG_FLOOR).ln()
}

/// Vertex offset and value of a parabola through three equally spaced points.
#[inline]
pub(crate) fn parabolic_vertex(a: f32, b: f32, c: f32) -> (f32, f32) {
    let denom = a - 2.0 * b + c;
    if denom.abs() < 1e-12 {
        return (0.0, b);
    }
    let delta = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
    (delta, b - 0.25 * (a - c) * delta)
}

/// Cepstrally smoothed envelope of a half-spectrum magnitude.
///
/// `lifter` is the number of low-quefrency coefficients kept. `fft` must be
/// planned for `2 * (magnitude.len() - 1)` points.
pub fn cepstral_envelope(magnitude: &[f32], lifter: usize, fft: &mut RealFft) -> Vec<f32> {
    let size = fft.size();
    debug_assert_eq!(magnitude.len(), fft.num_bins());

    let peak = magnitude.iter().copied().fold(0.0f32, f32::max);
    if peak <= LOG_FLOOR {
        return vec![0.0; magnitude.len()];
    }
    let floor = peak * 1e-6;

    let log_spectrum: Vec<Complex32> = magnitude
        .iter()
        .map(|&m| Complex32::new(m.max(floor).ln(), 0.0))
        .collect();
    let mut cepstrum = fft.inverse(&log_spectrum);

    let keep = lifter.max(1).min((size / 2).saturating_sub(1));
    for c in cepstrum.iter_mut().take(size - keep).skip(keep + 1) {
        *c = 0.0;
    }

    fft.forward(&cepstrum)
        .iter()
        .map(|c| c.re.exp())
        .collect()
}

/// Locate harmonic peaks `h * f0` in a magnitude spectrum.
///
/// Each peak is the largest bin within half a harmonic spacing of its
/// nominal position, refined by log-parabolic interpolation.
pub fn harmonic_peaks(magnitude: &[f32], f0: f32, bin_hz: f32) -> Vec<HarmonicPeak> {
    if f0 <= 0.0 || bin_hz <= 0.0 || magnitude.len() < 3 {
        return Vec::new();
    }
    let last = magnitude.len() - 1;
    let spacing = f0 / bin_hz;
    let radius = (spacing * 0.5).floor().max(1.0) as usize;

    let mut peaks = Vec::new();
    let mut h = 1u32;
    loop {
        let center = (h as f32 * spacing).round() as usize;
        if center + 1 > last {
            break;
        }
        let lo = center.saturating_sub(radius).max(1);
        let hi = (center + radius).min(last - 1);
        if lo <= hi {
            let k = (lo..=hi)
                .max_by(|&a, &b| magnitude[a].total_cmp(&magnitude[b]))
                .unwrap_or(center);
            let (delta, log_amp) = parabolic_vertex(
                ln_floor(magnitude[k - 1]),
                ln_floor(magnitude[k]),
                ln_floor(magnitude[k + 1]),
            );
            peaks.push(HarmonicPeak {
                harmonic: h,
                frequency: (k as f32 + delta) * bin_hz,
                amplitude: log_amp.exp(),
            });
        }
        h += 1;
    }
    peaks
}

/// Envelope through harmonic peaks, interpolated linearly in log amplitude
/// and held flat outside the first and last harmonic.
pub fn harmonic_envelope(peaks: &[HarmonicPeak], num_bins: usize, bin_hz: f32) -> Vec<f32> {
    let Some(first) = peaks.first() else {
        return vec![0.0; num_bins];
    };
    let logs: Vec<f32> = peaks.iter().map(|p| ln_floor(p.amplitude)).collect();

    let mut out = Vec::with_capacity(num_bins);
    let mut seg = 0usize;
    for k in 0..num_bins {
        let f = k as f32 * bin_hz;
        if f <= first.frequency {
            out.push(logs[0].exp());
            continue;
        }
        while seg + 1 < peaks.len() && peaks[seg + 1].frequency < f {
            seg += 1;
        }
        if seg + 1 >= peaks.len() {
            out.push(logs[peaks.len() - 1].exp());
            continue;
        }
        let (f0, f1) = (peaks[seg].frequency, peaks[seg + 1].frequency);
        let t = if f1 > f0 { (f - f0) / (f1 - f0) } else { 0.0 };
        out.push((logs[seg] + t * (logs[seg + 1] - logs[seg])).exp());
    }
    out
}

/// Local maxima of an envelope in Hz, interpolated on the log curve,
/// in ascending frequency.
pub fn find_envelope_peaks(envelope: &[f32], bin_hz: f32) -> Vec<f32> {
    if envelope.len() < 3 {
        return Vec::new();
    }
    (1..envelope.len() - 1)
        .filter(|&k| envelope[k] > envelope[k - 1] && envelope[k] >= envelope[k + 1])
        .map(|k| {
            let (delta, _) = parabolic_vertex(
                ln_floor(envelope[k - 1]),
                ln_floor(envelope[k]),
                ln_floor(envelope[k + 1]),
            );
            (k as f32 + delta) * bin_hz
        })
        .collect()
}

/// Formant estimates from harmonic amplitudes: local maxima across
/// harmonics, refined by a parabola through the neighbouring partials.
pub fn formant_frequencies(peaks: &[HarmonicPeak]) -> Vec<(f32, f32)> {
    if peaks.len() < 3 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for w in peaks.windows(3) {
        let (p0, p1, p2) = (&w[0], &w[1], &w[2]);
        if !(p1.amplitude > p0.amplitude && p1.amplitude >= p2.amplitude) {
            continue;
        }
        let (x0, x1, x2) = (p0.frequency, p1.frequency, p2.frequency);
        let (y0, y1, y2) = (
            ln_floor(p0.amplitude),
            ln_floor(p1.amplitude),
            ln_floor(p2.amplitude),
        );
        let denom = (x0 - x1) * (x0 - x2) * (x1 - x2);
        let a = (x2 * (y1 - y0) + x1 * (y0 - y2) + x0 * (y2 - y1)) / denom;
        let b = (x2 * x2 * (y0 - y1) + x1 * x1 * (y2 - y0) + x0 * x0 * (y1 - y2)) / denom;
        let freq = if a < 0.0 && denom.abs() > 1e-12 {
            (-b / (2.0 * a)).clamp(x0, x2)
        } else {
            x1
        };
        out.push((freq, p1.amplitude));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;
    use voxmorph_core::hann_window;

    const SR: f32 = 16000.0;
    const N: usize = 1024;

    fn gaussian_formants(f: f32) -> f32 {
        [(500.0, 1.0), (1500.0, 0.6)]
            .iter()
            .map(|(c, a)| a * (-(f - c) * (f - c) / (2.0 * 150.0 * 150.0)).exp())
            .sum::<f32>()
            + 0.02
    }

    fn vowel_magnitude(f0: f32) -> Vec<f32> {
        let window = hann_window(N);
        let samples: Vec<f32> = (0..N)
            .map(|i| {
                let t = i as f32 / SR;
                let mut s = 0.0;
                let mut h = 1.0;
                while h * f0 < SR / 2.0 - f0 {
                    s += gaussian_formants(h * f0) * (2.0 * PI * h * f0 * t).sin();
                    h += 1.0;
                }
                s * window[i]
            })
            .collect();
        let mut fft = RealFft::new(N);
        fft.forward(&samples).iter().map(|c| c.norm()).collect()
    }

    #[test]
    fn test_parabolic_vertex_symmetric() {
        let (delta, value) = parabolic_vertex(1.0, 2.0, 1.0);
        assert_eq!(delta, 0.0);
        assert_eq!(value, 2.0);

        let (delta, _) = parabolic_vertex(1.0, 2.0, 1.5);
        assert!(delta > 0.0);
    }

    #[test]
    fn test_harmonic_peaks_positions() {
        let mag = vowel_magnitude(100.0);
        let peaks = harmonic_peaks(&mag, 100.0, SR / N as f32);
        assert!(peaks.len() > 70);
        for p in peaks.iter().take(30) {
            let expected = p.harmonic as f32 * 100.0;
            assert!(
                (p.frequency - expected).abs() < 3.0,
                "harmonic {} at {} Hz",
                p.harmonic,
                p.frequency
            );
        }
    }

    #[test]
    fn test_formants_from_harmonics() {
        let mag = vowel_magnitude(100.0);
        let peaks = harmonic_peaks(&mag, 100.0, SR / N as f32);
        let max = peaks.iter().map(|p| p.amplitude).fold(0.0, f32::max);
        let strong: Vec<f32> = formant_frequencies(&peaks)
            .into_iter()
            .filter(|(_, a)| *a > 0.3 * max)
            .map(|(f, _)| f)
            .collect();
        assert_eq!(strong.len(), 2, "formants: {strong:?}");
        assert_abs_diff_eq!(strong[0], 500.0, epsilon = 15.0);
        assert_abs_diff_eq!(strong[1], 1500.0, epsilon = 30.0);
    }

    #[test]
    fn test_harmonic_envelope_follows_peaks() {
        let bin_hz = SR / N as f32;
        let mag = vowel_magnitude(100.0);
        let peaks = harmonic_peaks(&mag, 100.0, bin_hz);
        let env = harmonic_envelope(&peaks, mag.len(), bin_hz);
        assert_eq!(env.len(), mag.len());

        let envelope_peaks = find_envelope_peaks(&env, bin_hz);
        assert!(envelope_peaks.iter().any(|f| (f - 500.0).abs() < 60.0));
        assert!(envelope_peaks.iter().any(|f| (f - 1500.0).abs() < 60.0));

        // Between formants the envelope drops well below the peaks
        let at = |hz: f32| env[(hz / bin_hz).round() as usize];
        assert!(at(1000.0) < 0.2 * at(500.0));
    }

    #[test]
    fn test_cepstral_envelope_is_smooth() {
        let mag = vowel_magnitude(100.0);
        let mut fft = RealFft::new(N);
        let env = cepstral_envelope(&mag, 24, &mut fft);
        assert_eq!(env.len(), mag.len());
        assert!(env.iter().all(|v| v.is_finite() && *v > 0.0));

        // 24 coefficients cannot resolve 100 Hz harmonics, only the formants
        let bin_hz = SR / N as f32;
        let peaks = find_envelope_peaks(&env, bin_hz);
        assert!(peaks.iter().any(|f| (f - 500.0).abs() < 150.0), "{peaks:?}");
        assert!(peaks.iter().any(|f| (f - 1500.0).abs() < 150.0), "{peaks:?}");
        let at = |hz: f32| env[(hz / bin_hz).round() as usize];
        assert!(at(500.0) > at(1000.0));
        assert!(at(1500.0) > at(1000.0));
    }

    #[test]
    fn test_cepstral_envelope_of_silence() {
        let mut fft = RealFft::new(N);
        let env = cepstral_envelope(&vec![0.0; N / 2 + 1], 24, &mut fft);
        assert!(env.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_cepstral_envelope_of_tiny_frame() {
        for size in [2, 4, 6] {
            let mut fft = RealFft::new(size);
            let magnitude = vec![1.0; fft.num_bins()];
            let envelope = cepstral_envelope(&magnitude, 24, &mut fft);
            assert_eq!(envelope.len(), magnitude.len());
            assert!(envelope.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_no_peaks_without_f0() {
        assert!(harmonic_peaks(&[1.0; 64], 0.0, 10.0).is_empty());
        assert!(harmonic_envelope(&[], 8, 10.0).iter().all(|v| *v == 0.0));
    }
}
