/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use crate::error::{DspError, Result};
use num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug)]
pub enum Window {
    Hamming,
    Hann,
    Blackman,
    Rectangle,
}

/// Handle coefficients for various window types
impl Window {
    /// Generate periodic (DFT-even) window coefficients for a given frame size.
    pub fn coefficients(&self, frame_size: usize) -> Vec<f64> {
        let n = frame_size as f64;
        match self {
            Window::Hamming => (0..frame_size)
                .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / n).cos())
                .collect(),
            Window::Hann => (0..frame_size)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n).cos())
                .collect(),
            Window::Blackman => (0..frame_size)
                .map(|i| {
                    let ratio = 2.0 * PI * i as f64 / n;
                    0.42 - 0.50 * ratio.cos() + 0.08 * (2.0 * ratio).cos()
                })
                .collect(),
            Window::Rectangle => vec![1.0; frame_size],
        }
    }
}

/// Discrete Fourier transform of a real sequence of any length.
pub fn fft_real(samples: &[f64]) -> Vec<Complex<f64>> {
    let mut buffer: Vec<Complex<f64>> = samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer
}

/// Frequency (Hz) of every DFT bin in standard order: `0, 1, ..., -2, -1` times `sample_rate / n`.
pub fn fft_frequencies(n: usize, sample_rate: f64) -> Vec<f64> {
    let step = sample_rate / n as f64;
    let positive = (n - 1) / 2 + 1;
    (0..n)
        .map(|k| {
            if k < positive {
                k as f64 * step
            } else {
                (k as f64 - n as f64) * step
            }
        })
        .collect()
}

/// Power spectrum `|X[k]|^2` restricted to the non-negative frequencies.
///
/// # Returns
/// Parallel vectors of frequencies (Hz) and powers.
pub fn positive_power_spectrum(samples: &[f64], sample_rate: f64) -> (Vec<f64>, Vec<f64>) {
    let spectrum = fft_real(samples);
    fft_frequencies(samples.len(), sample_rate)
        .into_iter()
        .zip(spectrum)
        .filter(|(f, _)| *f >= 0.0)
        .map(|(f, x)| (f, x.norm_sqr()))
        .unzip()
}

/// Estimate the one-sided power spectral density with Welch's method:
/// 1. Split into segments of `nperseg` samples with 50% overlap
/// 2. Remove each segment's mean and apply the window
/// 3. Average the scaled periodograms
///
/// # Arguments
/// * `samples`     - Time-domain samples.
/// * `sample_rate` - Sampling frequency in Hz.
/// * `nperseg`     - Segment length, clamped to the input length.
/// * `window`      - Window applied to every segment.
///
/// # Returns
/// Frequencies (Hz) and PSD values (units^2 / Hz), `nperseg / 2 + 1` bins each.
pub fn welch_psd(samples: &[f64], sample_rate: f64, nperseg: usize, window: Window) -> Result<(Vec<f64>, Vec<f64>)> {
    let nperseg = nperseg.min(samples.len());
    if nperseg < 2 {
        return Err(DspError::input(format!(
            "Welch estimate needs at least 2 samples per segment, got {}",
            nperseg
        )));
    }
    let noverlap = nperseg / 2;
    let step = nperseg - noverlap;
    let n_segments = (samples.len() - noverlap) / step;

    let win = window.coefficients(nperseg);
    let win_power: f64 = win.iter().map(|w| w * w).sum();
    if win_power == 0.0 {
        return Err(DspError::numeric("window has zero energy"));
    }
    let scale = 1.0 / (sample_rate * win_power);

    let n_bins = nperseg / 2 + 1;
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);

    let mut psd = vec![0.0; n_bins];
    let mut frame = vec![Complex::new(0.0, 0.0); nperseg];
    for seg in 0..n_segments {
        let chunk = &samples[seg * step..seg * step + nperseg];
        let mean = chunk.iter().sum::<f64>() / nperseg as f64;
        for (slot, (&x, &w)) in frame.iter_mut().zip(chunk.iter().zip(win.iter())) {
            *slot = Complex::new((x - mean) * w, 0.0);
        }
        fft.process(&mut frame);
        for (acc, x) in psd.iter_mut().zip(frame.iter()) {
            *acc += x.norm_sqr() * scale;
        }
    }

    // fold negative frequencies onto positive ones, except DC and (even length) Nyquist
    let last = if nperseg % 2 == 0 { n_bins - 1 } else { n_bins };
    for (k, v) in psd.iter_mut().enumerate() {
        *v /= n_segments as f64;
        if k > 0 && k < last {
            *v *= 2.0;
        }
    }

    let freqs = (0..n_bins).map(|k| k as f64 * sample_rate / nperseg as f64).collect();
    Ok((freqs, psd))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::signal::*;
    use crate::_EPSILON;
    use float_cmp::approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fft_frequencies_layout() {
        assert_eq!(fft_frequencies(4, 8.0), vec![0.0, 2.0, -4.0, -2.0]);
        assert_eq!(fft_frequencies(5, 5.0), vec![0.0, 1.0, 2.0, -2.0, -1.0]);
    }

    #[test]
    fn test_fft_parseval() {
        let mut rng = StdRng::seed_from_u64(3);
        let samples = generate_samples(1000, SignalType::WhiteNoise, 1.0, &mut rng);
        let time_energy: f64 = samples.iter().map(|x| x * x).sum();
        let freq_energy: f64 = fft_real(&samples).iter().map(|c| c.norm_sqr()).sum::<f64>() / 1000.0;
        assert!(approx_eq!(f64, time_energy, freq_energy, epsilon = 1e-9));
    }

    #[test]
    fn test_positive_spectrum_peak() {
        let sr = 1000.0;
        let mut rng = StdRng::seed_from_u64(0);
        let samples = generate_samples(1000, SignalType::Sinusoidal(125.0), sr, &mut rng);
        let (freqs, power) = positive_power_spectrum(&samples, sr);
        assert_eq!(freqs.len(), 500);
        let peak = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| freqs[i])
            .unwrap();
        assert!(approx_eq!(f64, peak, 125.0, epsilon = _EPSILON));
    }

    #[test]
    fn test_periodic_hann() {
        let w = Window::Hann.coefficients(4);
        let expected = [0.0, 0.5, 1.0, 0.5];
        for (a, b) in w.iter().zip(expected.iter()) {
            assert!(approx_eq!(f64, *a, *b, epsilon = _EPSILON));
        }
    }

    #[test]
    fn test_welch_white_noise_level() {
        // uniform noise in [-1, 1) has variance 1/3, spread over fs/2 -> PSD = 2 * (1/3) / fs
        let sr = 8000.0;
        let mut rng = StdRng::seed_from_u64(11);
        let noise = generate_samples(200_000, SignalType::WhiteNoise, sr, &mut rng);
        let (freqs, psd) = welch_psd(&noise, sr, 1024, Window::Hann).unwrap();
        assert_eq!(freqs.len(), 513);
        assert!(approx_eq!(f64, freqs[512], 4000.0, epsilon = _EPSILON));
        let expected = 2.0 / 3.0 / sr;
        let mean: f64 = psd[10..500].iter().sum::<f64>() / 490.0;
        assert!((mean / expected - 1.0).abs() < 0.05, "mean={} expected={}", mean, expected);
    }

    #[test]
    fn test_welch_clamps_segment_and_finds_tone() {
        let sr = 1000.0;
        let mut rng = StdRng::seed_from_u64(0);
        let tone = generate_samples(600, SignalType::Sinusoidal(100.0), sr, &mut rng);
        let (freqs, psd) = welch_psd(&tone, sr, 1024, Window::Hann).unwrap();
        assert_eq!(freqs.len(), 301);
        let peak = psd
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| freqs[i])
            .unwrap();
        assert!((peak - 100.0).abs() <= sr / 600.0);
        assert!(welch_psd(&[1.0], sr, 1024, Window::Hann).is_err());
    }
}
