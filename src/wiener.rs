/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use crate::error::{DspError, Result};
use crate::fft::{welch_psd, Window};
use crate::signal::Signal;
use log::debug;

/// Welch segment length used for both PSD estimates (50% overlap).
pub const WELCH_SEGMENT: usize = 1024;

/// Scalar Wiener suppression factor for one channel:
/// 1. Estimate S_ss and S_nn with Welch's method
/// 2. Compute the per-bin gain S_ss / (S_ss + S_nn)
/// 3. Average the gains over all bins
///
/// # Arguments
/// * `signal`      - Samples of the (noisy) signal.
/// * `noise`       - Samples of the noise reference.
/// * `sample_rate` - Shared sampling frequency in Hz.
///
/// # Returns
/// The mean gain `h`, in [0, 1].
pub fn wiener_gain(signal: &[f64], noise: &[f64], sample_rate: f64) -> Result<f64> {
    let (_, s_ss) = welch_psd(signal, sample_rate, WELCH_SEGMENT, Window::Hann)?;
    let (_, s_nn) = welch_psd(noise, sample_rate, WELCH_SEGMENT, Window::Hann)?;
    if s_ss.len() != s_nn.len() {
        return Err(DspError::input(format!(
            "signal and noise PSDs have {} and {} bins",
            s_ss.len(),
            s_nn.len()
        )));
    }

    let mut sum = 0.0;
    for (k, (&ss, &nn)) in s_ss.iter().zip(s_nn.iter()).enumerate() {
        let total = ss + nn;
        if total == 0.0 {
            return Err(DspError::numeric(format!("signal and noise PSDs are both zero at bin {}", k)));
        }
        sum += ss / total;
    }
    Ok(sum / s_ss.len() as f64)
}

/// Scale every channel of `signal` by its own [`wiener_gain`] against the matching `noise` channel.
///
/// This is a single-gain approximation: the spectrum shape of the signal is left untouched.
pub fn wiener_filter(signal: &Signal, noise: &Signal) -> Result<Signal> {
    if signal.sample_rate() != noise.sample_rate() {
        return Err(DspError::input(format!(
            "sample rates differ: {} vs {}",
            signal.sample_rate(),
            noise.sample_rate()
        )));
    }
    if signal.num_channels() != noise.num_channels() {
        return Err(DspError::input(format!(
            "channel counts differ: {} vs {}",
            signal.num_channels(),
            noise.num_channels()
        )));
    }
    signal.map_channels(|idx, ch| {
        let h = wiener_gain(ch, noise.channel(idx), signal.sample_rate())?;
        debug!("wiener gain for channel {}: {:.4}", idx, h);
        Ok(ch.iter().map(|x| x * h).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::*;
    use crate::_EPSILON;
    use float_cmp::approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_gain_without_noise_is_one() {
        let mut rng = StdRng::seed_from_u64(0);
        let sig = generate_samples(4096, SignalType::WhiteNoise, 8000.0, &mut rng);
        let silence = vec![0.0; 4096];
        let h = wiener_gain(&sig, &silence, 8000.0).unwrap();
        assert!(approx_eq!(f64, h, 1.0, epsilon = _EPSILON));
    }

    #[test]
    fn test_gain_of_equal_white_processes_is_half() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = generate_samples(200_000, SignalType::WhiteNoise, 8000.0, &mut rng);
        let b = generate_samples(200_000, SignalType::WhiteNoise, 8000.0, &mut rng);
        let h = wiener_gain(&a, &b, 8000.0).unwrap();
        assert!((h - 0.5).abs() < 0.01, "h={}", h);
    }

    #[test]
    fn test_gain_drops_with_louder_noise() {
        let mut rng = StdRng::seed_from_u64(5);
        let sig = generate_samples(50_000, SignalType::WhiteNoise, 8000.0, &mut rng);
        let noise = generate_samples(50_000, SignalType::WhiteNoise, 8000.0, &mut rng);
        let quiet: Vec<f64> = noise.iter().map(|x| x * 0.1).collect();
        let loud: Vec<f64> = noise.iter().map(|x| x * 3.0).collect();
        let h_quiet = wiener_gain(&sig, &quiet, 8000.0).unwrap();
        let h_loud = wiener_gain(&sig, &loud, 8000.0).unwrap();
        assert!(h_quiet > 0.95 && h_loud < 0.15, "quiet={} loud={}", h_quiet, h_loud);
    }

    #[test]
    fn test_zero_psd_is_numeric_error() {
        let silence = vec![0.0; 2048];
        assert!(matches!(wiener_gain(&silence, &silence, 8000.0), Err(DspError::Numeric(_))));
    }

    #[test]
    fn test_filter_scales_each_channel() {
        let mut rng = StdRng::seed_from_u64(6);
        let left = generate_samples(8192, SignalType::WhiteNoise, 8000.0, &mut rng);
        let right = generate_samples(8192, SignalType::WhiteNoise, 8000.0, &mut rng);
        let sig = Signal::from_channels(vec![left.clone(), right.clone()], 8000.0).unwrap();
        let noise = Signal::from_channels(vec![vec![0.0; 8192], right.clone()], 8000.0).unwrap();
        let out = wiener_filter(&sig, &noise).unwrap();

        assert_eq!(out.channel(0), sig.channel(0));
        let h = wiener_gain(&right, &right, 8000.0).unwrap();
        assert!(approx_eq!(f64, h, 0.5, epsilon = _EPSILON));
        for (o, x) in out.channel(1).iter().zip(&right) {
            assert!(approx_eq!(f64, *o, x * 0.5, epsilon = _EPSILON));
        }
    }

    #[test]
    fn test_filter_rejects_mismatch() {
        let sig = Signal::mono(vec![1.0; 2048], 8000.0).unwrap();
        let other_rate = Signal::mono(vec![1.0; 2048], 16000.0).unwrap();
        let stereo = Signal::from_channels(vec![vec![1.0; 2048]; 2], 8000.0).unwrap();
        assert!(matches!(wiener_filter(&sig, &other_rate), Err(DspError::InvalidInput(_))));
        assert!(matches!(wiener_filter(&sig, &stereo), Err(DspError::InvalidInput(_))));
    }
}
