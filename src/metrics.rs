/* ==================================================================================================
 *                           This file is part of the bachelor thesis project
 *                  Implementation and Analysis of Selected Noise Reduction Methods
 *                                Weronika Tarnawska (Index No. 331171)
 *                                  Supervisor:  dr hab. Paweł Woźny
 *                                  University of Wrocław, June 2025
 * ================================================================================================== */
use crate::error::{DspError, Result};
use crate::fft::{fft_frequencies, fft_real, positive_power_spectrum};
use crate::signal::{power, Signal};

pub const DEFAULT_ROLLOFF_PERCENTILE: f64 = 85.0;

fn check_same_len(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(DspError::input(format!("lengths differ: {} vs {}", a.len(), b.len())));
    }
    if a.is_empty() {
        return Err(DspError::input("metrics need at least one sample"));
    }
    Ok(())
}

fn finite_or_numeric(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DspError::numeric(format!("{} is undefined ({})", what, value)))
    }
}

/// Arithmetic mean of a per-channel metric.
fn channel_mean<F>(signal: &Signal, mut f: F) -> Result<f64>
where
    F: FnMut(usize, &[f64]) -> Result<f64>,
{
    let mut sum = 0.0;
    for (idx, ch) in signal.channels().iter().enumerate() {
        sum += f(idx, ch)?;
    }
    Ok(sum / signal.num_channels() as f64)
}

/// Computes the mean squared error (MSE) between two signals.
pub fn mean_square_error(signal1: &[f64], signal2: &[f64]) -> Result<f64> {
    check_same_len(signal1, signal2)?;
    Ok(signal1
        .iter()
        .zip(signal2.iter())
        .map(|(s1, s2)| (s1 - s2) * (s1 - s2))
        .sum::<f64>()
        / signal1.len() as f64)
}

/// SNR in dB of `test` against the reference `original`:
/// `10 * log10(mean(original^2) / mean((test - original)^2))`.
///
/// Identical inputs have no noise and give `Numeric`.
pub fn snr_db_slice(original: &[f64], test: &[f64]) -> Result<f64> {
    let noise_power = mean_square_error(original, test)?;
    if noise_power == 0.0 {
        return Err(DspError::numeric("SNR undefined: noise power is zero"));
    }
    finite_or_numeric(10.0 * (power(original) / noise_power).log10(), "SNR")
}

/// Peak SNR in dB: `20 * log10(max|original| / sqrt(mse))`.
pub fn psnr_db_slice(original: &[f64], test: &[f64]) -> Result<f64> {
    let mse = mean_square_error(original, test)?;
    if mse == 0.0 {
        return Err(DspError::numeric("PSNR undefined: mean square error is zero"));
    }
    let peak = original.iter().fold(0.0_f64, |max, &s| max.max(s.abs()));
    finite_or_numeric(20.0 * (peak / mse.sqrt()).log10(), "PSNR")
}

/// Power-weighted mean frequency over the full signed DFT frequency axis.
///
/// Real signals have a symmetric power spectrum, so this sits close to 0 Hz
/// unless the content is concentrated at the (negative) Nyquist bin.
pub fn spectral_centroid_slice(samples: &[f64], sample_rate: f64) -> Result<f64> {
    if samples.is_empty() {
        return Err(DspError::input("spectral centroid needs at least one sample"));
    }
    let spectrum = fft_real(samples);
    let freqs = fft_frequencies(samples.len(), sample_rate);
    let (weighted, total) = freqs
        .iter()
        .zip(spectrum.iter())
        .fold((0.0, 0.0), |(w, t), (f, x)| (w + f * x.norm_sqr(), t + x.norm_sqr()));
    if total == 0.0 {
        return Err(DspError::numeric("spectral centroid undefined: zero spectral power"));
    }
    Ok(weighted / total)
}

/// Smallest non-negative frequency where the cumulative power reaches `percentile` % of the total.
pub fn spectral_rolloff_slice(samples: &[f64], sample_rate: f64, percentile: f64) -> Result<f64> {
    if !(percentile > 0.0 && percentile <= 100.0) {
        return Err(DspError::spec(format!("rolloff percentile must lie in (0, 100], got {}", percentile)));
    }
    if samples.is_empty() {
        return Err(DspError::input("spectral rolloff needs at least one sample"));
    }
    let (freqs, spectrum) = positive_power_spectrum(samples, sample_rate);
    let total: f64 = spectrum.iter().sum();
    if total == 0.0 {
        return Err(DspError::numeric("spectral rolloff undefined: zero spectral power"));
    }
    let threshold = total * percentile / 100.0;
    let mut cumulative = 0.0;
    for (f, p) in freqs.iter().zip(spectrum.iter()) {
        cumulative += p;
        if cumulative >= threshold {
            return Ok(*f);
        }
    }
    Err(DspError::numeric("spectral rolloff threshold never reached"))
}

/// SNR in dB, computed per channel and averaged.
pub fn snr_db(original: &Signal, test: &Signal) -> Result<f64> {
    original.check_compatible(test)?;
    channel_mean(original, |idx, ch| snr_db_slice(ch, test.channel(idx)))
}

/// PSNR in dB, computed per channel and averaged.
pub fn psnr_db(original: &Signal, test: &Signal) -> Result<f64> {
    original.check_compatible(test)?;
    channel_mean(original, |idx, ch| psnr_db_slice(ch, test.channel(idx)))
}

/// Spectral centroid in Hz, computed per channel and averaged.
pub fn spectral_centroid(signal: &Signal) -> Result<f64> {
    channel_mean(signal, |_, ch| spectral_centroid_slice(ch, signal.sample_rate()))
}

/// Spectral rolloff in Hz, computed per channel and averaged.
pub fn spectral_rolloff(signal: &Signal, percentile: f64) -> Result<f64> {
    channel_mean(signal, |_, ch| spectral_rolloff_slice(ch, signal.sample_rate(), percentile))
}

/// Compute the improvement in SNR (in dB) from a noisy input to a processed output,
/// relative to a clean reference.
///
/// improvement_dB = SNR_db(clean, processed) - SNR_db(clean, noisy)
pub fn snr_improvement_db_slice(clean: &[f64], noisy: &[f64], processed: &[f64]) -> Result<f64> {
    let snr_in = snr_db_slice(clean, noisy)?;
    let snr_out = snr_db_slice(clean, processed)?;
    Ok(snr_out - snr_in)
}

/// [`snr_improvement_db_slice`] over whole signals, using the channel-averaged SNR.
pub fn snr_improvement_db(clean: &Signal, noisy: &Signal, processed: &Signal) -> Result<f64> {
    Ok(snr_db(clean, processed)? - snr_db(clean, noisy)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::*;
    use crate::_EPSILON;
    use float_cmp::approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tone(len: usize, freq: f64, sr: f64) -> Vec<f64> {
        generate_samples(len, SignalType::Sinusoidal(freq), sr, &mut StdRng::seed_from_u64(0))
    }

    #[test]
    fn test_snr_known_value() {
        let original = vec![1.0, -1.0].repeat(50);
        let test: Vec<f64> = original.iter().map(|x| x + 0.1).collect();
        assert!(approx_eq!(f64, snr_db_slice(&original, &test).unwrap(), 20.0, epsilon = 1e-9));
    }

    #[test]
    fn test_snr_of_identical_signals_is_numeric_error() {
        let x = tone(100, 5.0, 100.0);
        assert!(matches!(snr_db_slice(&x, &x), Err(DspError::Numeric(_))));
        let sig = Signal::mono(x, 100.0).unwrap();
        assert!(matches!(snr_db(&sig, &sig.clone()), Err(DspError::Numeric(_))));
    }

    #[test]
    fn test_snr_averages_channels() {
        let base = vec![1.0, -1.0].repeat(50);
        let original = Signal::from_channels(vec![base.clone(), base.clone()], 8000.0).unwrap();
        let ch0: Vec<f64> = base.iter().map(|x| x + 0.1).collect();
        let ch1: Vec<f64> = base.iter().map(|x| x + 10f64.powf(-0.5)).collect();
        let test = Signal::from_channels(vec![ch0, ch1], 8000.0).unwrap();
        assert!(approx_eq!(f64, snr_db(&original, &test).unwrap(), 15.0, epsilon = 1e-9));

        let short = Signal::mono(base[..10].to_vec(), 8000.0).unwrap();
        assert!(matches!(snr_db(&original, &short), Err(DspError::InvalidInput(_))));
    }

    #[test]
    fn test_psnr_known_value() {
        let original = vec![2.0, 0.0, -1.0, 0.5];
        let test: Vec<f64> = original.iter().map(|x| x - 0.1).collect();
        let expected = 20.0 * (2.0_f64 / 0.1).log10();
        assert!(approx_eq!(f64, psnr_db_slice(&original, &test).unwrap(), expected, epsilon = 1e-9));
        assert!(psnr_db_slice(&original, &original).is_err());
    }

    #[test]
    fn test_centroid_uses_signed_axis() {
        let sr = 1000.0;
        // all energy in the Nyquist bin, which the signed axis places at -fs/2
        let alternating = vec![1.0, -1.0].repeat(32);
        assert!(approx_eq!(f64, spectral_centroid_slice(&alternating, sr).unwrap(), -500.0, epsilon = 1e-9));
        // symmetric spectrum of a real sine balances out
        let sine = tone(1000, 100.0, sr);
        assert!(spectral_centroid_slice(&sine, sr).unwrap().abs() < 1e-6);
        assert!(matches!(spectral_centroid_slice(&[0.0; 8], sr), Err(DspError::Numeric(_))));
    }

    #[test]
    fn test_rolloff_of_two_tones() {
        let sr = 8000.0;
        let low = tone(8000, 500.0, sr);
        let high = tone(8000, 2000.0, sr);
        let mix: Vec<f64> = low.iter().zip(&high).map(|(a, b)| a + b).collect();
        assert!(approx_eq!(f64, spectral_rolloff_slice(&mix, sr, 85.0).unwrap(), 2000.0, epsilon = _EPSILON));
        assert!(approx_eq!(f64, spectral_rolloff_slice(&mix, sr, 40.0).unwrap(), 500.0, epsilon = _EPSILON));
        assert!(approx_eq!(f64, spectral_rolloff_slice(&low, sr, 99.0).unwrap(), 500.0, epsilon = _EPSILON));

        let sig = Signal::from_channels(vec![low, high], sr).unwrap();
        let avg = spectral_rolloff(&sig, DEFAULT_ROLLOFF_PERCENTILE).unwrap();
        assert!(approx_eq!(f64, avg, 1250.0, epsilon = 1e-9));
    }

    #[test]
    fn test_rolloff_rejects_bad_percentile() {
        let x = tone(100, 5.0, 100.0);
        assert!(matches!(spectral_rolloff_slice(&x, 100.0, 0.0), Err(DspError::InvalidSpec(_))));
        assert!(matches!(spectral_rolloff_slice(&x, 100.0, 100.5), Err(DspError::InvalidSpec(_))));
        assert!(matches!(spectral_rolloff_slice(&[0.0; 16], 100.0, 85.0), Err(DspError::Numeric(_))));
    }

    #[test]
    fn test_mse_and_improvement() {
        let clean = vec![1.0, -1.0].repeat(50);
        let noisy: Vec<f64> = clean.iter().map(|x| x + 0.1).collect();
        let processed: Vec<f64> = clean.iter().map(|x| x + 0.01).collect();
        assert!(approx_eq!(f64, mean_square_error(&clean, &noisy).unwrap(), 0.01, epsilon = 1e-12));
        assert!(mean_square_error(&clean, &noisy[..10]).is_err());
        let improvement = snr_improvement_db_slice(&clean, &noisy, &processed).unwrap();
        assert!(approx_eq!(f64, improvement, 20.0, epsilon = 1e-9));
    }
}
