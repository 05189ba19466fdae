/* ==================================================================================================
 *                           This file is part of the bachelor thesis project
 *                  Implementation and Analysis of Selected Noise Reduction Methods
 *                                Weronika Tarnawska (Index No. 331171)
 *                                  Supervisor:  dr hab. Paweł Woźny
 *                                  University of Wrocław, June 2025
 * ================================================================================================== */
use crate::error::{DspError, Result};
use crate::signal::Signal;
use log::debug;

pub const DEFAULT_FILTER_LENGTH: usize = 64;
pub const DEFAULT_STEP_SIZE: f64 = 0.01;

/// Result of one LMS pass.
#[derive(Clone, Debug)]
pub struct LmsOutput {
    /// Filter output `y[n]`, zero for the first `filter_length` samples.
    pub output: Vec<f64>,
    /// Prediction error `d[n] - y[n]`, zero for the first `filter_length` samples.
    pub error: Vec<f64>,
    /// Final filter coefficients.
    pub weights: Vec<f64>,
}

/// Performs the core LMS recursion. Inputs are already validated.
///
/// # Arguments
/// * `x` - Reference signal
/// * `d` - Desired signal, same length as `x`
/// * `p` - Filter length
/// * `mu` - Step size (learning rate)
fn lms_inner(x: &[f64], d: &[f64], p: usize, mu: f64) -> LmsOutput {
    let n = d.len();
    let mut e = vec![0.0; n];
    let mut y = vec![0.0; n];
    let mut w = vec![0.0; p];

    for k in p..n {
        // one-sample convolution, most recent reference sample first
        let mut y_k = 0.0;
        for i in 0..p {
            y_k += w[i] * x[k - i];
        }

        // error between desired and output
        let e_k = d[k] - y_k;

        // update weights
        for i in 0..p {
            w[i] += mu * e_k * x[k - i];
        }

        e[k] = e_k;
        y[k] = y_k;
    }

    LmsOutput {
        output: y,
        error: e,
        weights: w,
    }
}

/// Adapts an FIR filter mapping `reference` onto `desired` with the Least Mean Squares rule.
///
/// The first `filter_length` outputs stay zero (startup transient). Divergence is not
/// caught inside the loop: a non-finite output or weight after the pass is reported as `Numeric`.
///
/// # Arguments
/// * `reference` - Reference (noise proxy) signal
/// * `desired` - Desired signal, same length as `reference`
/// * `filter_length` - Number of filter coefficients
/// * `step_size` - Learning rate (mu): controls adaptation speed
pub fn lms(reference: &[f64], desired: &[f64], filter_length: usize, step_size: f64) -> Result<LmsOutput> {
    if reference.len() != desired.len() {
        return Err(DspError::input(format!(
            "reference has {} samples, desired has {}",
            reference.len(),
            desired.len()
        )));
    }
    if filter_length == 0 {
        return Err(DspError::spec("LMS filter length must be >= 1"));
    }
    if filter_length >= desired.len() {
        return Err(DspError::input(format!(
            "LMS filter length {} needs more than {} samples",
            filter_length,
            desired.len()
        )));
    }
    if !(step_size.is_finite() && step_size > 0.0) {
        return Err(DspError::spec(format!("LMS step size must be positive, got {}", step_size)));
    }

    let out = lms_inner(reference, desired, filter_length, step_size);

    if out.output.iter().chain(out.weights.iter()).any(|v| !v.is_finite()) {
        return Err(DspError::numeric(format!(
            "LMS diverged with step size {} and filter length {}",
            step_size, filter_length
        )));
    }
    debug!("LMS finished: L={} mu={} |w|={:.4e}", filter_length, step_size, norm(&out.weights));
    Ok(out)
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Runs [`lms`] channel by channel and returns the error signals, i.e. the desired
/// signal with the part predictable from the reference removed.
pub fn lms_signal(reference: &Signal, desired: &Signal, filter_length: usize, step_size: f64) -> Result<Signal> {
    reference.check_compatible(desired)?;
    desired.map_channels(|idx, d| Ok(lms(reference.channel(idx), d, filter_length, step_size)?.error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{mean_square_error, snr_improvement_db_slice};
    use crate::signal::*;
    use float_cmp::approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_startup_transient_is_zero() {
        let mut rng = StdRng::seed_from_u64(4);
        let r = generate_samples(500, SignalType::WhiteNoise, 1.0, &mut rng);
        let d = generate_samples(500, SignalType::WhiteNoise, 1.0, &mut rng);
        for l in [1, 8, 64] {
            let out = lms(&r, &d, l, 0.01).unwrap();
            assert!(out.output[..l].iter().all(|&v| v == 0.0));
            assert!(out.error[..l].iter().all(|&v| v == 0.0));
            assert_eq!(out.weights.len(), l);
        }
    }

    #[test]
    fn test_error_decays_when_reference_is_desired() {
        // unit-power reference; the ideal filter is w = [1, 0, ...]
        let mut rng = StdRng::seed_from_u64(8);
        let r: Vec<f64> = generate_samples(2000, SignalType::WhiteNoise, 1.0, &mut rng)
            .iter()
            .map(|x| x * 3f64.sqrt())
            .collect();
        let out = lms(&r, &r, 8, 0.01).unwrap();

        // exponential moving average of |e|, sampled every 100 iterations
        let mut ema = 0.0;
        let mut checkpoints = Vec::new();
        for (i, e) in out.error.iter().enumerate().skip(8) {
            ema = 0.95 * ema + 0.05 * e.abs();
            if i % 100 == 0 && i >= 100 {
                checkpoints.push(ema);
            }
        }
        for pair in checkpoints[..5].windows(2) {
            assert!(pair[1] < pair[0], "checkpoints {:?}", checkpoints);
        }
        assert!(approx_eq!(f64, out.weights[0], 1.0, epsilon = 1e-3));
        assert!(out.weights[1..].iter().all(|w| w.abs() < 1e-3));
    }

    #[test]
    fn test_lms_denoise() {
        let len = 4000;
        let sample_rate = 4000.0; // arbitrary
        let mut rng = StdRng::seed_from_u64(0);
        let clean = generate_samples(len, SignalType::Sinusoidal(500.0), sample_rate, &mut rng);
        let noise = generate_samples(len, SignalType::Sinusoidal(1200.0), sample_rate, &mut rng);
        let noisy: Vec<f64> = clean.iter().zip(&noise).map(|(c, n)| c + n).collect();
        for filt_size in [16, 32, 64] {
            let out = lms(&noise, &noisy, filt_size, 0.001).unwrap();
            // skip the startup transient and the initial convergence
            let tail = len / 2;
            let improvement = snr_improvement_db_slice(&clean[tail..], &noisy[tail..], &out.error[tail..]).unwrap();
            assert!(improvement >= 20.0, "L={}: improvement {}", filt_size, improvement);
            assert!(mean_square_error(&clean[tail..], &out.error[tail..]).unwrap() < 1e-2);
        }
    }

    #[test]
    fn test_divergence_is_numeric_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let r: Vec<f64> = generate_samples(5000, SignalType::WhiteNoise, 1.0, &mut rng)
            .iter()
            .map(|x| x * 10.0)
            .collect();
        assert!(matches!(lms(&r, &r, 16, 10.0), Err(DspError::Numeric(_))));
    }

    #[test]
    fn test_invalid_arguments() {
        let x = vec![0.0; 32];
        assert!(matches!(lms(&x, &x[..31], 4, 0.01), Err(DspError::InvalidInput(_))));
        assert!(matches!(lms(&x, &x, 0, 0.01), Err(DspError::InvalidSpec(_))));
        assert!(matches!(lms(&x, &x, 32, 0.01), Err(DspError::InvalidInput(_))));
        assert!(matches!(lms(&x, &x, 4, -0.1), Err(DspError::InvalidSpec(_))));
    }

    #[test]
    fn test_lms_signal_per_channel() {
        let noise = Signal::from_channels(vec![vec![1.0, -1.0].repeat(100), vec![0.5, 0.0].repeat(100)], 8000.0).unwrap();
        let out = lms_signal(&noise, &noise, 4, 0.05).unwrap();
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.len(), 200);
        let other_rate = Signal::mono(vec![0.0; 200], 16000.0).unwrap();
        assert!(lms_signal(&other_rate, &other_rate.clone(), 4, 0.05).is_ok());
        assert!(lms_signal(&noise, &other_rate, 4, 0.05).is_err());
    }
}
