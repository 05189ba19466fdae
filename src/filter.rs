/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use crate::error::{DspError, Result};
use crate::signal::Signal;
use log::{debug, trace};
use num_complex::Complex;
use std::f64::consts::PI;

/// Zero-phase filtering needs strictly more samples than this per channel.
pub const MIN_FILTFILT_LEN: usize = 15;

/// Transfer function `B(z) / A(z)` designed for a given sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterCoefficients {
    b: Vec<f64>,
    a: Vec<f64>,
    sample_rate: f64,
    label: String,
}

impl FilterCoefficients {
    /// Creates a coefficient set, normalizing both polynomials so that `a[0] == 1`.
    pub fn new(b: Vec<f64>, a: Vec<f64>, sample_rate: f64, label: impl Into<String>) -> Result<Self> {
        if b.is_empty() || a.is_empty() {
            return Err(DspError::spec("filter coefficients must not be empty"));
        }
        if a[0] == 0.0 {
            return Err(DspError::spec("leading denominator coefficient must be non-zero"));
        }
        if b.iter().chain(a.iter()).any(|c| !c.is_finite()) {
            return Err(DspError::numeric("filter coefficients are not finite"));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(DspError::spec(format!("sample rate must be positive, got {}", sample_rate)));
        }
        let a0 = a[0];
        Ok(FilterCoefficients {
            b: b.iter().map(|c| c / a0).collect(),
            a: a.iter().map(|c| c / a0).collect(),
            sample_rate,
            label: label.into(),
        })
    }

    /// Numerator coefficients.
    pub fn b(&self) -> &[f64] {
        &self.b
    }

    /// Denominator coefficients, `a[0] == 1`.
    pub fn a(&self) -> &[f64] {
        &self.a
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Order of the transfer function (degree of the longer polynomial).
    pub fn order(&self) -> usize {
        self.b.len().max(self.a.len()) - 1
    }

    /// Zero-phase filtering of every channel of `signal`.
    pub fn apply(&self, signal: &Signal) -> Result<Signal> {
        apply(self, signal)
    }

    pub fn frequency_response(&self, n_points: usize) -> Result<FrequencyResponse> {
        frequency_response(self, n_points)
    }

    /// Complex response `H(e^jw)` at `freq` Hz.
    pub fn response_at(&self, freq: f64) -> Complex<f64> {
        let w = 2.0 * PI * freq / self.sample_rate;
        let zinv = Complex::from_polar(1.0, -w);
        eval_poly(&self.b, zinv) / eval_poly(&self.a, zinv)
    }
}

/// Pads `b` and `a` with trailing zeros to a common length.
fn padded(b: &[f64], a: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = b.len().max(a.len());
    let mut b = b.to_vec();
    let mut a = a.to_vec();
    b.resize(n, 0.0);
    a.resize(n, 0.0);
    (b, a)
}

/// Filters `x` with direct form II transposed. `zi` holds the initial delay-line state
/// (length `max(len a, len b) - 1`); `a[0]` must be 1.
///
/// # Returns
/// The filtered signal, same length as `x`.
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64], zi: Option<&[f64]>) -> Vec<f64> {
    let (b, a) = padded(b, a);
    let n = b.len();
    let mut z = match zi {
        Some(zi) => zi.to_vec(),
        None => vec![0.0; n - 1],
    };
    z.resize(n - 1, 0.0);

    let mut y = Vec::with_capacity(x.len());
    for &x_k in x {
        let y_k = b[0] * x_k + z.first().copied().unwrap_or(0.0);
        for i in 0..n.saturating_sub(2) {
            z[i] = b[i + 1] * x_k + z[i + 1] - a[i + 1] * y_k;
        }
        if n > 1 {
            z[n - 2] = b[n - 1] * x_k - a[n - 1] * y_k;
        }
        y.push(y_k);
    }
    y
}

/// Initial state of `lfilter` for the step response steady state,
/// so that a constant input of 1 produces a constant output from the first sample.
pub fn lfilter_zi(b: &[f64], a: &[f64]) -> Result<Vec<f64>> {
    let (b, a) = padded(b, a);
    let n = b.len();
    if n < 2 {
        return Ok(Vec::new());
    }

    let total_a: f64 = a.iter().sum();
    if total_a.abs() < f64::EPSILON {
        return Err(DspError::numeric("filter has a pole at z = 1, no steady state exists"));
    }
    let total_c: f64 = (1..n).map(|k| b[k] - a[k] * b[0]).sum();

    let mut zi = vec![0.0; n - 1];
    zi[0] = total_c / total_a;
    let mut asum = 1.0;
    let mut csum = 0.0;
    for k in 1..n - 1 {
        asum += a[k];
        csum += b[k] - a[k] * b[0];
        zi[k] = asum * zi[0] - csum;
    }
    Ok(zi)
}

/// Forward-backward (zero-phase) filtering of a single channel.
///
/// The channel is extended at both ends by odd reflection before filtering and both passes
/// start from the steady-state initial conditions, which keeps the edges free of
/// start-up transients.
pub fn filtfilt(b: &[f64], a: &[f64], x: &[f64]) -> Result<Vec<f64>> {
    let len = x.len();
    if len <= MIN_FILTFILT_LEN {
        return Err(DspError::input(format!(
            "signal too short: {} samples, zero-phase filtering needs more than {}",
            len, MIN_FILTFILT_LEN
        )));
    }

    let padlen = (3 * b.len().max(a.len())).min(len - 1);
    trace!("filtfilt: {} samples, padlen {}", len, padlen);

    // odd extension
    let mut ext = Vec::with_capacity(len + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * x[0] - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=padlen).map(|i| 2.0 * x[len - 1] - x[len - 1 - i]));

    let zi = lfilter_zi(b, a)?;

    let x0 = ext[0];
    let z0: Vec<f64> = zi.iter().map(|z| z * x0).collect();
    let forward = lfilter(b, a, &ext, Some(z0.as_slice()));

    let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
    let y0 = reversed[0];
    let z0: Vec<f64> = zi.iter().map(|z| z * y0).collect();
    reversed = lfilter(b, a, &reversed, Some(z0.as_slice()));

    let out: Vec<f64> = reversed.into_iter().rev().skip(padlen).take(len).collect();
    Ok(out)
}

/// Zero-phase filtering of every channel of `signal` with `coefficients`.
pub fn apply(coefficients: &FilterCoefficients, signal: &Signal) -> Result<Signal> {
    if coefficients.sample_rate != signal.sample_rate() {
        return Err(DspError::input(format!(
            "filter '{}' was designed for {} Hz, signal is {} Hz",
            coefficients.label,
            coefficients.sample_rate,
            signal.sample_rate()
        )));
    }
    debug!(
        "applying {} (order {}) to {} channel(s) x {} samples",
        coefficients.label,
        coefficients.order(),
        signal.num_channels(),
        signal.len()
    );
    let out = signal.map_channels(|_, ch| filtfilt(&coefficients.b, &coefficients.a, ch))?;
    if out.channels().iter().flatten().any(|v| !v.is_finite()) {
        return Err(DspError::numeric(format!("filter '{}' produced non-finite output", coefficients.label)));
    }
    Ok(out)
}

/// Frequency response evaluated on the upper half of the unit circle.
#[derive(Clone, Debug)]
pub struct FrequencyResponse {
    /// Frequencies in Hz.
    pub frequencies: Vec<f64>,
    /// Linear magnitude `|H|`.
    pub magnitude: Vec<f64>,
    /// Unwrapped phase in radians.
    pub phase: Vec<f64>,
}

impl FrequencyResponse {
    /// Magnitude in dB, floored at -200 dB.
    pub fn magnitude_db(&self) -> Vec<f64> {
        self.magnitude.iter().map(|m| 20.0 * (m + 1e-10).log10()).collect()
    }

    /// Linear magnitude at the evaluated frequency closest to `freq`.
    pub fn magnitude_at(&self, freq: f64) -> f64 {
        let idx = self
            .frequencies
            .iter()
            .enumerate()
            .min_by(|(_, f1), (_, f2)| (*f1 - freq).abs().total_cmp(&(*f2 - freq).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.magnitude[idx]
    }
}

/// Evaluates polynomial `c[0] + c[1] z^-1 + ...` at `z^-1 = zinv` (Horner).
fn eval_poly(coeffs: &[f64], zinv: Complex<f64>) -> Complex<f64> {
    coeffs
        .iter()
        .rev()
        .fold(Complex::new(0.0, 0.0), |acc, &c| acc * zinv + c)
}

/// Unwraps a phase sequence so that consecutive values never jump by more than pi.
pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(phase.len());
    let mut correction = 0.0;
    for (i, &p) in phase.iter().enumerate() {
        if i > 0 {
            let delta = p - phase[i - 1];
            if delta.abs() >= PI {
                let mut wrapped = (delta + PI).rem_euclid(2.0 * PI) - PI;
                if wrapped == -PI && delta > 0.0 {
                    wrapped = PI;
                }
                correction += wrapped - delta;
            }
        }
        out.push(p + correction);
    }
    out
}

/// Evaluates the transfer function at `n_points` equally spaced frequencies `k * nyquist / n_points`.
pub fn frequency_response(coefficients: &FilterCoefficients, n_points: usize) -> Result<FrequencyResponse> {
    if n_points == 0 {
        return Err(DspError::input("frequency response needs at least one point"));
    }
    let nyquist = coefficients.sample_rate / 2.0;

    let frequencies: Vec<f64> = (0..n_points).map(|k| k as f64 * nyquist / n_points as f64).collect();
    let h: Vec<Complex<f64>> = frequencies.iter().map(|&f| coefficients.response_at(f)).collect();

    let magnitude = h.iter().map(|c| c.norm()).collect();
    let wrapped: Vec<f64> = h.iter().map(|c| c.arg()).collect();

    Ok(FrequencyResponse {
        frequencies,
        magnitude,
        phase: unwrap_phase(&wrapped),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::_EPSILON;
    use float_cmp::approx_eq;

    fn one_pole(alpha: f64) -> (Vec<f64>, Vec<f64>) {
        // y[n] = alpha * x[n] + (1 - alpha) * y[n-1]
        (vec![alpha], vec![1.0, -(1.0 - alpha)])
    }

    #[test]
    fn test_coefficients_are_normalized() {
        let c = FilterCoefficients::new(vec![2.0, 4.0], vec![2.0, 1.0], 8000.0, "x").unwrap();
        assert_eq!(c.b(), &[1.0, 2.0]);
        assert_eq!(c.a(), &[1.0, 0.5]);
        assert_eq!(c.order(), 1);
        assert!(FilterCoefficients::new(vec![1.0], vec![0.0, 1.0], 8000.0, "x").is_err());
        assert!(FilterCoefficients::new(vec![], vec![1.0], 8000.0, "x").is_err());
    }

    #[test]
    fn test_lfilter_impulse_response() {
        let (b, a) = one_pole(0.5);
        let mut impulse = vec![0.0; 5];
        impulse[0] = 1.0;
        let y = lfilter(&b, &a, &impulse, None);
        let expected = [0.5, 0.25, 0.125, 0.0625, 0.03125];
        for (o, e) in y.iter().zip(expected.iter()) {
            assert!(approx_eq!(f64, *o, *e, epsilon = _EPSILON));
        }
    }

    #[test]
    fn test_lfilter_fir_is_convolution() {
        let y = lfilter(&[1.0, 2.0, 3.0], &[1.0], &[1.0, 0.0, 0.0, 1.0], None);
        assert_eq!(y, vec![1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_lfilter_zi_gives_steady_step() {
        let b = [0.2, 0.3, 0.1];
        let a = [1.0, -0.5, 0.1];
        let zi = lfilter_zi(&b, &a).unwrap();
        let y = lfilter(&b, &a, &[1.0; 10], Some(zi.as_slice()));
        let dc = b.iter().sum::<f64>() / a.iter().sum::<f64>();
        for v in y {
            assert!(approx_eq!(f64, v, dc, epsilon = 1e-12));
        }
    }

    #[test]
    fn test_filtfilt_rejects_short_input() {
        let (b, a) = one_pole(0.5);
        let res = filtfilt(&b, &a, &[0.0; MIN_FILTFILT_LEN]);
        assert!(matches!(res, Err(DspError::InvalidInput(_))));
        assert!(filtfilt(&b, &a, &[0.0; MIN_FILTFILT_LEN + 1]).is_ok());
    }

    #[test]
    fn test_filtfilt_passes_constant() {
        let (b, a) = one_pole(0.3);
        let y = filtfilt(&b, &a, &[0.7; 64]).unwrap();
        assert_eq!(y.len(), 64);
        for v in y {
            assert!(approx_eq!(f64, v, 0.7, epsilon = 1e-12));
        }
    }

    #[test]
    fn test_filtfilt_has_no_delay() {
        // symmetric pulse must stay symmetric around the same centre
        let mut x = vec![0.0; 101];
        for (i, v) in x.iter_mut().enumerate().take(61).skip(40) {
            *v = 1.0 - ((i as f64 - 50.0) / 10.0).abs();
        }
        let (b, a) = one_pole(0.4);
        let y = filtfilt(&b, &a, &x).unwrap();
        let peak = y
            .iter()
            .enumerate()
            .max_by(|l, r| l.1.total_cmp(r.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 50);
        for k in 1..20 {
            assert!(approx_eq!(f64, y[50 - k], y[50 + k], epsilon = 1e-6), "k={}", k);
        }
    }

    #[test]
    fn test_apply_rejects_rate_mismatch() {
        let c = FilterCoefficients::new(vec![1.0], vec![1.0], 8000.0, "identity").unwrap();
        let sig = Signal::mono(vec![0.0; 32], 16000.0).unwrap();
        assert!(matches!(c.apply(&sig), Err(DspError::InvalidInput(_))));
    }

    #[test]
    fn test_apply_processes_channels_independently() {
        let (b, a) = one_pole(0.5);
        let c = FilterCoefficients::new(b, a, 1000.0, "one-pole").unwrap();
        let left: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
        let right = vec![0.25; 64];
        let sig = Signal::from_channels(vec![left.clone(), right], 1000.0).unwrap();
        let out = c.apply(&sig).unwrap();
        let mono = c.apply(&Signal::mono(left, 1000.0).unwrap()).unwrap();
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.channel(0), mono.channel(0));
        assert!(out.channel(1).iter().all(|v| approx_eq!(f64, *v, 0.25, epsilon = 1e-12)));
    }

    #[test]
    fn test_frequency_response_of_moving_average() {
        // H(w) = (1 + e^-jw) / 2 -> |H| = cos(w/2), phase = -w/2
        let c = FilterCoefficients::new(vec![0.5, 0.5], vec![1.0], 1000.0, "avg").unwrap();
        let resp = c.frequency_response(8).unwrap();
        assert_eq!(resp.frequencies.len(), 8);
        assert!(approx_eq!(f64, resp.frequencies[4], 250.0, epsilon = _EPSILON));
        for (k, (m, p)) in resp.magnitude.iter().zip(&resp.phase).enumerate() {
            let w = PI * k as f64 / 8.0;
            assert!(approx_eq!(f64, *m, (w / 2.0).cos(), epsilon = 1e-12));
            assert!(approx_eq!(f64, *p, -w / 2.0, epsilon = 1e-12));
        }
        assert!(c.frequency_response(0).is_err());
    }

    #[test]
    fn test_unwrap_phase_removes_jumps() {
        let wrapped = vec![0.0, 3.0, -3.0, -0.5];
        let unwrapped = unwrap_phase(&wrapped);
        assert!(approx_eq!(f64, unwrapped[2], -3.0 + 2.0 * PI, epsilon = _EPSILON));
        assert!(approx_eq!(f64, unwrapped[3], -0.5 + 2.0 * PI, epsilon = _EPSILON));
    }
}
