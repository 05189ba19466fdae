/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use crate::design::{design_bandpass, FilterFamily};
use crate::error::{DspError, Result};
use crate::filter::filtfilt;
use crate::signal::{power, Signal};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SNR_DB: f64 = 10.0;
pub const DEFAULT_NARROWBAND: (f64, f64) = (1000.0, 2000.0);
pub const DEFAULT_NARROWBAND_SNR_DB: f64 = 15.0;
pub const DEFAULT_TONE_FREQ: f64 = 1500.0;
pub const DEFAULT_TONE_AMPLITUDE: f64 = 0.3;
pub const DEFAULT_IMPULSE_PROBABILITY: f64 = 0.01;
pub const DEFAULT_IMPULSE_AMPLITUDE: f64 = 0.5;

/// Order of the Butterworth band-pass that shapes narrowband noise.
const NARROWBAND_ORDER: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseKind {
    Gaussian,
    Narrowband,
    SingleFrequency,
    Impulse,
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NoiseKind::Gaussian => "gaussian",
            NoiseKind::Narrowband => "narrowband",
            NoiseKind::SingleFrequency => "single_freq",
            NoiseKind::Impulse => "impulse",
        };
        f.write_str(name)
    }
}

impl FromStr for NoiseKind {
    type Err = DspError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gaussian" => Ok(NoiseKind::Gaussian),
            "narrowband" => Ok(NoiseKind::Narrowband),
            "single_freq" => Ok(NoiseKind::SingleFrequency),
            "impulse" => Ok(NoiseKind::Impulse),
            other => Err(DspError::spec(format!(
                "unknown noise type '{}', expected gaussian|narrowband|single_freq|impulse",
                other
            ))),
        }
    }
}

/// Parameters of one noise synthesis call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoiseRequest {
    Gaussian { snr_db: f64 },
    Narrowband { low_freq: f64, high_freq: f64, snr_db: f64 },
    SingleFrequency { frequency: f64, amplitude: f64 },
    Impulse { probability: f64, amplitude: f64 },
}

impl NoiseRequest {
    /// Request of the given kind with its default parameters.
    pub fn default_for(kind: NoiseKind) -> Self {
        match kind {
            NoiseKind::Gaussian => NoiseRequest::Gaussian { snr_db: DEFAULT_SNR_DB },
            NoiseKind::Narrowband => NoiseRequest::Narrowband {
                low_freq: DEFAULT_NARROWBAND.0,
                high_freq: DEFAULT_NARROWBAND.1,
                snr_db: DEFAULT_NARROWBAND_SNR_DB,
            },
            NoiseKind::SingleFrequency => NoiseRequest::SingleFrequency {
                frequency: DEFAULT_TONE_FREQ,
                amplitude: DEFAULT_TONE_AMPLITUDE,
            },
            NoiseKind::Impulse => NoiseRequest::Impulse {
                probability: DEFAULT_IMPULSE_PROBABILITY,
                amplitude: DEFAULT_IMPULSE_AMPLITUDE,
            },
        }
    }

    pub fn kind(&self) -> NoiseKind {
        match self {
            NoiseRequest::Gaussian { .. } => NoiseKind::Gaussian,
            NoiseRequest::Narrowband { .. } => NoiseKind::Narrowband,
            NoiseRequest::SingleFrequency { .. } => NoiseKind::SingleFrequency,
            NoiseRequest::Impulse { .. } => NoiseKind::Impulse,
        }
    }
}

/// Add the requested noise to every channel of `signal`.
pub fn add_noise<R: Rng + ?Sized>(signal: &Signal, request: &NoiseRequest, rng: &mut R) -> Result<Signal> {
    debug!("adding {:?} noise to {} channel(s)", request, signal.num_channels());
    match *request {
        NoiseRequest::Gaussian { snr_db } => add_gaussian_noise(signal, snr_db, rng),
        NoiseRequest::Narrowband {
            low_freq,
            high_freq,
            snr_db,
        } => add_narrowband_noise(signal, low_freq, high_freq, snr_db, rng),
        NoiseRequest::SingleFrequency { frequency, amplitude } => {
            add_single_frequency_interference(signal, frequency, amplitude)
        }
        NoiseRequest::Impulse { probability, amplitude } => add_impulse_noise(signal, probability, amplitude, rng),
    }
}

/// Noise power giving `snr_db` against a signal of power `signal_power`.
pub fn noise_power_for_snr(signal_power: f64, snr_db: f64) -> Result<f64> {
    if !(signal_power.is_finite() && signal_power > 0.0) {
        return Err(DspError::numeric(format!(
            "SNR calibration needs positive signal power, got {}",
            signal_power
        )));
    }
    if !snr_db.is_finite() {
        return Err(DspError::spec(format!("SNR must be finite, got {}", snr_db)));
    }
    let noise_power = signal_power / 10f64.powf(snr_db / 10.0);
    if !(noise_power.is_finite() && noise_power > 0.0) {
        return Err(DspError::numeric(format!(
            "SNR {} dB gives degenerate noise power {}",
            snr_db, noise_power
        )));
    }
    Ok(noise_power)
}

/// Additive component of `noisy` relative to `original`.
pub fn extract_noise(noisy: &Signal, original: &Signal) -> Result<Signal> {
    noisy.sub(original)
}

/// One independent generator per channel, seeded in channel order from the caller's generator.
fn channel_rngs<R: Rng + ?Sized>(num_channels: usize, rng: &mut R) -> Vec<StdRng> {
    (0..num_channels).map(|_| StdRng::seed_from_u64(rng.gen())).collect()
}

/// Add white Gaussian noise so that every channel ends up at `snr_db` against its own power.
pub fn add_gaussian_noise<R: Rng + ?Sized>(signal: &Signal, snr_db: f64, rng: &mut R) -> Result<Signal> {
    let mut rngs = channel_rngs(signal.num_channels(), rng);
    signal.map_channels(|idx, ch| {
        let noise_power = noise_power_for_snr(power(ch), snr_db)?;
        let normal = Normal::new(0.0, noise_power.sqrt()).map_err(|e| DspError::numeric(e.to_string()))?;
        let rng = &mut rngs[idx];
        Ok(ch.iter().map(|x| x + normal.sample(rng)).collect())
    })
}

/// Add band-limited noise occupying `[low_freq, high_freq]`:
/// 1. Draw unit-variance white noise
/// 2. Shape it with a zero-phase Butterworth band-pass
/// 3. Rescale by the measured post-filter power to hit `snr_db`
pub fn add_narrowband_noise<R: Rng + ?Sized>(
    signal: &Signal,
    low_freq: f64,
    high_freq: f64,
    snr_db: f64,
    rng: &mut R,
) -> Result<Signal> {
    let band = design_bandpass(
        low_freq,
        high_freq,
        signal.sample_rate(),
        NARROWBAND_ORDER,
        FilterFamily::Butterworth,
    )?;
    let mut rngs = channel_rngs(signal.num_channels(), rng);
    let normal = Normal::new(0.0, 1.0).map_err(|e| DspError::numeric(e.to_string()))?;

    signal.map_channels(|idx, ch| {
        let target = noise_power_for_snr(power(ch), snr_db)?;
        let white: Vec<f64> = normal.sample_iter(&mut rngs[idx]).take(ch.len()).collect();
        let shaped = filtfilt(band.b(), band.a(), &white)?;
        let shaped_power = power(&shaped);
        if !(shaped_power.is_finite() && shaped_power > 0.0) {
            return Err(DspError::numeric(format!(
                "band-pass noise has degenerate power {}",
                shaped_power
            )));
        }
        let scale = (target / shaped_power).sqrt();
        Ok(ch.iter().zip(shaped).map(|(x, n)| x + n * scale).collect())
    })
}

/// Add a sinusoid `amplitude * sin(2 pi f t)` starting at `t = 0` to every channel.
pub fn add_single_frequency_interference(signal: &Signal, frequency: f64, amplitude: f64) -> Result<Signal> {
    if !(frequency > 0.0 && frequency < signal.nyquist()) {
        return Err(DspError::spec(format!(
            "interference frequency {} Hz outside (0, {}) Hz",
            frequency,
            signal.nyquist()
        )));
    }
    if !amplitude.is_finite() {
        return Err(DspError::spec(format!("interference amplitude must be finite, got {}", amplitude)));
    }
    let sr = signal.sample_rate();
    signal.map_channels(|_, ch| {
        Ok(ch
            .iter()
            .enumerate()
            .map(|(i, x)| x + amplitude * (2.0 * PI * frequency * i as f64 / sr).sin())
            .collect())
    })
}

/// Add impulses of magnitude `amplitude` and random sign, each sample hit with probability `probability`.
pub fn add_impulse_noise<R: Rng + ?Sized>(
    signal: &Signal,
    probability: f64,
    amplitude: f64,
    rng: &mut R,
) -> Result<Signal> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(DspError::spec(format!("impulse probability must lie in [0, 1], got {}", probability)));
    }
    if !amplitude.is_finite() {
        return Err(DspError::spec(format!("impulse amplitude must be finite, got {}", amplitude)));
    }
    let mut rngs = channel_rngs(signal.num_channels(), rng);
    signal.map_channels(|idx, ch| {
        let rng = &mut rngs[idx];
        Ok(ch
            .iter()
            .map(|&x| {
                if rng.gen::<f64>() < probability {
                    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                    x + sign * amplitude
                } else {
                    x
                }
            })
            .collect())
    })
}
