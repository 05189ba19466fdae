/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use crate::error::{DspError, Result};
use rand::{distributions::Uniform, Rng};
use std::f64::consts::PI;

/// Fixed-length audio buffer: one or more equally long channels sharing a sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    channels: Vec<Vec<f64>>,
    sample_rate: f64,
}

impl Signal {
    /// Single-channel signal.
    pub fn mono(samples: Vec<f64>, sample_rate: f64) -> Result<Self> {
        Self::from_channels(vec![samples], sample_rate)
    }

    /// Multi-channel signal, one `Vec` per channel.
    ///
    /// Fails with `InvalidInput` when there are no channels, a channel is empty,
    /// channel lengths differ or the sample rate is not a positive finite number.
    pub fn from_channels(channels: Vec<Vec<f64>>, sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(DspError::input(format!("sample rate must be positive, got {}", sample_rate)));
        }
        let len = match channels.first() {
            Some(ch) => ch.len(),
            None => return Err(DspError::input("signal needs at least one channel")),
        };
        if len == 0 {
            return Err(DspError::input("signal length must be > 0"));
        }
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, ch)| ch.len() != len) {
            return Err(DspError::input(format!(
                "channel {} has {} samples, expected {}",
                idx,
                ch.len(),
                len
            )));
        }
        Ok(Signal { channels, sample_rate })
    }

    /// Builds a signal from frame-interleaved samples (`L R L R ...`).
    pub fn from_interleaved(samples: &[f64], num_channels: usize, sample_rate: f64) -> Result<Self> {
        if num_channels == 0 || samples.len() % num_channels != 0 {
            return Err(DspError::input(format!(
                "{} interleaved samples do not split into {} channels",
                samples.len(),
                num_channels
            )));
        }
        let channels = (0..num_channels)
            .map(|c| samples.iter().skip(c).step_by(num_channels).copied().collect())
            .collect();
        Self::from_channels(channels, sample_rate)
    }

    pub fn to_interleaved(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len() * self.num_channels());
        for i in 0..self.len() {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Number of samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn is_mono(&self) -> bool {
        self.channels.len() == 1
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }

    /// Samples of channel `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.num_channels()`. Use [`Signal::get_channel`] for a checked lookup.
    pub fn channel(&self, idx: usize) -> &[f64] {
        &self.channels[idx]
    }

    /// Samples of channel `idx`, or `None` when the signal has fewer channels.
    pub fn get_channel(&self, idx: usize) -> Option<&[f64]> {
        self.channels.get(idx).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f64>> {
        self.channels
    }

    /// Apply `f` to every channel and recombine the results into a signal of the same shape.
    ///
    /// `f` receives the channel index and its samples. Every returned channel must keep
    /// the input length.
    pub fn map_channels<F>(&self, mut f: F) -> Result<Signal>
    where
        F: FnMut(usize, &[f64]) -> Result<Vec<f64>>,
    {
        let len = self.len();
        let mut channels = Vec::with_capacity(self.num_channels());
        for (idx, ch) in self.channels.iter().enumerate() {
            let out = f(idx, ch)?;
            if out.len() != len {
                return Err(DspError::numeric(format!(
                    "channel {} changed length from {} to {}",
                    idx,
                    len,
                    out.len()
                )));
            }
            channels.push(out);
        }
        Ok(Signal {
            channels,
            sample_rate: self.sample_rate,
        })
    }

    /// Check that `other` has the same sample rate, channel count and length.
    pub fn check_compatible(&self, other: &Signal) -> Result<()> {
        if self.sample_rate != other.sample_rate {
            return Err(DspError::input(format!(
                "sample rates differ: {} vs {}",
                self.sample_rate, other.sample_rate
            )));
        }
        if self.num_channels() != other.num_channels() {
            return Err(DspError::input(format!(
                "channel counts differ: {} vs {}",
                self.num_channels(),
                other.num_channels()
            )));
        }
        if self.len() != other.len() {
            return Err(DspError::input(format!(
                "lengths differ: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        Ok(())
    }

    /// Elementwise `self + other`.
    pub fn add(&self, other: &Signal) -> Result<Signal> {
        self.check_compatible(other)?;
        self.map_channels(|idx, ch| Ok(ch.iter().zip(other.channel(idx)).map(|(a, b)| a + b).collect()))
    }

    /// Elementwise `self - other`.
    pub fn sub(&self, other: &Signal) -> Result<Signal> {
        self.check_compatible(other)?;
        self.map_channels(|idx, ch| Ok(ch.iter().zip(other.channel(idx)).map(|(a, b)| a - b).collect()))
    }
}

/// Mean power `mean(x^2)` of a sample slice.
pub fn power(samples: &[f64]) -> f64 {
    samples.iter().map(|x| x * x).sum::<f64>() / samples.len() as f64
}

/// Test signal types
#[derive(Clone, Copy, Debug)]
pub enum SignalType {
    WhiteNoise,      // Uniform white noise in [-1, 1)
    Sinusoidal(f64), // Sinusoidal signal with given frequency (Hz)
    Chirp(f64, f64), // Linear chirp from f1 to f2
    Chord(f64),      // Major chord based on root frequency
}

/// Generates white noise signal
fn generate_white_noise<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<f64> {
    let uniform = Uniform::from(-1.0..1.0);
    (0..len).map(|_| rng.sample(uniform)).collect()
}

/// Generates a sinusoidal signal at the given frequency
fn generate_sinusoidal(len: usize, frequency: f64, sr: f64) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let t = i as f64 / sr;
            (2.0 * PI * frequency * t).sin()
        })
        .collect()
}

/// Generates a linear chirp from f1 to f2 over the signal duration
fn generate_chirp(len: usize, f1: f64, f2: f64, sr: f64) -> Vec<f64> {
    let duration = len as f64 / sr;
    let k = (f2 - f1) / duration;

    (0..len)
        .map(|i| {
            let t = i as f64 / sr;
            (2.0 * PI * (f1 * t + 0.5 * k * t * t)).sin()
        })
        .collect()
}

/// Generates a major chord (triad) based on the root frequency
fn generate_major_chord(root_freq: f64, len: usize, sample_rate: f64) -> Vec<f64> {
    let semitone = 2f64.powf(1.0 / 12.0);
    let third_freq = root_freq * semitone.powf(4.0);
    let fifth_freq = root_freq * semitone.powf(7.0);

    let root_sig = generate_sinusoidal(len, root_freq, sample_rate);
    let third_sig = generate_sinusoidal(len, third_freq, sample_rate);
    let fifth_sig = generate_sinusoidal(len, fifth_freq, sample_rate);

    root_sig
        .into_iter()
        .zip(third_sig)
        .zip(fifth_sig)
        .map(|((r, t), f)| r + t + f)
        .collect()
}

/// Generates a sample vector of given length and type.
pub fn generate_samples<R: Rng + ?Sized>(len: usize, sig_type: SignalType, sample_rate: f64, rng: &mut R) -> Vec<f64> {
    match sig_type {
        SignalType::WhiteNoise => generate_white_noise(len, rng),
        SignalType::Sinusoidal(freq) => generate_sinusoidal(len, freq, sample_rate),
        SignalType::Chirp(f1, f2) => generate_chirp(len, f1, f2, sample_rate),
        SignalType::Chord(root) => generate_major_chord(root, len, sample_rate),
    }
}

/// Generates a mono test signal of given length and type.
pub fn generate_signal<R: Rng + ?Sized>(len: usize, sig_type: SignalType, sample_rate: f64, rng: &mut R) -> Result<Signal> {
    Signal::mono(generate_samples(len, sig_type, sample_rate, rng), sample_rate)
}
