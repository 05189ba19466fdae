/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use crate::error::{DspError, Result};
use crate::signal::Signal;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::info;
use std::path::Path;

const SAMPLE_MAX: f64 = 32767.0;

/// Scale samples into [-1.0, 1.0], but only if the peak exceeds 1.0
fn normalize_samples(samples: &[f64]) -> Vec<f64> {
    let max_sample = samples.iter().fold(0.0_f64, |max, &s| max.max(s.abs()));
    if max_sample > 1.0 {
        return samples.iter().map(|s| s / max_sample).collect();
    }
    samples.to_vec()
}

/// Reads a WAV file of any channel count and sample rate.
///
/// Integer PCM is scaled by its full-scale value into [-1.0, 1.0]; 32-bit float is taken as is.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Signal> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(DspError::input(format!(
                    "unsupported integer sample width: {} bits",
                    spec.bits_per_sample
                )));
            }
            let full_scale = (1u64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / full_scale))
                .collect::<std::result::Result<_, _>>()?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
    };

    info!(
        "read {}: {} channel(s), {} Hz, {} bit {:?}",
        path.as_ref().display(),
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format
    );
    Signal::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate as f64)
}

/// Writes a signal to a 16-bit PCM WAV file with its own channel count and sample rate.
/// The whole signal is normalized to [-1.0, 1.0] first if any sample exceeds that range.
pub fn save_wav<P: AsRef<Path>>(signal: &Signal, path: P) -> Result<()> {
    let normalized = normalize_samples(&signal.to_interleaved());
    let channels = u16::try_from(signal.num_channels())
        .map_err(|_| DspError::input(format!("too many channels for WAV: {}", signal.num_channels())))?;
    let sample_rate = signal.sample_rate();
    if sample_rate.fract() != 0.0 || sample_rate > u32::MAX as f64 {
        return Err(DspError::input(format!("WAV needs an integer sample rate, got {}", sample_rate)));
    }

    let spec = WavSpec {
        channels,
        sample_rate: sample_rate as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for s in normalized {
        writer.write_sample((s * SAMPLE_MAX).round() as i16)?;
    }
    writer.finalize()?;
    info!("saved {}", path.as_ref().display());
    Ok(())
}
