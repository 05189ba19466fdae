/* ==================================================================================================
 *                           This file is part of the bachelor thesis project
 *                  Implementation and Analysis of Selected Noise Reduction Methods
 *                                Weronika Tarnawska (Index No. 331171)
 *                                  Supervisor:  dr hab. Paweł Woźny
 *                                  University of Wrocław, June 2025
 * ================================================================================================== */
use denoise_dsp::design::{design_bandpass, design_lowpass, design_notch, FilterFamily, DEFAULT_NOTCH_Q, DEFAULT_ORDER};
use denoise_dsp::filter::{FilterCoefficients, FrequencyResponse};
use denoise_dsp::metrics::{psnr_db, snr_db, spectral_centroid, spectral_rolloff, DEFAULT_ROLLOFF_PERCENTILE};
use denoise_dsp::noise::{add_noise, NoiseRequest};
use denoise_dsp::signal::Signal;
use denoise_dsp::wav::save_wav;

use log::{info, warn};
use rand::Rng;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Instant;

use csv::Writer;

/// Number of points in the saved frequency responses
pub const RESPONSE_POINTS: usize = 1024;

/// Pass band kept around the narrowband case
const SPEECH_BAND_LOW: f64 = 200.0;
const SPEECH_BAND_HIGH: f64 = 8000.0;
/// Upper band edges are kept at or below this fraction of the sample rate
const MAX_EDGE_FRACTION: f64 = 0.45;

/// One noise/filter pairing of the pipeline
struct Case {
    name: &'static str,
    noise: NoiseRequest,
    filter: FilterCoefficients,
}

/// Noise types and their matching filters
fn build_cases(sample_rate: f64) -> Result<Vec<Case>, Box<dyn Error>> {
    let band_high = SPEECH_BAND_HIGH.min(MAX_EDGE_FRACTION * sample_rate);
    if band_high < SPEECH_BAND_HIGH {
        warn!(
            "Bandpass upper edge lowered to {} Hz for sample rate {} Hz",
            band_high, sample_rate
        );
    }
    Ok(vec![
        Case {
            name: "gaussian",
            noise: NoiseRequest::Gaussian { snr_db: 10.0 },
            filter: design_lowpass(3000.0, sample_rate, DEFAULT_ORDER, FilterFamily::Butterworth)?,
        },
        Case {
            name: "narrowband",
            noise: NoiseRequest::Narrowband {
                low_freq: 1000.0,
                high_freq: 2000.0,
                snr_db: 15.0,
            },
            filter: design_bandpass(SPEECH_BAND_LOW, band_high, sample_rate, DEFAULT_ORDER, FilterFamily::Butterworth)?,
        },
        Case {
            name: "single_freq",
            noise: NoiseRequest::SingleFrequency {
                frequency: 1500.0,
                amplitude: 0.3,
            },
            filter: design_notch(1500.0, sample_rate, DEFAULT_NOTCH_Q)?,
        },
    ])
}

/// Write a frequency response as `frequency_hz,magnitude,magnitude_db,phase_rad` rows
pub fn write_response_csv(response: &FrequencyResponse, path: &Path) -> Result<(), Box<dyn Error>> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["frequency_hz", "magnitude", "magnitude_db", "phase_rad"])?;
    let db = response.magnitude_db();
    for i in 0..response.frequencies.len() {
        writer.write_record(&[
            response.frequencies[i].to_string(),
            response.magnitude[i].to_string(),
            db[i].to_string(),
            response.phase[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Metric value for the report; undefined metrics become an empty cell
fn cell(value: denoise_dsp::Result<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

/// Run the full flow on one clean signal:
/// 1. Add gaussian, narrowband and single-frequency noise
/// 2. Filter each with its matching lowpass, bandpass or notch filter
/// 3. Save noisy and filtered audio plus filter responses under `out_dir`
/// 4. Write SNR, PSNR, centroid and rolloff of every case to `report`
pub fn run<R: Rng + ?Sized>(clean: &Signal, out_dir: &Path, report: &Path, rng: &mut R) -> Result<(), Box<dyn Error>> {
    let noisy_dir = out_dir.join("noisy_audio");
    let filtered_dir = out_dir.join("filtered_audio");
    let response_dir = out_dir.join("responses");
    for dir in [&noisy_dir, &filtered_dir, &response_dir] {
        fs::create_dir_all(dir)?;
    }

    let mut csv_writer = Writer::from_path(report)?;
    csv_writer.write_record([
        "case",
        "filter",
        "snr_noisy_db",
        "snr_filtered_db",
        "psnr_noisy_db",
        "psnr_filtered_db",
        "centroid_noisy_hz",
        "centroid_filtered_hz",
        "rolloff_noisy_hz",
        "rolloff_filtered_hz",
        "time_sec",
    ])?;

    for case in build_cases(clean.sample_rate())? {
        info!("Running case {} with {}", case.name, case.filter.label());
        let noisy = add_noise(clean, &case.noise, rng)?;

        let start = Instant::now();
        let filtered = case.filter.apply(&noisy)?;
        let duration_sec = start.elapsed().as_secs_f64();

        save_wav(&noisy, noisy_dir.join(format!("{}_noisy.wav", case.name)))?;
        save_wav(&filtered, filtered_dir.join(format!("{}_filtered.wav", case.name)))?;
        let response = case.filter.frequency_response(RESPONSE_POINTS)?;
        write_response_csv(&response, &response_dir.join(format!("{}_response.csv", case.filter.label())))?;

        csv_writer.write_record(&[
            case.name.to_string(),
            case.filter.label().to_string(),
            cell(snr_db(clean, &noisy)),
            cell(snr_db(clean, &filtered)),
            cell(psnr_db(clean, &noisy)),
            cell(psnr_db(clean, &filtered)),
            cell(spectral_centroid(&noisy)),
            cell(spectral_centroid(&filtered)),
            cell(spectral_rolloff(&noisy, DEFAULT_ROLLOFF_PERCENTILE)),
            cell(spectral_rolloff(&filtered, DEFAULT_ROLLOFF_PERCENTILE)),
            duration_sec.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    info!(
        "Pipeline finished. Audio and responses in '{}', metrics in '{}'",
        out_dir.display(),
        report.display()
    );
    Ok(())
}
