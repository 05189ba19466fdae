/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use clap::{arg, ArgMatches, Command};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::path::Path;
use std::str::FromStr;

use denoise_dsp::design::{design, Cutoff, FilterFamily, FilterKind, FilterSpec};
use denoise_dsp::lms::lms_signal;
use denoise_dsp::metrics::{psnr_db, snr_db, spectral_centroid, spectral_rolloff};
use denoise_dsp::noise::{add_noise, extract_noise, NoiseKind, NoiseRequest};
use denoise_dsp::signal::{generate_signal, SignalType};
use denoise_dsp::wav::{read_wav, save_wav};
use denoise_dsp::wiener::wiener_filter;

mod pipeline;

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Arguments shared by every command that designs a filter
fn with_design_args(cmd: Command) -> Command {
    cmd.arg(arg!(-k --"kind" <KIND> "lowpass|highpass|bandpass|bandstop|notch").required(true))
        .arg(arg!(-c --"cutoff" <HZ> "Cutoff in Hz, or 'low,high' for band kinds").required(true))
        .arg(arg!(-f --"family" [FAMILY] "butterworth|chebyshev1|chebyshev2|elliptic (not for notch)"))
        .arg(arg!(-n --"order" <N> "Filter order").default_value("4"))
        .arg(arg!(--"ripple" <DB> "Passband ripple in dB").default_value("1"))
        .arg(arg!(--"attenuation" <DB> "Stopband attenuation in dB").default_value("40"))
        .arg(arg!(-q --"quality" <Q> "Notch quality factor").default_value("30"))
}

fn build_cli() -> Command {
    Command::new("Noise synthesis and denoising CLI")
        .version("1.0")
        .about("Add controlled noise to audio and remove it with designed filters")
        .arg(arg!(-v --"verbose" ... "More log output (-v info, -vv debug, -vvv trace)").global(true))
        .subcommand_required(true)
        .subcommand(
            Command::new("sig-gen")
                .about("Generate signal and save to WAV")
                .arg(arg!(-t --"type" <TYPE> "Signal type, e.g., white|sine,440.0|chirp,200,800|chord,440.0").required(true))
                .arg(arg!(-d --"duration" <DUR> "Duration in seconds").required(true))
                .arg(arg!(-r --"sample-rate" <HZ> "Sample rate in Hz").default_value("44100"))
                .arg(arg!(-s --"seed" [SEED] "Random seed"))
                .arg(arg!(-o --"out-file" <FILE> "Output WAV path").default_value("output.wav")),
        )
        .subcommand(
            Command::new("noise")
                .about("Add synthetic noise to a WAV file")
                .arg(arg!(-i --"input" <FILE> "Clean WAV").required(true))
                .arg(arg!(-t --"type" <TYPE> "gaussian|narrowband|single_freq|impulse").default_value("gaussian"))
                .arg(arg!(--"snr" [DB] "Target SNR in dB (gaussian, narrowband)"))
                .arg(arg!(--"low" [HZ] "Lower band edge (narrowband)"))
                .arg(arg!(--"high" [HZ] "Upper band edge (narrowband)"))
                .arg(arg!(--"freq" [HZ] "Interference frequency (single_freq)"))
                .arg(arg!(--"amplitude" [AMP] "Amplitude (single_freq, impulse)"))
                .arg(arg!(--"probability" [P] "Impulse probability per sample (impulse)"))
                .arg(arg!(-s --"seed" [SEED] "Random seed"))
                .arg(arg!(--"noise-out" [FILE] "Also save the added noise alone"))
                .arg(arg!(-o --"out-file" <FILE> "Output WAV path").default_value("noisy.wav")),
        )
        .subcommand(with_design_args(
            Command::new("filter")
                .about("Zero-phase filtering with a designed IIR filter")
                .arg(arg!(-i --"input" <FILE> "Input WAV").required(true))
                .arg(arg!(-o --"out-file" <FILE> "Output WAV path").default_value("filtered.wav")),
        ))
        .subcommand(with_design_args(
            Command::new("response")
                .about("Write the frequency response of a designed filter to CSV")
                .arg(arg!(-r --"sample-rate" <HZ> "Sample rate in Hz").default_value("44100"))
                .arg(arg!(-p --"points" <N> "Number of frequency points").default_value("1024"))
                .arg(arg!(-o --"out-file" <FILE> "Output CSV path").default_value("response.csv")),
        ))
        .subcommand(
            Command::new("lms")
                .about("LMS adaptive filtering")
                .arg(arg!(-x --"noisy" <FILE> "Noisy WAV").required(true))
                .arg(arg!(-y --"noise-only" <FILE> "Noise-only WAV").required(true))
                .arg(arg!(-f --"filt-size" <N> "Filter size").default_value("64"))
                .arg(arg!(-s --"step-size" <MU> "Step size").default_value("0.01"))
                .arg(arg!(-o --"out-file" <OUT> "Output WAV path").default_value("lms.wav")),
        )
        .subcommand(
            Command::new("wiener")
                .about("Scalar-gain Wiener filter")
                .arg(arg!(-x --"noisy" <FILE> "Noisy WAV").required(true))
                .arg(arg!(-y --"noise-only" <FILE> "Noise-only WAV").required(true))
                .arg(arg!(-o --"out-file" <OUT> "Output WAV path").default_value("wiener.wav")),
        )
        .subcommand(
            Command::new("metrics")
                .about("Compare a processed WAV against a clean reference")
                .arg(arg!(-c --"clean" <FILE> "Clean reference WAV").required(true))
                .arg(arg!(-t --"test" <FILE> "Processed WAV").required(true))
                .arg(arg!(-p --"percentile" <P> "Spectral rolloff percentile").default_value("85")),
        )
        .subcommand(
            Command::new("pipeline")
                .about("Add three noise types, filter each and report metrics")
                .arg(arg!(-i --"input" <FILE> "Clean WAV").required(true))
                .arg(arg!(-d --"out-dir" <DIR> "Output directory").default_value("output"))
                .arg(arg!(-r --"report" <CSV> "Metrics CSV path").default_value("results.csv"))
                .arg(arg!(-s --"seed" [SEED] "Random seed")),
        )
}

fn main() {
    let matches = build_cli().get_matches();

    init_logging(matches.get_count("verbose"));

    if let Err(e) = dispatch(&matches) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn dispatch(matches: &ArgMatches) -> CliResult<()> {
    match matches.subcommand() {
        Some(("sig-gen", m)) => handle_sig_gen(m),
        Some(("noise", m)) => handle_noise(m),
        Some(("filter", m)) => handle_filter(m),
        Some(("response", m)) => handle_response(m),
        Some(("lms", m)) => handle_lms(m),
        Some(("wiener", m)) => handle_wiener(m),
        Some(("metrics", m)) => handle_metrics(m),
        Some(("pipeline", m)) => handle_pipeline(m),
        _ => Err("Unknown command. Use --help.".into()),
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

/// Parse a value of an argument that is always present (required or defaulted)
fn parse_arg<T>(m: &ArgMatches, name: &str) -> CliResult<T>
where
    T: FromStr,
    T::Err: Into<Box<dyn Error>>,
{
    let raw = str_arg(m, name)?;
    raw.parse::<T>().map_err(|e| {
        let e: Box<dyn Error> = e.into();
        format!("invalid --{} '{}': {}", name, raw, e).into()
    })
}

/// Parse an optional argument
fn parse_opt<T>(m: &ArgMatches, name: &str) -> CliResult<Option<T>>
where
    T: FromStr,
    T::Err: Into<Box<dyn Error>>,
{
    match m.get_one::<String>(name) {
        Some(_) => parse_arg(m, name).map(Some),
        None => Ok(None),
    }
}

fn str_arg<'a>(m: &'a ArgMatches, name: &str) -> CliResult<&'a str> {
    m.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument --{}", name).into())
}

fn rng_from_args(m: &ArgMatches) -> CliResult<StdRng> {
    Ok(match parse_opt::<u64>(m, "seed")? {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    })
}

fn parse_signal_type(s: &str) -> CliResult<SignalType> {
    let s = s.to_lowercase();
    let params = |prefix: &str| -> CliResult<Vec<f64>> {
        s[prefix.len()..]
            .split(',')
            .map(|x| x.trim().parse::<f64>().map_err(|e| e.into()))
            .collect()
    };
    if s == "white" {
        Ok(SignalType::WhiteNoise)
    } else if s.starts_with("sine,") {
        Ok(SignalType::Sinusoidal(params("sine,")?[0]))
    } else if s.starts_with("chirp,") {
        match params("chirp,")?[..] {
            [f1, f2] => Ok(SignalType::Chirp(f1, f2)),
            _ => Err(format!("chirp needs two frequencies: {}", s).into()),
        }
    } else if s.starts_with("chord,") {
        Ok(SignalType::Chord(params("chord,")?[0]))
    } else {
        Err(format!("Unknown type: {}", s).into())
    }
}

fn parse_cutoff(s: &str) -> CliResult<Cutoff> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|x| x.trim().parse::<f64>())
        .collect::<Result<_, _>>()?;
    match parts[..] {
        [f] => Ok(Cutoff::Single(f)),
        [lo, hi] => Ok(Cutoff::Band(lo, hi)),
        _ => Err(format!("cutoff must be 'hz' or 'low,high', got '{}'", s).into()),
    }
}

fn filter_spec_from_args(m: &ArgMatches) -> CliResult<FilterSpec> {
    Ok(FilterSpec {
        kind: parse_arg::<FilterKind>(m, "kind")?,
        family: parse_opt::<FilterFamily>(m, "family")?,
        cutoff: parse_cutoff(str_arg(m, "cutoff")?)?,
        order: parse_arg(m, "order")?,
        passband_ripple_db: parse_arg(m, "ripple")?,
        stopband_atten_db: parse_arg(m, "attenuation")?,
        quality: parse_arg(m, "quality")?,
    })
}

fn noise_request_from_args(m: &ArgMatches) -> CliResult<NoiseRequest> {
    let kind: NoiseKind = parse_arg(m, "type")?;
    let request = match NoiseRequest::default_for(kind) {
        NoiseRequest::Gaussian { snr_db } => NoiseRequest::Gaussian {
            snr_db: parse_opt(m, "snr")?.unwrap_or(snr_db),
        },
        NoiseRequest::Narrowband {
            low_freq,
            high_freq,
            snr_db,
        } => NoiseRequest::Narrowband {
            low_freq: parse_opt(m, "low")?.unwrap_or(low_freq),
            high_freq: parse_opt(m, "high")?.unwrap_or(high_freq),
            snr_db: parse_opt(m, "snr")?.unwrap_or(snr_db),
        },
        NoiseRequest::SingleFrequency { frequency, amplitude } => NoiseRequest::SingleFrequency {
            frequency: parse_opt(m, "freq")?.unwrap_or(frequency),
            amplitude: parse_opt(m, "amplitude")?.unwrap_or(amplitude),
        },
        NoiseRequest::Impulse { probability, amplitude } => NoiseRequest::Impulse {
            probability: parse_opt(m, "probability")?.unwrap_or(probability),
            amplitude: parse_opt(m, "amplitude")?.unwrap_or(amplitude),
        },
    };
    Ok(request)
}

fn handle_sig_gen(m: &ArgMatches) -> CliResult<()> {
    let sig_type = str_arg(m, "type")?;
    let duration: f64 = parse_arg(m, "duration")?;
    let sample_rate: f64 = parse_arg(m, "sample-rate")?;
    let out_file = str_arg(m, "out-file")?;
    let mut rng = rng_from_args(m)?;
    let len = (duration * sample_rate) as usize;
    let sig = generate_signal(len, parse_signal_type(sig_type)?, sample_rate, &mut rng)?;
    save_wav(&sig, out_file)?;
    println!("Generated {}-second {} -> {}", duration, sig_type, out_file);
    Ok(())
}

fn handle_noise(m: &ArgMatches) -> CliResult<()> {
    let clean = read_wav(str_arg(m, "input")?)?;
    let request = noise_request_from_args(m)?;
    let out_path = str_arg(m, "out-file")?;
    let mut rng = rng_from_args(m)?;

    let noisy = add_noise(&clean, &request, &mut rng)?;
    save_wav(&noisy, out_path)?;
    if let Some(noise_path) = m.get_one::<String>("noise-out") {
        save_wav(&extract_noise(&noisy, &clean)?, noise_path)?;
    }
    match snr_db(&clean, &noisy) {
        Ok(snr) => println!("{} noise added (SNR {:.2} dB) -> {}", request.kind(), snr, out_path),
        Err(_) => println!("{} noise added -> {}", request.kind(), out_path),
    }
    Ok(())
}

fn handle_filter(m: &ArgMatches) -> CliResult<()> {
    let input = read_wav(str_arg(m, "input")?)?;
    let out_path = str_arg(m, "out-file")?;
    let coefficients = design(&filter_spec_from_args(m)?, input.sample_rate())?;
    let filtered = coefficients.apply(&input)?;
    save_wav(&filtered, out_path)?;
    println!("{} (order {}) done -> {}", coefficients.label(), coefficients.order(), out_path);
    Ok(())
}

fn handle_response(m: &ArgMatches) -> CliResult<()> {
    let sample_rate: f64 = parse_arg(m, "sample-rate")?;
    let points: usize = parse_arg(m, "points")?;
    let out_path = str_arg(m, "out-file")?;
    let coefficients = design(&filter_spec_from_args(m)?, sample_rate)?;
    let response = coefficients.frequency_response(points)?;
    pipeline::write_response_csv(&response, Path::new(out_path))?;
    println!("{} response ({} points) -> {}", coefficients.label(), points, out_path);
    Ok(())
}

fn handle_lms(m: &ArgMatches) -> CliResult<()> {
    let noise = read_wav(str_arg(m, "noise-only")?)?;
    let noisy = read_wav(str_arg(m, "noisy")?)?;
    let filt_size: usize = parse_arg(m, "filt-size")?;
    let step_size: f64 = parse_arg(m, "step-size")?;
    let out_path = str_arg(m, "out-file")?;
    let out = lms_signal(&noise, &noisy, filt_size, step_size)?;
    save_wav(&out, out_path)?;
    println!("LMS done -> {}", out_path);
    Ok(())
}

fn handle_wiener(m: &ArgMatches) -> CliResult<()> {
    let noise = read_wav(str_arg(m, "noise-only")?)?;
    let noisy = read_wav(str_arg(m, "noisy")?)?;
    let out_path = str_arg(m, "out-file")?;
    let denoised = wiener_filter(&noisy, &noise)?;
    save_wav(&denoised, out_path)?;
    println!("Wiener filtering done -> {}", out_path);
    Ok(())
}

fn handle_metrics(m: &ArgMatches) -> CliResult<()> {
    let clean = read_wav(str_arg(m, "clean")?)?;
    let test = read_wav(str_arg(m, "test")?)?;
    let percentile: f64 = parse_arg(m, "percentile")?;
    println!("snr_db: {:.4}", snr_db(&clean, &test)?);
    println!("psnr_db: {:.4}", psnr_db(&clean, &test)?);
    println!("centroid_hz: {:.2}", spectral_centroid(&test)?);
    println!("rolloff_hz: {:.2}", spectral_rolloff(&test, percentile)?);
    Ok(())
}

fn handle_pipeline(m: &ArgMatches) -> CliResult<()> {
    let clean = read_wav(str_arg(m, "input")?)?;
    let out_dir = str_arg(m, "out-dir")?;
    let report = str_arg(m, "report")?;
    let mut rng = rng_from_args(m)?;
    pipeline::run(&clean, Path::new(out_dir), Path::new(report), &mut rng)?;
    println!("All cases completed. Audio in '{}', metrics in '{}'.", out_dir, report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("denoise_cli_{}_{}", name, std::process::id()))
    }

    fn run_cli(args: &[&str]) -> CliResult<()> {
        let matches = build_cli().try_get_matches_from(std::iter::once("denoise").chain(args.iter().copied()))?;
        dispatch(&matches)
    }

    #[test]
    fn test_response_command_writes_csv() {
        let out = temp_path("response.csv");
        let out_str = out.to_str().unwrap();
        run_cli(&["response", "-k", "lowpass", "-c", "1000", "-p", "64", "-o", out_str]).unwrap();

        let mut reader = csv::Reader::from_path(&out).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, ["frequency_hz", "magnitude", "magnitude_db", "phase_rad"]);
        assert_eq!(reader.records().count(), 64);
        fs::remove_file(&out).unwrap();
    }

    #[test]
    fn test_string_arguments_are_read() {
        let m = build_cli()
            .try_get_matches_from(["denoise", "metrics", "-c", "clean.wav", "-t", "test.wav"])
            .unwrap();
        let (_, sub) = m.subcommand().unwrap();
        assert_eq!(str_arg(sub, "clean").unwrap(), "clean.wav");
        assert_eq!(parse_arg::<f64>(sub, "percentile").unwrap(), 85.0);
        assert!(str_arg(sub, "missing").is_err());
    }

    #[test]
    fn test_bad_values_are_reported() {
        assert!(run_cli(&["response", "-k", "sideways", "-c", "1000"]).is_err());
        assert!(run_cli(&["response", "-k", "lowpass", "-c", "1000", "-n", "four"]).is_err());
        assert!(run_cli(&["response", "-k", "bandpass", "-c", "1000"]).is_err());
    }

    #[test]
    fn test_sig_gen_then_pipeline_at_16khz() {
        let dir = temp_path("pipeline");
        fs::create_dir_all(&dir).unwrap();
        let clean = dir.join("clean.wav");
        let report = dir.join("results.csv");
        let clean_str = clean.to_str().unwrap();
        run_cli(&["sig-gen", "-t", "sine,440", "-d", "1", "-r", "16000", "-s", "1", "-o", clean_str]).unwrap();
        run_cli(&[
            "pipeline",
            "-i",
            clean_str,
            "-d",
            dir.to_str().unwrap(),
            "-r",
            report.to_str().unwrap(),
            "-s",
            "2",
        ])
        .unwrap();

        let mut reader = csv::Reader::from_path(&report).unwrap();
        assert_eq!(reader.records().count(), 3);
        fs::remove_dir_all(&dir).unwrap();
    }
}
