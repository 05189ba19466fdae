/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use crate::error::{DspError, Result};
use crate::filter::FilterCoefficients;
use crate::prototype::{buttap, cheb1ap, cheb2ap, ellipap, prod_neg, Zpk};
use log::debug;
use num_complex::Complex;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_ORDER: usize = 4;
pub const DEFAULT_RIPPLE_DB: f64 = 1.0;
pub const DEFAULT_ATTENUATION_DB: f64 = 40.0;
pub const DEFAULT_NOTCH_Q: f64 = 30.0;

/// Magnitude response class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
    Bandstop,
    Notch,
}

/// IIR design family
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterFamily {
    Butterworth, // maximally flat passband
    Chebyshev1,  // equiripple passband
    Chebyshev2,  // equiripple stopband
    Elliptic,    // equiripple in both bands
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::Lowpass => "Lowpass",
            FilterKind::Highpass => "Highpass",
            FilterKind::Bandpass => "Bandpass",
            FilterKind::Bandstop => "Bandstop",
            FilterKind::Notch => "Notch",
        };
        f.write_str(name)
    }
}

impl FromStr for FilterKind {
    type Err = DspError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lowpass" => Ok(FilterKind::Lowpass),
            "highpass" => Ok(FilterKind::Highpass),
            "bandpass" => Ok(FilterKind::Bandpass),
            "bandstop" => Ok(FilterKind::Bandstop),
            "notch" => Ok(FilterKind::Notch),
            _ => Err(DspError::spec(format!("unknown filter kind '{}'", s))),
        }
    }
}

impl fmt::Display for FilterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterFamily::Butterworth => "butterworth",
            FilterFamily::Chebyshev1 => "chebyshev1",
            FilterFamily::Chebyshev2 => "chebyshev2",
            FilterFamily::Elliptic => "elliptic",
        };
        f.write_str(name)
    }
}

impl FromStr for FilterFamily {
    type Err = DspError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "butterworth" => Ok(FilterFamily::Butterworth),
            "chebyshev1" => Ok(FilterFamily::Chebyshev1),
            "chebyshev2" => Ok(FilterFamily::Chebyshev2),
            "elliptic" => Ok(FilterFamily::Elliptic),
            _ => Err(DspError::spec(format!("unknown filter family '{}'", s))),
        }
    }
}

/// Cutoff frequency (Hz): one edge for lowpass/highpass/notch, an edge pair for band kinds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cutoff {
    Single(f64),
    Band(f64, f64),
}

/// Immutable description of one filter request.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterSpec {
    pub kind: FilterKind,
    /// `None` for a notch; IIR kinds fall back to Butterworth.
    pub family: Option<FilterFamily>,
    pub cutoff: Cutoff,
    pub order: usize,
    /// Chebyshev I / elliptic passband ripple (dB).
    pub passband_ripple_db: f64,
    /// Chebyshev II / elliptic stopband attenuation (dB).
    pub stopband_atten_db: f64,
    /// Notch quality factor.
    pub quality: f64,
}

impl FilterSpec {
    fn new(kind: FilterKind, cutoff: Cutoff) -> Self {
        FilterSpec {
            kind,
            family: None,
            cutoff,
            order: DEFAULT_ORDER,
            passband_ripple_db: DEFAULT_RIPPLE_DB,
            stopband_atten_db: DEFAULT_ATTENUATION_DB,
            quality: DEFAULT_NOTCH_Q,
        }
    }

    pub fn lowpass(cutoff: f64) -> Self {
        Self::new(FilterKind::Lowpass, Cutoff::Single(cutoff))
    }

    pub fn highpass(cutoff: f64) -> Self {
        Self::new(FilterKind::Highpass, Cutoff::Single(cutoff))
    }

    pub fn bandpass(low: f64, high: f64) -> Self {
        Self::new(FilterKind::Bandpass, Cutoff::Band(low, high))
    }

    pub fn bandstop(low: f64, high: f64) -> Self {
        Self::new(FilterKind::Bandstop, Cutoff::Band(low, high))
    }

    pub fn notch(center: f64) -> Self {
        Self::new(FilterKind::Notch, Cutoff::Single(center))
    }

    pub fn with_family(mut self, family: FilterFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn with_ripple(mut self, ripple_db: f64) -> Self {
        self.passband_ripple_db = ripple_db;
        self
    }

    pub fn with_attenuation(mut self, atten_db: f64) -> Self {
        self.stopband_atten_db = atten_db;
        self
    }

    pub fn with_quality(mut self, q: f64) -> Self {
        self.quality = q;
        self
    }

    /// Human readable label, e.g. `Bandstop_elliptic` or `Notch`.
    pub fn label(&self) -> String {
        match (self.kind, self.family) {
            (FilterKind::Notch, _) => FilterKind::Notch.to_string(),
            (kind, family) => format!("{}_{}", kind, family.unwrap_or(FilterFamily::Butterworth)),
        }
    }
}

/// Cutoff divided by Nyquist; must lie strictly inside (0, 1).
fn normalize(freq: f64, nyquist: f64) -> Result<f64> {
    let wn = freq / nyquist;
    if !(wn > 0.0 && wn < 1.0) {
        return Err(DspError::spec(format!(
            "cutoff {} Hz must lie strictly between 0 and Nyquist ({} Hz)",
            freq, nyquist
        )));
    }
    Ok(wn)
}

fn lp2lp(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.poles.len() as i32 - zpk.zeros.len() as i32;
    Zpk {
        zeros: zpk.zeros.iter().map(|&z| z * wo).collect(),
        poles: zpk.poles.iter().map(|&p| p * wo).collect(),
        gain: zpk.gain * wo.powi(degree),
    }
}

fn lp2hp(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.poles.len() - zpk.zeros.len();
    let mut zeros: Vec<Complex<f64>> = zpk.zeros.iter().map(|&z| wo / z).collect();
    zeros.extend(std::iter::repeat(Complex::new(0.0, 0.0)).take(degree));
    let poles = zpk.poles.iter().map(|&p| wo / p).collect();
    let gain = zpk.gain * (prod_neg(&zpk.zeros) / prod_neg(&zpk.poles)).re;
    Zpk { zeros, poles, gain }
}

/// Roots `r ± sqrt(r^2 - wo^2)` of each transformed root, in two halves.
fn split_roots(roots: &[Complex<f64>], wo: f64) -> Vec<Complex<f64>> {
    let plus = roots.iter().map(|&r| r + (r * r - wo * wo).sqrt());
    let minus = roots.iter().map(|&r| r - (r * r - wo * wo).sqrt());
    plus.chain(minus).collect()
}

fn lp2bp(zpk: Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = zpk.poles.len() - zpk.zeros.len();
    let z_lp: Vec<Complex<f64>> = zpk.zeros.iter().map(|&z| z * bw / 2.0).collect();
    let p_lp: Vec<Complex<f64>> = zpk.poles.iter().map(|&p| p * bw / 2.0).collect();
    let mut zeros = split_roots(&z_lp, wo);
    zeros.extend(std::iter::repeat(Complex::new(0.0, 0.0)).take(degree));
    Zpk {
        zeros,
        poles: split_roots(&p_lp, wo),
        gain: zpk.gain * bw.powi(degree as i32),
    }
}

fn lp2bs(zpk: Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = zpk.poles.len() - zpk.zeros.len();
    let z_hp: Vec<Complex<f64>> = zpk.zeros.iter().map(|&z| (bw / 2.0) / z).collect();
    let p_hp: Vec<Complex<f64>> = zpk.poles.iter().map(|&p| (bw / 2.0) / p).collect();
    let mut zeros = split_roots(&z_hp, wo);
    zeros.extend(std::iter::repeat(Complex::new(0.0, wo)).take(degree));
    zeros.extend(std::iter::repeat(Complex::new(0.0, -wo)).take(degree));
    let gain = zpk.gain * (prod_neg(&zpk.zeros) / prod_neg(&zpk.poles)).re;
    Zpk {
        zeros,
        poles: split_roots(&p_hp, wo),
        gain,
    }
}

/// Bilinear transform of an analog zpk at sampling frequency `fs`.
fn bilinear(zpk: Zpk, fs: f64) -> Zpk {
    let degree = zpk.poles.len() - zpk.zeros.len();
    let fs2 = 2.0 * fs;
    let mut zeros: Vec<Complex<f64>> = zpk.zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    zeros.extend(std::iter::repeat(Complex::new(-1.0, 0.0)).take(degree));
    let poles = zpk.poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();

    let num = zpk.zeros.iter().fold(Complex::new(1.0, 0.0), |acc, &z| acc * (fs2 - z));
    let den = zpk.poles.iter().fold(Complex::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
    Zpk {
        zeros,
        poles,
        gain: zpk.gain * (num / den).re,
    }
}

/// Polynomial (highest power first) with the given roots.
fn poly(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for r in roots {
        coeffs.push(Complex::new(0.0, 0.0));
        for i in (1..coeffs.len()).rev() {
            let prev = coeffs[i - 1];
            coeffs[i] -= *r * prev;
        }
    }
    coeffs
}

/// Expand zeros and poles into numerator and denominator coefficients.
fn zpk_to_tf(zpk: &Zpk) -> (Vec<f64>, Vec<f64>) {
    let b = poly(&zpk.zeros).iter().map(|c| c.re * zpk.gain).collect();
    let a = poly(&zpk.poles).iter().map(|c| c.re).collect();
    (b, a)
}

fn prototype(spec: &FilterSpec, family: FilterFamily) -> Result<Zpk> {
    let (rp, rs) = (spec.passband_ripple_db, spec.stopband_atten_db);
    match family {
        FilterFamily::Butterworth => Ok(buttap(spec.order)),
        FilterFamily::Chebyshev1 => {
            if !(rp > 0.0 && rp.is_finite()) {
                return Err(DspError::spec(format!("passband ripple must be > 0 dB, got {}", rp)));
            }
            Ok(cheb1ap(spec.order, rp))
        }
        FilterFamily::Chebyshev2 => {
            if !(rs > 0.0 && rs.is_finite()) {
                return Err(DspError::spec(format!("stopband attenuation must be > 0 dB, got {}", rs)));
            }
            Ok(cheb2ap(spec.order, rs))
        }
        FilterFamily::Elliptic => {
            if !(rp > 0.0 && rs > rp && rs.is_finite()) {
                return Err(DspError::spec(format!(
                    "elliptic design needs 0 < ripple < attenuation, got {} dB / {} dB",
                    rp, rs
                )));
            }
            ellipap(spec.order, rp, rs)
        }
    }
}

/// Second-order IIR notch at normalized frequency `w0` whose -3 dB width is `w0 / q`.
fn notch_tf(w0: f64, q: f64) -> (Vec<f64>, Vec<f64>) {
    let bw = w0 / q * PI;
    let w0 = w0 * PI;
    // gain at the band edges is 1/sqrt(2), so the edge factor sqrt(1 - gb^2) / gb is 1
    let beta = (bw / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);
    let b = vec![gain, -2.0 * gain * w0.cos(), gain];
    let a = vec![1.0, -2.0 * gain * w0.cos(), 2.0 * gain - 1.0];
    (b, a)
}

/// Designs the transfer function requested by `spec` for a signal sampled at `sample_rate`.
pub fn design(spec: &FilterSpec, sample_rate: f64) -> Result<FilterCoefficients> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(DspError::spec(format!("sample rate must be positive, got {}", sample_rate)));
    }
    let nyquist = sample_rate / 2.0;
    let label = spec.label();

    if spec.kind == FilterKind::Notch {
        if let Some(family) = spec.family {
            return Err(DspError::spec(format!("a notch filter has no {} variant", family)));
        }
        let center = match spec.cutoff {
            Cutoff::Single(f) => f,
            Cutoff::Band(..) => return Err(DspError::spec("a notch takes a single center frequency")),
        };
        if !(spec.quality > 0.0 && spec.quality.is_finite()) {
            return Err(DspError::spec(format!("quality factor must be > 0, got {}", spec.quality)));
        }
        let w0 = normalize(center, nyquist)?;
        debug!("designing {} at {} Hz (w0={:.5}, Q={})", label, center, w0, spec.quality);
        let (b, a) = notch_tf(w0, spec.quality);
        return FilterCoefficients::new(b, a, sample_rate, label);
    }

    if spec.order == 0 {
        return Err(DspError::spec("filter order must be at least 1"));
    }
    let family = spec.family.unwrap_or(FilterFamily::Butterworth);

    // pre-warp for the bilinear transform at fs = 2
    let fs = 2.0;
    let warp = |wn: f64| 2.0 * fs * (PI * wn / fs).tan();

    let analog = prototype(spec, family)?;
    let analog = match (spec.kind, spec.cutoff) {
        (FilterKind::Lowpass, Cutoff::Single(f)) => lp2lp(analog, warp(normalize(f, nyquist)?)),
        (FilterKind::Highpass, Cutoff::Single(f)) => lp2hp(analog, warp(normalize(f, nyquist)?)),
        (FilterKind::Bandpass, Cutoff::Band(lo, hi)) | (FilterKind::Bandstop, Cutoff::Band(lo, hi)) => {
            if lo >= hi {
                return Err(DspError::spec(format!(
                    "band edges must satisfy low < high, got {} Hz and {} Hz",
                    lo, hi
                )));
            }
            let (w_lo, w_hi) = (warp(normalize(lo, nyquist)?), warp(normalize(hi, nyquist)?));
            let bw = w_hi - w_lo;
            let wo = (w_lo * w_hi).sqrt();
            if spec.kind == FilterKind::Bandpass {
                lp2bp(analog, wo, bw)
            } else {
                lp2bs(analog, wo, bw)
            }
        }
        (kind, cutoff) => {
            return Err(DspError::spec(format!("{} cannot be designed from cutoff {:?}", kind, cutoff)));
        }
    };

    let digital = bilinear(analog, fs);
    let (b, a) = zpk_to_tf(&digital);
    debug!("designed {} of order {} ({} poles)", label, spec.order, digital.poles.len());
    FilterCoefficients::new(b, a, sample_rate, label)
}

/// Lowpass filter with the given family, defaults for ripple/attenuation.
pub fn design_lowpass(cutoff: f64, sample_rate: f64, order: usize, family: FilterFamily) -> Result<FilterCoefficients> {
    design(&FilterSpec::lowpass(cutoff).with_order(order).with_family(family), sample_rate)
}

pub fn design_highpass(cutoff: f64, sample_rate: f64, order: usize, family: FilterFamily) -> Result<FilterCoefficients> {
    design(&FilterSpec::highpass(cutoff).with_order(order).with_family(family), sample_rate)
}

pub fn design_bandpass(
    low: f64,
    high: f64,
    sample_rate: f64,
    order: usize,
    family: FilterFamily,
) -> Result<FilterCoefficients> {
    design(&FilterSpec::bandpass(low, high).with_order(order).with_family(family), sample_rate)
}

pub fn design_bandstop(
    low: f64,
    high: f64,
    sample_rate: f64,
    order: usize,
    family: FilterFamily,
) -> Result<FilterCoefficients> {
    design(&FilterSpec::bandstop(low, high).with_order(order).with_family(family), sample_rate)
}

/// Notch at `center` Hz with quality factor `q` (bandwidth `center / q`).
pub fn design_notch(center: f64, sample_rate: f64, q: f64) -> Result<FilterCoefficients> {
    design(&FilterSpec::notch(center).with_quality(q), sample_rate)
}
