/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
//! Analog low-pass prototypes (cutoff 1 rad/s) in zero-pole-gain form, together with
//! the complete elliptic integral and Jacobi elliptic functions the Cauer design needs.
use crate::error::{DspError, Result};
use num_complex::Complex;
use std::f64::consts::{FRAC_PI_2, PI};

const EPSILON: f64 = 2e-16;
const MACHEP: f64 = 1.11022302462515654042e-16;
const ARC_JAC_SN_MAXITER: usize = 10;
const ELLIPDEG_MMAX: i32 = 7;

/// Zeros, poles and gain of a transfer function.
#[derive(Clone, Debug)]
pub struct Zpk {
    pub zeros: Vec<Complex<f64>>,
    pub poles: Vec<Complex<f64>>,
    pub gain: f64,
}

/// `10^x - 1`
fn pow10m1(x: f64) -> f64 {
    (x * std::f64::consts::LN_10).exp_m1()
}

/// Product of `-r` over all roots.
pub(crate) fn prod_neg(roots: &[Complex<f64>]) -> Complex<f64> {
    roots.iter().fold(Complex::new(1.0, 0.0), |acc, &r| acc * -r)
}

/// Butterworth prototype of order `n`: poles evenly spaced on the left unit half-circle.
pub fn buttap(n: usize) -> Zpk {
    let nf = n as f64;
    let poles = (0..n)
        .map(|i| {
            let m = -(nf - 1.0) + 2.0 * i as f64;
            -Complex::new(0.0, PI * m / (2.0 * nf)).exp()
        })
        .collect();
    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

/// Chebyshev type I prototype with `rp` dB of passband ripple.
pub fn cheb1ap(n: usize, rp: f64) -> Zpk {
    let nf = n as f64;
    let eps = pow10m1(0.1 * rp).sqrt();
    let mu = (1.0 / eps).asinh() / nf;
    let poles: Vec<Complex<f64>> = (0..n)
        .map(|i| {
            let m = -(nf - 1.0) + 2.0 * i as f64;
            let theta = PI * m / (2.0 * nf);
            -Complex::new(mu, theta).sinh()
        })
        .collect();
    let mut gain = prod_neg(&poles).re;
    if n % 2 == 0 {
        gain /= (1.0 + eps * eps).sqrt();
    }
    Zpk {
        zeros: Vec::new(),
        poles,
        gain,
    }
}

/// Chebyshev type II prototype with `rs` dB of stopband attenuation.
pub fn cheb2ap(n: usize, rs: f64) -> Zpk {
    let nf = n as f64;
    let de = 1.0 / pow10m1(0.1 * rs).sqrt();
    let mu = (1.0 / de).asinh() / nf;

    // the middle term m = 0 of an odd order would be a zero at infinity
    let zeros: Vec<Complex<f64>> = (0..n)
        .map(|i| -(nf - 1.0) + 2.0 * i as f64)
        .filter(|m| *m != 0.0)
        .map(|m| Complex::new(0.0, 1.0 / (m * PI / (2.0 * nf)).sin()))
        .collect();

    let poles: Vec<Complex<f64>> = (0..n)
        .map(|i| {
            let m = -(nf - 1.0) + 2.0 * i as f64;
            let p = -Complex::new(0.0, PI * m / (2.0 * nf)).exp();
            let p = Complex::new(mu.sinh() * p.re, mu.cosh() * p.im);
            p.inv()
        })
        .collect();

    let gain = (prod_neg(&poles) / prod_neg(&zeros)).re;
    Zpk { zeros, poles, gain }
}

/// Elliptic (Cauer) prototype with `rp` dB passband ripple and `rs` dB stopband attenuation.
pub fn ellipap(n: usize, rp: f64, rs: f64) -> Result<Zpk> {
    if n == 1 {
        let p = -(1.0 / pow10m1(0.1 * rp)).sqrt();
        return Ok(Zpk {
            zeros: Vec::new(),
            poles: vec![Complex::new(p, 0.0)],
            gain: -p,
        });
    }

    let eps_sq = pow10m1(0.1 * rp);
    let eps = eps_sq.sqrt();
    let ck1_sq = eps_sq / pow10m1(0.1 * rs);
    if ck1_sq == 0.0 {
        return Err(DspError::spec(format!(
            "cannot design an elliptic filter with rp={} dB and rs={} dB",
            rp, rs
        )));
    }

    let val0 = ellipk(ck1_sq);
    let m = ellipdeg(n, ck1_sq);
    let capk = ellipk(m);
    let nf = n as f64;

    let jacobi: Vec<(f64, f64, f64)> = (1 - n % 2..n)
        .step_by(2)
        .map(|j| {
            let (s, c, d, _) = ellipj(j as f64 * capk / nf, m);
            (s, c, d)
        })
        .collect();

    let mut zeros: Vec<Complex<f64>> = jacobi
        .iter()
        .filter(|(s, _, _)| s.abs() > EPSILON)
        .map(|(s, _, _)| Complex::new(0.0, 1.0 / (m.sqrt() * s)))
        .collect();
    let conj: Vec<Complex<f64>> = zeros.iter().map(|z| z.conj()).collect();
    zeros.extend(conj);

    let r = arc_jac_sc1(1.0 / eps, ck1_sq)?;
    let v0 = capk * r / (nf * val0);
    let (sv, cv, dv, _) = ellipj(v0, 1.0 - m);

    let mut poles: Vec<Complex<f64>> = jacobi
        .iter()
        .map(|&(s, c, d)| -Complex::new(c * d * sv * cv, s * dv) / (1.0 - (d * sv).powi(2)))
        .collect();

    if n % 2 == 1 {
        let scale = EPSILON * poles.iter().map(|p| p.norm_sqr()).sum::<f64>().sqrt();
        let conj: Vec<Complex<f64>> = poles.iter().filter(|p| p.im.abs() > scale).map(|p| p.conj()).collect();
        poles.extend(conj);
    } else {
        let conj: Vec<Complex<f64>> = poles.iter().map(|p| p.conj()).collect();
        poles.extend(conj);
    }

    let mut gain = (prod_neg(&poles) / prod_neg(&zeros)).re;
    if n % 2 == 0 {
        gain /= (1.0 + eps_sq).sqrt();
    }
    Ok(Zpk { zeros, poles, gain })
}

/// Arithmetic-geometric mean.
fn agm(mut a: f64, mut b: f64) -> f64 {
    for _ in 0..64 {
        if (a - b).abs() <= MACHEP * a {
            break;
        }
        let next = 0.5 * (a + b);
        b = (a * b).sqrt();
        a = next;
    }
    a
}

/// Complete elliptic integral of the first kind, parameter `m = k^2`.
pub fn ellipk(m: f64) -> f64 {
    if m >= 1.0 {
        return f64::INFINITY;
    }
    PI / (2.0 * agm(1.0, (1.0 - m).sqrt()))
}

/// `K(1 - p)`, accurate for small `p`.
pub fn ellipkm1(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::INFINITY;
    }
    PI / (2.0 * agm(1.0, p.sqrt()))
}

/// Jacobi elliptic functions `(sn, cn, dn, am)` of real argument `u` and parameter `m`.
pub fn ellipj(u: f64, m: f64) -> (f64, f64, f64, f64) {
    if m < 1.0e-9 {
        let t = u.sin();
        let b = u.cos();
        let ai = 0.25 * m * (u - t * b);
        return (t - ai * b, b + ai * t, 1.0 - 0.5 * m * t * t, u - ai);
    }

    if m >= 0.9999999999 {
        let mut ai = 0.25 * (1.0 - m);
        let b = u.cosh();
        let t = u.tanh();
        let phi = 1.0 / b;
        let twon = b * u.sinh();
        let sn = t + ai * (twon - u) / (b * b);
        let ph = 2.0 * u.exp().atan() - FRAC_PI_2 + ai * (twon - u) / b;
        ai *= t * phi;
        let cn = phi - ai * (twon - u);
        let dn = phi + ai * (twon + u);
        return (sn, cn, dn, ph);
    }

    // descending Landen transformation
    let mut a = [0.0f64; 9];
    let mut c = [0.0f64; 9];
    a[0] = 1.0;
    let mut b = (1.0 - m).sqrt();
    c[0] = m.sqrt();
    let mut twon = 1.0;
    let mut i = 0;
    while (c[i] / a[i]).abs() > MACHEP && i < 8 {
        let ai = a[i];
        i += 1;
        c[i] = (ai - b) / 2.0;
        let t = (ai * b).sqrt();
        a[i] = (ai + b) / 2.0;
        b = t;
        twon *= 2.0;
    }

    let mut phi = twon * a[i] * u;
    let mut prev = phi;
    while i > 0 {
        let t = c[i] * phi.sin() / a[i];
        prev = phi;
        phi = (t.asin() + phi) / 2.0;
        i -= 1;
    }

    let cn = phi.cos();
    (phi.sin(), cn, cn / (phi - prev).cos(), phi)
}

/// `sqrt((1 - k)(1 + k))` on complex values.
fn complement(kx: Complex<f64>) -> Complex<f64> {
    ((1.0 - kx) * (1.0 + kx)).sqrt()
}

/// Inverse Jacobi `sn` for complex argument via the Landen sequence.
fn arc_jac_sn(w: Complex<f64>, m: f64) -> Result<Complex<f64>> {
    let k = m.sqrt();
    if k > 1.0 {
        return Err(DspError::numeric(format!("elliptic modulus {} exceeds 1", k)));
    }
    if k == 1.0 {
        return Ok(w.atanh());
    }

    let mut ks = vec![k];
    while *ks.last().unwrap_or(&0.0) != 0.0 {
        if ks.len() > ARC_JAC_SN_MAXITER {
            return Err(DspError::numeric("Landen transformation did not converge"));
        }
        let k_ = ks[ks.len() - 1];
        let k_p = complement(Complex::new(k_, 0.0)).re;
        ks.push((1.0 - k_p) / (1.0 + k_p));
    }

    let capk = ks[1..].iter().map(|kn| 1.0 + kn).product::<f64>() * FRAC_PI_2;

    let mut wn = w;
    for pair in ks.windows(2) {
        let (kn, knext) = (pair[0], pair[1]);
        wn = 2.0 * wn / ((1.0 + knext) * (1.0 + complement(kn * wn)));
    }

    let u = 2.0 / PI * wn.asin();
    Ok(capk * u)
}

/// Real inverse of the Jacobi `sc` function with complementary parameter.
fn arc_jac_sc1(w: f64, m: f64) -> Result<f64> {
    let z = arc_jac_sn(Complex::new(0.0, w), m)?;
    if z.re.abs() > 1e-14 {
        return Err(DspError::numeric("inverse sc produced a complex result"));
    }
    Ok(z.im)
}

/// Solve the elliptic degree equation for `n` and modulus `m1`.
fn ellipdeg(n: usize, m1: f64) -> f64 {
    let k1 = ellipk(m1);
    let k1p = ellipkm1(m1);
    let q1 = (-PI * k1p / k1).exp();
    let q = q1.powf(1.0 / n as f64);

    let num: f64 = (0..=ELLIPDEG_MMAX).map(|i| q.powi(i * (i + 1))).sum();
    let den: f64 = 1.0 + 2.0 * (1..=ELLIPDEG_MMAX + 1).map(|i| q.powi(i * i)).sum::<f64>();

    16.0 * q * (num / den).powi(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_ellipk_known_values() {
        assert!(approx_eq!(f64, ellipk(0.0), FRAC_PI_2, epsilon = 1e-12));
        // K(0.5) = 1.8540746773013719
        assert!(approx_eq!(f64, ellipk(0.5), 1.8540746773013719, epsilon = 1e-12));
        assert!(approx_eq!(f64, ellipkm1(0.5), ellipk(0.5), epsilon = 1e-12));
    }

    #[test]
    fn test_ellipj_identities() {
        for &m in &[0.0, 0.1, 0.5, 0.9, 0.99999999999] {
            for &u in &[0.0, 0.3, 1.0, 2.5] {
                let (sn, cn, dn, _) = ellipj(u, m);
                assert!(approx_eq!(f64, sn * sn + cn * cn, 1.0, epsilon = 1e-9), "m={} u={}", m, u);
                assert!(approx_eq!(f64, dn * dn + m * sn * sn, 1.0, epsilon = 1e-9), "m={} u={}", m, u);
            }
        }
        // sn(K(m), m) = 1
        let (sn, _, _, _) = ellipj(ellipk(0.7), 0.7);
        assert!(approx_eq!(f64, sn, 1.0, epsilon = 1e-9));
    }

    #[test]
    fn test_arc_jac_sn_inverts_sn() {
        let m = 0.3;
        let u = 0.8;
        let (sn, _, _, _) = ellipj(u, m);
        let back = arc_jac_sn(Complex::new(sn, 0.0), m).unwrap();
        assert!(approx_eq!(f64, back.re, u, epsilon = 1e-9));
        assert!(back.im.abs() < 1e-9);
    }

    #[test]
    fn test_buttap_poles_on_unit_circle() {
        let zpk = buttap(5);
        assert_eq!(zpk.poles.len(), 5);
        assert!(zpk.zeros.is_empty());
        for p in &zpk.poles {
            assert!(approx_eq!(f64, p.norm(), 1.0, epsilon = 1e-12));
            assert!(p.re < 0.0);
        }
    }

    #[test]
    fn test_prototype_dc_gain() {
        // |H(0)| = k * prod(-z) / prod(-p)
        let dc = |zpk: &Zpk| (zpk.gain * prod_neg(&zpk.zeros) / prod_neg(&zpk.poles)).norm();
        assert!(approx_eq!(f64, dc(&buttap(4)), 1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, dc(&cheb1ap(3, 1.0)), 1.0, epsilon = 1e-12));
        // even Chebyshev I sits at the bottom of the ripple at DC
        assert!(approx_eq!(f64, dc(&cheb1ap(4, 1.0)), 10f64.powf(-1.0 / 20.0), epsilon = 1e-12));
        assert!(approx_eq!(f64, dc(&cheb2ap(4, 40.0)), 1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, dc(&ellipap(3, 1.0, 40.0).unwrap()), 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, dc(&ellipap(4, 1.0, 40.0).unwrap()), 10f64.powf(-1.0 / 20.0), epsilon = 1e-9));
    }

    #[test]
    fn test_ellipap_counts_and_stability() {
        for n in 1..=6 {
            let zpk = ellipap(n, 1.0, 40.0).unwrap();
            assert_eq!(zpk.poles.len(), n, "order {}", n);
            assert_eq!(zpk.zeros.len(), n - n % 2, "order {}", n);
            assert!(zpk.poles.iter().all(|p| p.re < 0.0));
            assert!(zpk.zeros.iter().all(|z| z.re.abs() < 1e-12));
        }
    }
}
