// 1-D interpolation kernels used by resampling and time-normalization

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{Result, TsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpMethod {
    #[default]
    Linear,
    Nearest,
    /// Step function holding the previous sample ("zero" order hold).
    Previous,
    Next,
    /// Not-a-knot cubic spline.
    Cubic,
    /// Shape-preserving piecewise cubic Hermite.
    Pchip,
}

impl FromStr for InterpMethod {
    type Err = TsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(InterpMethod::Linear),
            "nearest" => Ok(InterpMethod::Nearest),
            "zero" | "previous" => Ok(InterpMethod::Previous),
            "next" => Ok(InterpMethod::Next),
            "cubic" => Ok(InterpMethod::Cubic),
            "pchip" => Ok(InterpMethod::Pchip),
            other => Err(TsError::Argument(format!(
                "unknown interpolation method '{}'; expected one of linear, nearest, zero, previous, next, cubic, pchip",
                other
            ))),
        }
    }
}

impl fmt::Display for InterpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpMethod::Linear => "linear",
            InterpMethod::Nearest => "nearest",
            InterpMethod::Previous => "previous",
            InterpMethod::Next => "next",
            InterpMethod::Cubic => "cubic",
            InterpMethod::Pchip => "pchip",
        };
        f.write_str(name)
    }
}

/// What to return for query points outside the fitted range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillPolicy {
    Value(f64),
    Extrapolate,
}

impl Default for FillPolicy {
    fn default() -> Self {
        FillPolicy::Value(f64::NAN)
    }
}

/// Interpolant fitted once on `(x, y)` and evaluated at arbitrary points.
///
/// `x` must be strictly increasing. Step methods (nearest, previous, next)
/// extrapolate by holding the end values.
#[derive(Debug, Clone)]
pub struct Interpolator {
    method: InterpMethod,
    x: Vec<f64>,
    y: Vec<f64>,
    // Second derivatives for Cubic, node slopes for Pchip, empty otherwise
    coeffs: Vec<f64>,
}

impl Interpolator {
    pub fn new(method: InterpMethod, x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(TsError::Argument(format!(
                "x and y must have the same length ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(TsError::Argument(format!(
                "at least 2 points are needed to interpolate, got {}",
                x.len()
            )));
        }
        let coeffs = match method {
            InterpMethod::Cubic => not_a_knot_second_derivatives(x, y),
            InterpMethod::Pchip => pchip_slopes(x, y),
            _ => Vec::new(),
        };
        Ok(Self {
            method,
            x: x.to_vec(),
            y: y.to_vec(),
            coeffs,
        })
    }

    pub fn method(&self) -> InterpMethod {
        self.method
    }

    pub fn eval(&self, xq: f64, fill: FillPolicy) -> f64 {
        if xq.is_nan() {
            return f64::NAN;
        }
        let n = self.x.len();
        if xq < self.x[0] || xq > self.x[n - 1] {
            if let FillPolicy::Value(v) = fill {
                return v;
            }
        }
        match self.method {
            InterpMethod::Linear => self.linear(xq),
            InterpMethod::Nearest => self.nearest(xq),
            InterpMethod::Previous => self.previous(xq),
            InterpMethod::Next => self.next(xq),
            InterpMethod::Cubic => self.cubic(xq),
            InterpMethod::Pchip => self.hermite(xq),
        }
    }

    pub fn eval_many(&self, xq: &[f64], fill: FillPolicy) -> Vec<f64> {
        xq.iter().map(|&v| self.eval(v, fill)).collect()
    }

    // Segment i such that x[i] <= xq < x[i+1], clamped to the end segments
    fn segment(&self, xq: f64) -> usize {
        let n = self.x.len();
        self.x
            .partition_point(|&v| v <= xq)
            .saturating_sub(1)
            .min(n - 2)
    }

    fn linear(&self, xq: f64) -> f64 {
        let i = self.segment(xq);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        y0 + (y1 - y0) * (xq - x0) / (x1 - x0)
    }

    fn nearest(&self, xq: f64) -> f64 {
        let n = self.x.len();
        if xq <= self.x[0] {
            return self.y[0];
        }
        if xq >= self.x[n - 1] {
            return self.y[n - 1];
        }
        let i = self.segment(xq);
        if xq - self.x[i] <= self.x[i + 1] - xq {
            self.y[i]
        } else {
            self.y[i + 1]
        }
    }

    fn previous(&self, xq: f64) -> f64 {
        let count = self.x.partition_point(|&v| v <= xq);
        self.y[count.saturating_sub(1)]
    }

    fn next(&self, xq: f64) -> f64 {
        let j = self.x.partition_point(|&v| v < xq);
        self.y[j.min(self.x.len() - 1)]
    }

    fn cubic(&self, xq: f64) -> f64 {
        let i = self.segment(xq);
        let h = self.x[i + 1] - self.x[i];
        let a = self.x[i + 1] - xq;
        let b = xq - self.x[i];
        let (m0, m1) = (self.coeffs[i], self.coeffs[i + 1]);
        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (self.y[i] / h - m0 * h / 6.0) * a
            + (self.y[i + 1] / h - m1 * h / 6.0) * b
    }

    fn hermite(&self, xq: f64) -> f64 {
        let i = self.segment(xq);
        let h = self.x[i + 1] - self.x[i];
        let t = (xq - self.x[i]) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        (2.0 * t3 - 3.0 * t2 + 1.0) * self.y[i]
            + (t3 - 2.0 * t2 + t) * h * self.coeffs[i]
            + (-2.0 * t3 + 3.0 * t2) * self.y[i + 1]
            + (t3 - t2) * h * self.coeffs[i + 1]
    }
}

/// Fit `method` on `(x, y)` and evaluate at every `xq`.
pub fn interpolate(
    method: InterpMethod,
    x: &[f64],
    y: &[f64],
    xq: &[f64],
    fill: FillPolicy,
) -> Result<Vec<f64>> {
    Ok(Interpolator::new(method, x, y)?.eval_many(xq, fill))
}

fn steps_and_secants(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let d: Vec<f64> = y
        .windows(2)
        .zip(&h)
        .map(|(w, hi)| (w[1] - w[0]) / hi)
        .collect();
    (h, d)
}

fn not_a_knot_second_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let (h, d) = steps_and_secants(x, y);
    match n {
        2 => return vec![0.0; 2],
        // The not-a-knot spline through three points is their parabola
        3 => return vec![2.0 * (d[1] - d[0]) / (h[0] + h[1]); 3],
        _ => {}
    }

    // Unknowns M[1..n-1]; M[0] and M[n-1] are eliminated with the
    // continuity of the third derivative at x[1] and x[n-2].
    let m = n - 2;
    let mut sub = vec![0.0; m];
    let mut diag = vec![0.0; m];
    let mut sup = vec![0.0; m];
    let mut rhs = vec![0.0; m];
    for k in 0..m {
        let i = k + 1;
        sub[k] = h[i - 1];
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        sup[k] = h[i];
        rhs[k] = 6.0 * (d[i] - d[i - 1]);
    }
    let (h0, h1) = (h[0], h[1]);
    diag[0] = (h0 + h1) * (h0 + 2.0 * h1) / h1;
    sup[0] = (h1 * h1 - h0 * h0) / h1;
    let (a, b) = (h[n - 3], h[n - 2]);
    sub[m - 1] = (a * a - b * b) / a;
    diag[m - 1] = (a + b) * (2.0 * a + b) / a;

    let inner = solve_tridiagonal(&sub, &mut diag, &sup, &mut rhs);

    let mut second = Vec::with_capacity(n);
    second.push(((h0 + h1) * inner[0] - h0 * inner[1]) / h1);
    second.extend_from_slice(&inner);
    second.push(((a + b) * inner[m - 1] - b * inner[m - 2]) / a);
    second
}

// Thomas algorithm; `diag` and `rhs` are overwritten
fn solve_tridiagonal(sub: &[f64], diag: &mut [f64], sup: &[f64], rhs: &mut [f64]) -> Vec<f64> {
    let m = diag.len();
    for k in 1..m {
        let w = sub[k] / diag[k - 1];
        diag[k] -= w * sup[k - 1];
        rhs[k] -= w * rhs[k - 1];
    }
    let mut sol = vec![0.0; m];
    sol[m - 1] = rhs[m - 1] / diag[m - 1];
    for k in (0..m - 1).rev() {
        sol[k] = (rhs[k] - sup[k] * sol[k + 1]) / diag[k];
    }
    sol
}

fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let (h, d) = steps_and_secants(x, y);
    if n == 2 {
        return vec![d[0]; 2];
    }
    let mut slopes = vec![0.0; n];
    for k in 1..n - 1 {
        let (d0, d1) = (d[k - 1], d[k]);
        if d0 * d1 <= 0.0 {
            continue;
        }
        // Weighted harmonic mean
        let w1 = 2.0 * h[k] + h[k - 1];
        let w2 = h[k] + 2.0 * h[k - 1];
        slopes[k] = (w1 + w2) / (w1 / d0 + w2 / d1);
    }
    slopes[0] = pchip_edge(h[0], h[1], d[0], d[1]);
    slopes[n - 1] = pchip_edge(h[n - 2], h[n - 3], d[n - 2], d[n - 3]);
    slopes
}

// One-sided three-point estimate, limited to preserve shape
fn pchip_edge(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}
