//! Black-Scholes pricing, Greeks and implied volatility.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;
use std::f64::consts::{PI, SQRT_2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Standard normal PDF
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

fn intrinsic(kind: OptionKind, spot: f64, strike: f64) -> f64 {
    match kind {
        OptionKind::Call => (spot - strike).max(0.0),
        OptionKind::Put => (strike - spot).max(0.0),
    }
}

fn d1_d2(spot: f64, strike: f64, t: f64, r: f64, sigma: f64) -> (f64, f64) {
    let sqrt_t = t.sqrt();
    let d1 = ((spot / strike).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * sqrt_t);
    (d1, d1 - sigma * sqrt_t)
}

fn is_degenerate(spot: f64, strike: f64, t: f64, sigma: f64) -> bool {
    t <= 0.0 || sigma <= 0.0 || spot <= 0.0 || strike <= 0.0
}

/// European option price. Expired or zero-vol inputs price at intrinsic value.
pub fn black_scholes_price(kind: OptionKind, spot: f64, strike: f64, t: f64, r: f64, sigma: f64) -> f64 {
    if is_degenerate(spot, strike, t, sigma) {
        return intrinsic(kind, spot, strike);
    }
    let (d1, d2) = d1_d2(spot, strike, t, r, sigma);
    let discount = (-r * t).exp();
    match kind {
        OptionKind::Call => spot * norm_cdf(d1) - strike * discount * norm_cdf(d2),
        OptionKind::Put => strike * discount * norm_cdf(-d2) - spot * norm_cdf(-d1),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    /// Per calendar day
    pub theta: f64,
    /// Per 1 percentage point of volatility
    pub vega: f64,
}

pub fn greeks(kind: OptionKind, spot: f64, strike: f64, t: f64, r: f64, sigma: f64) -> Greeks {
    if is_degenerate(spot, strike, t, sigma) {
        let delta = match kind {
            OptionKind::Call if spot > strike => 1.0,
            OptionKind::Put if spot < strike => -1.0,
            _ => 0.0,
        };
        return Greeks {
            delta,
            gamma: 0.0,
            theta: 0.0,
            vega: 0.0,
        };
    }

    let (d1, d2) = d1_d2(spot, strike, t, r, sigma);
    let sqrt_t = t.sqrt();
    let pdf = norm_pdf(d1);
    let discount = (-r * t).exp();

    let gamma = pdf / (spot * sigma * sqrt_t);
    let vega = spot * pdf * sqrt_t / 100.0;
    let decay = -spot * pdf * sigma / (2.0 * sqrt_t);
    let (delta, theta_year) = match kind {
        OptionKind::Call => (norm_cdf(d1), decay - r * strike * discount * norm_cdf(d2)),
        OptionKind::Put => (norm_cdf(d1) - 1.0, decay + r * strike * discount * norm_cdf(-d2)),
    };

    Greeks {
        delta,
        gamma,
        theta: theta_year / 365.0,
        vega,
    }
}

/// Bounds and stopping rules for the implied volatility search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvSolverConfig {
    pub lower: f64,
    pub upper: f64,
    /// Stop once the bracket is narrower than this
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Largest price error, relative to the market price, accepted as converged
    pub max_relative_error: f64,
}

impl Default for IvSolverConfig {
    fn default() -> Self {
        Self {
            lower: 0.001,
            upper: 5.0,
            tolerance: 1e-8,
            max_iterations: 200,
            max_relative_error: 1e-3,
        }
    }
}

/// Volatility that reproduces `market_price`, found by golden-section
/// minimization of the squared pricing error over `[lower, upper]`.
///
/// Returns NaN when the inputs are degenerate or the best fit still misses the
/// market price.
pub fn implied_volatility(
    kind: OptionKind,
    market_price: f64,
    spot: f64,
    strike: f64,
    t: f64,
    r: f64,
    solver: &IvSolverConfig,
) -> f64 {
    if !market_price.is_finite() || market_price <= 0.0 || t <= 0.0 || spot <= 0.0 || strike <= 0.0 {
        return f64::NAN;
    }

    let error = |sigma: f64| {
        let diff = black_scholes_price(kind, spot, strike, t, r, sigma) - market_price;
        diff * diff
    };

    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = (solver.lower, solver.upper);
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut fc = error(c);
    let mut fd = error(d);

    for _ in 0..solver.max_iterations {
        if (b - a).abs() < solver.tolerance {
            break;
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = error(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = error(d);
        }
    }

    let sigma = (a + b) / 2.0;
    let residual = (black_scholes_price(kind, spot, strike, t, r, sigma) - market_price).abs();
    if residual <= solver.max_relative_error * market_price.max(1e-6) {
        sigma
    } else {
        f64::NAN
    }
}
