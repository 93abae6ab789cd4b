//! Limited-memory BFGS minimizer with a backtracking Armijo line search.

use std::collections::VecDeque;

use super::train::FitError;

/// Solver limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LbfgsOptions {
    pub max_iter: usize,
    /// Number of curvature pairs kept for the inverse-Hessian estimate.
    pub history: usize,
    /// Stop when the gradient infinity norm drops to this value.
    pub gradient_tolerance: f64,
    /// Stop when the relative objective decrease drops to this value.
    pub relative_tolerance: f64,
}

impl Default for LbfgsOptions {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            history: 10,
            gradient_tolerance: 1e-4,
            relative_tolerance: 2.220446049250313e-9,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LbfgsOutcome {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const MIN_CURVATURE: f64 = 1e-12;

struct Pair {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

/// Minimize `objective`, which writes the gradient into its second argument and
/// returns the objective value.
pub(crate) fn minimize<F>(
    mut objective: F,
    x0: Vec<f64>,
    options: &LbfgsOptions,
) -> Result<LbfgsOutcome, FitError>
where
    F: FnMut(&[f64], &mut [f64]) -> f64,
{
    let n = x0.len();
    let mut x = x0;
    let mut grad = vec![0.0; n];
    let mut value = objective(&x, &mut grad);
    if !value.is_finite() || grad.iter().any(|g| !g.is_finite()) {
        return Err(FitError::NonFinite { iteration: 0 });
    }

    let mut pairs: VecDeque<Pair> = VecDeque::with_capacity(options.history);
    let mut x_next = vec![0.0; n];
    let mut grad_next = vec![0.0; n];

    for iteration in 1..=options.max_iter {
        if inf_norm(&grad) <= options.gradient_tolerance {
            return Ok(LbfgsOutcome {
                x,
                value,
                iterations: iteration - 1,
                converged: true,
            });
        }

        let mut direction = two_loop_direction(&grad, &pairs);
        let mut slope = dot(&direction, &grad);
        if slope >= 0.0 {
            pairs.clear();
            direction = grad.iter().map(|g| -g).collect();
            slope = -dot(&grad, &grad);
        }

        let mut step = if pairs.is_empty() {
            (1.0 / norm(&grad)).min(1.0)
        } else {
            1.0
        };
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            for i in 0..n {
                x_next[i] = x[i] + step * direction[i];
            }
            let candidate = objective(&x_next, &mut grad_next);
            if candidate.is_finite()
                && grad_next.iter().all(|g| g.is_finite())
                && candidate <= value + ARMIJO_C1 * step * slope
            {
                accepted = Some(candidate);
                break;
            }
            step *= 0.5;
        }

        let Some(next_value) = accepted else {
            if pairs.is_empty() {
                tracing::debug!("L-BFGS line search stalled at iteration {iteration}");
                return Ok(LbfgsOutcome {
                    x,
                    value,
                    iterations: iteration,
                    converged: false,
                });
            }
            pairs.clear();
            continue;
        };

        let s: Vec<f64> = x_next.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = grad_next.iter().zip(&grad).map(|(a, b)| a - b).collect();
        let curvature = dot(&s, &y);
        if curvature > MIN_CURVATURE {
            if pairs.len() == options.history.max(1) {
                pairs.pop_front();
            }
            pairs.push_back(Pair {
                s,
                y,
                rho: 1.0 / curvature,
            });
        }

        let previous = value;
        std::mem::swap(&mut x, &mut x_next);
        std::mem::swap(&mut grad, &mut grad_next);
        value = next_value;

        let scale = previous.abs().max(value.abs()).max(1.0);
        if (previous - value) / scale <= options.relative_tolerance {
            return Ok(LbfgsOutcome {
                x,
                value,
                iterations: iteration,
                converged: true,
            });
        }
    }

    let converged = inf_norm(&grad) <= options.gradient_tolerance;
    Ok(LbfgsOutcome {
        x,
        value,
        iterations: options.max_iter,
        converged,
    })
}

fn two_loop_direction(grad: &[f64], pairs: &VecDeque<Pair>) -> Vec<f64> {
    let mut q = grad.to_vec();
    let mut alphas = Vec::with_capacity(pairs.len());
    for pair in pairs.iter().rev() {
        let alpha = pair.rho * dot(&pair.s, &q);
        axpy(-alpha, &pair.y, &mut q);
        alphas.push(alpha);
    }
    let gamma = pairs
        .back()
        .map(|pair| dot(&pair.s, &pair.y) / dot(&pair.y, &pair.y))
        .filter(|gamma| gamma.is_finite() && *gamma > 0.0)
        .unwrap_or(1.0);
    for v in &mut q {
        *v *= gamma;
    }
    for (pair, alpha) in pairs.iter().zip(alphas.into_iter().rev()) {
        let beta = pair.rho * dot(&pair.y, &q);
        axpy(alpha - beta, &pair.s, &mut q);
    }
    for v in &mut q {
        *v = -*v;
    }
    q
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

fn inf_norm(a: &[f64]) -> f64 {
    a.iter().fold(0.0f64, |acc, v| acc.max(v.abs()))
}

fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}
