//! The NLP solver core (§4.6): a primal log-barrier interior-point Newton
//! method over the box-bounded, equality-constrained flat NLP the model
//! builder produces. Every inequality in the model (INV8-11) has already
//! been turned into an equality plus a nonnegative slack by `pd-model`
//! (§3, §4.5), so the only inequalities left here are the variable box
//! bounds themselves — exactly the shape a classic primal barrier method
//! wants. The Jacobian of the equality block is computed by central finite
//! differences, mirroring `pd-solver`'s sibling style
//! (`jacobian::central_difference_jacobian` in this workspace's older
//! steady-network solver) rather than reaching for a symbolic/AD
//! dependency (§9 design note: "direct assembly of sparse Jacobian
//! callbacks ... feasible in any target language").

use std::collections::HashSet;
use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use pd_core::Real;
use pd_model::bounds::Bound;

use crate::error::{SolverError, SolverResult};
use crate::options::{MuStrategy, SolverOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Optimal,
    IterationLimit,
    Infeasible,
    Unbounded,
    Other,
}

impl TerminationStatus {
    /// §4.7 "a small integer code".
    pub fn code(self) -> i32 {
        match self {
            TerminationStatus::Optimal => 0,
            TerminationStatus::IterationLimit => 1,
            TerminationStatus::Infeasible => 2,
            TerminationStatus::Unbounded => 3,
            TerminationStatus::Other => -1,
        }
    }
}

pub struct SolveOutcome {
    pub status: TerminationStatus,
    pub iterations: usize,
    pub constraint_violation: Real,
    pub stationarity_residual: Real,
    pub cpu_time: Duration,
}

/// Fraction-to-the-boundary parameter (classic interior-point line-search
/// rule): a Newton step may approach a bound but never step past
/// `1 - FRACTION_TO_BOUNDARY` of the remaining distance to it in one move.
const FRACTION_TO_BOUNDARY: Real = 0.995;
const MU_REDUCTION: Real = 0.2;
const MU_MIN: Real = 1e-10;
const REGULARIZATION: Real = 1e-8;

/// Runs the barrier-Newton core to convergence (or exhaustion of
/// `options.max_iter` Newton steps, summed across all barrier phases).
///
/// - `x` is the full flat state vector, mutated in place; only indices NOT
///   in `fixed` are iterated on.
/// - `objective_grad` gives `df/dx_i` for every free index (zero almost
///   everywhere: this NLP's objective is `Tf`, optionally plus a
///   quadratic smoothness penalty whose gradient the caller folds in).
/// - `residual_fn` evaluates the full equality-constraint vector `g(x)`.
pub fn solve(
    x: &mut [Real],
    bounds: &[Bound],
    scale: &[Real],
    fixed: &HashSet<usize>,
    objective_grad: impl Fn(&[Real]) -> Vec<Real>,
    residual_fn: impl Fn(&[Real]) -> Vec<Real>,
    options: &SolverOptions,
) -> SolverResult<SolveOutcome> {
    let started = Instant::now();
    let n = x.len();
    let free: Vec<usize> = (0..n).filter(|i| !fixed.contains(i)).collect();
    let nf = free.len();

    if let Some(push) = options.warmstart_bound_push {
        push_initial_point_from_bounds(x, bounds, &free, push);
    }

    let g0 = residual_fn(x);
    let m = g0.len();

    let mut mu = options.mu_init;
    let mut total_iters = 0usize;
    let mut last_constr_viol = inf_norm(&g0);
    let mut last_stationarity = Real::INFINITY;

    loop {
        let (converged, iters, constr_viol, stationarity) = newton_phase(
            x,
            bounds,
            scale,
            &free,
            m,
            mu,
            &objective_grad,
            &residual_fn,
            options,
            options.max_iter.saturating_sub(total_iters),
        )?;
        total_iters += iters;
        last_constr_viol = constr_viol;
        last_stationarity = stationarity;

        if total_iters >= options.max_iter {
            return Ok(SolveOutcome {
                status: TerminationStatus::IterationLimit,
                iterations: total_iters,
                constraint_violation: last_constr_viol,
                stationarity_residual: last_stationarity,
                cpu_time: started.elapsed(),
            });
        }

        let dual_gap_small = mu <= options.tol.max(MU_MIN);
        if converged && constr_viol <= options.constr_viol_tol && dual_gap_small {
            return Ok(SolveOutcome {
                status: TerminationStatus::Optimal,
                iterations: total_iters,
                constraint_violation: last_constr_viol,
                stationarity_residual: last_stationarity,
                cpu_time: started.elapsed(),
            });
        }

        if !converged && constr_viol > 1e3 * options.constr_viol_tol.max(1.0) {
            return Ok(SolveOutcome {
                status: TerminationStatus::Infeasible,
                iterations: total_iters,
                constraint_violation: last_constr_viol,
                stationarity_residual: last_stationarity,
                cpu_time: started.elapsed(),
            });
        }

        match options.mu_strategy {
            MuStrategy::Adaptive => mu = (mu * MU_REDUCTION).max(MU_MIN),
            MuStrategy::Monotone => mu *= 0.5,
        }
        if mu < MU_MIN && !converged {
            return Ok(SolveOutcome {
                status: TerminationStatus::Other,
                iterations: total_iters,
                constraint_violation: last_constr_viol,
                stationarity_residual: last_stationarity,
                cpu_time: started.elapsed(),
            });
        }
        let _ = nf;
    }
}

/// One barrier phase at fixed `mu`: Newton-iterate the KKT stationarity +
/// primal-feasibility system until its residual norm stops shrinking
/// meaningfully or `max_iter` is exhausted.
///
/// The linear system is assembled and solved in scaled coordinates
/// `u = x / scale` (§4.2): the Jacobian's free columns and the barrier
/// curvature's diagonal are divided by `scale[idx]` before
/// `assemble_kkt`/`solve_kkt`, and the resulting step is multiplied back
/// by `scale[idx]` before it is applied to `x`. With every `scale` entry
/// at `1.0` this is exactly the unscaled system.
#[allow(clippy::too_many_arguments)]
fn newton_phase(
    x: &mut [Real],
    bounds: &[Bound],
    scale: &[Real],
    free: &[usize],
    m: usize,
    mu: Real,
    objective_grad: &impl Fn(&[Real]) -> Vec<Real>,
    residual_fn: &impl Fn(&[Real]) -> Vec<Real>,
    options: &SolverOptions,
    max_iter: usize,
) -> SolverResult<(bool, usize, Real, Real)> {
    let nf = free.len();
    let relax = options.bound_relax_factor;
    let mut lambda = DVector::<Real>::zeros(m);
    let mut iters_used = 0usize;
    let mut final_stationarity = Real::INFINITY;
    let mut final_viol = inf_norm(&residual_fn(x));

    for _ in 0..max_iter.max(1) {
        iters_used += 1;
        let g = residual_fn(x);
        let viol = inf_norm(&g);
        let jac = jacobian(x, free, residual_fn, m);

        let grad_f = objective_grad(x);
        let barrier_grad = barrier_gradient(x, bounds, free, mu, relax);
        let mut stat = vec![0.0; nf];
        for (row, &idx) in free.iter().enumerate() {
            let jt_lambda: Real = (0..m).map(|r| jac[(r, row)] * lambda[r]).sum();
            stat[row] = grad_f[idx] + jt_lambda - barrier_grad[row];
        }

        let stat_norm = inf_norm(&stat);
        final_stationarity = stat_norm;
        final_viol = viol;
        if stat_norm <= options.tol && viol <= options.constr_viol_tol {
            return Ok((true, iters_used, viol, stat_norm));
        }

        let barrier_curv = barrier_curvature(x, bounds, free, mu, relax);
        let inv_scale: Vec<Real> = free.iter().map(|&idx| 1.0 / scale[idx]).collect();
        let jac_scaled = scale_jacobian_columns(&jac, &inv_scale);
        let curv_scaled: Vec<Real> = barrier_curv
            .iter()
            .zip(&inv_scale)
            .map(|(h, s)| h * s * s)
            .collect();

        let kkt = assemble_kkt(&jac_scaled, &curv_scaled, nf, m);
        let mut rhs = DVector::<Real>::zeros(nf + m);
        for row in 0..nf {
            rhs[row] = -stat[row] * inv_scale[row];
        }
        for row in 0..m {
            rhs[nf + row] = -g[row];
        }

        let step = solve_kkt(&kkt, &rhs)?;
        let dx_free: Vec<Real> = (0..nf).map(|i| step[i] * inv_scale[i]).collect();
        let dlambda: Vec<Real> = (0..m).map(|i| step[nf + i]).collect();

        let alpha = fraction_to_boundary_step(x, bounds, free, &dx_free, relax);
        for (row, &idx) in free.iter().enumerate() {
            x[idx] += alpha * dx_free[row];
        }
        for row in 0..m {
            lambda[row] += alpha * dlambda[row];
        }
    }

    Ok((false, iters_used, final_viol, final_stationarity))
}

/// Divides each free column `c` of `jac` by `inv_scale[c]`'s reciprocal,
/// i.e. multiplies it by `inv_scale[c]` (`d(residual)/d(u) = d(residual)/d(x)
/// * dx/du = J * scale^-1`, §4.2).
fn scale_jacobian_columns(jac: &DMatrix<Real>, inv_scale: &[Real]) -> DMatrix<Real> {
    let mut scaled = jac.clone();
    for (c, &s) in inv_scale.iter().enumerate() {
        for r in 0..scaled.nrows() {
            scaled[(r, c)] *= s;
        }
    }
    scaled
}

/// One-time push of the initial iterate away from its bounds (§4.6
/// warm-start policy): clamps a doubly-bounded free variable into
/// `[lo+push, hi-push]` (or its midpoint if the interval is narrower than
/// `2*push`), and a singly-bounded one away from its one finite bound.
/// A warm-started initial point can land exactly on a bound (e.g. a
/// released control pinned to its prior value); starting the barrier
/// method there makes the first Newton step badly conditioned.
fn push_initial_point_from_bounds(x: &mut [Real], bounds: &[Bound], free: &[usize], push: Real) {
    for &idx in free {
        let b = bounds[idx];
        match (b.lo.is_finite(), b.hi.is_finite()) {
            (true, true) => {
                if b.hi - b.lo > 2.0 * push {
                    x[idx] = x[idx].clamp(b.lo + push, b.hi - push);
                } else {
                    x[idx] = 0.5 * (b.lo + b.hi);
                }
            }
            (true, false) => x[idx] = x[idx].max(b.lo + push),
            (false, true) => x[idx] = x[idx].min(b.hi - push),
            (false, false) => {}
        }
    }
}

fn inf_norm(v: &[Real]) -> Real {
    v.iter().fold(0.0, |acc, &x| acc.max(x.abs()))
}

fn jacobian(
    x: &[Real],
    free: &[usize],
    residual_fn: &impl Fn(&[Real]) -> Vec<Real>,
    m: usize,
) -> DMatrix<Real> {
    let nf = free.len();
    let mut jac = DMatrix::<Real>::zeros(m, nf);
    let mut xp = x.to_vec();
    let mut xm = x.to_vec();
    for (col, &idx) in free.iter().enumerate() {
        let h = 1e-6 * x[idx].abs().max(1.0);
        xp[idx] = x[idx] + h;
        xm[idx] = x[idx] - h;
        let fp = residual_fn(&xp);
        let fm = residual_fn(&xm);
        for row in 0..m {
            jac[(row, col)] = (fp[row] - fm[row]) / (2.0 * h);
        }
        xp[idx] = x[idx];
        xm[idx] = x[idx];
    }
    jac
}

/// Relaxes a box bound outward by `relax` times its own magnitude (§4.6
/// `bound_relax_factor`): `lo' = lo - relax*max(1,|lo|)`, `hi' = hi +
/// relax*max(1,|hi|)`, each only where the original bound is finite. This
/// is the IPOPT-style fix for variables whose true bound is pinned at
/// exactly the barrier's feasible boundary (e.g. a structural fixing),
/// where the unrelaxed barrier gradient/curvature would blow up.
fn relaxed_bound(b: Bound, relax: Real) -> Bound {
    Bound {
        lo: if b.lo.is_finite() {
            b.lo - relax * b.lo.abs().max(1.0)
        } else {
            b.lo
        },
        hi: if b.hi.is_finite() {
            b.hi + relax * b.hi.abs().max(1.0)
        } else {
            b.hi
        },
    }
}

/// Gradient of `-mu * sum(log(x - lo) + log(hi - x))` restricted to the
/// free indices (only finite bounds contribute), evaluated against the
/// relaxed bounds.
fn barrier_gradient(x: &[Real], bounds: &[Bound], free: &[usize], mu: Real, relax: Real) -> Vec<Real> {
    free.iter()
        .map(|&idx| {
            let b = relaxed_bound(bounds[idx], relax);
            let mut g = 0.0;
            if b.lo.is_finite() {
                g += mu / (x[idx] - b.lo).max(1e-12);
            }
            if b.hi.is_finite() {
                g -= mu / (b.hi - x[idx]).max(1e-12);
            }
            g
        })
        .collect()
}

/// Diagonal curvature of the same barrier term (second derivative), used
/// as a Gauss-Newton-style stand-in for the Lagrangian Hessian (§9: the
/// reference implementation's Hessian comes from AD; this rewrite keeps
/// only the barrier's own curvature plus a Levenberg-Marquardt
/// regularizer, which is enough to keep the KKT system well posed near
/// the bounds that actually drive this problem's difficulty).
fn barrier_curvature(x: &[Real], bounds: &[Bound], free: &[usize], mu: Real, relax: Real) -> Vec<Real> {
    free.iter()
        .map(|&idx| {
            let b = relaxed_bound(bounds[idx], relax);
            let mut h = REGULARIZATION;
            if b.lo.is_finite() {
                h += mu / (x[idx] - b.lo).max(1e-12).powi(2);
            }
            if b.hi.is_finite() {
                h += mu / (b.hi - x[idx]).max(1e-12).powi(2);
            }
            h
        })
        .collect()
}

fn assemble_kkt(jac: &DMatrix<Real>, barrier_curv: &[Real], nf: usize, m: usize) -> DMatrix<Real> {
    let mut kkt = DMatrix::<Real>::zeros(nf + m, nf + m);
    for i in 0..nf {
        kkt[(i, i)] = barrier_curv[i];
    }
    for r in 0..m {
        for c in 0..nf {
            kkt[(c, nf + r)] = jac[(r, c)];
            kkt[(nf + r, c)] = jac[(r, c)];
        }
    }
    kkt
}

fn solve_kkt(kkt: &DMatrix<Real>, rhs: &DVector<Real>) -> SolverResult<DVector<Real>> {
    match kkt.clone().lu().solve(rhs) {
        Some(sol) => Ok(sol),
        None => {
            let svd = kkt.clone().svd(true, true);
            let threshold = 1e-10 * svd.singular_values.max();
            svd.solve(rhs, threshold)
                .map_err(|_| SolverError::IllConditioned)
        }
    }
}

fn fraction_to_boundary_step(
    x: &[Real],
    bounds: &[Bound],
    free: &[usize],
    dx: &[Real],
    relax: Real,
) -> Real {
    let mut alpha = 1.0_f64;
    for (row, &idx) in free.iter().enumerate() {
        let b = relaxed_bound(bounds[idx], relax);
        let step = dx[row];
        if step < 0.0 && b.lo.is_finite() {
            let max_decrease = (1.0 - FRACTION_TO_BOUNDARY) * (x[idx] - b.lo).max(0.0);
            let limit = (x[idx] - b.lo - max_decrease) / -step;
            if limit.is_finite() {
                alpha = alpha.min(limit.max(0.0));
            }
        } else if step > 0.0 && b.hi.is_finite() {
            let max_increase = (1.0 - FRACTION_TO_BOUNDARY) * (b.hi - x[idx]).max(0.0);
            let limit = (b.hi - x[idx] - max_increase) / step;
            if limit.is_finite() {
                alpha = alpha.min(limit.max(0.0));
            }
        }
    }
    alpha.clamp(0.0, 1.0)
}
