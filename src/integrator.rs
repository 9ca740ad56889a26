//! Numerical integration of compiled dynamics models.
//!
//! Two adaptive methods are provided, mirroring the two solver families the
//! simulations rely on:
//!
//! - [Method::Rk45] — Dormand-Prince 5(4) embedded Runge-Kutta. The default,
//!   accurate for smooth open-loop dynamics.
//! - [Method::Bdf] — backward differentiation (BDF1, backward Euler) with a
//!   damped Newton solver and step-doubling error control. Stiff-capable and
//!   considerably faster for the friction-including single-link model, where
//!   the Coulomb term makes the dynamics stiff around zero velocity.
//!
//! Integration never panics on solver trouble: every failure mode is a
//! [SolverError] value the caller must look at before trusting the output.
//! Output times are strictly increasing; states align index-for-index with
//! times. When sample times are supplied, the solution is resampled at exactly
//! those times by cubic Hermite interpolation between accepted steps, which
//! keeps downstream rendering deterministic.

use crate::dynamics_traits::State;
use nalgebra::{Const, DimMin, SMatrix};

/// The enumerated solver methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Dormand-Prince 5(4) adaptive Runge-Kutta.
    Rk45,
    /// Adaptive backward differentiation (implicit, stiff-capable).
    Bdf,
}

/// Why an integration failed. Returned as a value; the integrator does not
/// panic and does not hand back partial output.
#[derive(Debug)]
pub enum SolverError {
    /// The requested span is empty, reversed, or non-finite.
    InvalidSpan { t0: f64, tf: f64 },
    /// Error control pushed the step size below the representable minimum.
    StepSizeUnderflow { t: f64 },
    /// The right-hand side produced NaN or infinity at the given time.
    NonFiniteState { t: f64 },
    /// The Newton iteration of the implicit method could not converge even at
    /// the minimum step size.
    NewtonDivergence { t: f64 },
    /// The iteration matrix of the implicit method is singular.
    SingularJacobian { t: f64 },
    /// A requested sample time lies outside the integration span or the sample
    /// sequence is not strictly increasing.
    InvalidSampleTimes { t: f64 },
    /// The step budget was exhausted before reaching the end of the span.
    StepLimitExceeded { limit: usize },
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            SolverError::InvalidSpan { t0, tf } =>
                write!(f, "Invalid integration span [{}, {}]", t0, tf),
            SolverError::StepSizeUnderflow { t } =>
                write!(f, "Step size underflow at t = {}", t),
            SolverError::NonFiniteState { t } =>
                write!(f, "State became non-finite at t = {}", t),
            SolverError::NewtonDivergence { t } =>
                write!(f, "Newton iteration failed to converge at t = {}", t),
            SolverError::SingularJacobian { t } =>
                write!(f, "Singular iteration matrix at t = {}", t),
            SolverError::InvalidSampleTimes { t } =>
                write!(f, "Sample time {} outside the span or out of order", t),
            SolverError::StepLimitExceeded { limit } =>
                write!(f, "Exceeded the limit of {} solver steps", limit),
        }
    }
}

impl std::error::Error for SolverError {}

/// Tolerances and output control for a batch integration.
#[derive(Debug, Clone)]
pub struct IntegrationOptions {
    /// Relative tolerance of the local error control.
    pub rel_tol: f64,
    /// Absolute tolerance of the local error control.
    pub abs_tol: f64,
    /// Hard limit on attempted solver steps.
    pub max_steps: usize,
    /// If set, the solution is resampled at exactly these (strictly
    /// increasing, in-span) times instead of the solver's own steps.
    pub sample_times: Option<Vec<f64>>,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        IntegrationOptions {
            rel_tol: 1e-6,
            abs_tol: 1e-9,
            max_steps: 100_000,
            sample_times: None,
        }
    }
}

/// The result of a successful batch integration. `times` is strictly
/// increasing and `states[k]` is the state at `times[k]`.
#[derive(Debug, Clone)]
pub struct Solution<const S: usize> {
    pub times: Vec<f64>,
    pub states: Vec<State<S>>,
}

impl<const S: usize> Solution<S> {
    /// The final time and state of the run.
    pub fn last(&self) -> (f64, &State<S>) {
        let k = self.times.len() - 1;
        (self.times[k], &self.states[k])
    }
}

// An accepted solver step: time, state, and state derivative. The derivative
// is kept for Hermite resampling.
struct Node<const S: usize> {
    t: f64,
    y: State<S>,
    f: State<S>,
}

/// Batch mode: integrates the full span in one call. Used for open-loop runs
/// where the input does not change mid-flight.
pub fn integrate<const S: usize, F>(
    rhs: F,
    y0: &State<S>,
    t_span: (f64, f64),
    method: Method,
    options: &IntegrationOptions,
) -> Result<Solution<S>, SolverError>
where
    F: Fn(f64, &State<S>) -> State<S>,
    Const<S>: DimMin<Const<S>, Output = Const<S>>,
{
    let (t0, tf) = t_span;
    if !t0.is_finite() || !tf.is_finite() || tf <= t0 {
        return Err(SolverError::InvalidSpan { t0, tf });
    }
    if !y0.iter().all(|v| v.is_finite()) {
        return Err(SolverError::NonFiniteState { t: t0 });
    }

    let nodes = match method {
        Method::Rk45 => integrate_rk45(&rhs, y0, t0, tf, options)?,
        Method::Bdf => integrate_bdf(&rhs, y0, t0, tf, options)?,
    };

    match &options.sample_times {
        None => Ok(Solution {
            times: nodes.iter().map(|n| n.t).collect(),
            states: nodes.iter().map(|n| n.y).collect(),
        }),
        Some(samples) => resample(&nodes, samples, t0, tf),
    }
}

/// Single-step mode: advances exactly one step `[t, t + dt]`. The closed-loop
/// controller uses this, recomputing the torque before every call; it cannot
/// use batch mode because the input changes at each step boundary.
pub fn step<const S: usize, F>(
    rhs: F,
    y: &State<S>,
    t: f64,
    dt: f64,
    method: Method,
) -> Result<State<S>, SolverError>
where
    F: Fn(f64, &State<S>) -> State<S>,
    Const<S>: DimMin<Const<S>, Output = Const<S>>,
{
    let solution = integrate(rhs, y, (t, t + dt), method, &IntegrationOptions::default())?;
    Ok(*solution.last().1)
}

// Weighted RMS norm of the local error, following the usual mixed
// absolute/relative criterion. A value <= 1 means the step is acceptable.
fn error_norm<const S: usize>(
    error: &State<S>,
    y_old: &State<S>,
    y_new: &State<S>,
    options: &IntegrationOptions,
) -> f64 {
    let mut sum = 0.0;
    for k in 0..S {
        let scale = options.abs_tol + options.rel_tol * y_old[k].abs().max(y_new[k].abs());
        let ratio = error[k] / scale;
        sum += ratio * ratio;
    }
    (sum / S as f64).sqrt()
}

fn is_finite<const S: usize>(v: &State<S>) -> bool {
    v.iter().all(|x| x.is_finite())
}

// Dormand-Prince 5(4) with the standard step controller.
fn integrate_rk45<const S: usize, F>(
    rhs: &F,
    y0: &State<S>,
    t0: f64,
    tf: f64,
    options: &IntegrationOptions,
) -> Result<Vec<Node<S>>, SolverError>
where
    F: Fn(f64, &State<S>) -> State<S>,
{
    let span = tf - t0;
    let min_step = 1e-14 * span.max(1.0);

    let mut t = t0;
    let mut y = *y0;
    let mut f = rhs(t, &y);
    if !is_finite(&f) {
        return Err(SolverError::NonFiniteState { t });
    }

    let mut nodes = vec![Node { t, y, f }];
    let mut h = (span / 100.0).min(0.1);
    let mut attempts = 0usize;

    while t < tf {
        attempts += 1;
        if attempts > options.max_steps {
            return Err(SolverError::StepLimitExceeded { limit: options.max_steps });
        }
        let last = t + h >= tf;
        if last {
            h = tf - t;
        }

        let k1 = f;
        let k2 = rhs(t + h / 5.0, &(y + h * (k1 / 5.0)));
        let k3 = rhs(t + 3.0 * h / 10.0, &(y + h * (3.0 / 40.0 * k1 + 9.0 / 40.0 * k2)));
        let k4 = rhs(
            t + 4.0 * h / 5.0,
            &(y + h * (44.0 / 45.0 * k1 - 56.0 / 15.0 * k2 + 32.0 / 9.0 * k3)),
        );
        let k5 = rhs(
            t + 8.0 * h / 9.0,
            &(y + h
                * (19372.0 / 6561.0 * k1 - 25360.0 / 2187.0 * k2 + 64448.0 / 6561.0 * k3
                    - 212.0 / 729.0 * k4)),
        );
        let k6 = rhs(
            t + h,
            &(y + h
                * (9017.0 / 3168.0 * k1 - 355.0 / 33.0 * k2 + 46732.0 / 5247.0 * k3
                    + 49.0 / 176.0 * k4
                    - 5103.0 / 18656.0 * k5)),
        );
        let y5 = y
            + h * (35.0 / 384.0 * k1 + 500.0 / 1113.0 * k3 + 125.0 / 192.0 * k4
                - 2187.0 / 6784.0 * k5
                + 11.0 / 84.0 * k6);
        let k7 = rhs(t + h, &y5);
        let y4 = y
            + h * (5179.0 / 57600.0 * k1 + 7571.0 / 16695.0 * k3 + 393.0 / 640.0 * k4
                - 92097.0 / 339200.0 * k5
                + 187.0 / 2100.0 * k6
                + k7 / 40.0);

        let norm = if is_finite(&y5) && is_finite(&k7) {
            error_norm(&(y5 - y4), &y, &y5, options)
        } else {
            f64::INFINITY
        };

        if norm <= 1.0 {
            t = if last { tf } else { t + h };
            y = y5;
            f = k7;
            nodes.push(Node { t, y, f });
        }

        let factor = if norm.is_finite() && norm > 0.0 {
            (0.9 * norm.powf(-0.2)).clamp(0.2, 5.0)
        } else if norm == 0.0 {
            5.0
        } else {
            0.2
        };
        h *= factor;
        if h < min_step {
            return Err(SolverError::StepSizeUnderflow { t });
        }
    }

    Ok(nodes)
}

// Adaptive BDF1 (backward Euler) with step-doubling error estimation. First
// order, but A- and L-stable, which is what the sign-discontinuous friction
// term needs.
fn integrate_bdf<const S: usize, F>(
    rhs: &F,
    y0: &State<S>,
    t0: f64,
    tf: f64,
    options: &IntegrationOptions,
) -> Result<Vec<Node<S>>, SolverError>
where
    F: Fn(f64, &State<S>) -> State<S>,
    Const<S>: DimMin<Const<S>, Output = Const<S>>,
{
    let span = tf - t0;
    let min_step = 1e-14 * span.max(1.0);

    let mut t = t0;
    let mut y = *y0;
    let f0 = rhs(t, &y);
    if !is_finite(&f0) {
        return Err(SolverError::NonFiniteState { t });
    }

    let mut nodes = vec![Node { t, y, f: f0 }];
    let mut h = (span / 1000.0).min(0.01);
    let mut attempts = 0usize;

    while t < tf {
        attempts += 1;
        if attempts > options.max_steps {
            return Err(SolverError::StepLimitExceeded { limit: options.max_steps });
        }
        let last = t + h >= tf;
        if last {
            h = tf - t;
        }

        // One full step against two half steps; their difference estimates the
        // local error (Richardson, order 1).
        let trial = backward_euler_step(rhs, t, &y, h, options).and_then(|full| {
            let half = backward_euler_step(rhs, t, &y, h / 2.0, options)?;
            let fine = backward_euler_step(rhs, t + h / 2.0, &half, h / 2.0, options)?;
            Ok((full, fine))
        });

        let mut last_failure: Option<SolverError> = None;
        let norm = match trial {
            Ok((full, fine)) if is_finite(&fine) => {
                let norm = error_norm(&(fine - full), &y, &fine, options);
                if norm <= 1.0 {
                    t = if last { tf } else { t + h };
                    y = fine;
                    let f = rhs(t, &y);
                    nodes.push(Node { t, y, f });
                }
                norm
            }
            Ok(_) => f64::INFINITY,
            Err(e @ SolverError::SingularJacobian { .. }) => {
                // A singular iteration matrix does not improve with smaller steps.
                return Err(e);
            }
            Err(e) => {
                last_failure = Some(e);
                f64::INFINITY
            }
        };

        let factor = if norm.is_finite() && norm > 0.0 {
            (0.9 * norm.powf(-0.5)).clamp(0.2, 2.0)
        } else if norm == 0.0 {
            2.0
        } else {
            0.2
        };
        h *= factor;
        if h < min_step {
            // Newton trouble and error control both funnel here once the step
            // cannot shrink further.
            return Err(last_failure.unwrap_or(SolverError::StepSizeUnderflow { t }));
        }
    }

    Ok(nodes)
}

const MAX_NEWTON_ITERATIONS: usize = 8;

// Solves y_next = y + h * f(t + h, y_next) by damped-free Newton iteration
// with a finite-difference Jacobian.
fn backward_euler_step<const S: usize, F>(
    rhs: &F,
    t: f64,
    y: &State<S>,
    h: f64,
    options: &IntegrationOptions,
) -> Result<State<S>, SolverError>
where
    F: Fn(f64, &State<S>) -> State<S>,
    Const<S>: DimMin<Const<S>, Output = Const<S>>,
{
    let t_next = t + h;
    // Explicit Euler predictor.
    let mut y_next = y + h * rhs(t, y);
    if !is_finite(&y_next) {
        return Err(SolverError::NonFiniteState { t });
    }

    for _ in 0..MAX_NEWTON_ITERATIONS {
        let f = rhs(t_next, &y_next);
        if !is_finite(&f) {
            return Err(SolverError::NonFiniteState { t: t_next });
        }
        let residual = y_next - y - h * f;
        if error_norm(&residual, y, &y_next, options) <= 0.1 {
            return Ok(y_next);
        }

        let jacobian = finite_difference_jacobian(rhs, t_next, &y_next, &f);
        let iteration_matrix = SMatrix::<f64, S, S>::identity() - h * jacobian;
        let delta = iteration_matrix
            .lu()
            .solve(&residual)
            .ok_or(SolverError::SingularJacobian { t: t_next })?;
        y_next -= delta;
        if !is_finite(&y_next) {
            return Err(SolverError::NonFiniteState { t: t_next });
        }
    }

    Err(SolverError::NewtonDivergence { t: t_next })
}

// Forward-difference Jacobian of the right-hand side with respect to the state.
fn finite_difference_jacobian<const S: usize, F>(
    rhs: &F,
    t: f64,
    y: &State<S>,
    f_at_y: &State<S>,
) -> SMatrix<f64, S, S>
where
    F: Fn(f64, &State<S>) -> State<S>,
{
    let mut jacobian = SMatrix::<f64, S, S>::zeros();
    for j in 0..S {
        let eps = 1e-8 * y[j].abs().max(1.0);
        let mut perturbed = *y;
        perturbed[j] += eps;
        let column = (rhs(t, &perturbed) - f_at_y) / eps;
        jacobian.set_column(j, &column);
    }
    jacobian
}

// Resamples accepted steps at the requested times by cubic Hermite
// interpolation, so output does not depend on where the solver happened to
// place its steps.
fn resample<const S: usize>(
    nodes: &[Node<S>],
    samples: &[f64],
    t0: f64,
    tf: f64,
) -> Result<Solution<S>, SolverError> {
    let mut times = Vec::with_capacity(samples.len());
    let mut states = Vec::with_capacity(samples.len());
    let mut previous = f64::NEG_INFINITY;
    let mut segment = 0usize;

    for &ts in samples {
        if !(t0..=tf).contains(&ts) || ts <= previous {
            return Err(SolverError::InvalidSampleTimes { t: ts });
        }
        previous = ts;

        while segment + 1 < nodes.len() - 1 && nodes[segment + 1].t < ts {
            segment += 1;
        }
        let left = &nodes[segment];
        let right = &nodes[segment + 1];
        times.push(ts);
        states.push(hermite(left, right, ts));
    }

    Ok(Solution { times, states })
}

// Cubic Hermite interpolant on a single accepted step.
fn hermite<const S: usize>(left: &Node<S>, right: &Node<S>, t: f64) -> State<S> {
    let h = right.t - left.t;
    let s = (t - left.t) / h;
    let s2 = s * s;
    let s3 = s2 * s;

    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    h00 * left.y + (h10 * h) * left.f + h01 * right.y + (h11 * h) * right.f
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHODS: [Method; 2] = [Method::Rk45, Method::Bdf];

    #[test]
    fn test_exponential_decay_both_methods() {
        for method in METHODS {
            let solution = integrate(
                |_t, y: &State<1>| -y,
                &State::<1>::new(1.0),
                (0.0, 2.0),
                method,
                &IntegrationOptions::default(),
            )
            .unwrap();
            let (t_end, y_end) = solution.last();
            assert_eq!(t_end, 2.0);
            let expected = (-2.0f64).exp();
            let tolerance = match method {
                Method::Rk45 => 1e-5,
                Method::Bdf => 1e-3,
            };
            assert!(
                (y_end[0] - expected).abs() < tolerance,
                "{:?}: {} vs {}",
                method,
                y_end[0],
                expected
            );
        }
    }

    #[test]
    fn test_times_strictly_increasing_and_span_bounds() {
        for method in METHODS {
            let solution = integrate(
                |t, _y: &State<1>| State::<1>::new(t.cos()),
                &State::<1>::zeros(),
                (0.0, 3.0),
                method,
                &IntegrationOptions::default(),
            )
            .unwrap();
            assert_eq!(solution.times[0], 0.0);
            assert_eq!(*solution.times.last().unwrap(), 3.0);
            for pair in solution.times.windows(2) {
                assert!(pair[1] > pair[0], "{:?}: times not increasing", method);
            }
            assert_eq!(solution.times.len(), solution.states.len());
        }
    }

    #[test]
    fn test_resampling_hits_exact_times() {
        let samples: Vec<f64> = (0..50).map(|k| k as f64 * 0.02).collect();
        let options = IntegrationOptions { sample_times: Some(samples.clone()), ..Default::default() };
        let solution = integrate(
            |_t, y: &State<1>| -y,
            &State::<1>::new(1.0),
            (0.0, 1.0),
            Method::Rk45,
            &options,
        )
        .unwrap();
        assert_eq!(solution.times, samples);
        for (t, y) in solution.times.iter().zip(&solution.states) {
            assert!((y[0] - (-t).exp()).abs() < 5e-5, "at t = {}", t);
        }
    }

    #[test]
    fn test_sample_times_outside_span_rejected() {
        let options = IntegrationOptions { sample_times: Some(vec![0.5, 1.5]), ..Default::default() };
        let result = integrate(
            |_t, y: &State<1>| -y,
            &State::<1>::new(1.0),
            (0.0, 1.0),
            Method::Rk45,
            &options,
        );
        assert!(matches!(result, Err(SolverError::InvalidSampleTimes { .. })));
    }

    #[test]
    fn test_reversed_span_rejected() {
        let result = integrate(
            |_t, y: &State<1>| -y,
            &State::<1>::new(1.0),
            (1.0, 0.0),
            Method::Rk45,
            &IntegrationOptions::default(),
        );
        assert!(matches!(result, Err(SolverError::InvalidSpan { .. })));
    }

    #[test]
    fn test_non_finite_rhs_is_an_error_not_a_panic() {
        for method in METHODS {
            let result = integrate(
                |_t, _y: &State<1>| State::<1>::new(f64::NAN),
                &State::<1>::new(1.0),
                (0.0, 1.0),
                method,
                &IntegrationOptions::default(),
            );
            assert!(result.is_err(), "{:?} accepted NaN dynamics", method);
        }
    }

    #[test]
    fn test_stiff_problem_with_bdf() {
        // lambda = -1000 forces tiny steps from explicit methods; the implicit
        // method should cross the transient comfortably.
        let solution = integrate(
            |_t, y: &State<1>| -1000.0 * y,
            &State::<1>::new(1.0),
            (0.0, 0.1),
            Method::Bdf,
            &IntegrationOptions::default(),
        )
        .unwrap();
        let (_, y_end) = solution.last();
        assert!(y_end[0].abs() < 1e-3);
    }

    #[test]
    fn test_single_step_matches_batch() {
        let y0 = State::<2>::new(1.0, 0.0);
        let rhs = |_t: f64, y: &State<2>| State::<2>::new(y[1], -y[0]);

        let stepped = step(rhs, &y0, 0.0, 0.25, Method::Rk45).unwrap();
        let batch = integrate(rhs, &y0, (0.0, 0.25), Method::Rk45, &IntegrationOptions::default())
            .unwrap();
        let (_, y_end) = batch.last();
        assert!((stepped - y_end).norm() < 1e-9);
    }

    #[test]
    fn test_harmonic_oscillator_accuracy() {
        // y'' = -y from (1, 0): y(t) = cos(t).
        let rhs = |_t: f64, y: &State<2>| State::<2>::new(y[1], -y[0]);
        let solution = integrate(
            rhs,
            &State::<2>::new(1.0, 0.0),
            (0.0, std::f64::consts::TAU),
            Method::Rk45,
            &IntegrationOptions::default(),
        )
        .unwrap();
        let (_, y_end) = solution.last();
        assert!((y_end[0] - 1.0).abs() < 1e-4);
        assert!(y_end[1].abs() < 1e-4);
    }
}
