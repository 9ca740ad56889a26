//! Sliding-mode tracking controller for the single-link arm.
//!
//! The control law cancels the known gravity torque and imposes critically
//! damped second-order error dynamics:
//!
//! ```text
//! tau = M*G*R*sin(theta) + I * (alpha_d - 2*lambda*e_dot - lambda^2*e)
//! ```
//!
//! The characteristic polynomial of the resulting error dynamics is
//! `s^2 + 2*lambda*s + lambda^2`, a double root at `-lambda`, so a single gain
//! sets the convergence rate. The desired velocity and acceleration are not
//! supplied by the caller; they are obtained by central finite differences of
//! the desired-position function. The differentiation step bounds the achievable
//! precision and is a known source of steady-state error, accepted as a
//! deliberate simplification.

use crate::dynamics_traits::State;
use crate::parameters::arm_dynamics::SingleLinkParameters;

/// Why a control step could not be computed.
#[derive(Debug)]
pub enum ControlError {
    /// The desired-position function is NaN or infinite at or around the given
    /// time. The controller fails loudly here instead of letting NaN propagate
    /// into the simulation.
    NonFiniteTrajectory { t: f64 },
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ControlError::NonFiniteTrajectory { t } =>
                write!(f, "Desired trajectory is not finite around t = {}", t),
        }
    }
}

impl std::error::Error for ControlError {}

/// One computed control step: the commanded torque plus the target and error
/// terms the caller may want to record for plotting.
#[derive(Debug, Clone, Copy)]
pub struct ControlStep {
    /// Torque to apply until the next step boundary (N*m), already saturated.
    pub torque: f64,

    /// Desired `[theta_d, omega_d]` at the step time.
    pub target: [f64; 2],

    /// Tracking error `[e, e_dot]` = `[theta - theta_d, omega - omega_d]`.
    pub error: [f64; 2],
}

/// The tracking controller. A pure function of the current state, the current
/// time, and the desired-position function; it keeps no state across steps.
#[derive(Debug, Clone, Copy)]
pub struct TrackingController {
    /// Convergence rate of the error dynamics (double pole at `-lambda`).
    pub lambda: f64,

    /// Symmetric torque saturation range `(min, max)`, or `None` for an ideal
    /// unsaturated motor.
    pub saturation: Option<(f64, f64)>,

    /// Perturbation step of the finite-difference derivatives of the desired
    /// position. Larger values smooth noise, smaller values chase precision;
    /// either way this step bounds the tracking accuracy.
    pub fd_step: f64,
}

impl Default for TrackingController {
    fn default() -> Self {
        TrackingController {
            lambda: 25.0,
            saturation: None,
            fd_step: 1e-4,
        }
    }
}

impl TrackingController {
    pub fn new(lambda: f64) -> Self {
        TrackingController { lambda, ..Default::default() }
    }

    pub fn with_saturation(lambda: f64, limits: (f64, f64)) -> Self {
        TrackingController { lambda, saturation: Some(limits), ..Default::default() }
    }

    /// Computes the torque required to track the desired trajectory from the
    /// current state. Invoked once per control step by the session; the caller
    /// is responsible for storing the returned target and error terms.
    pub fn compute_torque<F>(
        &self,
        state: &State<2>,
        t: f64,
        trajectory: F,
        params: &SingleLinkParameters,
    ) -> Result<ControlStep, ControlError>
    where
        F: Fn(f64) -> f64,
    {
        let h = self.fd_step;
        let behind = trajectory(t - h);
        let at = trajectory(t);
        let ahead = trajectory(t + h);
        if !behind.is_finite() || !at.is_finite() || !ahead.is_finite() {
            return Err(ControlError::NonFiniteTrajectory { t });
        }

        // Central differences: first derivative for the desired velocity,
        // second for the desired acceleration.
        let theta_d = at;
        let omega_d = (ahead - behind) / (2.0 * h);
        let alpha_d = (ahead - 2.0 * at + behind) / (h * h);

        let e = state[0] - theta_d;
        let e_dot = state[1] - omega_d;

        let torque = params.m * params.g * params.r * state[0].sin()
            + params.i * (alpha_d - 2.0 * self.lambda * e_dot - self.lambda * self.lambda * e);

        let torque = match self.saturation {
            Some((lo, hi)) => torque.clamp(lo, hi),
            None => torque,
        };

        Ok(ControlStep {
            torque,
            target: [theta_d, omega_d],
            error: [e, e_dot],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn params() -> SingleLinkParameters {
        SingleLinkParameters::default()
    }

    #[test]
    fn test_zero_error_at_gravity_cancellation() {
        // Holding theta = pi/6 at rest against a constant target: the law
        // reduces to pure gravity cancellation.
        let controller = TrackingController::new(25.0);
        let state = State::<2>::new(PI / 6.0, 0.0);
        let step = controller.compute_torque(&state, 1.0, |_t| PI / 6.0, &params()).unwrap();

        let gravity = 1.0 * 9.8 * 0.5 * (PI / 6.0).sin();
        assert!((step.torque - gravity).abs() < 1e-9);
        assert!(step.error[0].abs() < 1e-12);
        assert!(step.error[1].abs() < 1e-12);
    }

    #[test]
    fn test_saturation_clamps_large_errors() {
        // An error this large would demand a torque near 100 N*m unsaturated.
        let controller = TrackingController::with_saturation(25.0, (-5.0, 5.0));
        let state = State::<2>::new(PI, 10.0);
        let step = controller.compute_torque(&state, 0.0, |_t| 0.0, &params()).unwrap();
        assert!(step.torque >= -5.0 && step.torque <= 5.0);

        let state = State::<2>::new(-PI, -10.0);
        let step = controller.compute_torque(&state, 0.0, |_t| 0.0, &params()).unwrap();
        assert!(step.torque >= -5.0 && step.torque <= 5.0);
    }

    #[test]
    fn test_finite_difference_derivatives() {
        // Quadratic reference: derivatives are exact up to the fd step error.
        let controller = TrackingController::new(25.0);
        let state = State::<2>::new(0.0, 0.0);
        let step = controller
            .compute_torque(&state, 2.0, |t| 0.5 * t * t, &params())
            .unwrap();
        assert!((step.target[0] - 2.0).abs() < 1e-12);
        assert!((step.target[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_trajectory_fails_loudly() {
        let controller = TrackingController::new(25.0);
        let state = State::<2>::zeros();
        let result = controller.compute_torque(&state, 0.0, |_t| f64::NAN, &params());
        assert!(matches!(result, Err(ControlError::NonFiniteTrajectory { .. })));
    }

    #[test]
    fn test_restoring_direction() {
        // Arm below the target at rest: commanded torque must push it up.
        let controller = TrackingController::new(25.0);
        let state = State::<2>::new(0.0, 0.0);
        let step = controller.compute_torque(&state, 0.0, |_t| PI / 6.0, &params()).unwrap();
        assert!(step.torque > 0.0);
    }
}
