//! Compiled dynamics of the 1-DOF rotating arm.
//!
//! The equation of motion, derived offline with the Lagrange method and carried
//! here in closed form, is
//!
//! ```text
//! I * domega = tau - M * G * R * sin(theta) - T_f * signum(omega)
//! ```
//!
//! where the Coulomb friction term `T_f * signum(omega)` is only present when
//! friction is enabled in the parameter set. The friction term makes the system
//! stiff around `omega = 0`, which is why the implicit integrator method is
//! noticeably faster on it.

use crate::dynamics_traits::{Dynamics, State, Torque};
use crate::parameter_error::ParameterError;
use crate::parameters::arm_dynamics::{SINGLE_LINK_FRICTION_TORQUE, SingleLinkParameters};

/// Coefficients of the compiled single-link model: the closed form with all
/// physical constants substituted, sufficient to reconstruct the model. This is
/// what the model cache persists.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "allow_filesystem", derive(serde::Serialize, serde::Deserialize))]
pub struct SingleLinkCoefficients {
    /// Gravity torque amplitude `M * G * R` (N*m).
    pub gravity_torque: f64,

    /// Inverse of the moment of inertia `1 / I` (1/(kg*m^2)).
    pub inverse_inertia: f64,

    /// Coulomb friction torque magnitude, zero when friction is disabled (N*m).
    pub friction_torque: f64,
}

/// The compiled 1-DOF model. State is `[theta, omega]`, input is `[tau]`.
#[derive(Debug, Clone, Copy)]
pub struct SingleLinkModel {
    coefficients: SingleLinkCoefficients,
}

/// Derives the compiled coefficients from a parameter set. This stands in for
/// the offline symbolic derivation: expensive in the original tooling, but
/// deterministic for a fixed parameter tuple.
pub fn derive_single_link(
    params: &SingleLinkParameters,
) -> Result<SingleLinkCoefficients, ParameterError> {
    params.validate()?;
    Ok(SingleLinkCoefficients {
        gravity_torque: params.m * params.g * params.r,
        inverse_inertia: 1.0 / params.i,
        friction_torque: if params.friction {
            SINGLE_LINK_FRICTION_TORQUE
        } else {
            0.0
        },
    })
}

impl SingleLinkModel {
    /// Reconstructs the model from compiled (possibly cache-loaded) coefficients.
    pub fn from_coefficients(coefficients: SingleLinkCoefficients) -> Self {
        SingleLinkModel { coefficients }
    }

    /// Derives and compiles the model directly from a parameter set.
    pub fn derive(params: &SingleLinkParameters) -> Result<Self, ParameterError> {
        Ok(Self::from_coefficients(derive_single_link(params)?))
    }

    pub fn coefficients(&self) -> &SingleLinkCoefficients {
        &self.coefficients
    }

    /// Total mechanical energy at the given state, with the potential reference
    /// at the pivot: `E = omega^2 / (2 * inverse_inertia) - M*G*R * cos(theta)`.
    /// Conserved by the frictionless, torque-free model.
    pub fn energy(&self, state: &State<2>) -> f64 {
        let c = &self.coefficients;
        0.5 * state[1] * state[1] / c.inverse_inertia - c.gravity_torque * state[0].cos()
    }
}

impl Dynamics<2, 1> for SingleLinkModel {
    fn rhs(&self, state: &State<2>, torque: &Torque<1>) -> State<2> {
        let c = &self.coefficients;
        let (theta, omega) = (state[0], state[1]);
        let friction = c.friction_torque * omega.signum();
        State::<2>::new(
            omega,
            c.inverse_inertia * (torque[0] - c.gravity_torque * theta.sin() - friction),
        )
    }
}
