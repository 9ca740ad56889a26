//! Compiled dynamics of the 2-DOF SCARA-style arm.
//!
//! Standard planar two-link manipulator equations in the form
//! `M(q) * qdd + C(q, qd) + G(q) = tau`, solved for the accelerations. The
//! second joint angle is relative to the first link. The gravity vector uses
//! the same sine convention as the single-link model, so both models agree on
//! what "hanging at rest" means.

use crate::dynamics_traits::{Dynamics, State, Torque};
use crate::parameter_error::ParameterError;
use crate::parameters::arm_dynamics::TwoLinkParameters;
use nalgebra::{Matrix2, Vector2};

/// Coefficients of the compiled two-link model. These are the parameter groups
/// that survive the Lagrange derivation; everything the right-hand side needs
/// and nothing else, so this is what the model cache persists.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "allow_filesystem", derive(serde::Serialize, serde::Deserialize))]
pub struct TwoLinkCoefficients {
    /// `I1 + I2 + M1*R1^2 + M2*(L1^2 + R2^2)` — the configuration-independent
    /// part of the (1,1) mass matrix entry.
    pub alpha: f64,

    /// `M2 * L1 * R2` — amplitude of the configuration-dependent coupling.
    pub beta: f64,

    /// `I2 + M2*R2^2` — the (2,2) mass matrix entry.
    pub delta: f64,

    /// `(M1*R1 + M2*L1) * G` — gravity torque amplitude on joint 1.
    pub gravity_1: f64,

    /// `M2 * R2 * G` — gravity torque amplitude on the distal center of mass.
    pub gravity_2: f64,
}

/// The compiled 2-DOF model. State is `[theta1, theta2, omega1, omega2]`,
/// input is `[tau1, tau2]`.
#[derive(Debug, Clone, Copy)]
pub struct TwoLinkModel {
    coefficients: TwoLinkCoefficients,
}

/// Derives the compiled coefficients from a parameter set; the two-link
/// counterpart of [crate::single_link::derive_single_link].
pub fn derive_two_link(params: &TwoLinkParameters) -> Result<TwoLinkCoefficients, ParameterError> {
    params.validate()?;
    Ok(TwoLinkCoefficients {
        alpha: params.i1
            + params.i2
            + params.m1 * params.r1 * params.r1
            + params.m2 * (params.l1 * params.l1 + params.r2 * params.r2),
        beta: params.m2 * params.l1 * params.r2,
        delta: params.i2 + params.m2 * params.r2 * params.r2,
        gravity_1: (params.m1 * params.r1 + params.m2 * params.l1) * params.g,
        gravity_2: params.m2 * params.r2 * params.g,
    })
}

impl TwoLinkModel {
    /// Reconstructs the model from compiled (possibly cache-loaded) coefficients.
    pub fn from_coefficients(coefficients: TwoLinkCoefficients) -> Self {
        TwoLinkModel { coefficients }
    }

    /// Derives and compiles the model directly from a parameter set.
    pub fn derive(params: &TwoLinkParameters) -> Result<Self, ParameterError> {
        Ok(Self::from_coefficients(derive_two_link(params)?))
    }

    pub fn coefficients(&self) -> &TwoLinkCoefficients {
        &self.coefficients
    }
}

impl Dynamics<4, 2> for TwoLinkModel {
    fn rhs(&self, state: &State<4>, torque: &Torque<2>) -> State<4> {
        let c = &self.coefficients;
        let (theta1, theta2) = (state[0], state[1]);
        let (omega1, omega2) = (state[2], state[3]);
        let (sin2, cos2) = theta2.sin_cos();

        let mass = Matrix2::new(
            c.alpha + 2.0 * c.beta * cos2,
            c.delta + c.beta * cos2,
            c.delta + c.beta * cos2,
            c.delta,
        );

        // Coriolis/centrifugal and gravity generalized forces.
        let coriolis = Vector2::new(
            -c.beta * sin2 * (2.0 * omega1 * omega2 + omega2 * omega2),
            c.beta * sin2 * omega1 * omega1,
        );
        let gravity = Vector2::new(
            c.gravity_1 * theta1.sin() + c.gravity_2 * (theta1 + theta2).sin(),
            c.gravity_2 * (theta1 + theta2).sin(),
        );

        let generalized = Vector2::new(torque[0], torque[1]) - coriolis - gravity;
        // The mass matrix of a physical chain is positive definite, so the
        // solve cannot fail for validated parameters.
        let accel = mass
            .lu()
            .solve(&generalized)
            .unwrap_or_else(|| Vector2::from_element(f64::NAN));

        State::<4>::new(omega1, omega2, accel[0], accel[1])
    }
}
