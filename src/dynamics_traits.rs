extern crate nalgebra as na;

use na::SVector;

/// State vector of a manipulator: generalized positions followed by generalized
/// velocities. The length is always `2 * degrees_of_freedom`, so the single link
/// uses `State<2>` (`[theta, omega]`) and the SCARA arm uses `State<4>`
/// (`[theta1, theta2, omega1, omega2]`).
pub type State<const S: usize> = SVector<f64, S>;

/// Generalized input (joint torques), one entry per actuated joint.
pub type Torque<const U: usize> = SVector<f64, U>;

/// State of the single link at rest, hanging straight down.
pub const SINGLE_LINK_AT_REST: [f64; 2] = [0.0, 0.0];

/// A compiled dynamics model: the closed-form right-hand side of the equations
/// of motion, mapping state and input torque to the state derivative.
///
/// `S` is the state dimension (`2 * dof`), `U` the number of actuated joints.
/// Implementations are pure functions of their arguments; all physical
/// constants were substituted when the model was compiled.
pub trait Dynamics<const S: usize, const U: usize> {
    /// Evaluates the state derivative at the given state under the given torque.
    fn rhs(&self, state: &State<S>, torque: &Torque<U>) -> State<S>;

    /// Degrees of freedom of the modeled chain.
    fn dof(&self) -> usize {
        S / 2
    }
}
