//! Rigid body dynamics simulation and tracking control for small planar robotic
//! manipulators: a 1-DOF rotating arm, a 2-DOF SCARA-style arm, and the forward
//! kinematics of a 3-DOF anthropomorphic arm.
//!
//! The equations of motion were derived offline with the Lagrange method and are
//! carried here in closed form. Deriving ("compiling") a model for a concrete
//! parameter set is treated as expensive and deterministic, so compiled models can
//! be persisted to disk and reloaded, keyed by the exact parameter tuple.
//!
//! # Features
//!
//! - Closed-form dynamics models for the 1-DOF and 2-DOF arms, with optional
//!   Coulomb friction on the single link.
//! - An on-disk model cache that transparently rebuilds on any load failure
//!   (missing file, corrupt artifact, format version mismatch).
//! - An ODE integrator with an adaptive Runge-Kutta method (Dormand-Prince 5(4))
//!   and a stiff-capable implicit method (BDF1 with a damped Newton solver). The
//!   implicit method is materially faster for the friction-including model.
//! - Batch integration over a full horizon, and single-step integration for
//!   closed-loop control where the torque must be recomputed at every step.
//! - A sliding-mode tracking controller for the single link that imposes
//!   critically damped error dynamics and saturates the commanded torque.
//! - Forward kinematics of the planar chains (both documented y-sign
//!   conventions) and of the 3-DOF anthropomorphic arm.
//! - A simulation session that drives open-loop and closed-loop runs, records
//!   every frame into a trace, and feeds frames to a rendering callback without
//!   depending on how they are drawn.
//!
//! To use the library, fill out a parameter structure from [parameters], derive
//! or load a compiled model, and drive it through a [session::Session].

pub mod parameters;
pub mod parameter_error;

pub mod dynamics_traits;
pub mod single_link;
pub mod two_link;

pub mod integrator;
pub mod controller;
pub mod kinematics;
pub mod session;

#[cfg(feature = "allow_filesystem")]
pub mod model_cache;

#[path = "utils/utils.rs"]
pub mod utils;
