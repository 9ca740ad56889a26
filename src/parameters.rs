//! Defines the physical parameter data structures for the supported manipulators

pub mod arm_dynamics {
    use crate::parameter_error::ParameterError;

    /// Version tag baked into every cache key. Bump it whenever the derivation
    /// or the artifact layout changes, so stale models on disk can never load
    /// with wrong semantics.
    pub const MODEL_FORMAT_VERSION: u32 = 1;

    /// Coulomb friction torque magnitude applied to the single link when
    /// friction is enabled (N*m). Fixed by the derivation, not a parameter.
    pub const SINGLE_LINK_FRICTION_TORQUE: f64 = 0.25;

    /// Physical parameters of the 1-DOF rotating arm.
    ///
    /// A parameter set is immutable once the model is compiled; changing any
    /// value requires deriving (or reloading) a new model.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SingleLinkParameters {
        /// Length of the arm (m). Only used by forward kinematics.
        pub l: f64,

        /// Distance from the pivot to the center of mass of the arm (m).
        pub r: f64,

        /// Moment of inertia of the arm about the rotation axis (kg*m^2).
        pub i: f64,

        /// Mass of the arm (kg).
        pub m: f64,

        /// Gravitational acceleration (m/s^2).
        pub g: f64,

        /// Whether the model includes Coulomb friction at the joint. The
        /// friction torque opposes the angular velocity with the fixed
        /// magnitude [SINGLE_LINK_FRICTION_TORQUE].
        pub friction: bool,
    }

    impl Default for SingleLinkParameters {
        fn default() -> Self {
            SingleLinkParameters {
                l: 1.0,
                r: 0.5,
                i: 0.12,
                m: 1.0,
                g: 9.8,
                friction: false,
            }
        }
    }

    impl SingleLinkParameters {
        /// Checks that the parameter set is physically meaningful (all values
        /// finite, lengths, inertia and mass strictly positive).
        pub fn validate(&self) -> Result<(), ParameterError> {
            check_finite("g", self.g)?;
            check_positive("l", self.l)?;
            check_positive("r", self.r)?;
            check_positive("i", self.i)?;
            check_positive("m", self.m)?;
            Ok(())
        }

        /// Deterministic cache key for this parameter set. Built from the exact
        /// IEEE-754 bit patterns of the fields: two parameter sets share a cache
        /// entry if and only if every field is bit-identical. No rounding or
        /// tolerance is applied.
        pub fn cache_key(&self) -> String {
            format!(
                "rotatingarm_v{}_{:016x}_{:016x}_{:016x}_{:016x}_{:016x}_{}",
                MODEL_FORMAT_VERSION,
                self.l.to_bits(),
                self.r.to_bits(),
                self.i.to_bits(),
                self.m.to_bits(),
                self.g.to_bits(),
                if self.friction { "fr" } else { "nofr" }
            )
        }
    }

    /// Physical parameters of the 2-DOF SCARA-style arm.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct TwoLinkParameters {
        /// Length of the first link (m).
        pub l1: f64,

        /// Length of the second link (m).
        pub l2: f64,

        /// Distance from joint 1 to the center of mass of link 1 (m).
        pub r1: f64,

        /// Distance from joint 2 to the center of mass of link 2 (m).
        pub r2: f64,

        /// Moment of inertia of link 1 about its center of mass (kg*m^2).
        pub i1: f64,

        /// Moment of inertia of link 2 about its center of mass (kg*m^2).
        pub i2: f64,

        /// Mass of link 1 (kg).
        pub m1: f64,

        /// Mass of link 2 (kg).
        pub m2: f64,

        /// Gravitational acceleration (m/s^2).
        pub g: f64,
    }

    impl Default for TwoLinkParameters {
        fn default() -> Self {
            TwoLinkParameters {
                l1: 1.0,
                l2: 0.6,
                r1: 0.5,
                r2: 0.3,
                i1: 0.15,
                i2: 0.05,
                m1: 1.0,
                m2: 0.5,
                g: 9.81,
            }
        }
    }

    impl TwoLinkParameters {
        /// Checks that the parameter set is physically meaningful.
        pub fn validate(&self) -> Result<(), ParameterError> {
            check_finite("g", self.g)?;
            for (field, value) in [
                ("l1", self.l1),
                ("l2", self.l2),
                ("r1", self.r1),
                ("r2", self.r2),
                ("i1", self.i1),
                ("i2", self.i2),
                ("m1", self.m1),
                ("m2", self.m2),
            ] {
                check_positive(field, value)?;
            }
            Ok(())
        }

        /// Deterministic cache key, bit-exact in every field. See
        /// [SingleLinkParameters::cache_key] for the keying rule.
        pub fn cache_key(&self) -> String {
            let fields = [
                self.l1, self.l2, self.r1, self.r2, self.i1, self.i2, self.m1, self.m2,
                self.g,
            ];
            let bits: Vec<String> = fields.iter().map(|f| format!("{:016x}", f.to_bits())).collect();
            format!("scara_v{}_{}", MODEL_FORMAT_VERSION, bits.join("_"))
        }
    }

    fn check_finite(field: &'static str, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::NonFinite { field, value });
        }
        Ok(())
    }

    fn check_positive(field: &'static str, value: f64) -> Result<(), ParameterError> {
        check_finite(field, value)?;
        if value <= 0.0 {
            return Err(ParameterError::NonPositive { field, value });
        }
        Ok(())
    }
}
