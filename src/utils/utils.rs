//! Helper functions

use crate::dynamics_traits::State;
use crate::session::Frame;

/// Allows to specify joint values in degrees (converts to radians)
pub fn as_radians<const N: usize>(degrees: [f64; N]) -> [f64; N] {
    std::array::from_fn(|i| degrees[i].to_radians())
}

/// Builds a state vector from positions and velocities given in degrees and
/// degrees per second, matching how the original scripts took initial states.
pub fn state_from_degrees<const S: usize>(values: [f64; S]) -> State<S> {
    State::from_iterator(values.iter().map(|v| v.to_radians()))
}

/// Print a state vector, converting positions and velocities to degrees.
#[allow(dead_code)]
pub fn dump_state<const S: usize>(state: &State<S>) {
    let mut row_str = String::new();
    for k in 0..S {
        row_str.push_str(&format!("{:7.2} ", state[k].to_degrees()));
    }
    println!("[{}]", row_str.trim_end());
}

/// Print one simulation frame (time, state in degrees, torque).
#[allow(dead_code)]
pub fn dump_frame<const S: usize, const U: usize>(frame: &Frame<S, U>) {
    let mut state_str = String::new();
    for k in 0..S {
        state_str.push_str(&format!("{:7.2} ", frame.state[k].to_degrees()));
    }
    let mut torque_str = String::new();
    for k in 0..U {
        torque_str.push_str(&format!("{:6.3} ", frame.torque[k]));
    }
    match frame.error {
        Some(error) => println!(
            "t = {:5.2}  state [{}]  tau [{}]  e = {:8.5}",
            frame.time,
            state_str.trim_end(),
            torque_str.trim_end(),
            error[0]
        ),
        None => println!(
            "t = {:5.2}  state [{}]  tau [{}]",
            frame.time,
            state_str.trim_end(),
            torque_str.trim_end()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_as_radians() {
        let radians = as_radians([180.0, 90.0, 0.0]);
        assert!((radians[0] - PI).abs() < 1e-12);
        assert!((radians[1] - PI / 2.0).abs() < 1e-12);
        assert_eq!(radians[2], 0.0);
    }

    #[test]
    fn test_state_from_degrees() {
        let state = state_from_degrees([30.0, 0.0]);
        assert!((state[0] - PI / 6.0).abs() < 1e-12);
        assert_eq!(state[1], 0.0);
    }
}
