//! Simulation sessions: the object that owns a run.
//!
//! A session holds the current state, the elapsed time, the currently applied
//! torque, the last tracking error, and the compiled model, and drives the
//! integrator through one complete simulation. It is created at the start of a
//! run, mutated at every step, and discarded afterwards; there is no
//! checkpointing.
//!
//! Rendering stays outside: every step produces a [Frame] that is appended to
//! an explicit [Trace] accumulator and handed to an observer callback. The
//! session does not know or care how frames are drawn.

use crate::controller::{ControlError, TrackingController};
use crate::dynamics_traits::{Dynamics, State, Torque};
use crate::integrator::{self, IntegrationOptions, Method, SolverError};
use crate::parameters::arm_dynamics::SingleLinkParameters;
use tracing::debug;

/// Why a simulation run stopped early.
#[derive(Debug)]
pub enum SessionError {
    Solver(SolverError),
    Control(ControlError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            SessionError::Solver(ref err) => write!(f, "Solver failure: {}", err),
            SessionError::Control(ref err) => write!(f, "Control failure: {}", err),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SolverError> for SessionError {
    fn from(err: SolverError) -> Self {
        SessionError::Solver(err)
    }
}

impl From<ControlError> for SessionError {
    fn from(err: ControlError) -> Self {
        SessionError::Control(err)
    }
}

/// One rendered instant of a simulation: everything a drawing layer needs.
#[derive(Debug, Clone, Copy)]
pub struct Frame<const S: usize, const U: usize> {
    pub time: f64,
    pub state: State<S>,
    pub torque: Torque<U>,
    /// Desired `[theta_d, omega_d]`, present in closed-loop runs.
    pub target: Option<[f64; 2]>,
    /// Tracking error `[e, e_dot]`, present in closed-loop runs.
    pub error: Option<[f64; 2]>,
}

/// Accumulated run history, index-aligned across all fields. This replaces the
/// original scripts' habit of mutating lists captured by the animation closure.
#[derive(Debug, Clone, Default)]
pub struct Trace<const S: usize, const U: usize> {
    pub times: Vec<f64>,
    pub states: Vec<State<S>>,
    pub torques: Vec<Torque<U>>,
    /// Empty for open-loop runs.
    pub targets: Vec<[f64; 2]>,
    /// Empty for open-loop runs.
    pub errors: Vec<[f64; 2]>,
}

impl<const S: usize, const U: usize> Trace<S, U> {
    fn push(&mut self, frame: &Frame<S, U>) {
        self.times.push(frame.time);
        self.states.push(frame.state);
        self.torques.push(frame.torque);
        if let Some(target) = frame.target {
            self.targets.push(target);
        }
        if let Some(error) = frame.error {
            self.errors.push(error);
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// A simulation session over one compiled model.
pub struct Session<M, const S: usize, const U: usize>
where
    M: Dynamics<S, U>,
{
    model: M,
    state: State<S>,
    time: f64,
    torque: Torque<U>,
    last_error: Option<[f64; 2]>,
    method: Method,
}

impl<M, const S: usize, const U: usize> Session<M, S, U>
where
    M: Dynamics<S, U>,
{
    pub fn new(model: M, initial_state: State<S>, method: Method) -> Self {
        Session {
            model,
            state: initial_state,
            time: 0.0,
            torque: Torque::<U>::zeros(),
            last_error: None,
            method,
        }
    }

    pub fn state(&self) -> &State<S> {
        &self.state
    }

    pub fn time_elapsed(&self) -> f64 {
        self.time
    }

    pub fn torque(&self) -> &Torque<U> {
        &self.torque
    }

    /// Tracking error of the most recent closed-loop step, if any.
    pub fn last_error(&self) -> Option<[f64; 2]> {
        self.last_error
    }

    /// Sets a constant torque for subsequent open-loop integration.
    pub fn set_torque(&mut self, torque: Torque<U>) {
        self.torque = torque;
    }

    /// Open-loop run: integrates the whole horizon in one batch call (the
    /// torque does not change mid-flight) and resamples at the frame rate, so
    /// the rendered timeline is deterministic regardless of solver steps.
    pub fn run_open_loop<O>(
        &mut self,
        horizon: f64,
        fps: f64,
        mut observer: O,
    ) -> Result<Trace<S, U>, SessionError>
    where
        O: FnMut(&Frame<S, U>),
        nalgebra::Const<S>: nalgebra::DimMin<nalgebra::Const<S>, Output = nalgebra::Const<S>>,
    {
        let frame_dt = 1.0 / fps;
        let t0 = self.time;
        let mut sample_times = Vec::new();
        let mut k = 0usize;
        loop {
            let t = t0 + k as f64 * frame_dt;
            if t >= t0 + horizon {
                break;
            }
            sample_times.push(t);
            k += 1;
        }

        let options = IntegrationOptions { sample_times: Some(sample_times), ..Default::default() };
        let model = &self.model;
        let torque = self.torque;
        let solution = integrator::integrate(
            |_t, y: &State<S>| model.rhs(y, &torque),
            &self.state,
            (t0, t0 + horizon),
            self.method,
            &options,
        )?;

        let mut trace = Trace::default();
        for (t, y) in solution.times.iter().zip(&solution.states) {
            let frame = Frame { time: *t, state: *y, torque, target: None, error: None };
            trace.push(&frame);
            observer(&frame);
        }

        let (t_end, y_end) = solution.last();
        self.time = t_end;
        self.state = *y_end;
        debug!(frames = trace.len(), t_end, "open-loop run finished");
        Ok(trace)
    }
}

impl<M> Session<M, 2, 1>
where
    M: Dynamics<2, 1>,
{
    /// Closed-loop run for the single link: at every step boundary the
    /// controller recomputes the torque from the current tracking error, then
    /// the state advances by exactly one step. Batch integration is not
    /// possible here since the input changes at every boundary.
    pub fn run_tracking<F, O>(
        &mut self,
        controller: &TrackingController,
        trajectory: F,
        params: &SingleLinkParameters,
        horizon: f64,
        dt: f64,
        mut observer: O,
    ) -> Result<Trace<2, 1>, SessionError>
    where
        F: Fn(f64) -> f64,
        O: FnMut(&Frame<2, 1>),
    {
        let mut trace = Trace::default();
        let t_end = self.time + horizon;

        while self.time < t_end - 0.5 * dt {
            let control = controller.compute_torque(&self.state, self.time, &trajectory, params)?;
            self.torque[0] = control.torque;
            self.last_error = Some(control.error);

            let model = &self.model;
            let torque = self.torque;
            self.state = integrator::step(
                |_t, y: &State<2>| model.rhs(y, &torque),
                &self.state,
                self.time,
                dt,
                self.method,
            )?;
            self.time += dt;

            let frame = Frame {
                time: self.time,
                state: self.state,
                torque: self.torque,
                target: Some(control.target),
                error: Some(control.error),
            };
            trace.push(&frame);
            observer(&frame);
        }

        debug!(frames = trace.len(), t_end = self.time, "tracking run finished");
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::arm_dynamics::TwoLinkParameters;
    use crate::single_link::SingleLinkModel;
    use crate::two_link::TwoLinkModel;
    use std::f64::consts::PI;

    #[test]
    fn test_open_loop_trace_is_aligned_and_monotonic() {
        let model = TwoLinkModel::derive(&TwoLinkParameters::default()).unwrap();
        let initial = State::<4>::new(PI / 4.0, 0.1, 0.0, 0.0);
        let mut session = Session::new(model, initial, Method::Rk45);

        let mut observed = 0usize;
        let trace = session.run_open_loop(2.0, 60.0, |_frame| observed += 1).unwrap();

        assert_eq!(trace.len(), observed);
        assert_eq!(trace.times.len(), trace.states.len());
        assert_eq!(trace.times.len(), trace.torques.len());
        assert!(trace.targets.is_empty());
        for pair in trace.times.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        // 60 fps over 2 seconds.
        assert_eq!(trace.len(), 120);
    }

    #[test]
    fn test_open_loop_failure_is_reported_not_rendered() {
        // A NaN torque poisons the dynamics; the session must return the error
        // and never feed a frame to the observer.
        let model = SingleLinkModel::derive(&SingleLinkParameters::default()).unwrap();
        let mut session = Session::new(model, State::<2>::zeros(), Method::Rk45);
        session.set_torque(Torque::<1>::new(f64::NAN));

        let mut observed = 0usize;
        let result = session.run_open_loop(1.0, 30.0, |_frame| observed += 1);
        assert!(result.is_err());
        assert_eq!(observed, 0);
    }

    #[test]
    fn test_tracking_run_updates_session_and_trace() {
        let model = SingleLinkModel::derive(&SingleLinkParameters::default()).unwrap();
        let mut session = Session::new(model, State::<2>::zeros(), Method::Rk45);
        let controller = TrackingController::new(25.0);
        let params = SingleLinkParameters::default();

        let trace = session
            .run_tracking(&controller, |_t| PI / 6.0, &params, 1.0, 1.0 / 30.0, |_frame| {})
            .unwrap();

        assert_eq!(trace.len(), 30);
        assert_eq!(trace.errors.len(), trace.len());
        assert_eq!(trace.targets.len(), trace.len());
        assert!((session.time_elapsed() - 1.0).abs() < 1e-9);
        assert!(session.last_error().is_some());
    }

    #[test]
    fn test_tracking_propagates_control_error() {
        let model = SingleLinkModel::derive(&SingleLinkParameters::default()).unwrap();
        let mut session = Session::new(model, State::<2>::zeros(), Method::Rk45);
        let controller = TrackingController::new(25.0);
        let params = SingleLinkParameters::default();

        let result = session.run_tracking(
            &controller,
            |_t| f64::INFINITY,
            &params,
            1.0,
            1.0 / 30.0,
            |_frame| {},
        );
        assert!(matches!(result, Err(SessionError::Control(_))));
    }
}
