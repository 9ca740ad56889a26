use anyhow::Result;
use rs_arm_dynamics::controller::TrackingController;
use rs_arm_dynamics::dynamics_traits::{SINGLE_LINK_AT_REST, State};
use rs_arm_dynamics::integrator::Method;
use rs_arm_dynamics::kinematics::{YSign, endpoints};
use rs_arm_dynamics::parameters::arm_dynamics::{SingleLinkParameters, TwoLinkParameters};
use rs_arm_dynamics::session::Session;
use rs_arm_dynamics::single_link::SingleLinkModel;
use rs_arm_dynamics::two_link::TwoLinkModel;
use rs_arm_dynamics::utils::{dump_frame, state_from_degrees};
use std::f64::consts::PI;

/// Usage example: a closed-loop tracking run of the single link followed by an
/// open-loop swing of the two-link arm. Configured by the literals below.
fn main() -> Result<()> {
    let params = SingleLinkParameters { friction: true, ..Default::default() };
    params.validate()?;

    #[cfg(feature = "allow_filesystem")]
    let model = {
        // Compiled models are cached under ./models, keyed by the exact
        // parameter tuple, the way the original tooling stored its derivations.
        use rs_arm_dynamics::model_cache::get_or_build;
        use rs_arm_dynamics::single_link::derive_single_link;
        use std::path::Path;

        let coefficients = get_or_build(Path::new("models"), &params.cache_key(), || {
            derive_single_link(&params).expect("parameters validated above")
        })?;
        SingleLinkModel::from_coefficients(coefficients)
    };
    #[cfg(not(feature = "allow_filesystem"))]
    let model = SingleLinkModel::derive(&params)?;

    // The reference trajectory of the original controller script.
    let reference = |t: f64| PI / 6.0 * (1.0 - (2.0 * PI * t).cos());

    println!("Closed-loop tracking, 30 Hz control, implicit solver:");
    let controller = TrackingController::with_saturation(25.0, (-8.0, 8.0));
    let mut session = Session::new(model, State::from(SINGLE_LINK_AT_REST), Method::Bdf);
    let trace = session.run_tracking(
        &controller,
        reference,
        &params,
        10.0,
        1.0 / 30.0,
        |frame| {
            // Print once per simulated second; a plotting layer would draw
            // every frame instead.
            if (frame.time * 30.0).round() as i64 % 30 == 0 {
                dump_frame(frame);
            }
        },
    )?;
    let worst_late = trace.errors[trace.len() / 2..]
        .iter()
        .map(|e| e[0].abs())
        .fold(0.0, f64::max);
    println!("Worst tracking error over the second half: {:.5} rad", worst_late);

    println!();
    println!("Open-loop two-link arm released from a bent pose:");
    let scara_params = TwoLinkParameters::default();
    let scara = TwoLinkModel::derive(&scara_params)?;
    let initial = state_from_degrees([45.0, 30.0, 0.0, 0.0]);
    let mut session = Session::new(scara, initial, Method::Rk45);
    let trace = session.run_open_loop(8.0, 60.0, |frame| {
        if (frame.time * 60.0).round() as i64 % 120 == 0 {
            dump_frame(frame);
        }
    })?;
    println!("Simulated {} frames.", trace.len());

    let rest = session.state();
    let points = endpoints(&[rest[0], rest[1]], &[scara_params.l1, scara_params.l2], YSign::Down)?;
    let tip = points[2];
    println!("Final tip position: ({:.3}, {:.3})", tip.0, tip.1);

    Ok(())
}
