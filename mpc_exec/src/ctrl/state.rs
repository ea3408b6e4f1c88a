//! Implementations for the controller state structure

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use comms_if::msg::{SteerCommand, Telemetry};
use log::{trace, warn};
use serde::Serialize;

// Internal
use super::{CtrlError, CtrlInitError, CtrlParams};
use crate::{
    frame::{to_vehicle_frame, WorldPose},
    latency::LatencyCompensator,
    mpc::{Mpc, ParamsError, SolveFailure},
    ref_curve::ReferenceCurve,
    vehicle_model::{Actuation, KinematicModel, TrackedCurve, VehicleState},
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    maths::wrap_pi,
    module::State,
    params,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Controller state, one per connected vehicle.
///
/// Between cycles only the last applied actuation and the previous solution (for warm starting)
/// are kept.
pub struct Controller {
    params: CtrlParams,
    mpc: Mpc,
    compensator: LatencyCompensator,

    last_actuation: Actuation,
    warm_start: Option<Vec<Actuation>>,

    num_cycles: u64,

    report: StatusReport,
    arch_report: Option<Archiver>,
}

/// Status report for one controller cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub cycle: u64,

    /// Number of waypoints received
    pub num_waypoints: usize,

    /// Degree of the fitted reference curve, lower than configured when waypoints are scarce
    pub poly_degree: usize,

    /// Tracking errors at the vehicle before latency compensation
    pub cte: f64,
    pub epsi: f64,

    pub solve_status: SolveStatus,
    pub iterations: usize,
    pub cost: f64,
    pub solve_time_s: f64,

    /// Demands sent, in the model's convention
    pub steer_rad: f64,
    pub accel: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Outcome of the cycle's solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    NotRun,
    Solved,
    Timeout,
    NotConverged,
    Infeasible,
    DynamicsViolated,
    Numerical,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for SolveStatus {
    fn default() -> Self {
        SolveStatus::NotRun
    }
}

impl From<&SolveFailure> for SolveStatus {
    fn from(f: &SolveFailure) -> Self {
        match f {
            SolveFailure::Timeout { .. } => SolveStatus::Timeout,
            SolveFailure::NotConverged { .. } => SolveStatus::NotConverged,
            SolveFailure::Infeasible { .. } => SolveStatus::Infeasible,
            SolveFailure::DynamicsViolated { .. } => SolveStatus::DynamicsViolated,
            SolveFailure::Numerical => SolveStatus::Numerical,
        }
    }
}

impl Controller {
    /// Create a controller which does not archive its status.
    pub fn new(params: CtrlParams) -> Result<Self, ParamsError> {
        params.validate()?;

        let mpc = Mpc::new(params.mpc.clone())?;
        let compensator =
            LatencyCompensator::new(KinematicModel::new(params.mpc.lf_m), params.latency_s);

        Ok(Self {
            params,
            mpc,
            compensator,
            last_actuation: Actuation::default(),
            warm_start: None,
            num_cycles: 0,
            report: StatusReport::default(),
            arch_report: None,
        })
    }

    pub fn params(&self) -> &CtrlParams {
        &self.params
    }

    /// Report from the most recent cycle.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    /// Actuation applied by the most recent command.
    pub fn last_actuation(&self) -> Actuation {
        self.last_actuation
    }

    /// Process one telemetry event into a steering command.
    ///
    /// A failed solve is not an error, the configured fallback command is returned instead.
    pub fn handle_telemetry(&mut self, telem: &Telemetry) -> Result<SteerCommand, CtrlError> {
        self.num_cycles += 1;
        self.report = StatusReport {
            cycle: self.num_cycles,
            num_waypoints: telem.ptsx.len(),
            ..Default::default()
        };

        let pose = WorldPose::new(telem.x, telem.y, telem.psi);
        if !pose.is_finite() || !telem.speed.is_finite() {
            return Err(CtrlError::NonFinitePose);
        }

        let waypoints = to_vehicle_frame(&pose, &telem.ptsx, &telem.ptsy)?;
        if waypoints.len() < 2 {
            return Err(CtrlError::InsufficientWaypoints(waypoints.len()));
        }

        let mut degree = self.params.poly_degree;
        if waypoints.len() < degree + 1 {
            degree = waypoints.len() - 1;
            warn!(
                "Only {} waypoints received, fitting a degree {} curve instead of {}",
                waypoints.len(),
                degree,
                self.params.poly_degree
            );
        }
        self.report.poly_degree = degree;

        let curve = ReferenceCurve::fit(&waypoints.xs, &waypoints.ys, degree)?;

        let display = &self.params.display;
        let (next_x, next_y) = curve.sample(display.ref_sample_step_m, display.ref_sample_count);

        // The vehicle sits at the origin of its own frame
        let mode = self.params.mpc.heading_error;
        let cte = -curve.eval(0.0);
        let epsi = wrap_pi(-curve.desired_heading(0.0, mode));
        let state = VehicleState::new(0.0, 0.0, 0.0, telem.speed).with_errors(cte, epsi);
        self.report.cte = cte;
        self.report.epsi = epsi;

        let previous = self.current_actuation(telem);
        let predicted = self.compensator.compensate(
            &state,
            &previous,
            &TrackedCurve::new(&curve, mode),
        );

        trace!(
            "Cycle {}: cte {:.4}, epsi {:.4}, predicted state {:?}",
            self.num_cycles,
            cte,
            epsi,
            predicted
        );

        let max_steer = self.params.mpc.bounds.max_steer_rad;
        let output = self.params.output;

        let result = self
            .mpc
            .solve(&predicted, &curve, self.warm_start.as_deref());

        let (act, mpc_x, mpc_y) = match result {
            Ok(sol) => {
                self.report.solve_status = SolveStatus::Solved;
                self.report.iterations = sol.iterations;
                self.report.cost = sol.cost;
                self.report.solve_time_s = sol.solve_time_s;

                let act = sol.trajectory.first_actuation().unwrap_or_default();
                let (mpc_x, mpc_y) = sol.trajectory.positions();
                self.warm_start = Some(sol.trajectory.actuations());

                (act, mpc_x, mpc_y)
            }
            Err(failure) => {
                warn!("MPC solve failed, sending fallback command: {}", failure);
                self.report.solve_status = SolveStatus::from(&failure);
                self.warm_start = None;

                let fallback = &self.params.fallback;
                (
                    Actuation::new(fallback.steer_rad, fallback.throttle),
                    next_x.clone(),
                    next_y.clone(),
                )
            }
        };

        self.last_actuation = act;
        self.report.steer_rad = act.steer_rad;
        self.report.accel = act.accel;

        Ok(SteerCommand {
            steering_angle: output.to_wire(act.steer_rad, max_steer),
            throttle: act.accel,
            next_x,
            next_y,
            mpc_x,
            mpc_y,
        })
    }

    /// The actuation currently in effect, as reported by the vehicle where available.
    fn current_actuation(&self, telem: &Telemetry) -> Actuation {
        let max_steer = self.params.mpc.bounds.max_steer_rad;

        Actuation {
            steer_rad: telem
                .steering_angle
                .map(|s| self.params.output.from_wire(s, max_steer))
                .unwrap_or(self.last_actuation.steer_rad),
            accel: telem.throttle.unwrap_or(self.last_actuation.accel),
        }
    }
}

impl State for Controller {
    type InitData = &'static str;
    type InitError = CtrlInitError;

    type InputData = Telemetry;
    type OutputData = SteerCommand;
    type StatusReport = StatusReport;
    type ProcError = CtrlError;

    /// Initialise the controller.
    ///
    /// Expected init data is the path to the parameter file
    fn init(init_data: Self::InitData, session: &Session) -> Result<Self, Self::InitError> {
        let params: CtrlParams = params::load(init_data)?;

        let mut ctrl = Controller::new(params)?;
        ctrl.arch_report = Some(Archiver::from_path(session, "ctrl/status_report.csv")?);

        Ok(ctrl)
    }

    /// Perform one controller cycle.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let cmd = self.handle_telemetry(input_data)?;

        Ok((cmd, self.report))
    }
}

impl Archived for Controller {
    fn write(&mut self) -> Result<(), ArchiveError> {
        match self.arch_report {
            Some(ref mut a) => a.serialise(self.report),
            None => Ok(()),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ctrl::SteeringConvention, ref_curve::HeadingErrorMode};

    fn test_params() -> CtrlParams {
        let mut params = CtrlParams::default();
        params.mpc.solver.max_solve_time_s = 5.0;
        params.output = SteeringConvention::default();
        params
    }

    fn telem(ptsy: Vec<f64>) -> Telemetry {
        Telemetry {
            x: 0.0,
            y: 0.0,
            psi: 0.0,
            speed: 10.0,
            ptsx: vec![0.0, 25.0, 50.0],
            ptsy,
            steering_angle: Some(0.0),
            throttle: Some(0.0),
        }
    }

    #[test]
    fn test_straight_path() {
        let mut ctrl = Controller::new(test_params()).unwrap();

        let cmd = ctrl.handle_telemetry(&telem(vec![0.0, 0.0, 0.0])).unwrap();

        assert!(cmd.steering_angle.abs() < 1e-6);
        assert!(ctrl.report().cte.abs() < 1e-9);
        assert!(ctrl.report().epsi.abs() < 1e-9);
        assert_eq!(ctrl.report().solve_status, SolveStatus::Solved);

        assert_eq!(cmd.next_x.len(), 20);
        assert_eq!(cmd.mpc_x.len(), 10);
        for y in cmd.mpc_y.iter().chain(cmd.next_y.iter()) {
            assert!(y.abs() < 1e-6);
        }

        // Only 3 waypoints, so a quadratic is fitted
        assert_eq!(ctrl.report().poly_degree, 2);
    }

    #[test]
    fn test_curving_path() {
        let mut ctrl = Controller::new(test_params()).unwrap();

        let cmd = ctrl.handle_telemetry(&telem(vec![0.0, 2.0, 6.0])).unwrap();

        // Curve is f(x) = 0.04x + 0.0016x^2, bending left
        assert!(cmd.steering_angle > 0.0);
        assert!(cmd.mpc_y[cmd.mpc_y.len() - 1] > 0.0);
        assert!((cmd.next_y[1] - (0.04 * 5.0 + 0.0016 * 25.0)).abs() < 1e-9);
        assert!((ctrl.report().epsi + (0.04f64).atan()).abs() < 1e-9);
        assert_eq!(ctrl.last_actuation().steer_rad, cmd.steering_angle);
    }

    #[test]
    fn test_curving_path_small_angle() {
        let mut params = test_params();
        params.mpc.heading_error = HeadingErrorMode::SmallAngle;
        let mut ctrl = Controller::new(params).unwrap();

        let cmd = ctrl.handle_telemetry(&telem(vec![0.0, 2.0, 6.0])).unwrap();

        // Heading error is the negated slope rather than its arctangent
        assert!((ctrl.report().epsi + 0.04).abs() < 1e-9);
        assert!((ctrl.report().epsi + (0.04f64).atan()).abs() > 1e-6);

        assert_eq!(ctrl.report().solve_status, SolveStatus::Solved);
        assert!(cmd.steering_angle > 0.0);
        assert!(cmd.mpc_y[cmd.mpc_y.len() - 1] > 0.0);
    }

    #[test]
    fn test_simulator_convention() {
        let mut params = test_params();
        params.output = SteeringConvention {
            normalise_steering: true,
            invert_steering: true,
        };
        let mut ctrl = Controller::new(params).unwrap();

        let cmd = ctrl.handle_telemetry(&telem(vec![0.0, 2.0, 6.0])).unwrap();

        // Left turns are negative on the wire
        assert!(cmd.steering_angle < 0.0);
        assert!(cmd.steering_angle >= -1.0);
        assert!(ctrl.last_actuation().steer_rad > 0.0);
    }

    #[test]
    fn test_tight_steering_bound() {
        let mut params = test_params();
        params.mpc.bounds.max_steer_rad = 0.05;
        let mut ctrl = Controller::new(params).unwrap();

        let mut t = telem(vec![0.0, 10.0, 40.0]);
        t.speed = 20.0;
        let cmd = ctrl.handle_telemetry(&t).unwrap();

        assert!(cmd.steering_angle > 0.0);
        assert!(cmd.steering_angle <= 0.05);
    }

    #[test]
    fn test_solve_failure_uses_fallback() {
        let mut params = test_params();
        params.mpc.bounds.max_steer_rad = 0.0;
        params.mpc.corridor.max_cte_m = Some(0.05);
        let mut ctrl = Controller::new(params).unwrap();

        let cmd = ctrl.handle_telemetry(&telem(vec![0.0, 2.0, 6.0])).unwrap();

        assert_eq!(cmd.steering_angle, 0.0);
        assert_eq!(cmd.throttle, 0.4);
        assert_eq!(cmd.mpc_x, cmd.next_x);
        assert_eq!(cmd.mpc_y, cmd.next_y);
        assert_eq!(ctrl.report().solve_status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_malformed_telemetry() {
        let mut ctrl = Controller::new(test_params()).unwrap();

        let mut t = telem(vec![0.0, 0.0]);
        assert_eq!(
            ctrl.handle_telemetry(&t),
            Err(CtrlError::Frame(crate::frame::FrameError::LengthMismatch(3, 2)))
        );

        t.ptsx = vec![1.0];
        t.ptsy = vec![1.0];
        assert_eq!(
            ctrl.handle_telemetry(&t),
            Err(CtrlError::InsufficientWaypoints(1))
        );

        let mut t = telem(vec![0.0, 0.0, 0.0]);
        t.psi = std::f64::NAN;
        assert_eq!(ctrl.handle_telemetry(&t), Err(CtrlError::NonFinitePose));

        let mut t = telem(vec![0.0, 1.0, 2.0]);
        t.ptsx = vec![5.0, 5.0, 5.0];
        assert_eq!(
            ctrl.handle_telemetry(&t),
            Err(CtrlError::Fit(crate::ref_curve::FitError::Singular))
        );
    }

    #[test]
    fn test_proc_returns_report() {
        let mut ctrl = Controller::new(test_params()).unwrap();

        let (cmd, report) = ctrl.proc(&telem(vec![0.0, 0.0, 0.0])).unwrap();
        assert_eq!(report.cycle, 1);
        assert_eq!(report.steer_rad, cmd.steering_angle);

        // Without a session there is nothing to archive into
        assert!(ctrl.write().is_ok());
    }
}
