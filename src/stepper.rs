//! Four-wire stepper phase sequencing.
//!
//! A spin is three phases:
//!
//! 1. Forward: `floor((rotations + fraction) * steps_per_turn)` steps from the
//!    direction's table, overshooting the home mark by the category fraction.
//! 2. Dwell: the wheel rests while the category cue plays.
//! 3. Return: `floor(steps_per_turn * fraction)` steps from the opposite table.
//!
//! Both counts are derived from one overshoot computed in integer degrees,
//! so the net travel is a whole number of turns at any resolution and the
//! indicator lands on the category's stop angle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::outcome::{Direction, DEFAULT_PERIOD_DIVISOR};

/// Full steps per wheel turn (50 cycles of the 4-state table)
pub const DEFAULT_STEPS_PER_TURN: u32 = 50 * 4;

/// Default pause between forward and return phases
pub const DEFAULT_DWELL: Duration = Duration::from_secs(7);

/// Longest single wait while dwelling, so an abort is noticed promptly
const DWELL_SLICE: Duration = Duration::from_millis(100);

/// Energization of the four coil leads (A1, A2, B1, B2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoilState(pub [bool; 4]);

impl CoilState {
    /// All leads de-energized
    pub const OFF: CoilState = CoilState([false; 4]);

    pub const fn from_bits(bits: [u8; 4]) -> Self {
        CoilState([bits[0] != 0, bits[1] != 0, bits[2] != 0, bits[3] != 0])
    }

    pub fn bits(&self) -> [u8; 4] {
        self.0.map(u8::from)
    }

    pub fn is_off(&self) -> bool {
        self.0.iter().all(|lead| !lead)
    }
}

/// Full-step clockwise cycle
pub const CLOCKWISE: [CoilState; 4] = [
    CoilState::from_bits([1, 0, 0, 1]),
    CoilState::from_bits([1, 0, 1, 0]),
    CoilState::from_bits([0, 1, 1, 0]),
    CoilState::from_bits([0, 1, 0, 1]),
];

/// Full-step counter-clockwise cycle (clockwise reversed)
pub const COUNTER_CLOCKWISE: [CoilState; 4] = [
    CoilState::from_bits([0, 1, 0, 1]),
    CoilState::from_bits([0, 1, 1, 0]),
    CoilState::from_bits([1, 0, 1, 0]),
    CoilState::from_bits([1, 0, 0, 1]),
];

pub fn table(direction: Direction) -> &'static [CoilState; 4] {
    match direction {
        Direction::Clockwise => &CLOCKWISE,
        Direction::CounterClockwise => &COUNTER_CLOCKWISE,
    }
}

/// Hardware sink for coil states
pub trait CoilDriver {
    fn set_coils(&mut self, state: CoilState) -> Result<()>;
}

/// Phase boundaries reported while driving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrivePhase {
    Forward,
    Dwell,
    Return,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub steps_per_turn: u32,
    /// Speed code divisor: step period = speed code / divisor seconds
    pub period_divisor: f64,
    pub dwell_secs: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            steps_per_turn: DEFAULT_STEPS_PER_TURN,
            period_divisor: DEFAULT_PERIOD_DIVISOR,
            dwell_secs: DEFAULT_DWELL.as_secs_f64(),
        }
    }
}

/// Fully resolved spin, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct DrivePlan {
    pub direction: Direction,
    pub category: Category,
    pub rotation_count: u32,
    /// Fraction of a turn past home at which the category sits, seen from
    /// the spin direction
    pub target_fraction: f64,
    pub forward_steps: u64,
    pub return_steps: u64,
    pub step_period: Duration,
}

impl DrivePlan {
    /// Coil states of the forward phase, in emission order
    pub fn forward_states(&self) -> impl Iterator<Item = CoilState> + '_ {
        let cycle = table(self.direction);
        (0..self.forward_steps).map(move |i| cycle[(i % 4) as usize])
    }

    /// Coil states of the return phase, in emission order
    pub fn return_states(&self) -> impl Iterator<Item = CoilState> + '_ {
        let cycle = table(self.direction.opposite());
        (0..self.return_steps).map(move |i| cycle[(i % 4) as usize])
    }

    /// Steps travelled in the spin direction after both phases
    pub fn net_steps(&self) -> i64 {
        self.forward_steps as i64 - self.return_steps as i64
    }
}

/// Turns an outcome into timed coil writes
#[derive(Debug, Clone)]
pub struct StepperSequencer {
    steps_per_turn: u32,
    dwell: Duration,
}

impl StepperSequencer {
    pub fn new(steps_per_turn: u32, dwell: Duration) -> Self {
        Self {
            steps_per_turn,
            dwell,
        }
    }

    pub fn from_config(config: &DriveConfig) -> Result<Self> {
        if config.steps_per_turn == 0 {
            return Err(Error::InvalidDriveParameter(
                "steps_per_turn must be positive".to_string(),
            ));
        }
        let dwell = Duration::try_from_secs_f64(config.dwell_secs).map_err(|_| {
            Error::InvalidDriveParameter(format!("dwell {}s is not a valid duration", config.dwell_secs))
        })?;
        Ok(Self::new(config.steps_per_turn, dwell))
    }

    pub fn steps_per_turn(&self) -> u32 {
        self.steps_per_turn
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Resolve step counts for a spin.
    ///
    /// Negative rotation counts and non-positive step periods are rejected,
    /// never clamped.
    pub fn plan(
        &self,
        direction: Direction,
        rotation_count: i64,
        category: Category,
        step_period: f64,
    ) -> Result<DrivePlan> {
        let rotations = u32::try_from(rotation_count).map_err(|_| {
            Error::InvalidDriveParameter(format!("rotation count {} out of range", rotation_count))
        })?;
        if !(step_period.is_finite() && step_period > 0.0) {
            return Err(Error::InvalidDriveParameter(format!(
                "step period {} must be positive",
                step_period
            )));
        }
        let period = Duration::try_from_secs_f64(step_period).map_err(|_| {
            Error::InvalidDriveParameter(format!("step period {} is not a valid duration", step_period))
        })?;

        // Overshoot past home, in degrees seen from the spin direction
        let overshoot = match direction {
            Direction::Clockwise => category.stop_angle(),
            Direction::CounterClockwise => 360 - category.stop_angle(),
        };
        let target_fraction = f64::from(overshoot) / 360.0;

        let per_turn = u64::from(self.steps_per_turn);
        let return_steps = u64::from(overshoot) * per_turn / 360;
        let forward_steps = u64::from(rotations) * per_turn + return_steps;

        Ok(DrivePlan {
            direction,
            category,
            rotation_count: rotations,
            target_fraction,
            forward_steps,
            return_steps,
            step_period: period,
        })
    }

    /// Execute a plan: forward, dwell, return.
    ///
    /// `set_coils` is called once per emitted step and for nothing else; the
    /// caller de-energizes afterwards. `abort` is checked before every step
    /// and during the dwell.
    pub fn drive<D, C, F>(
        &self,
        plan: &DrivePlan,
        driver: &mut D,
        clock: &mut C,
        abort: &AtomicBool,
        mut on_phase: F,
    ) -> Result<()>
    where
        D: CoilDriver + ?Sized,
        C: Clock + ?Sized,
        F: FnMut(DrivePhase),
    {
        tracing::info!(
            direction = %plan.direction,
            category = %plan.category,
            rotations = plan.rotation_count,
            forward_steps = plan.forward_steps,
            return_steps = plan.return_steps,
            "driving stepper"
        );

        on_phase(DrivePhase::Forward);
        for state in plan.forward_states() {
            emit(driver, clock, abort, state, plan.step_period)?;
        }

        on_phase(DrivePhase::Dwell);
        let mut remaining = self.dwell;
        while !remaining.is_zero() {
            if abort.load(Ordering::SeqCst) {
                return Err(Error::Aborted);
            }
            let slice = remaining.min(DWELL_SLICE);
            clock.sleep(slice);
            remaining -= slice;
        }

        on_phase(DrivePhase::Return);
        for state in plan.return_states() {
            emit(driver, clock, abort, state, plan.step_period)?;
        }

        Ok(())
    }
}

impl Default for StepperSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS_PER_TURN, DEFAULT_DWELL)
    }
}

fn emit<D, C>(
    driver: &mut D,
    clock: &mut C,
    abort: &AtomicBool,
    state: CoilState,
    period: Duration,
) -> Result<()>
where
    D: CoilDriver + ?Sized,
    C: Clock + ?Sized,
{
    if abort.load(Ordering::SeqCst) {
        return Err(Error::Aborted);
    }
    driver.set_coils(state)?;
    clock.sleep(period);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;

    /// Coil driver that keeps every write
    #[derive(Default)]
    struct RecordingCoils {
        states: Vec<CoilState>,
        abort_after: Option<(usize, &'static AtomicBool)>,
    }

    impl CoilDriver for RecordingCoils {
        fn set_coils(&mut self, state: CoilState) -> Result<()> {
            self.states.push(state);
            if let Some((limit, flag)) = self.abort_after {
                if self.states.len() >= limit {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            Ok(())
        }
    }

    struct FailingCoils;

    impl CoilDriver for FailingCoils {
        fn set_coils(&mut self, _state: CoilState) -> Result<()> {
            Err(Error::Hardware("line busy".to_string()))
        }
    }

    fn quick_sequencer() -> StepperSequencer {
        StepperSequencer::new(DEFAULT_STEPS_PER_TURN, Duration::from_secs(1))
    }

    #[test]
    fn test_tables_are_reverses() {
        let mut reversed = CLOCKWISE;
        reversed.reverse();
        assert_eq!(reversed, COUNTER_CLOCKWISE);
        assert_eq!(CLOCKWISE[0].bits(), [1, 0, 0, 1]);
        assert!(CoilState::OFF.is_off());
        assert!(!CLOCKWISE[2].is_off());
    }

    #[test]
    fn test_plan_step_counts() {
        let sequencer = StepperSequencer::default();

        // Environmental sits at 26°: 26/360 of 200 steps = 14.4
        let cw = sequencer
            .plan(Direction::Clockwise, 3, Category::Environmental, 0.006)
            .unwrap();
        assert_eq!(cw.forward_steps, 614);
        assert_eq!(cw.return_steps, 14);

        // Counter-clockwise measures from the other side: 334/360
        let ccw = sequencer
            .plan(Direction::CounterClockwise, 3, Category::Environmental, 0.006)
            .unwrap();
        assert_eq!(ccw.forward_steps, 785);
        assert_eq!(ccw.return_steps, 185);
    }

    #[test]
    fn test_net_travel_is_whole_turns() {
        for steps_per_turn in [200u32, 360, 400, 720, 1600] {
            let sequencer = StepperSequencer::new(steps_per_turn, DEFAULT_DWELL);
            for direction in [Direction::Clockwise, Direction::CounterClockwise] {
                for category in Category::ALL {
                    for rotations in 0..=11 {
                        let plan = sequencer.plan(direction, rotations, category, 0.004).unwrap();
                        assert_eq!(
                            plan.net_steps(),
                            rotations * steps_per_turn as i64,
                            "{} {:?} {:?} {}",
                            steps_per_turn,
                            direction,
                            category,
                            rotations
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_whole_degree_resolution_lands_exactly() {
        // One step per degree: the overshoot is the stop angle itself
        let sequencer = StepperSequencer::new(360, DEFAULT_DWELL);
        let cw = sequencer
            .plan(Direction::Clockwise, 1, Category::Environmental, 0.006)
            .unwrap();
        assert_eq!(cw.return_steps, 26);
        assert_eq!(cw.forward_steps, 386);

        let ccw = sequencer
            .plan(Direction::CounterClockwise, 2, Category::Emotional, 0.006)
            .unwrap();
        assert_eq!(ccw.return_steps, 290);
        assert_eq!(ccw.forward_steps, 1010);
    }

    #[test]
    fn test_drive_emits_plan_in_order() {
        let sequencer = quick_sequencer();
        let plan = sequencer
            .plan(Direction::Clockwise, 2, Category::Emotional, 0.01)
            .unwrap();
        let mut coils = RecordingCoils::default();
        let mut clock = VirtualClock::new();
        let abort = AtomicBool::new(false);
        let mut phases = Vec::new();

        sequencer
            .drive(&plan, &mut coils, &mut clock, &abort, |phase| phases.push(phase))
            .unwrap();

        assert_eq!(phases, vec![DrivePhase::Forward, DrivePhase::Dwell, DrivePhase::Return]);

        let forward = plan.forward_steps as usize;
        let total = forward + plan.return_steps as usize;
        assert_eq!(coils.states.len(), total);

        for (i, state) in coils.states[..forward].iter().enumerate() {
            assert_eq!(*state, CLOCKWISE[i % 4]);
        }
        // Return phase restarts at the head of the opposite table
        for (i, state) in coils.states[forward..].iter().enumerate() {
            assert_eq!(*state, COUNTER_CLOCKWISE[i % 4]);
        }
    }

    #[test]
    fn test_drive_timing_on_virtual_clock() {
        let sequencer = quick_sequencer();
        let plan = sequencer
            .plan(Direction::CounterClockwise, 4, Category::Social, 0.005)
            .unwrap();
        let mut coils = RecordingCoils::default();
        let mut clock = VirtualClock::new();
        let abort = AtomicBool::new(false);

        sequencer.drive(&plan, &mut coils, &mut clock, &abort, |_| {}).unwrap();

        let steps = (plan.forward_steps + plan.return_steps) as u32;
        let expected = Duration::from_secs_f64(0.005) * steps + Duration::from_secs(1);
        assert_eq!(clock.now(), expected);
    }

    #[test]
    fn test_zero_rotations_only_visits_target() {
        let plan = StepperSequencer::default()
            .plan(Direction::Clockwise, 0, Category::Financial, 0.003)
            .unwrap();
        assert_eq!(plan.forward_steps, plan.return_steps);
        assert_eq!(plan.net_steps(), 0);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let sequencer = StepperSequencer::default();
        assert!(matches!(
            sequencer.plan(Direction::Clockwise, -1, Category::Social, 0.006),
            Err(Error::InvalidDriveParameter(_))
        ));
        for period in [0.0, -0.006, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                sequencer.plan(Direction::Clockwise, 3, Category::Social, period),
                Err(Error::InvalidDriveParameter(_))
            ));
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DriveConfig {
            steps_per_turn: 0,
            ..DriveConfig::default()
        };
        assert!(StepperSequencer::from_config(&config).is_err());

        let config = DriveConfig {
            dwell_secs: -1.0,
            ..DriveConfig::default()
        };
        assert!(StepperSequencer::from_config(&config).is_err());

        let sequencer = StepperSequencer::from_config(&DriveConfig::default()).unwrap();
        assert_eq!(sequencer.dwell(), DEFAULT_DWELL);
    }

    #[test]
    fn test_abort_stops_emitting() {
        static ABORT: AtomicBool = AtomicBool::new(false);
        ABORT.store(false, Ordering::SeqCst);

        let sequencer = quick_sequencer();
        let plan = sequencer
            .plan(Direction::Clockwise, 5, Category::Physical, 0.006)
            .unwrap();
        let mut coils = RecordingCoils {
            abort_after: Some((37, &ABORT)),
            ..RecordingCoils::default()
        };
        let mut clock = VirtualClock::new();

        let result = sequencer.drive(&plan, &mut coils, &mut clock, &ABORT, |_| {});
        assert_eq!(result, Err(Error::Aborted));
        assert_eq!(coils.states.len(), 37);
    }

    #[test]
    fn test_driver_failure_propagates() {
        let sequencer = quick_sequencer();
        let plan = sequencer
            .plan(Direction::Clockwise, 2, Category::Physical, 0.006)
            .unwrap();
        let mut clock = VirtualClock::new();
        let abort = AtomicBool::new(false);

        let result = sequencer.drive(&plan, &mut FailingCoils, &mut clock, &abort, |_| {});
        assert!(matches!(result, Err(Error::Hardware(_))));
        assert_eq!(clock.sleep_count(), 0);
    }
}
