use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::audio::CuePlayer;
use crate::classifier::{classify, Classification};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::fusion::{sanitize_dt, FusionConfig};
use crate::imu::SensorSource;
use crate::outcome::{Outcome, OutcomeSelector};
use crate::session::{Sample, Session, SessionRecorder};
use crate::stepper::{CoilDriver, CoilState, DrivePhase, DrivePlan, StepperSequencer};
use crate::trigger::TriggerInput;
use crate::units::{PhysicalReading, UnitConverter};

/// What a completed session turned into
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub classification: Classification,
    pub outcome: Outcome,
}

/// Trigger → record → classify → spin, forever.
///
/// Single-threaded and blocking; the only thing shared with other threads is
/// the abort flag.
pub struct SpinRuntime<S, T, D, P, C> {
    sensor: S,
    trigger: T,
    coils: D,
    player: P,
    clock: C,
    converter: UnitConverter,
    fusion: FusionConfig,
    swap_xy: bool,
    poll_interval: Duration,
    selector: OutcomeSelector,
    sequencer: StepperSequencer,
    music: String,
    abort: Arc<AtomicBool>,
}

impl<S, T, D, P, C> SpinRuntime<S, T, D, P, C>
where
    S: SensorSource,
    T: TriggerInput,
    D: CoilDriver,
    P: CuePlayer,
    C: Clock,
{
    pub fn new(
        sensor: S,
        trigger: T,
        coils: D,
        player: P,
        clock: C,
        config: &AppConfig,
        abort: Arc<AtomicBool>,
    ) -> Result<Self> {
        if !(config.drive.period_divisor.is_finite() && config.drive.period_divisor > 0.0) {
            return Err(Error::InvalidDriveParameter(format!(
                "period divisor {} must be positive",
                config.drive.period_divisor
            )));
        }

        Ok(Self {
            sensor,
            trigger,
            coils,
            player,
            clock,
            converter: config.sensor.converter(),
            fusion: config.fusion.clone(),
            swap_xy: config.sensor.swap_xy,
            poll_interval: config.sampling.poll_interval(),
            selector: OutcomeSelector::new(config.drive.period_divisor),
            sequencer: StepperSequencer::from_config(&config.drive)?,
            music: config.audio.music.clone(),
            abort,
        })
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Block until the trigger asserts
    pub fn wait_for_trigger(&mut self) -> Result<()> {
        loop {
            if self.aborted() {
                return Err(Error::Aborted);
            }
            if self.trigger.is_asserted()? {
                return Ok(());
            }
            self.clock.sleep(self.poll_interval);
        }
    }

    /// Record samples until the trigger deasserts.
    ///
    /// Orientation starts from identity for every session. An abort drops
    /// the partial session.
    pub fn record_session(&mut self) -> Result<Session> {
        info!("recording...");
        let mut recorder = SessionRecorder::new(self.converter, &self.fusion, self.swap_xy);
        let mut last = self.clock.now();

        loop {
            if self.aborted() {
                recorder.discard();
                return Err(Error::Aborted);
            }
            if !self.trigger.is_asserted()? {
                break;
            }

            if self.sensor.is_sample_ready()? {
                let raw = self.sensor.read_raw()?;
                let reading = self.converter.to_physical(raw.accel, raw.gyro);
                let now = self.clock.now();

                match record_timed(&mut recorder, reading, now, &mut last) {
                    Ok(()) => {}
                    Err(e @ Error::InvalidSensorReading { .. }) => warn!("sample skipped: {}", e),
                    Err(e) => return Err(e),
                }
            }

            self.clock.sleep(self.poll_interval);
        }

        let [roll, pitch, yaw] = recorder.orientation().to_euler();
        info!(
            samples = recorder.len(),
            rejected = recorder.rejected(),
            roll_deg = format_args!("{:.1}", roll.to_degrees()),
            pitch_deg = format_args!("{:.1}", pitch.to_degrees()),
            yaw_deg = format_args!("{:.1}", yaw.to_degrees()),
            "recording stopped"
        );
        Ok(recorder.finish())
    }

    /// Classify a session and pick its outcome
    pub fn decide(&self, session: &Session) -> Result<Decision> {
        let classification = classify(session)?;
        let outcome = self.selector.select(session)?;
        Ok(Decision {
            classification,
            outcome,
        })
    }

    /// One full interaction. Returns `None` when nothing was recorded.
    pub fn run_cycle(&mut self) -> Result<Option<Decision>> {
        self.wait_for_trigger()?;
        let session = self.record_session()?;

        let decision = match self.decide(&session) {
            Ok(decision) => decision,
            Err(Error::EmptySession) => {
                warn!("no samples recorded, waiting for the next trigger");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Decision {
            classification,
            outcome,
        } = &decision;
        let a = &classification.averages;
        info!(
            "averages: x {:.4} | y- {:.4} y+ {:.4} | z- {:.4} z+ {:.4} | gx {:.4} gy {:.4} gz {:.4}",
            a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7]
        );
        info!(
            category = %classification.category,
            direction = %outcome.direction,
            rotations = outcome.rotation_count,
            speed = outcome.speed_code,
            rps = format_args!(
                "{:.3}",
                outcome.revolutions_per_second(self.sequencer.steps_per_turn())
            ),
            "outcome selected"
        );

        let plan = self.sequencer.plan(
            outcome.direction,
            i64::from(outcome.rotation_count),
            classification.category,
            outcome.step_period,
        )?;

        let spun = self.spin(&plan);
        let released = self.release_coils();
        if spun.is_err() {
            self.player.stop();
        }
        spun?;
        released?;

        Ok(Some(decision))
    }

    fn spin(&mut self, plan: &DrivePlan) -> Result<()> {
        let Self {
            sequencer,
            coils,
            clock,
            player,
            music,
            abort,
            ..
        } = self;

        sequencer.drive(plan, coils, clock, &**abort, |phase| {
            debug!(?phase, "drive phase");
            let cue = match phase {
                DrivePhase::Forward => music.as_str(),
                DrivePhase::Dwell => {
                    player.stop();
                    plan.category.cue()
                }
                DrivePhase::Return => return,
            };
            if let Err(e) = player.play(cue) {
                warn!("cue {} not played: {}", cue, e);
            }
        })
    }

    /// De-energize all coils
    pub fn release_coils(&mut self) -> Result<()> {
        self.coils.set_coils(CoilState::OFF)
    }

    /// Cycle until aborted. Any other error stops the loop and is returned
    /// after the coils are released.
    pub fn run(&mut self) -> Result<()> {
        info!("waiting for trigger");
        let result = loop {
            match self.run_cycle() {
                Ok(_) => info!("waiting for trigger"),
                Err(Error::Aborted) => {
                    info!("abort requested");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        self.shutdown();
        result
    }

    /// Stop audio and release the coils
    pub fn shutdown(&mut self) {
        self.player.stop();
        match self.release_coils() {
            Ok(()) => info!("coils released"),
            Err(e) => warn!("failed to release coils: {}", e),
        }
    }

    pub fn coils(&self) -> &D {
        &self.coils
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// Record one reading taken at `now`.
///
/// `last` only advances when the sample is accepted, so the next good
/// sample integrates over the whole gap left by a rejected one.
fn record_timed(
    recorder: &mut SessionRecorder,
    reading: PhysicalReading,
    now: Duration,
    last: &mut Duration,
) -> Result<()> {
    let dt = sanitize_dt(now.saturating_sub(*last).as_secs_f64());
    recorder.record_sample(Sample {
        accel: reading.accel,
        gyro: reading.gyro,
        dt,
    })?;
    *last = now;
    Ok(())
}
