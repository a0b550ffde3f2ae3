//! Motion-triggered spin-the-wheel runtime.
//!
//! While the record switch is held, ICM-20948 samples are fused into an
//! orientation estimate and reduced to gravity-free linear acceleration and
//! angular rate. The dominant motion picks one of eight wheel categories and
//! the tail of the recording picks how the wheel spins; a four-wire stepper
//! then turns the wheel and stops its indicator on the category.
//!
//! The pipeline modules (`units` through `stepper`) are pure and
//! hardware-free. Hardware sits behind [`SensorSource`], [`TriggerInput`],
//! [`CoilDriver`], [`CuePlayer`] and [`Clock`].

pub mod audio;
pub mod category;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod fusion;
pub mod imu;
pub mod linear;
pub mod motor;
pub mod outcome;
pub mod runtime;
pub mod session;
pub mod stepper;
pub mod trigger;
pub mod units;

pub use audio::CuePlayer;
pub use category::Category;
pub use classifier::{classify, Classification};
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use fusion::{OrientationFilter, Quaternion};
pub use imu::SensorSource;
pub use outcome::{Direction, Outcome, OutcomeSelector};
pub use runtime::{Decision, SpinRuntime};
pub use session::{Axis, Sample, Session, SessionRecorder};
pub use stepper::{CoilDriver, CoilState, StepperSequencer};
pub use trigger::TriggerInput;
pub use units::UnitConverter;
