//! Automation loops
//!
//! The control loop casts, detects bites and reels; the overtime loop answers
//! the overtime dialog. Both run on their own threads, share one parameter
//! lock and are started and stopped through [`RunControl`].

pub mod control;
pub mod overtime;
pub mod recorder;
pub mod run;
pub mod shared;
pub mod worker;

pub use control::ControlLoop;
pub use overtime::OvertimeLoop;
pub use recorder::CatchRecorder;
pub use run::RunControl;
pub use shared::{LoopEvent, Params, Shared};
pub use worker::{run_coordinator, Workers};
