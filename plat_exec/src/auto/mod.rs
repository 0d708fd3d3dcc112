//! # Automatic programs
//!
//! Compiles uploaded programs into timed track targets and walks them on a worker thread.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Parameters of the profile compiler
pub mod params;

/// Discrete model of the drive controller's acceleration and braking
pub mod ramp_sim;

/// Compiles high level instructions into low level steps
pub mod profile;

/// Where a running program reports its progress to
pub mod progress;

/// Executes compiled programs
pub mod sequencer;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::ProfileParams;
pub use profile::{CompileError, LowLevelStep, Maneuver, Program, ProfileCompiler};
pub use progress::{ChannelSink, ProgressSink, SinkError};
pub use sequencer::{RunId, RunOutcome, Sequencer, SequencerError, SequencerState};
