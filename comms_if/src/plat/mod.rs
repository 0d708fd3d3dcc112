//! # Platform interface
//!
//! Types exchanged between the platform executable and its clients. Everything here is
//! serialised as JSON; the literal strings used for directions, modes and instruction types
//! are shared with existing clients and must not change.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod cmd;
mod mode;
mod program;
mod req;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use cmd::*;
pub use mode::*;
pub use program::*;
pub use req::*;
