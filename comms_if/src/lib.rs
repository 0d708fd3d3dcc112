//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Commands, programs, modes and status exchanged with the platform
pub mod plat;

/// Network module
pub mod net;
