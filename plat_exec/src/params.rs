//! # Platform Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlatExecParams {

    /// Endpoint for the request socket
    pub request_endpoint: String,

    /// Endpoint for the program progress socket
    pub progress_endpoint: String,

    /// Time the server waits for a request before checking the connection again.
    ///
    /// Units: milliseconds
    pub request_timeout_ms: i32,

    /// Interval between heartbeats sent to the client.
    ///
    /// Units: milliseconds
    pub heartbeat_ivl_ms: i32,

    /// Time without a heartbeat reply after which the client is considered gone.
    ///
    /// Units: milliseconds
    pub heartbeat_timeout_ms: i32,

    /// Use the simulated motor driver even on the vehicle.
    #[serde(default)]
    pub simulate_driver: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_file() {
        let params: PlatExecParams = util::params::from_str(
            include_str!("../../params/plat_exec.toml")
        ).unwrap();

        assert_eq!(params.request_endpoint, "tcp://*:5020");
        assert!(params.request_timeout_ms > 0);
        assert!(params.heartbeat_timeout_ms > params.heartbeat_ivl_ms);
        assert!(!params.simulate_driver);
    }
}
