//! Configuration (cm)
//!
//! Two values, read once each:
//!
//! - `load_state`: applied right after the dGPU is discovered
//! - `unload_state`: applied before the driver is torn down
//!
//! Each is `dontcare`, `on` or `off`. The host hands them over as text.
//!
//! # Accepted Values
//!
//! | Text | State |
//! |---|---|
//! | `dontcare`, `-1` | DontCare |
//! | `on`, `1` | On |
//! | `off`, `0` | Off |
//!
//! Matching ignores ASCII case and surrounding whitespace.

use crate::po::PowerState;
use crate::{GswError, GswResult};

/// Parameter key for the load-time state
pub const LOAD_STATE_KEY: &str = "load_state";
/// Parameter key for the unload-time state
pub const UNLOAD_STATE_KEY: &str = "unload_state";

/// Configured intent for a lifecycle point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DesiredState {
    /// Leave the rail as found
    #[default]
    DontCare,
    On,
    Off,
}

impl DesiredState {
    pub fn from_param(value: &str) -> GswResult<Self> {
        let value = value.trim();
        let matches = |s: &str| value.eq_ignore_ascii_case(s);

        if matches("dontcare") || value == "-1" {
            Ok(DesiredState::DontCare)
        } else if matches("on") || value == "1" {
            Ok(DesiredState::On)
        } else if matches("off") || value == "0" {
            Ok(DesiredState::Off)
        } else {
            log::warn!("Invalid power state parameter '{}'", value);
            Err(GswError::InvalidArgument)
        }
    }

    /// The transition to request, if any
    pub fn target(self) -> Option<PowerState> {
        match self {
            DesiredState::DontCare => None,
            DesiredState::On => Some(PowerState::On),
            DesiredState::Off => Some(PowerState::Off),
        }
    }
}

/// Driver parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Params {
    pub on_load: DesiredState,
    pub on_unload: DesiredState,
}

impl Params {
    /// Build from `(key, value)` pairs
    ///
    /// Unknown keys are logged and skipped; a bad value for a known key is
    /// an error.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> GswResult<Self> {
        let mut params = Params::default();

        for (key, value) in pairs {
            match *key {
                LOAD_STATE_KEY => params.on_load = DesiredState::from_param(value)?,
                UNLOAD_STATE_KEY => params.on_unload = DesiredState::from_param(value)?,
                _ => log::warn!("Ignoring unknown parameter '{}'", key),
            }
        }

        Ok(params)
    }
}
