//! Outward Surfaces (io)
//!
//! - **attribute**: The `gpu_state` control file
//! - **switcheroo**: Handler for the host's GPU switching framework

pub mod attribute;
pub mod switcheroo;
