//! Library surface for the tournament server binary, split out so
//! integration tests under `tests/` can drive the router and configuration
//! layer directly rather than spawning a subprocess.

pub mod api;
pub mod config;
pub mod logging;
