//! Library exports for snapstack.
//!
//! Exposes the screenshot store, the capture coordinator, the crop engine and
//! the export pipeline so that other front ends (a browser bridge, a GUI) can
//! drive the same flows as the `snapstack` binary.

pub mod capture;
pub mod config;
pub mod crop;
pub mod export;
pub mod region;
pub mod store;
pub mod util;

pub use config::Config;
