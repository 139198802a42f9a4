//! # Runtime Module
//!
//! Runtime components for the gateway: logging, metrics and server startup.

pub mod initialization;

pub use initialization::*;
