//! # PaaS Crypt Gateway
//!
//! Tenant-scoped RSA encryption with a handle cache that follows key rotation.
//!
//! - [`crypt`] - Handles, the RSA-OAEP factory and error taxonomy
//! - [`cache`] - Per-tenant handle cache and key file watcher
//! - [`validation`] - Secret bundles and whole-tree decryption checks
//! - [`server`] - HTTP API, probes and metrics endpoint
//! - [`config`] - Environment configuration
//! - [`observability`] - Prometheus metrics
//! - [`runtime`] - Process startup

pub mod cache;
pub mod config;
pub mod constants;
pub mod crypt;
pub mod observability;
pub mod runtime;
pub mod server;
pub mod validation;
