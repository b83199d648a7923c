//! Functional core for the SmartDiary auto-deploy daemon.
//!
//! Everything in this crate is pure: commit identifiers, poll decisions,
//! lock staleness, compose service selection and argument building, remote
//! credential handling, and health policy. The `smartdiary_deploy` crate
//! owns all I/O and calls into these functions.

pub mod config;
pub mod health;
pub mod lock;
pub mod remote;
pub mod revision;
pub mod services;
