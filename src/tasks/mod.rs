//! Background Tasks Module
//!
//! Contains background tasks a host application may run alongside the cache.
//!
//! # Tasks
//! - Expiry Sweep: Removes expired cache files at configured intervals

mod cleanup;

pub use cleanup::spawn_sweep_task;
