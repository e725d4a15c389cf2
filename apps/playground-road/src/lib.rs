//! Session lifecycle core of the playground service: deterministic
//! playground addressing, per-session countdown workers and terminal access
//! resolution behind a small HTTP surface.

pub mod addressing;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod platform;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod task;
pub mod telemetry;
pub mod terminal;
