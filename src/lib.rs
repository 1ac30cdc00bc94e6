//! Status classification and zone ranking for a live student monitor.
//!
//! Everything outside [`db`] and [`refresh`] is synchronous and pure over
//! its inputs; the caller passes `now` explicitly.

pub mod attendance;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod light;
pub mod models;
pub mod refresh;
pub mod report;
pub mod roster;
pub mod stats;
pub mod status;
pub mod time;
pub mod zones;
