//! FloodWatch - Flood awareness platform API
//!
//! Authentication, community blogs and feedback, and a gateway to the
//! flood-risk prediction models.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
