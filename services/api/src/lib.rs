//! Timeclock API service
//!
//! Kiosk punches, supervisor overrides, payroll period locking and the audit
//! trail behind an axum router. [`routes::create_router`] wires everything
//! from an [`state::AppState`].

pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod validation;

pub use state::AppState;
