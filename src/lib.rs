//! # ticketd
//!
//! Time-driven status progression engine for tracked tickets.
//!
//! Tickets move through a fixed lifecycle (`Open → In Progress → Review →
//! Testing → Done`) purely as a function of elapsed time. A scheduler scans
//! at a fixed cadence, advances every ticket that has dwelt long enough in
//! its current state, and sends each owner a single digest covering all of
//! their tickets that reached `Done` in that cycle.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod transitions;
