//! # simtaq-common
//!
//! Shared configuration, error handling, domain models and pure business rules
//! used by every SIMTAQ crate. Nothing in here talks to the database or the network.

pub mod config;
pub mod credentials;
pub mod error;
pub mod ids;
pub mod models;
pub mod quran;
pub mod status;
pub mod validation;
