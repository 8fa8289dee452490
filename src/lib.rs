//! gpgenie: vanity ED25519 OpenPGP key miner (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod analyzer;
pub mod config;
pub mod constants;
pub mod entity;
pub mod env;
pub mod export;
pub mod logging;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod repository;
pub mod scoring;
