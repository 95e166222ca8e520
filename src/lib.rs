#![forbid(unsafe_code)]

pub mod agent;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod preflight;
pub mod reconcile;
pub mod target;
pub mod utils;
pub mod version;
