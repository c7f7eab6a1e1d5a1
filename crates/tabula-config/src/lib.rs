//! # Tabula Config
//!
//! Configuration management for Tabula.
//! Supports layered configuration from TOML files, a `.env` file,
//! environment variables, and runtime reload.

mod app_config;
mod loader;

pub use app_config::*;
pub use loader::*;
