//! Tessera: JSON Schema validated cards behind a sharded response cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
