//! Core library for the `loadscene` CLI.
//!
//! This crate provides the building blocks used by the binary: the scene
//! catalog and test selector, the per-worker test orchestrator with its
//! authentication lifecycle, API probes, the load driver, metrics
//! aggregation, and report generation. The primary user-facing interface is
//! the `loadscene` command-line application; library APIs may evolve as the
//! CLI grows.
pub mod app;
pub mod args;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod entry;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod shutdown;
pub mod transport;
