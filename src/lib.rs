//! Benchmarking toolkit for de novo peptide sequencing.

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod mass;
pub mod metrics;
pub mod model;
pub mod natsort;
pub mod residues;
pub mod runner;
