//! CLI command implementations for spritefridge.
//!
//! Each submodule implements one subcommand; [`extractbc`] is the barcode
//! extraction engine for raw SPRITE-seq paired-end reads.

#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod extractbc;
