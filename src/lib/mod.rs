#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # spritefridge - SPRITE-seq barcode extraction library
//!
//! Core functionality for recognizing structured barcode sequences in
//! paired-end SPRITE-seq reads and routing reads into valid and filtered
//! output streams.
//!
//! ## Modules
//!
//! - **[`barcodes`]** - Barcode table loading and per-category matchers
//! - **[`layout`]** - Read layout parsing into typed segments
//! - **[`extract`]** - The per-read barcode extraction walk
//! - **[`fastq`]** - Paired FASTQ reading with truncation-tolerant semantics
//! - **[`pipeline`]** - Reader/extractor/writer orchestration over bounded queues
//! - **[`sink`]** - Output classification, compression, and statistics
//! - **[`validation`]**, **[`progress`]**, **[`logging`]**, **[`errors`]** - shared utilities

pub mod barcodes;
pub mod errors;
pub mod extract;
pub mod fastq;
pub mod layout;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod sink;
pub mod validation;
