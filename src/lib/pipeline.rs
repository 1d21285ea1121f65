//! Pipeline orchestration: one reader, a pool of extractors, one writer.
//!
//! Stages communicate only through two bounded channels carrying batches of
//! read pairs; back-pressure throttles the reader to match extraction and
//! write throughput. Shutdown is exhaustion-driven: the reader enqueues one
//! empty poison batch per extractor, each extractor forwards its poison to the
//! writer, and the writer stops once it has collected all of them. A failing
//! stage drops its channel endpoints, which unblocks every other stage.

use std::io;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, bounded};
use log::info;

use crate::barcodes::BarcodeCatalog;
use crate::errors::Result;
use crate::extract::extract_barcodes;
use crate::fastq::ReadPair;
use crate::layout::LayoutPlan;
use crate::progress::ProgressTracker;
use crate::sink::{MatchStats, OutputSink};

/// Pairs per queue hand-off. Trades memory for channel overhead.
pub const BATCH_SIZE: usize = 5_000;

/// Immutable matching context shared read-only by all extractor threads.
pub struct MatchContext {
    pub catalog: BarcodeCatalog,
    pub plan1: LayoutPlan,
    pub plan2: LayoutPlan,
    pub laxity: usize,
}

impl MatchContext {
    /// Runs extraction over both mates and attaches the concatenated barcode
    /// list, read1 segments first.
    fn extract_pair(&self, pair: &mut ReadPair) {
        let mut barcodes =
            extract_barcodes(&pair.r1.sequence, &self.plan1, &self.catalog, self.laxity);
        barcodes.extend(extract_barcodes(
            &pair.r2.sequence,
            &self.plan2,
            &self.catalog,
            self.laxity,
        ));
        pair.barcodes = barcodes;
    }
}

/// The extraction pipeline, parameterized by a total worker budget.
///
/// A budget of 1 runs everything inline on the calling thread. A larger
/// budget runs the reader on the calling thread, `max(budget - 2, 1)`
/// extractor threads, and one writer thread.
pub struct Pipeline {
    context: Arc<MatchContext>,
    processes: usize,
}

impl Pipeline {
    #[must_use]
    pub fn new(context: MatchContext, processes: usize) -> Self {
        Self { context: Arc::new(context), processes: processes.max(1) }
    }

    /// Extractor pool size: the budget minus the reader and writer, floor 1.
    #[must_use]
    pub fn extractor_count(&self) -> usize {
        self.processes.saturating_sub(2).max(1)
    }

    /// Drives all pairs from `pairs` through extraction into `sink` and
    /// returns the accumulated statistics.
    ///
    /// # Errors
    ///
    /// Returns the first input or output error; channel disconnection unwinds
    /// the other stages so none blocks forever.
    pub fn run(
        &self,
        pairs: impl Iterator<Item = io::Result<ReadPair>>,
        sink: OutputSink,
    ) -> Result<MatchStats> {
        if self.processes <= 1 {
            self.run_inline(pairs, sink)
        } else {
            self.run_threaded(pairs, sink)
        }
    }

    /// Single-threaded path: read, match, and write interleaved per batch.
    fn run_inline(
        &self,
        pairs: impl Iterator<Item = io::Result<ReadPair>>,
        mut sink: OutputSink,
    ) -> Result<MatchStats> {
        info!("running inline with a single worker");
        let progress = ProgressTracker::new("Processed pairs");
        let mut pairs = pairs.peekable();
        while pairs.peek().is_some() {
            let mut batch = Vec::with_capacity(BATCH_SIZE);
            for pair in pairs.by_ref().take(BATCH_SIZE) {
                batch.push(pair?);
            }
            let count = batch.len() as u64;
            for mut pair in batch {
                self.context.extract_pair(&mut pair);
                sink.write_pair(pair)?;
            }
            progress.record(count);
        }
        progress.log_final();
        sink.finish()
    }

    /// Threaded path: reader on the calling thread, extractor pool, writer.
    fn run_threaded(
        &self,
        pairs: impl Iterator<Item = io::Result<ReadPair>>,
        sink: OutputSink,
    ) -> Result<MatchStats> {
        let extractors = self.extractor_count();
        info!("running with 1 reader, {extractors} extractor thread(s), 1 writer");
        let (batch_tx, batch_rx) = bounded::<Vec<ReadPair>>(extractors * 2);
        let (out_tx, out_rx) = bounded::<Vec<ReadPair>>(extractors * 2);

        std::thread::scope(|scope| {
            let mut extractor_handles = Vec::with_capacity(extractors);
            for _ in 0..extractors {
                let rx = batch_rx.clone();
                let tx = out_tx.clone();
                let context = Arc::clone(&self.context);
                extractor_handles.push(scope.spawn(move || extractor_loop(&context, &rx, &tx)));
            }
            // Only the spawned threads hold these ends now, so disconnection
            // tracks thread shutdown.
            drop(batch_rx);
            drop(out_tx);

            let writer_handle = scope.spawn(move || writer_loop(&out_rx, sink, extractors));

            let reader_result = reader_loop(pairs, &batch_tx, extractors);
            drop(batch_tx);

            for handle in extractor_handles {
                join(handle);
            }
            let writer_result = join(writer_handle);

            // The writer's error is the one worth reporting when both ends
            // failed from the same disconnection.
            match (writer_result, reader_result) {
                (Err(e), _) => Err(e),
                (Ok(_), Err(e)) => Err(e),
                (Ok(stats), Ok(())) => Ok(stats),
            }
        })
    }
}

/// Unwraps a scoped join, re-raising a child panic on the calling thread.
fn join<T>(handle: std::thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Reader role: batch pairs onto the input queue, then poison each extractor.
fn reader_loop(
    pairs: impl Iterator<Item = io::Result<ReadPair>>,
    tx: &Sender<Vec<ReadPair>>,
    extractors: usize,
) -> Result<()> {
    info!("starting reader");
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    for pair in pairs {
        batch.push(pair?);
        if batch.len() == BATCH_SIZE {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
            if tx.send(full).is_err() {
                // Downstream failed; its error is reported by the writer.
                return Ok(());
            }
        }
    }
    if !batch.is_empty() && tx.send(batch).is_err() {
        return Ok(());
    }
    info!("input exhausted, signaling {extractors} extractor(s) to shut down");
    for _ in 0..extractors {
        if tx.send(Vec::new()).is_err() {
            return Ok(());
        }
    }
    Ok(())
}

/// Extractor role: match every pair of every batch, forwarding poison batches
/// downstream as its own shutdown signal.
fn extractor_loop(
    context: &MatchContext,
    rx: &Receiver<Vec<ReadPair>>,
    tx: &Sender<Vec<ReadPair>>,
) {
    info!("starting extractor");
    loop {
        match rx.recv() {
            Ok(batch) if batch.is_empty() => {
                let _ = tx.send(batch);
                break;
            }
            Ok(mut batch) => {
                for pair in &mut batch {
                    context.extract_pair(pair);
                }
                if tx.send(batch).is_err() {
                    return;
                }
            }
            Err(_) => {
                // Reader went away without poisoning; poison the writer so it
                // can still terminate.
                let _ = tx.send(Vec::new());
                return;
            }
        }
    }
    info!("received shutdown signal, stopping extractor");
}

/// Writer role: classify, annotate, compress, append, and count, until one
/// poison batch per extractor has arrived; then flush the stats file.
fn writer_loop(
    rx: &Receiver<Vec<ReadPair>>,
    mut sink: OutputSink,
    extractors: usize,
) -> Result<MatchStats> {
    info!("starting writer");
    let progress = ProgressTracker::new("Processed pairs");
    let mut poisons = 0;
    while poisons < extractors {
        let Ok(batch) = rx.recv() else {
            break;
        };
        if batch.is_empty() {
            poisons += 1;
            continue;
        }
        let count = batch.len() as u64;
        for pair in batch {
            sink.write_pair(pair)?;
        }
        progress.record(count);
    }
    progress.log_final();
    info!("all pairs processed, shutting down writer");
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcodes::{BarcodeCatalog, BarcodeEntry};
    use crate::fastq::ReadRecord;
    use crate::layout::LayoutPlan;
    use crate::sink::OutputPaths;
    use ahash::AHashMap;
    use flate2::read::MultiGzDecoder;
    use std::fs::File;
    use std::io::Read;
    use std::path::Path;
    use tempfile::TempDir;

    fn context() -> MatchContext {
        let entries = vec![
            BarcodeEntry {
                category: "DPM".to_string(),
                name: "dpm1".to_string(),
                sequence: b"GGGG".to_vec(),
            },
            BarcodeEntry {
                category: "ODD".to_string(),
                name: "odd1".to_string(),
                sequence: b"ACGT".to_vec(),
            },
        ];
        let budgets: AHashMap<String, usize> =
            [("DPM", 0), ("ODD", 1)].iter().map(|(c, m)| ((*c).to_string(), *m)).collect();
        let catalog = BarcodeCatalog::build(&entries, &budgets, 6).unwrap();
        let plan1 = LayoutPlan::parse("DPM", &catalog).unwrap();
        let plan2 = LayoutPlan::parse("ODD", &catalog).unwrap();
        MatchContext { catalog, plan1, plan2, laxity: 6 }
    }

    fn record(name: &str, seq: &str) -> ReadRecord {
        ReadRecord {
            name: name.as_bytes().to_vec(),
            sequence: seq.as_bytes().to_vec(),
            separator: b"+".to_vec(),
            quality: vec![b'I'; seq.len()],
        }
    }

    fn pairs(n: usize) -> Vec<io::Result<ReadPair>> {
        (0..n)
            .map(|i| {
                // Every third pair misses on read2.
                let r2_seq = if i % 3 == 0 { "TTTTTTTTTT" } else { "ACGTAAAAAA" };
                Ok(ReadPair {
                    r1: record(&format!("@q{i}"), "GGGGAAAAAA"),
                    r2: record(&format!("@q{i}"), r2_seq),
                    barcodes: Vec::new(),
                })
            })
            .collect()
    }

    fn decompress(path: &Path) -> String {
        let mut out = String::new();
        MultiGzDecoder::new(File::open(path).unwrap()).read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_extractor_count_derivation() {
        let ctx = context();
        assert_eq!(Pipeline::new(ctx, 4).extractor_count(), 2);
        let ctx = context();
        assert_eq!(Pipeline::new(ctx, 2).extractor_count(), 1);
        let ctx = context();
        assert_eq!(Pipeline::new(ctx, 0).extractor_count(), 1);
    }

    #[test]
    fn test_inline_run_classifies_and_counts() {
        let tmp = TempDir::new().unwrap();
        let paths = OutputPaths::from_prefix(&tmp.path().join("out"), true, false);
        let sink = OutputSink::create(&paths).unwrap();
        let pipeline = Pipeline::new(context(), 1);
        let stats = pipeline.run(pairs(9).into_iter(), sink).unwrap();

        // Pairs 0, 3, 6 miss on read2.
        assert_eq!(stats.total(), 9);
        assert_eq!(stats.valid(), 6);
        assert_eq!(stats.filtered(), 3);
        let valid = decompress(&paths.valid_r1);
        assert_eq!(valid.matches("[dpm1|odd1\n").count(), 6);
        let filtered = decompress(paths.filtered_r1.as_ref().unwrap());
        assert_eq!(filtered.matches("[dpm1|\n").count(), 3);
    }

    #[test]
    fn test_threaded_run_matches_inline_results() {
        let tmp = TempDir::new().unwrap();
        let paths = OutputPaths::from_prefix(&tmp.path().join("out"), false, false);
        let sink = OutputSink::create(&paths).unwrap();
        let pipeline = Pipeline::new(context(), 4);
        let stats = pipeline.run(pairs(1000).into_iter(), sink).unwrap();

        assert_eq!(stats.total(), 1000);
        assert_eq!(stats.valid() + stats.filtered(), 1000);
        assert_eq!(stats.buckets().iter().sum::<u64>(), 1000);
        // 0, 3, 6, ... miss: 334 of 1000.
        assert_eq!(stats.filtered(), 334);
        let valid = decompress(&paths.valid_r1);
        assert_eq!(valid.matches("[dpm1|odd1\n").count(), 666);
    }

    #[test]
    fn test_threaded_run_with_empty_input() {
        let tmp = TempDir::new().unwrap();
        let paths = OutputPaths::from_prefix(&tmp.path().join("out"), false, false);
        let sink = OutputSink::create(&paths).unwrap();
        let pipeline = Pipeline::new(context(), 3);
        let stats = pipeline.run(pairs(0).into_iter(), sink).unwrap();
        assert_eq!(stats.total(), 0);
        assert_eq!(std::fs::read_to_string(&paths.stats).unwrap(), "");
    }

    #[test]
    fn test_reader_error_propagates_inline() {
        let tmp = TempDir::new().unwrap();
        let paths = OutputPaths::from_prefix(&tmp.path().join("out"), false, false);
        let sink = OutputSink::create(&paths).unwrap();
        let pipeline = Pipeline::new(context(), 1);
        let input = vec![Err(io::Error::new(io::ErrorKind::InvalidData, "bad gzip stream"))];
        let err = pipeline.run(input.into_iter(), sink).unwrap_err();
        assert!(err.to_string().contains("bad gzip stream"));
    }

    #[test]
    fn test_reader_error_propagates_threaded() {
        let tmp = TempDir::new().unwrap();
        let paths = OutputPaths::from_prefix(&tmp.path().join("out"), false, false);
        let sink = OutputSink::create(&paths).unwrap();
        let pipeline = Pipeline::new(context(), 4);
        let mut input = pairs(10);
        input.push(Err(io::Error::new(io::ErrorKind::InvalidData, "bad gzip stream")));
        let err = pipeline.run(input.into_iter(), sink).unwrap_err();
        assert!(err.to_string().contains("bad gzip stream"));
    }

    #[test]
    fn test_batch_boundary_exact_multiple() {
        // Exactly one full batch plus poison handling.
        let tmp = TempDir::new().unwrap();
        let paths = OutputPaths::from_prefix(&tmp.path().join("out"), false, false);
        let sink = OutputSink::create(&paths).unwrap();
        let pipeline = Pipeline::new(context(), 2);
        let stats = pipeline.run(pairs(BATCH_SIZE).into_iter(), sink).unwrap();
        assert_eq!(stats.total(), BATCH_SIZE as u64);
    }
}
