//! Barcode extraction from read sequences.
//!
//! [`extract_barcodes`] walks a [`LayoutPlan`] left to right over a read
//! sequence, advancing a cursor segment by segment and recording one matched
//! barcode name (or an empty string) per non-spacer segment. A miss is a
//! first-class outcome, not an error: downstream classification relies on the
//! empty-string sentinel.

use crate::barcodes::BarcodeCatalog;
use crate::layout::{LayoutPlan, SegmentKind};

/// Extracts barcode names from `sequence` according to `plan`.
///
/// Returns exactly one entry per non-spacer segment, in layout order. The
/// `laxity` parameter is the number of extra window start offsets tried for
/// fuzzy segments when the barcode position may have drifted.
#[must_use]
pub fn extract_barcodes(
    sequence: &[u8],
    plan: &LayoutPlan,
    catalog: &BarcodeCatalog,
    laxity: usize,
) -> Vec<String> {
    let mut barcodes = Vec::with_capacity(plan.barcode_segment_count());
    let mut pos = 0usize;

    for segment in plan.segments() {
        match segment.kind {
            SegmentKind::Spacer => {
                pos += segment.max_len;
            }
            SegmentKind::VariableExact => {
                let window = clamp(sequence, pos, segment.max_len);
                // If no length hits, the cursor still advances by max_len.
                // That is observed behavior the rest of the pipeline depends
                // on; see the fallback test below before changing it.
                let mut matched = String::new();
                let mut advance = segment.max_len;
                if let Some(matcher) = catalog.matcher(&segment.category) {
                    for bc_len in segment.min_len..=segment.max_len {
                        let probe = &window[..bc_len.min(window.len())];
                        if let Some(name) = matcher.exact_match(probe) {
                            matched = name.to_string();
                            advance = bc_len;
                            break;
                        }
                    }
                }
                barcodes.push(matched);
                pos += advance;
            }
            SegmentKind::FixedExact => {
                let window = clamp(sequence, pos, segment.max_len);
                let matched = catalog
                    .matcher(&segment.category)
                    .and_then(|m| m.exact_match(window))
                    .unwrap_or("")
                    .to_string();
                barcodes.push(matched);
                pos += segment.max_len;
            }
            SegmentKind::Fuzzy => {
                let window = clamp(sequence, pos, segment.max_len + laxity);
                let mut matched = String::new();
                let mut advance = segment.max_len;
                if let Some(matcher) = catalog.matcher(&segment.category) {
                    for offset in 0..laxity {
                        let probe = &window[offset.min(window.len())..];
                        if let Some(name) = matcher.fuzzy_match(probe) {
                            matched = name.to_string();
                            advance = offset + segment.max_len;
                            break;
                        }
                    }
                }
                barcodes.push(matched);
                pos += advance;
            }
        }
    }

    barcodes
}

/// Slice `[pos, pos + len)` truncated to the sequence bounds.
fn clamp(sequence: &[u8], pos: usize, len: usize) -> &[u8] {
    let start = pos.min(sequence.len());
    let end = (pos + len).min(sequence.len());
    &sequence[start..end]
}
