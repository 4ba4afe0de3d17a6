// crates/core/src/ranges.rs
//! Page range expression parser for the extract operation.
//!
//! Grammar: comma-separated segments, each either a single 1-based page
//! number or a `start-end` span; an empty end means "through the last page".
//! Segments must be strictly ascending with no page reused, and a span that
//! ends on the last page closes the expression.

use serde::{Deserialize, Serialize};

use crate::error::OpError;

/// Inclusive 1-based page span. `end >= start` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }

    /// The 1-based page numbers covered by this span, in order.
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

/// Parse a range expression against a source of `page_count` pages.
pub fn parse_page_ranges(expr: &str, page_count: u32) -> Result<Vec<PageRange>, OpError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(OpError::invalid_input("page range expression is empty"));
    }
    if page_count == 0 {
        return Err(OpError::invalid_input("source document has no pages"));
    }

    let segments: Vec<&str> = expr.split(',').collect();
    let mut ranges = Vec::with_capacity(segments.len());
    let mut last_end = 0u32;

    for (i, segment) in segments.iter().enumerate() {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(OpError::invalid_input(
                "page range expression contains an empty segment",
            ));
        }

        let range = parse_segment(segment, page_count)?;

        // Strictly ascending also rules out any page reuse across segments.
        if range.start <= last_end {
            return Err(OpError::invalid_input(format!(
                "page ranges must be strictly ascending (segment {segment:?} overlaps or \
                 repeats an earlier page)"
            )));
        }
        last_end = range.end;

        if range.end == page_count && i != segments.len() - 1 {
            return Err(OpError::invalid_input(
                "no further segments may follow a range ending on the last page",
            ));
        }

        ranges.push(range);
    }

    Ok(ranges)
}

fn parse_segment(segment: &str, page_count: u32) -> Result<PageRange, OpError> {
    if let Some((start_raw, end_raw)) = segment.split_once('-') {
        let start = parse_page_number(start_raw, "range start")?;
        let end = if end_raw.trim().is_empty() {
            // An open end must widen the span; starting on the last page
            // would be a disguised single-page segment.
            if start == page_count {
                return Err(OpError::invalid_input(format!(
                    "open-ended range {segment:?} must start before page {page_count}"
                )));
            }
            page_count
        } else {
            parse_page_number(end_raw, "range end")?
        };
        if start < 1 || end < start || end > page_count {
            return Err(OpError::invalid_input(format!(
                "range {segment:?} is outside the document's 1-{page_count} page span"
            )));
        }
        Ok(PageRange { start, end })
    } else {
        let page = parse_page_number(segment, "page number")?;
        if page < 1 || page > page_count {
            return Err(OpError::invalid_input(format!(
                "page {page} is outside the document's 1-{page_count} page span"
            )));
        }
        Ok(PageRange {
            start: page,
            end: page,
        })
    }
}

fn parse_page_number(raw: &str, what: &str) -> Result<u32, OpError> {
    raw.trim()
        .parse()
        .map_err(|_| OpError::invalid_input(format!("{what} {raw:?} is not a whole number")))
}
