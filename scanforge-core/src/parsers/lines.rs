use crate::records::{NormalizedRecord, RawOutput};

/// Apply `parse_line` to every non-blank line; lines it rejects are skipped
pub fn parse_lines<F>(text: &str, mut parse_line: F) -> Vec<NormalizedRecord>
where
    F: FnMut(&str) -> Option<NormalizedRecord>,
{
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let record = parse_line(line);
            if record.is_none() {
                tracing::trace!(line, "Skipping unrecognised line");
            }
            record
        })
        .collect()
}

/// Whole stdout as a single record; empty output yields none
pub fn raw_output(text: &str) -> Vec<NormalizedRecord> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    vec![NormalizedRecord::RawOutput(RawOutput {
        content: text.to_string(),
        line_count: text.lines().count(),
    })]
}
