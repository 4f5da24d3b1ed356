//! Decide success / partial / error for a finished invocation

use super::{ExecutionOutcome, Invocation};
use crate::error::ScanError;
use crate::parsers::ParsedOutput;
use crate::records::ScanResult;

const STDERR_TAIL_LINES: usize = 5;

/// Classify an invocation that actually ran.
///
/// Launch failures never reach here; the pipeline maps them straight to an
/// error result. `benign_exit_codes` lists non-zero codes the tool uses for
/// normal completion.
pub fn classify(
    invocation: &Invocation,
    outcome: &ExecutionOutcome,
    parsed: Result<ParsedOutput, ScanError>,
    benign_exit_codes: &[i32],
) -> ScanResult {
    let tool = invocation.tool();
    let (parsed, parse_error) = match parsed {
        Ok(parsed) => (parsed, None),
        Err(e) => (ParsedOutput::default(), Some(e)),
    };
    let ParsedOutput { records, metadata } = parsed;

    let result = if outcome.timed_out {
        let message = ScanError::Timeout {
            tool: tool.to_string(),
            after: invocation.timeout(),
        }
        .to_string();
        if records.is_empty() {
            ScanResult::error(tool, message)
        } else {
            ScanResult::partial(tool, records, message)
        }
    } else if !is_clean_exit(outcome.exit_code, benign_exit_codes) {
        let mut message = exit_message(tool, outcome);
        if records.is_empty() {
            if let Some(e) = parse_error {
                message = format!("{}. {}", message, e);
            }
            ScanResult::error(tool, message)
        } else {
            ScanResult::partial(tool, records, message)
        }
    } else if let Some(e) = parse_error {
        ScanResult::error(tool, e.to_string())
    } else {
        ScanResult::success(tool, records).with_info(outcome.stderr.trim())
    };

    let result = result.with_metadata_map(metadata);
    if outcome.truncated && !result.is_error() {
        result.with_metadata("output_truncated", true)
    } else {
        result
    }
}

fn is_clean_exit(exit_code: Option<i32>, benign: &[i32]) -> bool {
    match exit_code {
        Some(0) => true,
        Some(code) => benign.contains(&code),
        None => false,
    }
}

fn exit_message(tool: &str, outcome: &ExecutionOutcome) -> String {
    let mut message = match outcome.exit_code {
        Some(code) => format!("{} process exited with error code {}", tool, code),
        None => format!("{} process was terminated by a signal", tool),
    };
    let tail = outcome.stderr_tail(STDERR_TAIL_LINES);
    if !tail.is_empty() {
        message.push_str(". Stderr: ");
        message.push_str(&tail);
    }
    message
}
