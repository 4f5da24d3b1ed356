//! LinPEAS privilege escalation enumeration

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{deserialize_options, options_schema, strip_ansi, Catalogued, VariantInfo};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ExecutionOutcome, ScratchArtifact, ToolSpec,
};
use crate::parsers::{raw_output, OutputShape, ParsedOutput};
use crate::records::ScanResult;

/// Colour linpeas uses for "95% a privilege escalation vector"
const PE_VECTOR_MARK: &str = "\x1b[1;31;103m";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinpeasRequest {
    /// Path to linpeas.sh; falls back to the configured binary
    #[serde(default)]
    pub script_path: Option<String>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
    /// Where to also save the raw output. Written once the run has been
    /// classified; a failed write is reported as `metadata.save_error`.
    #[serde(default)]
    pub output_file: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Linpeas;

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Look `binary` up the way a shell would, in `search_path`
fn resolve_script(binary: &str, search_path: Option<OsString>) -> Result<PathBuf, ScanError> {
    let cwd = std::env::current_dir().unwrap_or_default();
    which::which_in(binary, search_path, cwd).map_err(|_| ScanError::ToolNotFound {
        tool: "linpeas".to_string(),
        binary: binary.to_string(),
    })
}

impl ToolSpec for Linpeas {
    type Request = LinpeasRequest;

    fn name(&self) -> &'static str {
        "linpeas"
    }

    fn default_binary(&self) -> &'static str {
        "linpeas.sh"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::Raw
    }

    fn timeout(&self, _request: &LinpeasRequest) -> Duration {
        Duration::from_secs(600)
    }

    fn command(
        &self,
        request: &LinpeasRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        let explicit = request
            .script_path
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let script = match explicit {
            Some(path) if is_executable(Path::new(path)) => PathBuf::from(path),
            Some(path) => {
                return Err(ScanError::invalid_input(format!(
                    "LinPEAS script not found at {} or not executable.",
                    path
                )))
            }
            None => resolve_script(&ctx.binary, std::env::var_os("PATH"))?,
        };

        Ok(CommandBuilder::new(ctx.tool, script.to_string_lossy())
            .id(ctx.id)
            .timeout(ctx.timeout)
            .target_optional()
            .options(request.options.iter().cloned()))
    }

    fn parse(
        &self,
        _request: &LinpeasRequest,
        outcome: &ExecutionOutcome,
        _artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        let vectors: Vec<Value> = outcome
            .stdout
            .lines()
            .filter(|line| line.contains(PE_VECTOR_MARK))
            .map(|line| Value::String(strip_ansi(line).trim().to_string()))
            .collect();

        let mut output = ParsedOutput::new(raw_output(&strip_ansi(&outcome.stdout)));
        if !vectors.is_empty() {
            output = output.with_metadata("pe_vectors", Value::Array(vectors));
        }
        Ok(output)
    }

    fn finish(
        &self,
        request: &LinpeasRequest,
        outcome: &ExecutionOutcome,
        result: ScanResult,
    ) -> ScanResult {
        let Some(path) = request.output_file.as_deref().filter(|p| !p.is_empty()) else {
            return result;
        };
        match std::fs::write(path, &outcome.stdout) {
            Ok(()) => result.with_metadata("output_file", path),
            Err(e) => {
                tracing::warn!(path, "Failed to save linpeas output: {}", e);
                result.with_metadata(
                    "save_error",
                    format!("Failed to save LinPEAS output to {}: {}", path, e),
                )
            }
        }
    }
}

impl Catalogued for Linpeas {
    fn description(&self) -> &'static str {
        "Linux local privilege escalation enumeration script"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        vec![VariantInfo::new(
            "run",
            "Run linpeas.sh on the local host and return its full output. Highly likely escalation vectors are listed in metadata.pe_vectors.",
            json!({
                "type": "object",
                "properties": {
                    "script_path": {"type": "string", "description": "Path to an executable linpeas.sh"},
                    "options": options_schema("[\"-s\"]"),
                    "output_file": {"type": "string", "description": "Also save the raw output here"}
                }
            }),
        )]
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::records::NormalizedRecord;
    use std::os::unix::fs::PermissionsExt;

    fn outcome(stdout: &str) -> ExecutionOutcome {
        ExecutionOutcome {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
            timed_out: false,
            truncated: false,
            started_at: chrono::Utc::now(),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_script_must_be_executable() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("linpeas.sh");
        std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();

        let ctx = BuildContext::for_test("linpeas", None);
        let request = LinpeasRequest {
            script_path: Some(script.display().to_string()),
            ..Default::default()
        };
        let err = Linpeas.command(&request, &ctx).unwrap_err();
        assert!(err.to_string().contains("not executable"));

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let inv = Linpeas.command(&request, &ctx).unwrap().build().unwrap();
        assert_eq!(inv.program(), script.display().to_string());
        assert!(inv.targets().is_empty());
    }

    #[test]
    fn test_missing_script() {
        let ctx = BuildContext::for_test("linpeas", None);
        let request = LinpeasRequest {
            script_path: Some("/nonexistent/linpeas.sh".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Linpeas.command(&request, &ctx).unwrap_err(),
            ScanError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_default_binary_is_found_on_path() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("linpeas.sh");
        std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = resolve_script("linpeas.sh", Some(dir.path().as_os_str().to_owned())).unwrap();
        assert_eq!(found, script);
    }

    #[test]
    fn test_default_binary_missing_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            resolve_script("linpeas.sh", Some(dir.path().as_os_str().to_owned())).unwrap_err();
        match err {
            ScanError::ToolNotFound { tool, binary } => {
                assert_eq!(tool, "linpeas");
                assert_eq!(binary, "linpeas.sh");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_configured_binary_resolved_without_script_path() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("peas");
        std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut ctx = BuildContext::for_test("linpeas", None);
        ctx.binary = script.display().to_string();
        let inv = Linpeas
            .command(&LinpeasRequest::default(), &ctx)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(inv.program(), script.display().to_string());

        ctx.binary = "/nonexistent/linpeas.sh".to_string();
        assert!(matches!(
            Linpeas.command(&LinpeasRequest::default(), &ctx).unwrap_err(),
            ScanError::ToolNotFound { .. }
        ));
    }

    #[test]
    fn test_parse_leaves_output_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join("linpeas.txt");
        let stdout = "\x1b[1;33m╔══════════╣ Sudo version\x1b[0m\nSudo version 1.8.31\n\x1b[1;31;103m/usr/bin/pkexec\x1b[0m SUID\n";
        let request = LinpeasRequest {
            output_file: Some(saved.display().to_string()),
            ..Default::default()
        };

        let parsed = Linpeas.parse(&request, &outcome(stdout), None).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let NormalizedRecord::RawOutput(raw) = &parsed.records[0] else {
            panic!("expected raw output");
        };
        assert!(!raw.content.contains('\x1b'));
        assert_eq!(raw.line_count, 3);
        assert_eq!(parsed.metadata["pe_vectors"][0], "/usr/bin/pkexec SUID");
        assert!(!saved.exists());

        let result = Linpeas.finish(
            &request,
            &outcome(stdout),
            ScanResult::success("linpeas", parsed.records),
        );
        assert_eq!(result.metadata()["output_file"], saved.display().to_string());
        assert_eq!(std::fs::read_to_string(&saved).unwrap(), stdout);
    }

    #[test]
    fn test_unwritable_output_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let request = LinpeasRequest {
            output_file: Some(dir.path().join("missing/linpeas.txt").display().to_string()),
            ..Default::default()
        };
        let result = Linpeas.finish(
            &request,
            &outcome("Sudo version 1.8.31\n"),
            ScanResult::success("linpeas", Vec::new()),
        );
        assert_eq!(result.status(), crate::records::ScanStatus::Success);
        assert!(result.metadata()["save_error"]
            .as_str()
            .unwrap()
            .contains("Failed to save LinPEAS output"));
    }

    #[test]
    fn test_empty_output_has_no_records() {
        let parsed = Linpeas
            .parse(&LinpeasRequest::default(), &outcome(""), None)
            .unwrap();
        assert!(parsed.records.is_empty());
    }
}
