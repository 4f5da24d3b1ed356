//! The generic build → run → parse → classify pipeline

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::{classify, CommandBuilder, ExecutionOutcome, ProcessRunner, ScratchArtifact};
use crate::config::ScanforgeConfig;
use crate::error::ScanError;
use crate::parsers::{OutputShape, ParsedOutput};
use crate::records::{ExecutionSummary, ScanResult};

/// Everything a tool needs to know to lay out its command line
#[derive(Debug)]
pub struct BuildContext<'a> {
    pub id: Uuid,
    pub tool: &'static str,
    pub binary: String,
    pub timeout: Duration,
    /// Configured default wordlist, if any
    pub wordlist: Option<PathBuf>,
    pub artifact: Option<&'a ScratchArtifact>,
}

impl BuildContext<'_> {
    /// A builder preloaded with program, id and timeout
    pub fn command(&self) -> CommandBuilder {
        CommandBuilder::new(self.tool, self.binary.clone())
            .id(self.id)
            .timeout(self.timeout)
    }

    /// Path of the scratch artifact as an argv token
    pub fn artifact_arg(&self) -> Result<String, ScanError> {
        self.artifact.map(ScratchArtifact::arg).ok_or_else(|| {
            ScanError::invalid_input(format!("{} requires an output file", self.tool))
        })
    }

    /// Request wordlist, else configured wordlist, else the tool default
    pub fn wordlist_or(&self, requested: Option<&str>, fallback: &str) -> String {
        requested
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.wordlist
                    .as_ref()
                    .map(|w| w.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[cfg(test)]
impl<'a> BuildContext<'a> {
    pub(crate) fn for_test(tool: &'static str, artifact: Option<&'a ScratchArtifact>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool,
            binary: tool.to_string(),
            timeout: Duration::from_secs(600),
            wordlist: None,
            artifact,
        }
    }
}

/// One external tool: how to call it and how to read what it prints
pub trait ToolSpec: Send + Sync {
    type Request: Send + Sync;

    /// Name used in results, configuration and logs
    fn name(&self) -> &'static str;

    fn default_binary(&self) -> &'static str {
        self.name()
    }

    fn output_shape(&self) -> OutputShape;

    fn timeout(&self, request: &Self::Request) -> Duration;

    /// Checks beyond target presence (file existence, URL shape)
    fn validate(&self, _request: &Self::Request) -> Result<(), ScanError> {
        Ok(())
    }

    /// Suffix for a scratch output file, when the tool writes one
    fn artifact_suffix(&self, _request: &Self::Request) -> Option<&'static str> {
        None
    }

    fn command(
        &self,
        request: &Self::Request,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError>;

    fn parse(
        &self,
        request: &Self::Request,
        outcome: &ExecutionOutcome,
        artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError>;

    /// Non-zero exit codes that still mean normal completion
    fn benign_exit_codes(&self) -> &'static [i32] {
        &[]
    }

    /// Side effects on the classified result, such as saving output the
    /// caller asked to keep. Runs after classification and never changes
    /// the status.
    fn finish(
        &self,
        _request: &Self::Request,
        _outcome: &ExecutionOutcome,
        result: ScanResult,
    ) -> ScanResult {
        result
    }
}

/// Runs [`ToolSpec`]s. Cheap to clone; invocations share nothing mutable.
#[derive(Debug, Clone)]
pub struct ScanEngine {
    config: Arc<ScanforgeConfig>,
    runner: ProcessRunner,
}

impl ScanEngine {
    pub fn new(config: Arc<ScanforgeConfig>) -> Self {
        let runner = ProcessRunner::new(&config.runner);
        Self { config, runner }
    }

    pub fn config(&self) -> &ScanforgeConfig {
        &self.config
    }

    /// Run one request end to end. Never fails: every problem becomes an
    /// error result.
    pub async fn run<T: ToolSpec>(&self, tool: &T, request: &T::Request) -> ScanResult {
        match self.execute(tool, request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = tool.name(), "{}", e);
                ScanResult::error(tool.name(), e.to_string())
            }
        }
    }

    async fn execute<T: ToolSpec>(
        &self,
        tool: &T,
        request: &T::Request,
    ) -> Result<ScanResult, ScanError> {
        tool.validate(request)?;

        let settings = self.config.tool(tool.name());
        let id = Uuid::new_v4();
        let artifact = tool
            .artifact_suffix(request)
            .map(|suffix| ScratchArtifact::create(tool.name(), suffix, id))
            .transpose()?;

        let ctx = BuildContext {
            id,
            tool: tool.name(),
            binary: settings
                .binary
                .unwrap_or_else(|| tool.default_binary().to_string()),
            timeout: settings
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| tool.timeout(request)),
            wordlist: settings.wordlist,
            artifact: artifact.as_ref(),
        };

        let invocation = tool.command(request, &ctx)?.build()?;
        let outcome = self.runner.run(&invocation).await?;
        let parsed = tool.parse(request, &outcome, artifact.as_ref());
        let result = classify(&invocation, &outcome, parsed, tool.benign_exit_codes());
        let result = tool.finish(request, &outcome, result);

        Ok(result.with_execution(ExecutionSummary {
            invocation_id: invocation.id().to_string(),
            argv: invocation.argv().to_vec(),
            exit_code: outcome.exit_code,
            timed_out: outcome.timed_out,
            truncated: outcome.truncated,
            started_at: outcome.started_at,
            duration_ms: outcome.duration.as_millis() as u64,
        }))
    }
}
