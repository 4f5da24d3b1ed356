//! Argument vector assembly for external tools

use std::time::Duration;

use uuid::Uuid;

use crate::error::ScanError;

/// A user-supplied flag that would fight with a mandated output flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictRule {
    pattern: &'static str,
    prefix: bool,
    takes_value: bool,
    ignore_case: bool,
}

impl ConflictRule {
    /// Matches any token starting with `pattern` (`-oX` matches `-oX`, `-oXfile`)
    pub const fn prefix(pattern: &'static str) -> Self {
        Self {
            pattern,
            prefix: true,
            takes_value: false,
            ignore_case: false,
        }
    }

    /// Matches `pattern` exactly, or `pattern=value`
    pub const fn exact(pattern: &'static str) -> Self {
        Self {
            pattern,
            prefix: false,
            takes_value: false,
            ignore_case: false,
        }
    }

    /// The flag consumes the following token as its value
    pub const fn with_value(mut self) -> Self {
        self.takes_value = true;
        self
    }

    pub const fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    fn matches(&self, token: &str) -> bool {
        let (token, pattern) = if self.ignore_case {
            (token.to_lowercase(), self.pattern.to_lowercase())
        } else {
            (token.to_string(), self.pattern.to_string())
        };
        if self.prefix {
            token.starts_with(&pattern)
        } else {
            token == pattern || token.starts_with(&format!("{}=", pattern))
        }
    }

    /// Whether a matched token also owns the next token
    fn swallows_next(&self, token: &str) -> bool {
        self.takes_value && !token.contains('=') && token.len() == self.pattern.len()
    }
}

/// Where targets go in the argument vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPlacement {
    /// Each target preceded by a flag (`-u http://a -u http://b`)
    Flag(&'static str),
    /// Bare tokens right after the base command
    Positional,
    /// A single bare token at the very end (for getopt parsers that stop at
    /// the first operand)
    Trailing,
}

/// One fully resolved request to run an external tool. Immutable once built.
#[derive(Debug, Clone)]
pub struct Invocation {
    id: Uuid,
    tool: String,
    targets: Vec<String>,
    options: Vec<String>,
    argv: Vec<String>,
    timeout: Duration,
}

impl Invocation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// User options that survived conflict filtering
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Builds an [`Invocation`].
///
/// Layout: `program base.. targets.. target_args.. options.. mandated..`,
/// except for [`TargetPlacement::Trailing`] where the target comes last.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    id: Uuid,
    tool: String,
    program: String,
    base: Vec<String>,
    targets: Vec<String>,
    placement: TargetPlacement,
    target_required: bool,
    target_label: String,
    target_args: Vec<String>,
    options: Vec<String>,
    mandated: Vec<Vec<String>>,
    conflicts: Vec<ConflictRule>,
    timeout: Duration,
}

impl CommandBuilder {
    pub fn new(tool: impl Into<String>, program: impl Into<String>) -> Self {
        let tool = tool.into();
        Self {
            id: Uuid::new_v4(),
            target_label: "target".to_string(),
            tool,
            program: program.into(),
            base: Vec::new(),
            targets: Vec::new(),
            placement: TargetPlacement::Positional,
            target_required: true,
            target_args: Vec::new(),
            options: Vec::new(),
            mandated: Vec::new(),
            conflicts: Vec::new(),
            timeout: Duration::from_secs(600),
        }
    }

    /// Reuse an id allocated earlier (e.g. for the scratch artifact)
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn base<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn placement(mut self, placement: TargetPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Noun used in the missing-target message ("target URL", "domain", ...)
    pub fn target_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = label.into();
        self
    }

    /// The tool can run without a target
    pub fn target_optional(mut self) -> Self {
        self.target_required = false;
        self
    }

    /// Arguments tied to the target section (e.g. `-w <wordlist>`)
    pub fn target_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    /// Mandated switch appended after user options
    pub fn mandate(mut self, flag: impl Into<String>) -> Self {
        self.mandated.push(vec![flag.into()]);
        self
    }

    /// Mandated flag with a value appended after user options
    pub fn mandate_with(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.mandated.push(vec![flag.into(), value.into()]);
        self
    }

    pub fn conflicts(mut self, rules: &[ConflictRule]) -> Self {
        self.conflicts.extend_from_slice(rules);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the target and produce the final argv
    pub fn build(self) -> Result<Invocation, ScanError> {
        let targets: Vec<String> = self
            .targets
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if self.target_required && targets.is_empty() {
            return Err(ScanError::missing_input(format!(
                "No {} specified for {} scan.",
                self.target_label, self.tool
            )));
        }
        if self.placement == TargetPlacement::Trailing && targets.len() > 1 {
            return Err(ScanError::invalid_input(format!(
                "{} accepts a single {}",
                self.tool, self.target_label
            )));
        }

        let options = self.filter_options();

        let mut argv = vec![self.program.clone()];
        argv.extend(self.base.iter().cloned());
        if self.placement != TargetPlacement::Trailing {
            argv.extend(self.target_tokens(&targets));
        }
        argv.extend(self.target_args.iter().cloned());
        argv.extend(options.iter().cloned());
        argv.extend(self.mandated.iter().flatten().cloned());
        if self.placement == TargetPlacement::Trailing {
            argv.extend(targets.iter().cloned());
        }

        Ok(Invocation {
            id: self.id,
            tool: self.tool,
            targets,
            options,
            argv,
            timeout: self.timeout,
        })
    }

    /// Recover `(targets, options)` from an argv this builder produced.
    ///
    /// Returns `None` when the argv does not have this builder's shape.
    pub fn decompose(&self, argv: &[String]) -> Option<(Vec<String>, Vec<String>)> {
        let (program, rest) = argv.split_first()?;
        if *program != self.program {
            return None;
        }
        let mut rest = rest.strip_prefix(self.base.as_slice())?;

        let mut targets = Vec::new();
        match self.placement {
            TargetPlacement::Flag(flag) => {
                while let [f, value, tail @ ..] = rest {
                    if f != flag {
                        break;
                    }
                    targets.push(value.clone());
                    rest = tail;
                }
            }
            TargetPlacement::Positional => {
                while let [token, tail @ ..] = rest {
                    if token.starts_with('-') {
                        break;
                    }
                    targets.push(token.clone());
                    rest = tail;
                }
            }
            TargetPlacement::Trailing => {
                let (last, init) = rest.split_last()?;
                targets.push(last.clone());
                rest = init;
            }
        }

        let rest = rest.strip_prefix(self.target_args.as_slice())?;
        let mandated: Vec<String> = self.mandated.iter().flatten().cloned().collect();
        let options = rest.strip_suffix(mandated.as_slice())?;

        Some((targets, options.to_vec()))
    }

    fn target_tokens(&self, targets: &[String]) -> Vec<String> {
        match self.placement {
            TargetPlacement::Flag(flag) => targets
                .iter()
                .flat_map(|t| [flag.to_string(), t.clone()])
                .collect(),
            TargetPlacement::Positional | TargetPlacement::Trailing => targets.to_vec(),
        }
    }

    fn filter_options(&self) -> Vec<String> {
        let mandated_switches: Vec<&str> = self
            .mandated
            .iter()
            .filter(|group| group.len() == 1)
            .flatten()
            .map(String::as_str)
            .collect();

        let mut kept = Vec::with_capacity(self.options.len());
        let mut iter = self.options.iter();
        while let Some(opt) = iter.next() {
            if let Some(rule) = self.conflicts.iter().find(|r| r.matches(opt)) {
                tracing::debug!(tool = %self.tool, flag = %opt, "Dropping conflicting option");
                if rule.swallows_next(opt) {
                    iter.next();
                }
                continue;
            }
            if mandated_switches.contains(&opt.as_str()) {
                continue;
            }
            kept.push(opt.clone());
        }
        kept
    }
}
