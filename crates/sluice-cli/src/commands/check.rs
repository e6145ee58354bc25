//! `sluice check`: load a configuration file and report problems.

use anyhow::{Context, Result};
use sluice_core::{AuditOutput, SluiceConfig};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Configuration section, e.g. "guardrails".
    pub section: &'static str,
    pub message: String,
}

impl CheckFinding {
    fn error(section: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            section,
            message: message.into(),
        }
    }

    fn warning(section: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            section,
            message: message.into(),
        }
    }
}

pub fn run(config_path: &Path) -> Result<()> {
    let config = SluiceConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;

    let findings = check(&config);
    for finding in &findings {
        println!("  {} [{}]: {}", finding.severity, finding.section, finding.message);
    }

    let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();
    if errors > 0 {
        anyhow::bail!("Configuration has {} error(s)", errors);
    }
    println!("{}: ok ({} warning(s))", config_path.display(), findings.len());
    Ok(())
}

/// Validation errors plus settings that are legal but usually unintended.
pub fn check(config: &SluiceConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    if let Err(e) = config.validate() {
        findings.push(CheckFinding::error("config", e.to_string()));
    }
    if config.privileged.is_none() {
        findings.push(CheckFinding::warning(
            "privileged",
            "no privileged connection; existence probes run as the upstream login and may be hidden by row policies",
        ));
    }
    if config.guardrails.allow_unfiltered_mutations {
        findings.push(CheckFinding::warning(
            "guardrails",
            "allow_unfiltered_mutations permits UPDATE/DELETE without a filter",
        ));
    }
    if config.guardrails.default_limit > config.guardrails.max_rows_per_query {
        findings.push(CheckFinding::warning(
            "guardrails",
            format!(
                "default_limit {} exceeds max_rows_per_query {} and will be clamped",
                config.guardrails.default_limit, config.guardrails.max_rows_per_query
            ),
        ));
    }
    if !config.audit.enabled || config.audit.output == AuditOutput::None {
        findings.push(CheckFinding::warning("audit", "policy violations will not be recorded"));
    }

    findings.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.section.cmp(b.section)));
    findings
}
