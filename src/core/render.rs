//! Renderer module
//!
//! Renders digest reports and fingerprint lists to jsonl, json, md or text

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::core::model::{ArtifactFingerprint, ArtifactKind, DependencyChange, DigestReport};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    #[value(name = "md", alias = "markdown")]
    Markdown,
    Text,
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    /// Create a new render config with pretty option
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// One jsonl line of a digest report
#[derive(Serialize)]
#[serde(tag = "record", rename_all = "lowercase")]
enum ReportLine<'a> {
    Change(&'a DependencyChange),
    Summary {
        changed: bool,
        analyzed: usize,
        #[serde(skip_serializing_if = "no_paths")]
        skipped: &'a [PathBuf],
        #[serde(skip_serializing_if = "is_false")]
        baseline_discarded: bool,
        elapsed_ms: u64,
    },
}

fn no_paths(paths: &&[PathBuf]) -> bool {
    paths.is_empty()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Renderer for digest output
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Create a new renderer with render config
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let result = if self.config.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.unwrap_or_default()
    }

    fn line_separator(&self) -> &'static str {
        if self.config.pretty {
            "\n\n"
        } else {
            "\n"
        }
    }

    /// Render a digest report
    pub fn render_report(&self, report: &DigestReport) -> String {
        match self.config.format {
            OutputFormat::Jsonl => {
                let mut lines: Vec<String> = report
                    .changes
                    .iter()
                    .map(|c| self.to_json(&ReportLine::Change(c)))
                    .collect();
                lines.push(self.to_json(&ReportLine::Summary {
                    changed: report.changed,
                    analyzed: report.analyzed,
                    skipped: &report.skipped,
                    baseline_discarded: report.baseline_discarded,
                    elapsed_ms: report.elapsed_ms,
                }));
                lines.join(self.line_separator())
            }
            OutputFormat::Json => self.to_json(report),
            OutputFormat::Markdown => render_report_md(report),
            OutputFormat::Text => render_report_text(report),
        }
    }

    /// Render a list of fingerprints
    pub fn render_fingerprints(&self, fingerprints: &[ArtifactFingerprint]) -> String {
        match self.config.format {
            OutputFormat::Jsonl => fingerprints
                .iter()
                .map(|fp| self.to_json(fp))
                .collect::<Vec<_>>()
                .join(self.line_separator()),
            OutputFormat::Json => self.to_json(fingerprints),
            OutputFormat::Markdown => {
                let mut output = String::from("## Fingerprints\n\n");
                for fp in fingerprints {
                    output.push_str(&format!("- `{}` {}\n", fp.path().display(), describe(fp)));
                }
                output
            }
            OutputFormat::Text => fingerprints
                .iter()
                .map(|fp| format!("{}  {}", fp.path().display(), describe(fp)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn describe(fp: &ArtifactFingerprint) -> String {
    match fp.kind() {
        ArtifactKind::File => format!(
            "(file, {} bytes, mtime {})",
            fp.size_or_count(),
            fp.timestamp_ms()
        ),
        ArtifactKind::Directory => format!(
            "(directory, {} members, newest {})",
            fp.size_or_count(),
            fp.timestamp_ms()
        ),
    }
}

fn render_report_md(report: &DigestReport) -> String {
    let mut output = String::new();

    output.push_str("## Classpath Digest\n\n");
    output.push_str(&format!(
        "- **changed**: {}\n- **analyzed**: {}\n- **elapsed**: {} ms\n\n",
        report.changed, report.analyzed, report.elapsed_ms
    ));
    if report.baseline_discarded {
        output.push_str("Previous build state was discarded.\n\n");
    }

    if !report.changes.is_empty() {
        output.push_str("## Changes\n\n");
        for change in &report.changes {
            output.push_str(&format!(
                "- {} `{}`\n",
                change.kind.as_str(),
                change.path.display()
            ));
            for detail in &change.details {
                output.push_str(&format!("  - {}\n", detail));
            }
        }
        output.push('\n');
    }

    if !report.skipped.is_empty() {
        output.push_str("## Skipped (absent)\n\n");
        for path in &report.skipped {
            output.push_str(&format!("- `{}`\n", path.display()));
        }
        output.push('\n');
    }

    output
}

fn render_report_text(report: &DigestReport) -> String {
    let mut output = String::new();

    for change in &report.changes {
        output.push_str(&format!(
            "{:>8} {}\n",
            change.kind.as_str().yellow(),
            change.path.display()
        ));
        for detail in &change.details {
            output.push_str(&format!("         {}\n", detail.dimmed()));
        }
    }

    let verdict = if report.changed {
        "changed".red().bold()
    } else {
        "unchanged".green().bold()
    };
    output.push_str(&format!(
        "{} ({} dependencies, {} skipped, {} ms)",
        verdict,
        report.analyzed,
        report.skipped.len(),
        report.elapsed_ms
    ));
    output
}
