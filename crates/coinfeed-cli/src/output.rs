use coinfeed_core::{ProviderId, UtcDateTime};
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::commands::CommandResult;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ReportMeta {
    pub provider: ProviderId,
    pub generated_at: UtcDateTime,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Single JSON object written to stdout for every command.
#[derive(Debug, Serialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ReportError>,
}

impl Report {
    pub fn from_result(result: CommandResult) -> Self {
        Self {
            meta: ReportMeta {
                provider: result.provider,
                generated_at: UtcDateTime::now(),
                latency_ms: result.latency_ms,
                warnings: result.warnings,
            },
            data: result.data,
            errors: result.errors,
        }
    }
}

pub fn render(report: &Report, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(report)?
            } else {
                serde_json::to_string(report)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(report)?,
    }

    Ok(())
}

fn render_table(report: &Report) -> Result<(), CliError> {
    println!("provider    : {}", report.meta.provider);
    println!("generated_at: {}", report.meta.generated_at);
    println!("latency_ms  : {}", report.meta.latency_ms);

    if !report.meta.warnings.is_empty() {
        println!("warnings:");
        for warning in &report.meta.warnings {
            println!("  - {warning}");
        }
    }

    println!("data:");
    let pretty_data = serde_json::to_string_pretty(&report.data)?;
    for line in pretty_data.lines() {
        println!("  {line}");
    }

    if !report.errors.is_empty() {
        println!("errors:");
        for error in &report.errors {
            match &error.subject {
                Some(subject) => println!("  - {} [{subject}]: {}", error.code, error.message),
                None => println!("  - {}: {}", error.code, error.message),
            }
        }
    }

    Ok(())
}
