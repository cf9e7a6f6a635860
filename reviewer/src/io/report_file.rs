//! Serialized report attachment (`code_review_<ticket>.json`).

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;

use crate::core::types::Report;

const REPORT_SCHEMA: &str = include_str!("../../schemas/report.schema.json");

/// Attachment name for a ticket's report.
pub fn report_filename(ticket_id: &str) -> String {
    format!("code_review_{ticket_id}.json")
}

/// Pretty-printed report JSON with a trailing newline.
///
/// The output is checked against the published report schema before it
/// leaves the process. Equal reports always render to identical bytes.
pub fn render_report_json(report: &Report) -> Result<String> {
    let value = serde_json::to_value(report).context("serialize report")?;
    validate_report(&value)?;
    // Format from the struct so keys keep declaration order.
    let mut buf = serde_json::to_string_pretty(report).context("format report")?;
    buf.push('\n');
    Ok(buf)
}

fn validate_report(report: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(REPORT_SCHEMA).context("parse report schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(report) {
        let messages = compiled
            .iter_errors(report)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "report schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
