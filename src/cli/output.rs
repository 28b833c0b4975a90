//! CLI output: error mapping and text/json formatters.

use crate::debugger::QuerySnapshot;
use crate::error::ApiError;
use crate::instance::QueryResult;
use crate::params::{NamedValues, ParamValue};
use crate::template::QueryTemplate;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::time::Duration;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    e.to_string()
}

/// How a CLI run was scheduled.
pub struct RunSummary {
    pub ticks: usize,
    pub budget: Duration,
    pub elapsed: Duration,
}

fn section_title(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_result_text(result: &QueryResult, summary: &RunSummary) -> String {
    let status = if result.is_success() {
        format!("{:?}", result.status).green().to_string()
    } else {
        format!("{:?}", result.status).red().to_string()
    };
    let mut out = format!(
        "{}\nstatus: {}  option: {}  items: {}  ticks: {} x {}us  elapsed: {:.2}ms\n",
        section_title(&result.query_name),
        status,
        result.option_index,
        result.len(),
        summary.ticks,
        summary.budget.as_micros(),
        summary.elapsed.as_secs_f64() * 1000.0,
    );
    if let Some(ref error) = result.error {
        out.push_str(&format!("error: {}\n", error));
    }
    if result.is_empty() {
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Rank", "Item", "Score"]);
    for (rank, item) in result.items.iter().enumerate() {
        table.add_row(vec![
            rank.to_string(),
            result.describe(rank).unwrap_or_default(),
            format!("{:.4}", item.score),
        ]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_result_json(
    result: &QueryResult,
    summary: &RunSummary,
    snapshot: Option<&QuerySnapshot>,
) -> Result<String, ApiError> {
    let items: Vec<serde_json::Value> = result
        .items
        .iter()
        .enumerate()
        .map(|(rank, item)| {
            let location = result.location(rank).map(<[f32; 3]>::from);
            json!({
                "rank": rank,
                "index": item.index,
                "score": item.score,
                "location": location,
                "description": result.describe(rank),
            })
        })
        .collect();
    let value = json!({
        "query_id": result.query_id,
        "name": result.query_name,
        "status": result.status,
        "option_index": result.option_index,
        "item_type": format!("{:?}", result.item_type),
        "error": result.error.as_ref().map(|e| e.to_string()),
        "ticks": summary.ticks,
        "budget_us": summary.budget.as_micros() as u64,
        "elapsed_ms": summary.elapsed.as_secs_f64() * 1000.0,
        "items": items,
        "debug": snapshot,
    });
    serde_json::to_string_pretty(&value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to encode result: {}", e)))
}

pub fn format_template_summary(template: &QueryTemplate) -> String {
    let mut out = format!(
        "{}\nrun mode: {:?}  parameters: {}\n",
        section_title(template.name()),
        template.run_mode(),
        template.named_params().len(),
    );
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Option", "Step", "Description", "Details"]);
    for (index, option) in template.options().iter().enumerate() {
        table.add_row(vec![
            index.to_string(),
            format!("generator ({:?})", option.generator.item_type()),
            option.generator.describe_title(),
            option.generator.describe_details(),
        ]);
        for (test_index, test) in option.tests.iter().enumerate() {
            table.add_row(vec![
                String::new(),
                format!("test {} ({:?})", test_index, test.cost()),
                test.describe_title(),
                test.describe_details(),
            ]);
        }
    }
    out.push_str(&table.to_string());
    out.push('\n');
    out.push_str(&"ok".green().to_string());
    out
}

pub fn format_params_table(params: &NamedValues) -> String {
    if params.is_empty() {
        return "Template declares no named parameters".dimmed().to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "Kind", "Default"]);
    for value in params.iter() {
        let default = match value.value {
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
        };
        table.add_row(vec![value.name.clone(), format!("{:?}", value.kind()), default]);
    }
    table.to_string()
}
