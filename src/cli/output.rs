//! Output formatting utilities for the CLI.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use console::{style, StyledObject};
use serde::Serialize;

use crate::domain::models::constraint::Severity;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Borderless table with upper-cased headers.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Render a table under a count line, or a "none found" line when empty.
pub fn render_list(entity_name: &str, table: &Table, total: usize) -> String {
    if total == 0 {
        return format!("No {entity_name}s found.");
    }
    let noun = if total == 1 {
        entity_name.to_string()
    } else {
        format!("{entity_name}s")
    };
    format!("{} {noun}:\n{table}", style(total).bold())
}

pub fn severity_style(severity: Severity) -> StyledObject<String> {
    match severity {
        Severity::Critical => style(severity.to_string()).red().bold(),
        Severity::Warning => style(severity.to_string()).yellow(),
    }
}

pub fn pass_fail(pass: bool) -> StyledObject<&'static str> {
    if pass {
        style("PASS").green().bold()
    } else {
        style("FAIL").red().bold()
    }
}

/// Format an optional number with fixed precision, `-` when absent.
pub fn opt_num(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_list_counts() {
        let mut table = list_table(&["id", "value"]);
        assert_eq!(render_list("hook", &table, 0), "No hooks found.");
        table.add_row(vec!["a", "1"]);
        let rendered = render_list("hook", &table, 1);
        assert!(rendered.contains("hook:"));
        assert!(rendered.contains("ID"));
    }

    #[test]
    fn test_opt_num() {
        assert_eq!(opt_num(Some(7.256), 2), "7.26");
        assert_eq!(opt_num(None, 2), "-");
    }
}
