//! Listing output
//!
//! Two human-readable views:
//! - levels: every directory in the chain that has its own variables,
//!   with only the variables set on that directory
//! - merged: one table of the effective environment and where each value
//!   came from
//!
//! Both have JSON counterparts for `list --json`.

use crate::merge::EffectiveEnvironment;
use crate::resolve::AncestorChain;

/// Message shown when there is nothing to list
pub const NOTHING_SET: &str = "No variables set in this environment";

/// Render the per-directory breakdown of a chain
pub fn render_levels(chain: &AncestorChain) -> String {
    let mut output = String::new();

    for (path, vars) in chain.present() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(path);
        output.push('\n');

        if vars.is_empty() {
            output.push_str("  (empty)\n");
        }
        for (name, value) in vars {
            output.push_str(&format!("  {} : {}\n", name, escape(value)));
        }
    }

    if output.is_empty() {
        output.push_str(NOTHING_SET);
        output.push('\n');
    }
    output
}

/// Render the merged environment as a table
pub fn render_merged(env: &EffectiveEnvironment) -> String {
    if env.is_empty() {
        return format!("{}\n", NOTHING_SET);
    }

    let rows: Vec<[String; 3]> = env
        .iter()
        .map(|(name, value, origin)| [name.to_string(), escape(value), origin.to_string()])
        .collect();

    let header = ["Variable", "Value", "Set in"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    push_row(&mut output, &header.map(String::from), &widths);
    push_row(&mut output, &widths.map(|w| "-".repeat(w)), &widths);
    for row in &rows {
        push_row(&mut output, row, &widths);
    }
    output
}

fn push_row(output: &mut String, cells: &[String; 3], widths: &[usize; 3]) {
    let line = format!(
        "{:<w0$}  {:<w1$}  {}",
        cells[0],
        cells[1],
        cells[2],
        w0 = widths[0],
        w1 = widths[1],
    );
    output.push_str(line.trim_end());
    output.push('\n');
}

/// Keep one variable per line in listings
fn escape(value: &str) -> String {
    value.replace('\r', "\\r").replace('\n', "\\n")
}

/// JSON view of the chain levels that have their own variables
pub fn levels_to_json(chain: &AncestorChain) -> Result<String, serde_json::Error> {
    let levels: Vec<serde_json::Value> = chain
        .present()
        .map(|(path, vars)| serde_json::json!({ "path": path, "vars": vars }))
        .collect();
    serde_json::to_string_pretty(&levels)
}

/// JSON view of the merged environment
pub fn merged_to_json(env: &EffectiveEnvironment) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(env)
}
