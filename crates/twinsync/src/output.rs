//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders snapshots in the format selected by `--output`. Table uses
//! `tabled`, structured formats use serde, plain emits one
//! `thing feature value` line per feature.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use twinsync_core::{ConnectionState, Snapshot};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Snapshot rendering ───────────────────────────────────────────────

#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Thing")]
    thing: String,
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

fn feature_rows(snapshot: &Snapshot) -> Vec<FeatureRow> {
    let mut rows = Vec::new();
    for (id, features) in snapshot.iter() {
        if features.is_empty() {
            rows.push(FeatureRow {
                thing: id.to_string(),
                feature: "-".into(),
                value: "-".into(),
                updated: "-".into(),
            });
            continue;
        }
        let mut entries: Vec<_> = features.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (name, feature) in entries {
            rows.push(FeatureRow {
                thing: id.to_string(),
                feature: name.clone(),
                value: feature.value.to_string(),
                updated: feature
                    .last_update()
                    .map_or_else(|| "-".into(), |ts| ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            });
        }
    }
    rows
}

fn render_plain(snapshot: &Snapshot) -> String {
    feature_rows(snapshot)
        .into_iter()
        .filter(|row| row.feature != "-")
        .map(|row| format!("{} {} {}", row.thing, row.feature, row.value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_table(snapshot: &Snapshot) -> String {
    let header = format!(
        "snapshot v{} · {} twin(s)",
        snapshot.version(),
        snapshot.len()
    );
    if snapshot.is_empty() {
        return header;
    }
    let table = Table::new(feature_rows(snapshot))
        .with(Style::rounded())
        .to_string();
    format!("{header}\n{table}")
}

/// Render a snapshot in the chosen format.
pub fn render_snapshot(format: OutputFormat, snapshot: &Snapshot) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(render_table(snapshot)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(snapshot)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(snapshot)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(snapshot)?),
        OutputFormat::Plain => Ok(render_plain(snapshot)),
    }
}

/// One-line connection state report.
pub fn render_state(state: ConnectionState, color: bool) -> String {
    let label = state.to_string();
    if !color {
        return format!("● {label}");
    }
    match state {
        ConnectionState::Connected => format!("{} {}", "●".green(), label.green()),
        ConnectionState::Connecting => format!("{} {}", "●".yellow(), label.yellow()),
        ConnectionState::Disconnected => format!("{} {}", "●".red(), label.red()),
        ConnectionState::Idle | ConnectionState::Stopped => {
            format!("{} {}", "●".dimmed(), label.dimmed())
        }
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use twinsync_core::{FeatureMap, FeatureValue, StateStore, ThingId};

    fn sample() -> Arc<Snapshot> {
        let store = StateStore::new();
        let mut features = FeatureMap::new();
        features.insert("temperature".into(), FeatureValue::new(21.5));
        store.publish(
            [
                (ThingId::from("a/sensor"), Arc::new(features)),
                (ThingId::from("b/sensor"), Arc::new(FeatureMap::new())),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn plain_lists_one_line_per_feature() {
        let out = render_snapshot(OutputFormat::Plain, &sample()).unwrap();
        assert_eq!(out, "a/sensor temperature 21.5");
    }

    #[test]
    fn table_includes_twins_without_features() {
        let out = render_snapshot(OutputFormat::Table, &sample()).unwrap();
        assert!(out.starts_with("snapshot v1 · 2 twin(s)"));
        assert!(out.contains("temperature"));
        assert!(out.contains("b/sensor"));
    }

    #[test]
    fn json_carries_things_and_version() {
        let out = render_snapshot(OutputFormat::JsonCompact, &sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["things"]["a/sensor"]["temperature"]["value"], 21.5);
    }

    #[test]
    fn state_without_color_is_plain_text() {
        assert_eq!(render_state(ConnectionState::Connected, false), "● connected");
    }
}
