//! Instance inspection commands

use anyhow::{Context, Result};
use desirer_lib::{Desirer, Instance, LrpIdentifier};
use serde_json::json;
use tabled::Tabled;

use crate::output::{color_state, format_since, print_json, print_success, print_table, OutputFormat};

/// Row for the instances table
#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "Index")]
    index: u32,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Since")]
    since: String,
    #[tabled(rename = "Placement Error")]
    placement_error: String,
}

impl From<&Instance> for InstanceRow {
    fn from(instance: &Instance) -> Self {
        Self {
            index: instance.index,
            state: color_state(instance.state),
            since: format_since(instance.since),
            placement_error: instance.placement_error.clone().unwrap_or_default(),
        }
    }
}

pub async fn show_instances(
    desirer: &Desirer,
    identifier: &LrpIdentifier,
    format: OutputFormat,
) -> Result<()> {
    let mut instances = desirer
        .get_instances(identifier)
        .await
        .with_context(|| format!("Failed to get instances of LRP {}", identifier))?;
    instances.sort_by_key(|instance| instance.index);

    match format {
        OutputFormat::Json => print_json(&instances)?,
        OutputFormat::Table => {
            let rows: Vec<InstanceRow> = instances.iter().map(InstanceRow::from).collect();
            print_table(rows, "No running instances");
        }
    }

    Ok(())
}

pub async fn stop_instance(
    desirer: &Desirer,
    identifier: &LrpIdentifier,
    index: u32,
    format: OutputFormat,
) -> Result<()> {
    desirer
        .stop_instance(identifier, index)
        .await
        .with_context(|| format!("Failed to stop instance {} of LRP {}", index, identifier))?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "guid": identifier.guid,
            "version": identifier.version,
            "index": index,
            "result": "stopped",
        })),
        OutputFormat::Table => {
            print_success(&format!("Instance {} of LRP {} stopped", index, identifier));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desirer_lib::InstanceState;

    #[test]
    fn test_instance_row() {
        colored::control::set_override(false);
        let row = InstanceRow::from(&Instance {
            index: 2,
            since: 0,
            state: InstanceState::Unclaimed,
            placement_error: Some("Insufficient resources: memory".to_string()),
        });

        assert_eq!(row.index, 2);
        assert_eq!(row.state, "UNCLAIMED");
        assert_eq!(row.since, "-");
        assert_eq!(row.placement_error, "Insufficient resources: memory");
    }
}
