//! LRP lifecycle commands

use anyhow::{Context, Result};
use colored::Colorize;
use desirer_lib::{Desirer, Lrp, LrpIdentifier};
use std::path::Path;
use tabled::Tabled;

use crate::output::{format_memory, print_json, print_success, print_table, OutputFormat};

/// Row for the LRP table
#[derive(Tabled)]
struct LrpRow {
    #[tabled(rename = "GUID")]
    guid: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "App")]
    app: String,
    #[tabled(rename = "Space")]
    space: String,
    #[tabled(rename = "Instances")]
    instances: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Image")]
    image: String,
}

impl From<&Lrp> for LrpRow {
    fn from(lrp: &Lrp) -> Self {
        Self {
            guid: lrp.identifier.guid.clone(),
            version: lrp.identifier.version.clone(),
            app: lrp.app_name.clone(),
            space: lrp.space_name.clone(),
            instances: format!("{}/{}", lrp.running_instances, lrp.target_instances),
            memory: format_memory(lrp.memory_mb),
            image: lrp.image.clone(),
        }
    }
}

/// Read an LRP definition from a JSON file
pub fn read_lrp(path: &Path) -> Result<Lrp> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_lrp(&content).with_context(|| format!("Invalid LRP definition in {}", path.display()))
}

fn parse_lrp(content: &str) -> Result<Lrp> {
    Ok(serde_json::from_str(content)?)
}

fn print_ack(identifier: &LrpIdentifier, verb: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "guid": identifier.guid,
            "version": identifier.version,
            "result": verb,
        })),
        OutputFormat::Table => {
            print_success(&format!("LRP {} {}", identifier.to_string().cyan(), verb));
            Ok(())
        }
    }
}

pub async fn desire(desirer: &Desirer, lrp: &Lrp, format: OutputFormat) -> Result<()> {
    desirer
        .desire(lrp)
        .await
        .with_context(|| format!("Failed to desire LRP {}", lrp.identifier))?;
    print_ack(&lrp.identifier, "desired", format)
}

pub async fn update(desirer: &Desirer, lrp: &Lrp, format: OutputFormat) -> Result<()> {
    desirer
        .update(lrp)
        .await
        .with_context(|| format!("Failed to update LRP {}", lrp.identifier))?;
    print_ack(&lrp.identifier, "updated", format)
}

pub async fn list(desirer: &Desirer, format: OutputFormat) -> Result<()> {
    let lrps = desirer.list().await.context("Failed to list LRPs")?;

    match format {
        OutputFormat::Json => print_json(&lrps)?,
        OutputFormat::Table => {
            let rows: Vec<LrpRow> = lrps.iter().map(LrpRow::from).collect();
            print_table(rows, "No LRPs found");
            if !lrps.is_empty() {
                println!("\nTotal: {} LRPs", lrps.len());
            }
        }
    }

    Ok(())
}

pub async fn get(desirer: &Desirer, identifier: &LrpIdentifier, format: OutputFormat) -> Result<()> {
    let lrp = desirer
        .get(identifier)
        .await
        .with_context(|| format!("Failed to get LRP {}", identifier))?;

    match format {
        OutputFormat::Json => print_json(&lrp)?,
        OutputFormat::Table => {
            println!("{}", format!("LRP {}", identifier).bold());
            println!("{}", "=".repeat(50));
            println!("App:                    {}", lrp.app_name.cyan());
            println!("Space:                  {}", lrp.space_name);
            println!("Image:                  {}", lrp.image);
            println!(
                "Instances:              {}/{}",
                lrp.running_instances, lrp.target_instances
            );
            println!("Memory:                 {}", format_memory(lrp.memory_mb));
            println!("CPU weight:             {}m", lrp.cpu_weight);

            if !lrp.ports.is_empty() {
                let ports: Vec<String> = lrp.ports.iter().map(i32::to_string).collect();
                println!("Ports:                  {}", ports.join(", "));
            }

            if !lrp.metadata.is_empty() {
                println!();
                println!("{}", "Metadata".bold());
                println!("{}", "-".repeat(50));
                for (key, value) in &lrp.metadata {
                    println!("{:<24}{}", format!("{}:", key), value.dimmed());
                }
            }
        }
    }

    Ok(())
}

pub async fn stop(desirer: &Desirer, identifier: &LrpIdentifier, format: OutputFormat) -> Result<()> {
    desirer
        .stop(identifier)
        .await
        .with_context(|| format!("Failed to stop LRP {}", identifier))?;
    print_ack(identifier, "stopped", format)
}
