//! Container-related CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, Container, ContainerLogs, ContainerStats, MessageResponse};
use crate::output::{
    color_status, format_bytes, format_timestamp, print_json, print_rows, print_success,
    short_id, OutputFormat,
};

/// Row for containers table
#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

impl From<&Container> for ContainerRow {
    fn from(c: &Container) -> Self {
        Self {
            id: short_id(&c.id),
            name: c.name.clone(),
            image: c.image.clone(),
            status: color_status(&c.status),
            ports: format_ports(c),
            created_at: format_timestamp(&c.created_at),
        }
    }
}

/// `0.0.0.0:8080->80/tcp, 443/tcp`
fn format_ports(container: &Container) -> String {
    container
        .ports
        .iter()
        .map(|(spec, bindings)| {
            if bindings.is_empty() {
                return spec.clone();
            }
            bindings
                .iter()
                .map(|b| match &b.host_ip {
                    Some(ip) => format!("{}:{}->{}", ip, b.host_port, spec),
                    None => format!("{}->{}", b.host_port, spec),
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn container_path(id: &str) -> String {
    format!("api/v1/containers/{}", id)
}

/// List all containers
pub async fn list(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let containers: Vec<Container> = client.get("api/v1/containers", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&containers)?,
        OutputFormat::Table => {
            print_rows(
                containers.iter().map(ContainerRow::from).collect(),
                "No containers found",
            );
        }
    }

    Ok(())
}

/// Show one container including its detail fields
pub async fn get(client: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    let container: serde_json::Value = client.get(&container_path(id), &[]).await?;

    match format {
        OutputFormat::Json => print_json(&container)?,
        OutputFormat::Table => {
            let summary: Container = serde_json::from_value(container.clone())?;
            println!("{}", "Container".bold());
            println!("{}", "=".repeat(60));
            println!("ID:      {}", summary.id.cyan());
            println!("Name:    {}", summary.name);
            println!("Image:   {}", summary.image);
            println!("Status:  {}", color_status(&summary.status));
            println!("Ports:   {}", format_ports(&summary));
            println!("Created: {}", format_timestamp(&summary.created_at));

            if let Some(state) = container.get("state").and_then(|s| s.as_object()) {
                if let Some(pid) = state.get("Pid") {
                    println!("PID:     {}", pid);
                }
                if let Some(started) = state.get("StartedAt").and_then(|s| s.as_str()) {
                    println!("Started: {}", format_timestamp(started));
                }
            }
        }
    }

    Ok(())
}

/// Print the tail of a container's output
pub async fn logs(client: &ApiClient, id: &str, tail: usize, format: OutputFormat) -> Result<()> {
    let path = format!("{}/logs", container_path(id));
    let logs: ContainerLogs = client.get(&path, &[("tail", tail.to_string())]).await?;

    match format {
        OutputFormat::Json => print_json(&logs)?,
        OutputFormat::Table => print!("{}", logs.logs),
    }

    Ok(())
}

/// Show a point-in-time resource snapshot
pub async fn stats(client: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    let path = format!("{}/stats", container_path(id));
    let stats: ContainerStats = client.get(&path, &[]).await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            println!("{}", "Container Stats".bold());
            println!("{}", "=".repeat(40));
            println!("Container:   {}", id.cyan());
            println!("CPU (total): {}", stats.cpu_usage);
            println!("Memory:      {}", format_bytes(stats.memory_usage));
            println!("Network RX:  {}", format_bytes(stats.network_rx));
            println!("Network TX:  {}", format_bytes(stats.network_tx));
        }
    }

    Ok(())
}

pub async fn start(client: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    let path = format!("{}/start", container_path(id));
    let response: MessageResponse = client.post(&path).await?;
    report(&response, format)
}

pub async fn stop(client: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    let path = format!("{}/stop", container_path(id));
    let response: MessageResponse = client.post(&path).await?;
    report(&response, format)
}

/// Remove a container; `force` also removes running ones
pub async fn remove(client: &ApiClient, id: &str, force: bool, format: OutputFormat) -> Result<()> {
    let response: MessageResponse = client
        .delete(&container_path(id), &[("force", force.to_string())])
        .await?;
    report(&response, format)
}

pub(crate) fn report(response: &MessageResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(response)?,
        OutputFormat::Table => print_success(&response.message),
    }
    Ok(())
}
