//! Deployment and service CLI commands

use anyhow::Result;
use tabled::Tabled;

use super::containers::report;
use crate::client::{ApiClient, Deployment, MessageResponse, ModeResponse, Service, ServicePort};
use crate::output::{format_timestamp, print_info, print_json, print_rows, OutputFormat};

/// Row for deployments table
#[derive(Tabled)]
struct DeploymentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

/// Row for services table
#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Type")]
    service_type: String,
    #[tabled(rename = "Cluster IP")]
    cluster_ip: String,
    #[tabled(rename = "External IP")]
    external_ip: String,
    #[tabled(rename = "Ports")]
    ports: String,
}

fn namespace_query(namespace: &Option<String>) -> Vec<(&'static str, String)> {
    namespace
        .iter()
        .map(|ns| ("namespace", ns.clone()))
        .collect()
}

fn format_service_ports(ports: &[ServicePort]) -> String {
    ports
        .iter()
        .map(|p| match &p.target_port {
            serde_json::Value::String(name) => format!("{}->{}", p.port, name),
            other => format!("{}->{}", p.port, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Say so when the gateway answers from canned data
async fn announce_simulated(client: &ApiClient) -> Result<()> {
    let mode: ModeResponse = client.get("api/v1/kubernetes/mode", &[]).await?;
    if mode.mode == "simulated" {
        print_info("Gateway has no cluster connection; showing simulated data");
    }
    Ok(())
}

/// List deployments in a namespace
pub async fn list_deployments(
    client: &ApiClient,
    namespace: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let deployments: Vec<Deployment> = client
        .get("api/v1/kubernetes/deployments", &namespace_query(&namespace))
        .await?;

    match format {
        OutputFormat::Json => print_json(&deployments)?,
        OutputFormat::Table => {
            announce_simulated(client).await?;
            let rows = deployments
                .iter()
                .map(|d| DeploymentRow {
                    name: d.name.clone(),
                    namespace: d.namespace.clone(),
                    ready: format!(
                        "{}/{}",
                        d.available_replicas.unwrap_or(0),
                        d.replicas
                    ),
                    image: d.image.clone(),
                    created_at: d
                        .created_at
                        .as_deref()
                        .map(format_timestamp)
                        .unwrap_or_default(),
                })
                .collect();
            print_rows(rows, "No deployments found");
        }
    }

    Ok(())
}

/// Set the desired replica count of a deployment
pub async fn scale_deployment(
    client: &ApiClient,
    name: &str,
    replicas: i32,
    namespace: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut query = namespace_query(&namespace);
    query.push(("replicas", replicas.to_string()));

    let path = format!("api/v1/kubernetes/deployments/{}/scale", name);
    let response: MessageResponse = client.put(&path, &query).await?;
    report(&response, format)
}

pub async fn delete_deployment(
    client: &ApiClient,
    name: &str,
    namespace: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/kubernetes/deployments/{}", name);
    let response: MessageResponse = client.delete(&path, &namespace_query(&namespace)).await?;
    report(&response, format)
}

/// List services in a namespace
pub async fn list_services(
    client: &ApiClient,
    namespace: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let services: Vec<Service> = client
        .get("api/v1/kubernetes/services", &namespace_query(&namespace))
        .await?;

    match format {
        OutputFormat::Json => print_json(&services)?,
        OutputFormat::Table => {
            announce_simulated(client).await?;
            let rows = services
                .iter()
                .map(|s| ServiceRow {
                    name: s.name.clone(),
                    namespace: s.namespace.clone(),
                    service_type: s.service_type.clone(),
                    cluster_ip: s.cluster_ip.clone().unwrap_or_else(|| "-".into()),
                    external_ip: s.external_ip.clone().unwrap_or_else(|| "<none>".into()),
                    ports: format_service_ports(&s.ports),
                })
                .collect();
            print_rows(rows, "No services found");
        }
    }

    Ok(())
}
