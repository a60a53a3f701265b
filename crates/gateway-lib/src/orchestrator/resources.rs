//! Orchestrator manifests and their normalized views

use crate::field::{Field, NormalizeError};
use crate::models::{
    CreateDeploymentRequest, CreateServiceRequest, NetworkService, ServicePort, ServiceType,
    TargetPort, WorkloadDeployment,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, PodSpec, PodTemplateSpec, Service, ServicePort as K8sServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

pub(crate) fn default_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

pub(crate) fn default_ports() -> Vec<ServicePort> {
    vec![ServicePort::new(80, 80)]
}

/// One container named after the deployment; labels double as the selector
pub(crate) fn deployment_manifest(request: &CreateDeploymentRequest) -> Deployment {
    let labels = request
        .labels
        .clone()
        .unwrap_or_else(|| default_labels(&request.name));

    Deployment {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(request.namespace().to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(request.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: request.name.clone(),
                        image: Some(request.image.clone()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn service_manifest(request: &CreateServiceRequest) -> Service {
    let ports = request.ports.clone().unwrap_or_else(default_ports);
    let selector = request
        .selector
        .clone()
        .unwrap_or_else(|| default_labels(&request.name));

    Service {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(request.namespace().to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(request.service_type.as_str().to_string()),
            ports: Some(
                ports
                    .iter()
                    .map(|p| K8sServicePort {
                        port: p.port,
                        target_port: Some(match &p.target_port {
                            TargetPort::Number(n) => IntOrString::Int(*n),
                            TargetPort::Name(name) => IntOrString::String(name.clone()),
                        }),
                        ..Default::default()
                    })
                    .collect(),
            ),
            selector: Some(selector),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn normalize_deployment(
    deployment: &Deployment,
    namespace: &str,
) -> Result<WorkloadDeployment, NormalizeError> {
    let meta = &deployment.metadata;
    let name = Field::from_option(meta.name.clone()).required("metadata.name")?;
    let spec = Field::from_option(deployment.spec.as_ref()).required("spec")?;

    let image = match spec
        .template
        .spec
        .as_ref()
        .and_then(|pod| pod.containers.first())
    {
        Some(container) => Field::from_option(container.image.clone()),
        None => Field::Malformed("pod template has no containers".into()),
    }
    .required("spec.template.spec.containers[0].image")?;

    let replicas = match spec.replicas {
        Some(n) if n < 0 => Field::Malformed(format!("negative replica count {n}")),
        other => Field::from_option(other),
    }
    .or("spec.replicas", 1)?;

    Ok(WorkloadDeployment {
        name,
        namespace: meta.namespace.clone().unwrap_or_else(|| namespace.to_string()),
        replicas,
        available_replicas: deployment
            .status
            .as_ref()
            .and_then(|status| status.available_replicas),
        image,
        created_at: meta
            .creation_timestamp
            .as_ref()
            .map(|time| time.0.to_rfc3339()),
        labels: meta.labels.clone().unwrap_or_default(),
    })
}

pub(crate) fn normalize_service(
    service: &Service,
    namespace: &str,
) -> Result<NetworkService, NormalizeError> {
    let meta = &service.metadata;
    let name = Field::from_option(meta.name.clone()).required("metadata.name")?;
    let spec = Field::from_option(service.spec.as_ref()).required("spec")?;

    let service_type = match spec.type_.as_deref() {
        None => Field::Absent,
        Some(raw) => match raw.parse::<ServiceType>() {
            Ok(kind) => Field::Present(kind),
            Err(reason) => Field::Malformed(reason),
        },
    }
    .or("spec.type", ServiceType::ClusterIP)?;

    // Only load balancers get an ingress address
    let external_ip = match service_type {
        ServiceType::LoadBalancer => service
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .and_then(|ingress| ingress.first())
            .and_then(|entry| entry.ip.clone().or_else(|| entry.hostname.clone())),
        _ => None,
    };

    let ports = spec
        .ports
        .iter()
        .flatten()
        .map(|port| ServicePort {
            port: port.port,
            target_port: match &port.target_port {
                Some(IntOrString::Int(n)) => TargetPort::Number(*n),
                Some(IntOrString::String(name)) => TargetPort::Name(name.clone()),
                None => TargetPort::Number(port.port),
            },
        })
        .collect();

    Ok(NetworkService {
        name,
        namespace: meta.namespace.clone().unwrap_or_else(|| namespace.to_string()),
        service_type,
        cluster_ip: spec.cluster_ip.clone(),
        external_ip,
        ports,
        selector: spec.selector.clone().unwrap_or_default(),
    })
}
