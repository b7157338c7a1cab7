//! Dev topology generator.
//!
//! Pure functions that merge provider-contributed service definitions with
//! the fixed infra services into a canonical Compose model, a reverse-proxy
//! configuration, a cert request, and a hosts-file request. The generator
//! performs no I/O; [`artifacts`] writes the results to disk.

pub mod artifacts;
pub mod compose;
pub mod traefik;

pub use compose::{ComposeModel, ComposeService, DEV_NETWORK};
pub use traefik::{DynamicConfig, StaticConfig};

use crate::error::TopologyError;
use crate::providers::ServiceDefinition;

use traefik::Route;

/// The synthesized reverse-proxy service name. User-supplied fields for this
/// service are ignored; the generator owns the proxy shape.
pub const PROXY_SERVICE: &str = "proxy";

/// Fixed proxy image.
pub const PROXY_IMAGE: &str = "traefik:v3.1";

/// The computed dev hostnames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domains {
    pub frontend: String,
    pub backend: String,
}

/// Provider-contributed inputs. The backend slot is required; frontend and
/// proxy are optional but enabled by default.
#[derive(Debug, Clone, Default)]
pub struct TopologyInputs {
    pub backend: Option<ServiceDefinition>,
    pub frontend: Option<ServiceDefinition>,
    pub proxy_enabled: bool,
}

/// Hostnames that need local certificates, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertRequest {
    pub hostnames: Vec<String>,
}

/// One hosts-file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsEntry {
    pub hostname: String,
    pub ip: String,
}

/// The full computed dev topology.
#[derive(Debug, Clone)]
pub struct DevTopology {
    pub compose: ComposeModel,
    /// Present when the proxy slot is enabled.
    pub proxy_static: Option<StaticConfig>,
    pub proxy_dynamic: Option<DynamicConfig>,
    pub cert_request: CertRequest,
    pub hosts_request: Vec<HostsEntry>,
}

/// Merge the inputs into a deterministic topology.
///
/// The backend definition is required. Every service joins the
/// `stagecraft-dev` network. When the proxy is enabled its service is
/// synthesized from fixed values, overwriting any user-supplied service of
/// the same name.
pub fn generate(inputs: &TopologyInputs, domains: &Domains) -> Result<DevTopology, TopologyError> {
    let backend = inputs
        .backend
        .as_ref()
        .ok_or(TopologyError::BackendRequired)?;

    let mut compose = ComposeModel::default();
    compose.services.insert(
        backend.name.clone(),
        ComposeService::from_definition(backend),
    );

    if let Some(frontend) = &inputs.frontend {
        compose.services.insert(
            frontend.name.clone(),
            ComposeService::from_definition(frontend),
        );
    }

    let mut proxy_static = None;
    let mut proxy_dynamic = None;
    let mut cert_request = CertRequest::default();
    let mut hosts_request = Vec::new();

    if inputs.proxy_enabled {
        compose
            .services
            .insert(PROXY_SERVICE.to_string(), proxy_service());

        let mut routes = vec![Route {
            name: backend.name.clone(),
            hostname: domains.backend.clone(),
            upstream: format!("{}:{}", backend.name, upstream_port(backend)),
        }];
        if let Some(frontend) = &inputs.frontend {
            routes.push(Route {
                name: frontend.name.clone(),
                hostname: domains.frontend.clone(),
                upstream: format!("{}:{}", frontend.name, upstream_port(frontend)),
            });
        }

        let mut hostnames: Vec<String> = routes.iter().map(|r| r.hostname.clone()).collect();
        hostnames.sort();
        hostnames.dedup();

        hosts_request = hostnames
            .iter()
            .map(|hostname| HostsEntry {
                hostname: hostname.clone(),
                ip: "127.0.0.1".to_string(),
            })
            .collect();
        cert_request = CertRequest { hostnames };

        proxy_static = Some(StaticConfig::fixed());
        proxy_dynamic = Some(DynamicConfig::from_routes(&routes));
    }

    Ok(DevTopology {
        compose,
        proxy_static,
        proxy_dynamic,
        cert_request,
        hosts_request,
    })
}

/// The fixed proxy service shape.
fn proxy_service() -> ComposeService {
    let mut service = ComposeService {
        image: Some(PROXY_IMAGE.to_string()),
        command: Some(format!(
            "--configFile={}/{}",
            traefik::CONTAINER_CONFIG_DIR,
            traefik::STATIC_FILE
        )),
        ports: vec!["80:80/tcp".to_string(), "443:443/tcp".to_string()],
        volumes: vec![
            format!(
                "./{}/{}:{}:ro",
                artifacts::DEV_DIR,
                artifacts::CERTS_DIR,
                traefik::CONTAINER_CERT_DIR
            ),
            format!(
                "./{}/{}:{}:ro",
                artifacts::DEV_DIR,
                artifacts::TRAEFIK_DIR,
                traefik::CONTAINER_CONFIG_DIR
            ),
        ],
        ..Default::default()
    };
    service.join_network(DEV_NETWORK);
    service
}

/// Container port the proxy forwards to: the first published port, or 80.
fn upstream_port(definition: &ServiceDefinition) -> String {
    definition
        .ports
        .first()
        .map(|p| p.container.clone())
        .unwrap_or_else(|| "80".to_string())
}
