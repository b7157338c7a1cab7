//! Canonical Compose model and its deterministic serializer.
//!
//! The generator owns all formatting. Rendering discipline, total and
//! documented:
//!
//! - top-level keys: `services`, then `networks`
//! - services sorted lexicographically by name
//! - per-service keys in fixed order: image, build, command, ports,
//!   environment, volumes, labels, depends_on, networks
//! - ports always double-quoted `"host:container/proto"`
//! - environment and label maps sorted by key, values double-quoted
//! - volumes as `source:target[:ro]` strings
//! - depends_on and networks lists sorted lexicographically
//!
//! Identical inputs yield byte-identical YAML.

use std::collections::BTreeMap;

use crate::providers::ServiceDefinition;

/// The dev network every service joins.
pub const DEV_NETWORK: &str = "stagecraft-dev";

/// One rendered Compose service. Only declared fields are emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeService {
    pub image: Option<String>,
    pub build: Option<String>,
    pub command: Option<String>,
    /// Rendered `host:container/proto` strings.
    pub ports: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub depends_on: Vec<String>,
    pub networks: Vec<String>,
}

impl ComposeService {
    /// Build a service entry from a provider-contributed definition,
    /// carrying over only the declared fields and joining the dev network.
    pub fn from_definition(definition: &ServiceDefinition) -> Self {
        let mut service = Self {
            image: definition.image.clone(),
            build: definition.build.clone(),
            command: definition.command.clone(),
            ports: definition
                .ports
                .iter()
                .map(|p| format!("{}:{}/{}", p.host, p.container, p.protocol))
                .collect(),
            environment: definition.env.clone(),
            volumes: definition.volumes.clone(),
            labels: definition.labels.clone(),
            depends_on: definition.depends_on.clone(),
            networks: Vec::new(),
        };
        service.depends_on.sort();
        service.depends_on.dedup();
        service.join_network(DEV_NETWORK);
        service
    }

    /// Append a network, keeping the list sorted and deduplicated.
    pub fn join_network(&mut self, network: &str) {
        if !self.networks.iter().any(|n| n == network) {
            self.networks.push(network.to_string());
            self.networks.sort();
        }
    }
}

/// The whole Compose document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeModel {
    pub services: BTreeMap<String, ComposeService>,
}

impl ComposeModel {
    /// Render the document. Deterministic by construction.
    pub fn to_yaml(&self) -> String {
        let mut out = String::new();

        out.push_str("services:\n");
        for (name, service) in &self.services {
            out.push_str("  ");
            out.push_str(&scalar(name));
            out.push_str(":\n");
            render_service(&mut out, service);
        }

        out.push_str("networks:\n");
        out.push_str("  ");
        out.push_str(DEV_NETWORK);
        out.push_str(": {}\n");

        out
    }
}

fn render_service(out: &mut String, service: &ComposeService) {
    if let Some(image) = &service.image {
        out.push_str(&format!("    image: {}\n", scalar(image)));
    }
    if let Some(build) = &service.build {
        out.push_str(&format!("    build: {}\n", scalar(build)));
    }
    if let Some(command) = &service.command {
        out.push_str(&format!("    command: {}\n", scalar(command)));
    }
    if !service.ports.is_empty() {
        out.push_str("    ports:\n");
        for port in &service.ports {
            out.push_str(&format!("      - {}\n", quoted(port)));
        }
    }
    if !service.environment.is_empty() {
        out.push_str("    environment:\n");
        for (key, value) in &service.environment {
            out.push_str(&format!("      {}: {}\n", scalar(key), quoted(value)));
        }
    }
    if !service.volumes.is_empty() {
        out.push_str("    volumes:\n");
        for volume in &service.volumes {
            out.push_str(&format!("      - {}\n", scalar(volume)));
        }
    }
    if !service.labels.is_empty() {
        out.push_str("    labels:\n");
        for (key, value) in &service.labels {
            out.push_str(&format!("      {}: {}\n", scalar(key), quoted(value)));
        }
    }
    if !service.depends_on.is_empty() {
        out.push_str("    depends_on:\n");
        for dep in &service.depends_on {
            out.push_str(&format!("      - {}\n", scalar(dep)));
        }
    }
    if !service.networks.is_empty() {
        out.push_str("    networks:\n");
        for network in &service.networks {
            out.push_str(&format!("      - {}\n", scalar(network)));
        }
    }
}

/// Emit a plain scalar when unambiguous, a double-quoted one otherwise.
fn scalar(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@".contains(c))
        && !matches!(value, "true" | "false" | "null" | "yes" | "no" | "~")
        && value.parse::<f64>().is_err();
    if plain {
        value.to_string()
    } else {
        quoted(value)
    }
}

/// Always double-quoted, with escapes.
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
