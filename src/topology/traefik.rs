//! Reverse-proxy configuration.
//!
//! Two files under `.stagecraft/dev/traefik/`: a static config selecting the
//! entrypoints and the file-based dynamic provider (with watch), and a
//! dynamic config enumerating routers, services, and TLS certificates.
//! Routers and certificates are keyed/sorted by name so identical inputs
//! yield byte-identical YAML.

use std::collections::BTreeMap;

use serde::Serialize;

/// Fixed filename of the static config.
pub const STATIC_FILE: &str = "traefik.yaml";

/// Fixed filename of the dynamic config.
pub const DYNAMIC_FILE: &str = "dynamic.yaml";

/// Where the proxy container sees its config tree.
pub const CONTAINER_CONFIG_DIR: &str = "/etc/traefik";

/// Where the proxy container sees the cert directory.
pub const CONTAINER_CERT_DIR: &str = "/certs";

/// Static entrypoint/provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticConfig {
    #[serde(rename = "entryPoints")]
    pub entry_points: BTreeMap<String, EntryPoint>,
    pub providers: Providers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Providers {
    pub file: FileProvider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileProvider {
    pub directory: String,
    pub watch: bool,
}

impl StaticConfig {
    /// The fixed static config: web on 80, websecure on 443, file provider
    /// with dynamic reloading.
    pub fn fixed() -> Self {
        let mut entry_points = BTreeMap::new();
        entry_points.insert(
            "web".to_string(),
            EntryPoint {
                address: ":80".to_string(),
            },
        );
        entry_points.insert(
            "websecure".to_string(),
            EntryPoint {
                address: ":443".to_string(),
            },
        );

        Self {
            entry_points,
            providers: Providers {
                file: FileProvider {
                    directory: format!("{}/dynamic", CONTAINER_CONFIG_DIR),
                    watch: true,
                },
            },
        }
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).expect("static proxy config serialization is infallible")
    }
}

/// One HTTPS route: a hostname terminated at the proxy and forwarded to a
/// Compose service port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Router and upstream service name.
    pub name: String,
    /// Hostname the router matches.
    pub hostname: String,
    /// Upstream `service:port` target on the dev network.
    pub upstream: String,
}

/// Dynamic router/service/TLS configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicConfig {
    pub http: HttpSection,
    pub tls: TlsSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpSection {
    pub routers: BTreeMap<String, Router>,
    pub services: BTreeMap<String, LbService>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Router {
    pub rule: String,
    pub service: String,
    #[serde(rename = "entryPoints")]
    pub entry_points: Vec<String>,
    pub tls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LbService {
    #[serde(rename = "loadBalancer")]
    pub load_balancer: LoadBalancer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancer {
    pub servers: Vec<ServerUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsSection {
    pub certificates: Vec<Certificate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    #[serde(rename = "certFile")]
    pub cert_file: String,
    #[serde(rename = "keyFile")]
    pub key_file: String,
}

impl DynamicConfig {
    /// Build the dynamic config from routes. Certificates are one pair per
    /// hostname, sorted by hostname.
    pub fn from_routes(routes: &[Route]) -> Self {
        let mut routers = BTreeMap::new();
        let mut services = BTreeMap::new();
        let mut hostnames: Vec<&str> = routes.iter().map(|r| r.hostname.as_str()).collect();
        hostnames.sort_unstable();
        hostnames.dedup();

        for route in routes {
            routers.insert(
                route.name.clone(),
                Router {
                    rule: format!("Host(`{}`)", route.hostname),
                    service: route.name.clone(),
                    entry_points: vec!["websecure".to_string()],
                    tls: true,
                },
            );
            services.insert(
                route.name.clone(),
                LbService {
                    load_balancer: LoadBalancer {
                        servers: vec![ServerUrl {
                            url: format!("http://{}", route.upstream),
                        }],
                    },
                },
            );
        }

        let certificates = hostnames
            .iter()
            .map(|host| Certificate {
                cert_file: format!("{}/{}.pem", CONTAINER_CERT_DIR, host),
                key_file: format!("{}/{}-key.pem", CONTAINER_CERT_DIR, host),
            })
            .collect();

        Self {
            http: HttpSection { routers, services },
            tls: TlsSection { certificates },
        }
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).expect("dynamic proxy config serialization is infallible")
    }
}
