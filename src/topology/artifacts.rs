//! On-disk dev artifacts.
//!
//! Everything lands under `.stagecraft/dev/`. Each file is written
//! atomically (pid-suffixed temp + rename); callers must not run concurrent
//! generators against the same directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::traefik::{DYNAMIC_FILE, STATIC_FILE};
use super::DevTopology;

/// Dev artifact root, relative to the project root.
pub const DEV_DIR: &str = ".stagecraft/dev";

/// Generated Compose file name.
pub const COMPOSE_FILE: &str = "docker-compose.yaml";

/// Proxy config directory under [`DEV_DIR`].
pub const TRAEFIK_DIR: &str = "traefik";

/// Cert directory under [`DEV_DIR`], mounted read-only into the proxy.
pub const CERTS_DIR: &str = "certs";

/// Hosts-request file name under [`DEV_DIR`].
pub const HOSTS_FILE: &str = "hosts";

/// Write all topology artifacts under `root/.stagecraft/dev/`.
///
/// Returns the paths written, in a fixed order.
pub fn write_artifacts(root: &Path, topology: &DevTopology) -> Result<Vec<PathBuf>> {
    let dev_dir = root.join(DEV_DIR);
    fs::create_dir_all(dev_dir.join(CERTS_DIR))
        .with_context(|| format!("Failed to create {}", dev_dir.display()))?;

    let mut written = Vec::new();

    let compose_path = dev_dir.join(COMPOSE_FILE);
    atomic_write(&compose_path, &topology.compose.to_yaml())?;
    written.push(compose_path);

    if let (Some(static_config), Some(dynamic_config)) =
        (&topology.proxy_static, &topology.proxy_dynamic)
    {
        let traefik_dir = dev_dir.join(TRAEFIK_DIR);
        fs::create_dir_all(traefik_dir.join("dynamic"))
            .with_context(|| format!("Failed to create {}", traefik_dir.display()))?;

        let static_path = traefik_dir.join(STATIC_FILE);
        atomic_write(&static_path, &static_config.to_yaml())?;
        written.push(static_path);

        // The file provider watches the dynamic directory.
        let dynamic_path = traefik_dir.join("dynamic").join(DYNAMIC_FILE);
        atomic_write(&dynamic_path, &dynamic_config.to_yaml())?;
        written.push(dynamic_path);
    }

    if !topology.hosts_request.is_empty() {
        let mut hosts = String::new();
        for entry in &topology.hosts_request {
            hosts.push_str(&format!("{} {}\n", entry.ip, entry.hostname));
        }
        let hosts_path = dev_dir.join(HOSTS_FILE);
        atomic_write(&hosts_path, &hosts)?;
        written.push(hosts_path);
    }

    Ok(written)
}

/// Write-temp-then-rename in the target's directory, pid in the temp name.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("No file name in {}", path.display()))?
        .to_string_lossy();

    let tmp = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));
    {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        f.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to rename {} to {}", tmp.display(), path.display()))?;

    Ok(())
}
