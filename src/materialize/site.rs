//! Site configuration consumed by coordinator and worker processes.

use std::fmt::Write as _;
use std::path::Path;

use super::RuntimeEnv;
use crate::config::ClusterConfig;
use crate::constants::{self, site};
use crate::layout::ClusterLayout;

/// Ports allocated for the site config defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SitePorts {
    pub coordinator: u16,
    pub worker: u16,
    pub trace: u16,
}

/// Build the ordered site entries.
///
/// A default is emitted only when its key is absent from the overrides; all
/// overrides follow, unchanged, in key order.
pub fn site_entries(
    config: &ClusterConfig,
    layout: &ClusterLayout,
    env: &RuntimeEnv,
    ports: SitePorts,
) -> Vec<(String, String)> {
    let defaults = [
        (site::STORAGE_URI, "file:///".to_string()),
        (site::STORAGE_DIR, display(&layout.data)),
        (
            site::COORDINATION_HOST,
            format!("localhost:{}", config.coordination_port),
        ),
        (site::SECRET, constants::INSTANCE_SECRET.to_string()),
        (site::COORDINATOR_CLIENT_PORT, ports.coordinator.to_string()),
        (site::WORKER_CLIENT_PORT, ports.worker.to_string()),
        (site::WORKER_PORT_SEARCH, "true".to_string()),
        (site::WALOG_DIR, display(&layout.walog)),
        (site::DATA_CACHE_SIZE, "10M".to_string()),
        (site::INDEX_CACHE_SIZE, "10M".to_string()),
        (site::MAX_MEMORY, "50M".to_string()),
        (site::WALOG_MAX_SIZE, "100M".to_string()),
        (site::NATIVE_MAPS_ENABLED, "false".to_string()),
        (site::TRACE_PASSWORD, config.root_password.clone()),
        (site::TRACE_PORT, ports.trace.to_string()),
        // small memory footprint, so compact more eagerly
        (site::MAJOR_COMPACTION_DELAY, "3".to_string()),
        (site::CLASSPATHS, classpath_globs(env)),
        (site::DYNAMIC_CLASSPATHS, display(&layout.lib)),
    ];

    let mut entries: Vec<(String, String)> = defaults
        .into_iter()
        .filter(|(key, _)| !config.site_config.contains_key(*key))
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    entries.extend(
        config
            .site_config
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    entries
}

/// Library globs for every runtime location that is known.
fn classpath_globs(env: &RuntimeEnv) -> String {
    let mut globs = Vec::new();

    if let Some(home) = &env.home {
        globs.push(format!("{}/lib/[^.].*", home.display()));
        globs.push(format!("{}/lib/ext/[^.].*", home.display()));
    }
    if let Some(coordination) = &env.coordination_home {
        globs.push(format!("{}/[^.].*", coordination.display()));
    }
    if let Some(storage) = &env.storage_home {
        globs.push(format!("{}/[^.].*", storage.display()));
        globs.push(format!("{}/lib/[^.].*", storage.display()));
    }
    if let Some(prefix) = &env.storage_prefix {
        for dir in ["common", "common/lib", "storage", "compute"] {
            globs.push(format!("{}/share/{dir}/[^.].*", prefix.display()));
        }
    }

    globs.join(",")
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Render entries as a `<configuration>` document, one property per line.
pub fn render_site_xml(entries: &[(String, String)]) -> String {
    let mut out = String::from("<configuration>\n");
    for (name, value) in entries {
        let _ = writeln!(
            out,
            "<property><name>{}</name><value>{}</value></property>",
            escape_xml(name),
            escape_xml(value)
        );
    }
    out.push_str("</configuration>\n");
    out
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
