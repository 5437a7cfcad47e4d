//! Coordination-service configuration in property-file syntax.

use std::fmt::Write as _;

use crate::config::ClusterConfig;
use crate::constants;
use crate::layout::ClusterLayout;

/// Build the coordination-service entries, applying optional overrides.
///
/// An override with a default's key replaces it in place; other override
/// keys are appended in key order.
pub fn coordination_entries(
    config: &ClusterConfig,
    layout: &ClusterLayout,
) -> Vec<(String, String)> {
    let mut entries = vec![
        (
            "tickTime".to_string(),
            constants::COORDINATION_TICK_TIME.to_string(),
        ),
        (
            "initLimit".to_string(),
            constants::COORDINATION_INIT_LIMIT.to_string(),
        ),
        (
            "syncLimit".to_string(),
            constants::COORDINATION_SYNC_LIMIT.to_string(),
        ),
        ("clientPort".to_string(), config.coordination_port.to_string()),
        (
            "maxClientCnxns".to_string(),
            constants::COORDINATION_MAX_CLIENT_CONNECTIONS.to_string(),
        ),
        (
            "dataDir".to_string(),
            layout.coordination_data.display().to_string(),
        ),
    ];

    if let Some(overrides) = &config.coordination_config {
        for (key, value) in overrides {
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1.clone_from(value),
                None => entries.push((key.clone(), value.clone())),
            }
        }
    }

    entries
}

/// Render entries as a property file with a single `#` header line.
pub fn render_properties(entries: &[(String, String)], header: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#{header}");
    for (key, value) in entries {
        let _ = writeln!(out, "{}={}", escape(key, true), escape(value, false));
    }
    out
}

/// Escape text the way property-file readers expect.
///
/// Keys escape every space; values only a leading one. Separators and
/// comment markers are backslash-escaped and anything outside printable
/// ASCII becomes `\uXXXX`.
fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for (i, c) in text.chars().enumerate() {
        match c {
            ' ' if i == 0 || is_key => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            },
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04X}");
                }
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn fixture() -> (ClusterConfig, ClusterLayout) {
        let config = ClusterConfig::new("/tmp/x", "test1", "secret").with_coordination_port(2181);
        let layout = ClusterLayout::new(Path::new("/tmp/x")).unwrap();
        (config, layout)
    }

    #[test]
    fn test_default_entries() {
        let (config, layout) = fixture();
        let rendered = render_properties(&coordination_entries(&config, &layout), "header");

        assert_eq!(
            rendered,
            "#header\n\
             tickTime=1000\n\
             initLimit=10\n\
             syncLimit=5\n\
             clientPort=2181\n\
             maxClientCnxns=100\n\
             dataDir=/tmp/x/coordination-service-data\n"
        );
    }

    #[test]
    fn test_overrides_replace_and_append() {
        let (config, layout) = fixture();
        let config = config
            .with_coordination_config("maxClientCnxns", "10")
            .with_coordination_config("autopurge.snapRetainCount", "3");

        let entries = coordination_entries(&config, &layout);

        assert_eq!(entries.len(), 7);
        assert_eq!(entries[4], ("maxClientCnxns".to_string(), "10".to_string()));
        assert_eq!(
            entries[6],
            ("autopurge.snapRetainCount".to_string(), "3".to_string())
        );
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape(r"C:\data dir", false), r"C\:\\data dir");
        assert_eq!(escape(" lead", false), r"\ lead");
        assert_eq!(escape("a=b#c!", false), r"a\=b\#c\!");
        assert_eq!(escape("tab\there", false), r"tab\there");
        assert_eq!(escape("é", false), r"\u00E9");
    }

    #[test]
    fn test_escape_key_spaces() {
        assert_eq!(escape("a b", true), r"a\ b");
        assert_eq!(escape("a b", false), "a b");
    }
}
