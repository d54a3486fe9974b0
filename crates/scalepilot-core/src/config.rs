//! Flat configuration map decoding.
//!
//! The orchestrator passes a single `String → String` map to every call.
//! Keys this crate does not know about are ignored since the same map also
//! carries cluster and policy settings.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Blueprint, PROVENANCE_TAGS, PostCreateOptions, Zone};

/// The flat configuration map supplied by the orchestrator.
pub type ConfigMap = HashMap<String, String>;

/// Default Scaleway API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";

/// Credentials and defaults for the provider client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub access_key: String,
    pub secret_key: String,
    pub organization_id: String,
    pub project_id: String,
    pub region: String,
    pub zone: Option<Zone>,
    pub api_url: String,
}

impl ProviderConfig {
    /// Decode from the map, falling back to `SCW_*` environment variables.
    pub fn from_config(config: &ConfigMap) -> ConfigResult<Self> {
        Self::from_config_with(config, |key| std::env::var(key).ok())
    }

    /// Decode from the map with an explicit fallback lookup.
    pub fn from_config_with(
        config: &ConfigMap,
        fallback: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let value = |key: &str, env: &str| {
            non_empty(config, key)
                .map(str::to_string)
                .or_else(|| fallback(env).filter(|v| !v.is_empty()))
                .unwrap_or_default()
        };

        let zone = value("zone", "SCW_DEFAULT_ZONE");
        let zone = if zone.is_empty() {
            None
        } else {
            Some(zone.parse()?)
        };

        Ok(Self {
            access_key: value("access_key", "SCW_ACCESS_KEY"),
            secret_key: value("secret_key", "SCW_SECRET_KEY"),
            organization_id: value("organization_id", "SCW_DEFAULT_ORGANIZATION_ID"),
            project_id: value("project_id", "SCW_DEFAULT_PROJECT_ID"),
            region: value("region", "SCW_DEFAULT_REGION"),
            zone,
            api_url: non_empty(config, "api_url")
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

impl Blueprint {
    /// Decode a blueprint from the map. `zone` is required.
    ///
    /// The provenance tags are always placed ahead of the configured tags.
    pub fn from_config(config: &ConfigMap) -> ConfigResult<Self> {
        let zone = non_empty(config, "zone")
            .ok_or_else(|| ConfigError::Missing("zone".to_string()))?
            .parse()?;

        let mut tags: Vec<String> = PROVENANCE_TAGS.iter().map(|t| t.to_string()).collect();
        if let Some(raw) = config.get("tags") {
            tags.extend(split_list(raw));
        }

        Ok(Self {
            name: config.get("name").cloned().unwrap_or_default(),
            zone: Some(zone),
            commercial_type: config.get("commercial_type").cloned().unwrap_or_default(),
            tags,
            image: non_empty(config, "image").map(str::to_string),
            security_group: non_empty(config, "security_group").map(str::to_string),
            placement_group: non_empty(config, "placement_group").map(str::to_string),
            dynamic_ip: parse_bool(config, "dynamic_ip")?,
            enable_ipv6: parse_bool(config, "enable_ipv6")?,
        })
    }
}

impl PostCreateOptions {
    /// Decode post-create options. File-backed values are read here.
    pub fn from_config(config: &ConfigMap) -> ConfigResult<Self> {
        let user_data = match config.get("user_data") {
            Some(raw) => Some(parse_user_data(raw)?),
            None => None,
        };
        Ok(Self { user_data })
    }
}

/// Load a flat map from a TOML file whose top-level values are scalars.
///
/// Arrays of scalars are joined with commas so `tags = ["a", "b"]` decodes
/// the same as `tags = "a,b"`.
pub fn load_file(path: &Path) -> ConfigResult<ConfigMap> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml(&content)
}

/// Parse TOML text into a flat map.
pub fn parse_toml(content: &str) -> ConfigResult<ConfigMap> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let mut config = ConfigMap::new();
    for (key, value) in table {
        let flat = match &value {
            toml::Value::Array(items) => items
                .iter()
                .map(|item| scalar(&key, item))
                .collect::<ConfigResult<Vec<_>>>()?
                .join(","),
            other => scalar(&key, other)?,
        };
        config.insert(key, flat);
    }
    Ok(config)
}

/// Apply `key=value` overrides on top of an existing map.
pub fn apply_assignments(config: &mut ConfigMap, assignments: &[String]) -> ConfigResult<()> {
    for assignment in assignments {
        let (key, value) = assignment
            .split_once('=')
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ConfigError::Assignment(assignment.clone()))?;
        config.insert(key.to_string(), value.to_string());
    }
    Ok(())
}

fn scalar(key: &str, value: &toml::Value) -> ConfigResult<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            Err(ConfigError::NotScalar(key.to_string()))
        }
    }
}

fn non_empty<'a>(config: &'a ConfigMap, key: &str) -> Option<&'a str> {
    config.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn parse_bool(config: &ConfigMap, key: &str) -> ConfigResult<bool> {
    match config.get(key).map(String::as_str) {
        None => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',').filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parse `k=v` pairs separated by commas or newlines.
///
/// The whole value may name a file holding the pairs, and each pair value
/// may name a file whose contents become the value.
fn parse_user_data(raw: &str) -> ConfigResult<BTreeMap<String, String>> {
    let text = file_or_literal(raw)?;
    let mut data = BTreeMap::new();
    for line in text.split([',', '\n']) {
        if let Some((key, value)) = line.split_once('=') {
            data.insert(key.to_string(), file_or_literal(value)?);
        }
    }
    Ok(data)
}

/// Contents of the file at `text` if it exists, otherwise `text` itself.
fn file_or_literal(text: &str) -> ConfigResult<String> {
    let path = PathBuf::from(text);
    if !std::fs::metadata(&path).is_ok_and(|m| m.is_file()) {
        return Ok(text.to_string());
    }
    std::fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn map(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn blueprint_decodes_all_fields() {
        let config = map(&[
            ("name", "worker"),
            ("zone", "nl-ams-1"),
            ("commercial_type", "DEV1-S"),
            ("tags", "web,edge"),
            ("image", "bd0565d0-3e72-4ce2-b3b9-9d14df67ec2e"),
            ("security_group", "9aada4ae-7933-43e1-963d-adf066fdeb8b"),
            ("dynamic_ip", "true"),
            ("enable_ipv6", "false"),
        ]);

        let bp = Blueprint::from_config(&config).unwrap();
        assert_eq!(bp.name, "worker");
        assert_eq!(bp.zone.unwrap().as_str(), "nl-ams-1");
        assert_eq!(bp.commercial_type, "DEV1-S");
        assert_eq!(bp.tags, vec!["nomad", "client", "autoscaler", "web", "edge"]);
        assert_eq!(bp.image.as_deref(), Some("bd0565d0-3e72-4ce2-b3b9-9d14df67ec2e"));
        assert!(bp.security_group.is_some());
        assert!(bp.placement_group.is_none());
        assert!(bp.dynamic_ip);
        assert!(!bp.enable_ipv6);
    }

    #[test]
    fn blueprint_always_carries_provenance_tags() {
        let bp = Blueprint::from_config(&map(&[("zone", "fr-par-1")])).unwrap();
        assert_eq!(bp.tags, vec!["nomad", "client", "autoscaler"]);
    }

    #[test]
    fn blueprint_requires_zone() {
        let err = Blueprint::from_config(&map(&[("name", "worker")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(key) if key == "zone"));
    }

    #[test]
    fn blueprint_rejects_bad_boolean() {
        let err = Blueprint::from_config(&map(&[("zone", "fr-par-1"), ("dynamic_ip", "yes")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { .. }));
    }

    #[test]
    fn user_data_literal_pairs() {
        let opts = PostCreateOptions::from_config(&map(&[("user_data", "foo=bar,hello=world")]))
            .unwrap();
        let data = opts.user_data.unwrap();
        assert_eq!(data.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(data.get("hello").map(String::as_str), Some("world"));
    }

    #[test]
    fn user_data_absent_is_none() {
        let opts = PostCreateOptions::from_config(&ConfigMap::new()).unwrap();
        assert!(opts.is_empty());
    }

    #[test]
    fn user_data_values_can_come_from_files() {
        let mut script = tempfile::NamedTempFile::new().unwrap();
        write!(script, "#!/bin/sh\necho hi\n").unwrap();
        let raw = format!("cloud-init={}", script.path().display());

        let opts = PostCreateOptions::from_config(&map(&[("user_data", &raw)])).unwrap();
        let data = opts.user_data.unwrap();
        assert_eq!(data.get("cloud-init").map(String::as_str), Some("#!/bin/sh\necho hi\n"));
    }

    #[test]
    fn user_data_pairs_can_come_from_a_file() {
        let mut pairs = tempfile::NamedTempFile::new().unwrap();
        write!(pairs, "role=worker\npool=default\n").unwrap();
        let raw = pairs.path().display().to_string();

        let opts = PostCreateOptions::from_config(&map(&[("user_data", &raw)])).unwrap();
        let data = opts.user_data.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.get("pool").map(String::as_str), Some("default"));
    }

    #[test]
    fn provider_config_falls_back_to_env() {
        let config = map(&[("access_key", "SCWXXX"), ("zone", "nl-ams-1")]);
        let pc = ProviderConfig::from_config_with(&config, |key| match key {
            "SCW_SECRET_KEY" => Some("secret".to_string()),
            "SCW_ACCESS_KEY" => Some("ignored".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(pc.access_key, "SCWXXX");
        assert_eq!(pc.secret_key, "secret");
        assert_eq!(pc.zone.unwrap().as_str(), "nl-ams-1");
        assert_eq!(pc.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn parse_toml_flattens_scalars_and_lists() {
        let config = parse_toml(
            r#"
zone = "fr-par-1"
dynamic_ip = true
tags = ["web", "edge"]
per_host = 3
"#,
        )
        .unwrap();

        assert_eq!(config["zone"], "fr-par-1");
        assert_eq!(config["dynamic_ip"], "true");
        assert_eq!(config["tags"], "web,edge");
        assert_eq!(config["per_host"], "3");
    }

    #[test]
    fn parse_toml_rejects_nested_tables() {
        let err = parse_toml("[nested]\nkey = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::NotScalar(key) if key == "nested"));
    }

    #[test]
    fn assignments_override_file_values() {
        let mut config = map(&[("zone", "fr-par-1")]);
        apply_assignments(&mut config, &["zone=nl-ams-1".to_string(), "name=a=b".to_string()])
            .unwrap();
        assert_eq!(config["zone"], "nl-ams-1");
        assert_eq!(config["name"], "a=b");

        let err = apply_assignments(&mut config, &["novalue".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::Assignment(_)));
    }
}
