//! Declarative compilation configuration: model, multi-format reader, and
//! schema validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{CompilerError, Result};
use crate::transform;

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml)
    Yaml,
    /// TOML format (.toml)
    Toml,
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Toml => write!(f, "toml"),
        }
    }
}

/// Syntax family of a source filter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Adblock-syntax rules.
    #[default]
    Adblock,
    /// `/etc/hosts`-style rules.
    Hosts,
}

/// A single source filter list to compile.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterSource {
    /// Name of the source, used in diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Source URL or local file path.
    #[serde(default)]
    pub source: String,

    /// Syntax family of the source.
    #[serde(default, rename = "type")]
    pub source_type: SourceType,

    /// Source-level transformations.
    #[serde(default)]
    pub transformations: Vec<String>,

    /// Source-level exclusion patterns.
    #[serde(default)]
    pub exclusions: Vec<String>,

    /// URLs/paths of lists of exclusion patterns.
    #[serde(default)]
    pub exclusions_sources: Vec<String>,

    /// Source-level inclusion patterns.
    #[serde(default)]
    pub inclusions: Vec<String>,

    /// URLs/paths of lists of inclusion patterns.
    #[serde(default)]
    pub inclusions_sources: Vec<String>,
}

impl FilterSource {
    /// The source name, falling back to the source URL/path.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.source)
    }
}

/// The full compilation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    /// Name of the compiled filter list.
    #[serde(default)]
    pub name: String,

    /// Description, emitted in the header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Homepage URL, emitted in the header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    /// License identifier, emitted in the header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Version, emitted in the header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Source filter lists, in output order.
    #[serde(default)]
    pub sources: Vec<FilterSource>,

    /// Global transformations.
    #[serde(default)]
    pub transformations: Vec<String>,

    /// Global exclusion patterns.
    #[serde(default)]
    pub exclusions: Vec<String>,

    /// URLs/paths of lists of global exclusion patterns.
    #[serde(default)]
    pub exclusions_sources: Vec<String>,

    /// Global inclusion patterns.
    #[serde(default)]
    pub inclusions: Vec<String>,

    /// URLs/paths of lists of global inclusion patterns.
    #[serde(default)]
    pub inclusions_sources: Vec<String>,

    /// Format the config was read from (not serialized).
    #[serde(skip)]
    pub source_format: Option<ConfigFormat>,

    /// Path the config was read from (not serialized).
    #[serde(skip)]
    pub source_path: Option<String>,
}

/// Detect configuration format from a file extension.
///
/// # Errors
///
/// Returns `ConfigurationInvalid` when the extension is unknown.
pub fn detect_format<P: AsRef<Path>>(file_path: P) -> Result<ConfigFormat> {
    let path = file_path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => Ok(ConfigFormat::Json),
        "yaml" | "yml" => Ok(ConfigFormat::Yaml),
        "toml" => Ok(ConfigFormat::Toml),
        _ => Err(CompilerError::configuration(
            path.display().to_string(),
            vec![format!("unknown configuration extension '{extension}'")],
        )),
    }
}

/// Read, parse, and validate a configuration file.
///
/// # Errors
///
/// Returns `FileNotFound`, a parse error for the detected format, or
/// `ConfigurationInvalid` when schema validation fails.
pub fn read_config<P: AsRef<Path>>(
    config_path: P,
    format: Option<ConfigFormat>,
) -> Result<FilterConfig> {
    let path = config_path.as_ref();

    if !path.exists() {
        return Err(CompilerError::FileNotFound(path.display().to_string()));
    }

    let detected = match format {
        Some(f) => f,
        None => detect_format(path)?,
    };
    let content = fs::read_to_string(path)?;

    let mut config: FilterConfig = match detected {
        ConfigFormat::Json => serde_json::from_str(&content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(&content)?,
        ConfigFormat::Toml => toml::from_str(&content)?,
    };

    config.source_format = Some(detected);
    config.source_path = Some(path.display().to_string());

    validate(&config)?;

    Ok(config)
}

/// Validate a configuration against the schema.
///
/// Unknown transformation names are warnings, not errors; they are skipped
/// at pipeline assembly.
///
/// # Errors
///
/// Returns `ConfigurationInvalid` listing every failed check.
pub fn validate(config: &FilterConfig) -> Result<()> {
    let mut details = Vec::new();

    if config.name.trim().is_empty() {
        details.push("'name' is required".to_string());
    }

    if config.sources.is_empty() {
        details.push("'sources' must contain at least one source".to_string());
    }

    let mut seen_names = HashSet::new();
    for (index, source) in config.sources.iter().enumerate() {
        if source.source.trim().is_empty() {
            details.push(format!("sources[{index}]: 'source' is required"));
        } else if let Err(reason) = validate_location(&source.source) {
            details.push(format!("sources[{index}]: {reason}"));
        }

        if let Some(name) = &source.name {
            if !seen_names.insert(name.clone()) {
                details.push(format!("sources[{index}]: duplicate source name '{name}'"));
            }
        }

        warn_unknown_transformations(&source.transformations, source.display_name());
        for location in source
            .exclusions_sources
            .iter()
            .chain(source.inclusions_sources.iter())
        {
            if let Err(reason) = validate_location(location) {
                details.push(format!("sources[{index}]: {reason}"));
            }
        }
    }

    warn_unknown_transformations(&config.transformations, &config.name);
    for location in config
        .exclusions_sources
        .iter()
        .chain(config.inclusions_sources.iter())
    {
        if let Err(reason) = validate_location(location) {
            details.push(reason);
        }
    }

    if details.is_empty() {
        Ok(())
    } else {
        let path = config
            .source_path
            .clone()
            .unwrap_or_else(|| "<config>".to_string());
        Err(CompilerError::configuration(path, details))
    }
}

/// Check that a source location is a well-formed URL or a plausible path.
fn validate_location(location: &str) -> std::result::Result<(), String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        url::Url::parse(location).map_err(|e| format!("malformed URL '{location}': {e}"))?;
        return Ok(());
    }
    if location.contains("://") {
        return Err(format!("unsupported URL scheme in '{location}'"));
    }
    if location.trim().is_empty() {
        return Err("empty path".to_string());
    }
    Ok(())
}

fn warn_unknown_transformations(names: &[String], owner: &str) {
    for name in names {
        if !transform::is_known_transformation(name) {
            tracing::warn!("Unknown transformation '{}' for '{}' will be skipped", name, owner);
        }
    }
}

/// Convert a configuration to pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json(config: &FilterConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn minimal_config() -> FilterConfig {
        FilterConfig {
            name: "Test List".to_string(),
            sources: vec![FilterSource {
                source: "https://example.org/list.txt".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_format() {
        assert!(matches!(detect_format("c.json"), Ok(ConfigFormat::Json)));
        assert!(matches!(detect_format("c.yaml"), Ok(ConfigFormat::Yaml)));
        assert!(matches!(detect_format("c.yml"), Ok(ConfigFormat::Yaml)));
        assert!(matches!(detect_format("c.toml"), Ok(ConfigFormat::Toml)));
        assert!(detect_format("c.txt").is_err());
    }

    #[test]
    fn test_validate_minimal_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_name() {
        let mut config = minimal_config();
        config.name = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("'name' is required"));
    }

    #[test]
    fn test_validate_empty_sources() {
        let mut config = minimal_config();
        config.sources.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_source_names() {
        let mut config = minimal_config();
        let mut dup = config.sources[0].clone();
        dup.name = Some("one".to_string());
        config.sources[0].name = Some("one".to_string());
        config.sources.push(dup);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate source name"));
    }

    #[test]
    fn test_validate_malformed_url() {
        let mut config = minimal_config();
        config.sources[0].source = "https://".to_string();
        assert!(validate(&config).is_err());

        let mut config = minimal_config();
        config.sources[0].source = "ftp://example.org/list.txt".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_read_json_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"name": "Test", "version": "1.0.0.9",
                "sources": [{{"source": "https://example.org/source1.txt", "type": "adblock"}}]}}"#
        )
        .unwrap();

        let config = read_config(&path, None).unwrap();
        assert_eq!(config.name, "Test");
        assert_eq!(config.version.as_deref(), Some("1.0.0.9"));
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].source_type, SourceType::Adblock);
    }

    #[test]
    fn test_read_yaml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "name: YAML Test\nsources:\n  - source: https://example.org/a.txt\n    type: hosts"
        )
        .unwrap();

        let config = read_config(&path, None).unwrap();
        assert_eq!(config.name, "YAML Test");
        assert_eq!(config.sources[0].source_type, SourceType::Hosts);
    }

    #[test]
    fn test_read_missing_config() {
        assert!(matches!(
            read_config("/nonexistent/config.json", None),
            Err(CompilerError::FileNotFound(_))
        ));
    }
}
