//! Configuration constants and the per-source configuration value.
//!
//! A configuration file lists general settings and one entry per harvester:
//!
//! ```yaml
//! General:
//!   output-path: /data/literature
//!   request-delay: 1000
//!   logging-level: info
//!   overwrite: true
//! Harvesters:
//!   - BHL:
//!       source: bhl
//!       api-key: secrets/bhl.key
//!       items: [22314]
//! ```
//!
//! Each entry becomes one [`HarvesterConfig`]. The strategies only ever see
//! that value; nothing is shared between sources.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{HarvesterError, Result};
use crate::item::FileKind;
use crate::listfile::read_list_file;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/harvesting.yml";

/// HTTP timeout in seconds.
///
/// PDF scans from BHL can be several hundred megabytes, so this bounds
/// connection setup and stalls rather than total transfer time.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Log level used when neither `RUST_LOG` nor the configuration sets one.
pub const DEFAULT_LOGGING_LEVEL: &str = "info";

/// Settings key naming the registry identifier of a harvester entry.
const SOURCE_KEY: &str = "source";

/// Older configuration files name the implementation under `class`.
const LEGACY_SOURCE_KEY: &str = "class";

const LEGACY_CLASS_SUFFIX: &str = "Harvester";

const API_KEY_KEY: &str = "api-key";
const OVERWRITE_KEY: &str = "overwrite";

/// Configuration of a single harvester run.
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    /// Display name of the entry (e.g. "BHL").
    pub name: String,

    /// Registry identifier of the strategy (e.g. "bhl").
    pub source: String,

    /// API key, if the source needs one.
    pub api_key: Option<String>,

    /// Source-specific settings (item lists, base URLs, ...).
    pub settings: Value,

    /// Whether existing artifact files are downloaded again.
    pub overwrite: bool,

    /// Pause before every request-producing step.
    pub request_delay: Duration,

    /// Directory under which every source gets its own folder.
    pub output_root: PathBuf,

    /// Format of the metadata file written per item.
    pub metadata_format: FileKind,

    /// HTTP timeout.
    pub timeout: Duration,
}

impl HarvesterConfig {
    /// Create a config builder.
    pub fn builder(source: impl Into<String>) -> HarvesterConfigBuilder {
        let source = source.into();
        HarvesterConfigBuilder {
            name: source.clone(),
            source,
            api_key: None,
            settings: Value::Object(serde_json::Map::new()),
            overwrite: true,
            request_delay: Duration::ZERO,
            output_root: PathBuf::from("."),
            metadata_format: FileKind::Xml,
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }

    /// Look up a raw setting.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Look up a string setting.
    #[must_use]
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.setting(key).and_then(Value::as_str)
    }

    /// Read a list setting as tokens.
    ///
    /// Numbers are taken literally. A string entry that names an existing
    /// file is replaced by that file's lines, so `items: [lists/items.txt]`
    /// and `items: [22314, 122748]` are equivalent ways to list ids.
    /// A scalar setting is treated as a one-element list.
    pub fn setting_tokens(&self, key: &str) -> Result<Vec<String>> {
        let entries = match self.setting(key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries.clone(),
            Some(other) => vec![other.clone()],
        };

        let mut tokens = Vec::new();
        for entry in entries {
            match entry {
                Value::Number(n) => tokens.push(n.to_string()),
                Value::String(s) => {
                    let path = Path::new(&s);
                    if s.parse::<u64>().is_err() && path.is_file() {
                        tokens.extend(read_list_file(path)?);
                    } else {
                        tokens.push(s);
                    }
                }
                other => {
                    return Err(HarvesterError::Config(format!(
                        "unexpected entry {other} in '{key}' of {}",
                        self.name
                    )))
                }
            }
        }
        Ok(tokens)
    }

    /// Directory this source writes into: `<output_root>/<folder, lowercased>`.
    #[must_use]
    pub fn working_directory(&self, folder_name: &str) -> PathBuf {
        self.output_root.join(folder_name.to_lowercase())
    }
}

/// Builder for [`HarvesterConfig`].
pub struct HarvesterConfigBuilder {
    name: String,
    source: String,
    api_key: Option<String>,
    settings: Value,
    overwrite: bool,
    request_delay: Duration,
    output_root: PathBuf,
    metadata_format: FileKind,
    timeout: Duration,
}

impl HarvesterConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    pub fn output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    pub fn metadata_format(mut self, metadata_format: FileKind) -> Self {
        self.metadata_format = metadata_format;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> HarvesterConfig {
        HarvesterConfig {
            name: self.name,
            source: self.source,
            api_key: self.api_key,
            settings: self.settings,
            overwrite: self.overwrite,
            request_delay: self.request_delay,
            output_root: self.output_root,
            metadata_format: self.metadata_format,
            timeout: self.timeout,
        }
    }
}

/// Everything read from a configuration file.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base directory for all sources.
    pub output_root: PathBuf,

    /// Log level requested by the file.
    pub logging_level: String,

    /// One configuration per harvester entry, in file order.
    pub harvesters: Vec<HarvesterConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct GeneralSection {
    output_path: PathBuf,
    #[serde(default)]
    request_delay: u64,
    #[serde(default = "default_logging_level")]
    logging_level: String,
    #[serde(default = "default_overwrite")]
    overwrite: bool,
    #[serde(default)]
    metadata_format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "General")]
    general: GeneralSection,
    #[serde(rename = "Harvesters", default)]
    harvesters: Vec<BTreeMap<String, Value>>,
}

fn default_logging_level() -> String {
    DEFAULT_LOGGING_LEVEL.to_string()
}

fn default_overwrite() -> bool {
    true
}

/// Load and parse a configuration file.
///
/// # Arguments
/// * `path` - Path to the YAML file
///
/// # Returns
/// The parsed [`Settings`]
pub fn load_config_file(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path).map_err(|e| {
        HarvesterError::Config(format!(
            "could not read configuration file {}: {e}",
            path.display()
        ))
    })?;
    parse_config(&content)
}

/// Parse configuration YAML.
///
/// # Examples
/// ```
/// use literature_harvester::config::parse_config;
///
/// let settings = parse_config(
///     "General:\n  output-path: /tmp/out\nHarvesters:\n  - Zobodat: {}\n",
/// )
/// .unwrap();
/// assert_eq!(settings.harvesters[0].source, "zobodat");
/// ```
pub fn parse_config(yaml: &str) -> Result<Settings> {
    let file: ConfigFile = serde_yaml_ng::from_str(yaml)?;
    let general = file.general;

    let metadata_format = match general.metadata_format.as_deref() {
        Some(format) => FileKind::from_str(format)?,
        None => FileKind::Xml,
    };

    let mut harvesters = Vec::new();
    for entry in file.harvesters {
        let mut entries = entry.into_iter();
        let (Some((name, settings)), None) = (entries.next(), entries.next()) else {
            return Err(HarvesterError::Config(
                "every harvester entry must be a single-key mapping".to_string(),
            ));
        };

        let settings = match settings {
            Value::Null => Value::Object(serde_json::Map::new()),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(HarvesterError::Config(format!(
                    "settings of harvester '{name}' must be a mapping, got {other}"
                )))
            }
        };

        let source = match (
            settings.get(SOURCE_KEY).and_then(Value::as_str),
            settings.get(LEGACY_SOURCE_KEY).and_then(Value::as_str),
        ) {
            (Some(source), _) => source.to_lowercase(),
            (None, Some(class)) => legacy_source_id(class),
            (None, None) => name.to_lowercase(),
        };

        let api_key = settings
            .get(API_KEY_KEY)
            .and_then(Value::as_str)
            .map(resolve_api_key)
            .transpose()?;

        let overwrite = settings
            .get(OVERWRITE_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(general.overwrite);

        let mut builder = HarvesterConfig::builder(source)
            .name(name)
            .settings(settings)
            .overwrite(overwrite)
            .request_delay(Duration::from_millis(general.request_delay))
            .output_root(general.output_path.clone())
            .metadata_format(metadata_format);
        if let Some(api_key) = api_key {
            builder = builder.api_key(api_key);
        }
        harvesters.push(builder.build());
    }

    Ok(Settings {
        output_root: general.output_path,
        logging_level: general.logging_level.to_lowercase(),
        harvesters,
    })
}

/// Registry identifier for a legacy `class` value.
///
/// Older files name the implementation class, e.g.
/// `de.biofid.services.crawler.BhlHarvester`; the simple class name minus
/// its `Harvester` suffix is the identifier. Plain identifiers pass through.
fn legacy_source_id(class: &str) -> String {
    let simple_name = class.rsplit('.').next().unwrap_or(class);
    simple_name
        .strip_suffix(LEGACY_CLASS_SUFFIX)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(simple_name)
        .to_lowercase()
}

/// Resolve an API key setting.
///
/// A value naming an existing file is replaced by the first line of that
/// file; anything else is the key itself.
pub fn resolve_api_key(value: &str) -> Result<String> {
    let path = Path::new(value);
    if !path.is_file() {
        return Ok(value.to_string());
    }

    let content = fs::read_to_string(path)?;
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
        .ok_or_else(|| HarvesterError::Config(format!("API key file {} is empty", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_CONFIG: &str = r#"
General:
  output-path: /data/literature
  request-delay: 250
  logging-level: DEBUG
  overwrite: false
Harvesters:
  - BHL:
      api-key: 0123-abcd
      items: [22314, 122748]
      overwrite: true
  - Madrid:
      class: bib-digital-madrid
      items:
        - https://bibdigital.rjb.csic.es/idurl/1/15729
  - Zobodat:
"#;

    #[test]
    fn test_parse_config() {
        let settings = parse_config(SAMPLE_CONFIG).unwrap();

        assert_eq!(settings.output_root, PathBuf::from("/data/literature"));
        assert_eq!(settings.logging_level, "debug");
        assert_eq!(settings.harvesters.len(), 3);

        let bhl = &settings.harvesters[0];
        assert_eq!(bhl.name, "BHL");
        assert_eq!(bhl.source, "bhl");
        assert_eq!(bhl.api_key.as_deref(), Some("0123-abcd"));
        assert!(bhl.overwrite);
        assert_eq!(bhl.request_delay, Duration::from_millis(250));
        assert_eq!(bhl.metadata_format, FileKind::Xml);
        assert_eq!(bhl.setting_tokens("items").unwrap(), vec!["22314", "122748"]);

        let madrid = &settings.harvesters[1];
        assert_eq!(madrid.source, "bib-digital-madrid");
        assert!(!madrid.overwrite);
        assert_eq!(madrid.api_key, None);

        let zobodat = &settings.harvesters[2];
        assert_eq!(zobodat.source, "zobodat");
        assert_eq!(zobodat.settings, json!({}));
    }

    #[test]
    fn test_legacy_class_names() {
        let yaml = r#"
General:
  output-path: out
Harvesters:
  - BHL:
      class: de.biofid.services.crawler.BhlHarvester
  - Madrid:
      class: de.biofid.services.crawler.BibDigitalHarvester
  - Zobodat:
      class: ZobodatHarvester
"#;
        let settings = parse_config(yaml).unwrap();
        let sources: Vec<&str> = settings.harvesters.iter().map(|h| h.source.as_str()).collect();
        assert_eq!(sources, vec!["bhl", "bibdigital", "zobodat"]);

        assert_eq!(legacy_source_id("bib-digital-madrid"), "bib-digital-madrid");
        assert_eq!(legacy_source_id("Harvester"), "harvester");
    }

    #[test]
    fn test_parse_config_metadata_format() {
        let yaml = "General:\n  output-path: out\n  metadata-format: JSON\n";
        let settings = parse_config(yaml).unwrap();
        assert!(settings.harvesters.is_empty());

        let yaml = "General:\n  output-path: out\n  metadata-format: yaml\nHarvesters:\n  - BHL: {}\n";
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_parse_config_rejects_multi_key_entry() {
        let yaml = "General:\n  output-path: out\nHarvesters:\n  - BHL: {}\n    Zobodat: {}\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("single-key"));
    }

    #[test]
    fn test_parse_config_requires_output_path() {
        assert!(parse_config("General:\n  request-delay: 10\n").is_err());
    }

    #[test]
    fn test_resolve_api_key_literal() {
        assert_eq!(resolve_api_key("my-secret-key").unwrap(), "my-secret-key");
    }

    #[test]
    fn test_resolve_api_key_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "\nkey-from-file  \nsecond line").unwrap();

        let key = resolve_api_key(file.path().to_str().unwrap()).unwrap();
        assert_eq!(key, "key-from-file");
    }

    #[test]
    fn test_setting_tokens_expands_list_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "60\n64\n\n2105").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = HarvesterConfig::builder("bhl")
            .settings(json!({ "titles": [path, 7] }))
            .build();

        assert_eq!(
            config.setting_tokens("titles").unwrap(),
            vec!["60", "64", "2105", "7"]
        );
        assert!(config.setting_tokens("missing").unwrap().is_empty());
    }

    #[test]
    fn test_setting_tokens_rejects_nested_values() {
        let config = HarvesterConfig::builder("bhl")
            .settings(json!({ "items": [{ "id": 1 }] }))
            .build();
        assert!(config.setting_tokens("items").is_err());
    }

    #[test]
    fn test_working_directory_is_lowercased() {
        let config = HarvesterConfig::builder("bhl")
            .output_root("/data")
            .build();
        assert_eq!(config.working_directory("BHL"), PathBuf::from("/data/bhl"));
    }
}
