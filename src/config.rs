//! Configuration management for xsd-synth
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (xsd-synth.toml)
//! - Environment variables (XSD_SYNTH__*)
//!
//! ## Example config file (xsd-synth.toml):
//! ```toml
//! [render]
//! max_depth = 20
//! truncation_marker = "…"
//!
//! [synthesis]
//! strategy = "semantic"
//! leaf_content = "tag-name"
//! indent = 2
//! xml_declaration = true
//!
//! [source]
//! timeout_secs = 30
//!
//! [[presets]]
//! name = "FAIA Full Version"
//! url = "https://github.com/Tax-Technology/XSD-to-XML-Generator/raw/main/FAIA_v_2.01_full.xsd"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use crate::instance::{InstanceOptions, LeafContent};
use crate::synth::Strategy;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Descriptor rendering
    #[serde(default)]
    pub render: RenderConfig,

    /// Document synthesis
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Schema acquisition
    #[serde(default)]
    pub source: SourceConfig,

    /// Named schema sources
    #[serde(default = "default_presets")]
    pub presets: Vec<Preset>,
}

/// A schema URL under a display name
///
/// Stored as an array of tables so names keep their case through the config loader,
/// which lowercases table keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub url: String,
}

/// Descriptor renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Deepest level expanded before the tree is cut
    #[serde(default = "default_render_depth")]
    pub max_depth: usize,

    /// Appended to nodes that were not expanded
    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,
}

/// Document synthesizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub strategy: Strategy,

    /// Root element to generate; first declared root when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    #[serde(default)]
    pub leaf_content: LeafContent,

    /// Spaces per nesting level, 0 for compact output
    #[serde(default = "default_indent")]
    pub indent: usize,

    #[serde(default = "default_true")]
    pub xml_declaration: bool,

    /// Deepest element nesting the semantic strategy will emit
    #[serde(default = "default_synthesis_depth")]
    pub max_depth: usize,
}

/// Schema acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Timeout for URL fetches
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_render_depth() -> usize {
    20
}

fn default_truncation_marker() -> String {
    "…".to_string()
}

fn default_indent() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_synthesis_depth() -> usize {
    32
}

fn default_timeout_secs() -> u64 {
    30
}

const PRESET_BASE: &str = "https://github.com/Tax-Technology/XSD-to-XML-Generator/raw/main";

fn default_presets() -> Vec<Preset> {
    [
        ("FAIA Reduced Version A", "FAIA_v_2.01_reduced_version_A.xsd"),
        ("FAIA Reduced Version B", "FAIA_v_2.01_reduced_version_B.xsd"),
        ("FAIA Full Version", "FAIA_v_2.01_full.xsd"),
    ]
    .into_iter()
    .map(|(name, file)| Preset {
        name: name.to_string(),
        url: format!("{}/{}", PRESET_BASE, file),
    })
    .collect()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_depth: default_render_depth(),
            truncation_marker: default_truncation_marker(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            root: None,
            leaf_content: LeafContent::default(),
            indent: default_indent(),
            xml_declaration: true,
            max_depth: default_synthesis_depth(),
        }
    }
}

impl SynthesisConfig {
    /// Options handed to the instance generator
    pub fn instance_options(&self) -> InstanceOptions {
        InstanceOptions {
            leaf_content: self.leaf_content,
            indent: self.indent,
            xml_declaration: self.xml_declaration,
            max_depth: self.max_depth,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            synthesis: SynthesisConfig::default(),
            source: SourceConfig::default(),
            presets: default_presets(),
        }
    }
}

impl SynthConfig {
    /// Load configuration, layering a specific file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["xsd-synth.toml", ".xsd-synth.toml", "config/xsd-synth.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "tax-technology", "xsd-synth") {
            let xdg_config = config_dir.config_dir().join("xsd-synth.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // XSD_SYNTH__SECTION__KEY
        builder = builder.add_source(
            Environment::with_prefix("XSD_SYNTH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Preset names in declaration order
    pub fn preset_names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SynthConfig::default();
        assert_eq!(config.render.max_depth, 20);
        assert_eq!(config.render.truncation_marker, "…");
        assert_eq!(config.synthesis.strategy, Strategy::Semantic);
        assert_eq!(config.synthesis.indent, 2);
        assert_eq!(config.source.timeout_secs, 30);
    }

    #[test]
    fn test_default_presets() {
        let config = SynthConfig::default();
        assert_eq!(
            config.preset_names(),
            ["FAIA Reduced Version A", "FAIA Reduced Version B", "FAIA Full Version"]
        );
        assert!(config.presets[2].url.ends_with("FAIA_v_2.01_full.xsd"));
    }

    #[test]
    fn test_serialize_config() {
        let config = SynthConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[render]"));
        assert!(toml_str.contains("[synthesis]"));
        assert!(toml_str.contains("strategy = \"semantic\""));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xsd-synth.toml");
        let path = path.to_str().unwrap();

        let mut config = SynthConfig::default();
        config.synthesis.strategy = Strategy::LexicalEcho;
        config.synthesis.leaf_content = LeafContent::TagName;
        config.render.max_depth = 7;
        config.save(path).unwrap();

        let loaded = SynthConfig::load_from(Some(path)).unwrap();
        assert_eq!(loaded.synthesis.strategy, Strategy::LexicalEcho);
        assert_eq!(loaded.synthesis.leaf_content, LeafContent::TagName);
        assert_eq!(loaded.render.max_depth, 7);
        assert_eq!(loaded.presets, config.presets);
    }

    #[test]
    fn test_preset_names_keep_case_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.toml");
        std::fs::write(
            &path,
            r#"
[[presets]]
name = "Local Audit File"
url = "https://example.org/AuditFile.xsd"
"#,
        )
        .unwrap();

        let loaded = SynthConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.preset_names(), ["Local Audit File"]);
        assert_eq!(loaded.presets[0].url, "https://example.org/AuditFile.xsd");
    }

    #[test]
    fn test_instance_options_follow_synthesis_section() {
        let config = SynthesisConfig {
            indent: 0,
            xml_declaration: false,
            ..SynthesisConfig::default()
        };
        let options = config.instance_options();
        assert_eq!(options.indent, 0);
        assert!(!options.xml_declaration);
        assert_eq!(options.max_depth, 32);
    }
}
