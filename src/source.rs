//! Schema acquisition
//!
//! Fetches schema text from a file, a URL, a named preset or stdin. This sits in
//! front of the core: loading, rendering and synthesis only ever see the text.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tracing::{debug, info};

use crate::config::{Preset, SynthConfig};
use crate::error::{Result, XsdError};

/// Where schema text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    File(PathBuf),
    Url(String),
    /// Name of an entry in the `[[presets]]` list
    Preset(String),
    Stdin,
}

impl fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::File(path) => write!(f, "{}", path.display()),
            SchemaSource::Url(url) => write!(f, "{}", url),
            SchemaSource::Preset(name) => write!(f, "preset '{}'", name),
            SchemaSource::Stdin => write!(f, "<stdin>"),
        }
    }
}

impl SchemaSource {
    /// Read the schema text
    pub fn fetch(&self, config: &SynthConfig) -> Result<String> {
        let text = match self {
            SchemaSource::File(path) => std::fs::read_to_string(path)?,
            SchemaSource::Url(url) => fetch_url(url, config.source.timeout_secs)?,
            SchemaSource::Preset(name) => {
                let (resolved, url) = resolve_preset(config, name)?;
                debug!(requested = %name, preset = %resolved, "preset resolved");
                fetch_url(url, config.source.timeout_secs)?
            }
            SchemaSource::Stdin => {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text)?;
                text
            }
        };
        info!(source = %self, bytes = text.len(), "schema text acquired");
        Ok(text)
    }
}

/// Find a preset by exact name, then ignoring case, then by best fuzzy match
pub fn resolve_preset<'c>(config: &'c SynthConfig, name: &str) -> Result<(&'c str, &'c str)> {
    let found = config
        .presets
        .iter()
        .find(|p| p.name == name)
        .or_else(|| config.presets.iter().find(|p| p.name.eq_ignore_ascii_case(name)));
    if let Some(preset) = found {
        return Ok((preset.name.as_str(), preset.url.as_str()));
    }

    let matcher = SkimMatcherV2::default();
    let mut best: Option<(i64, &Preset)> = None;
    for preset in &config.presets {
        if let Some(score) = matcher.fuzzy_match(&preset.name, name) {
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, preset));
            }
        }
    }

    best.map(|(_, p)| (p.name.as_str(), p.url.as_str())).ok_or_else(|| {
        XsdError::UnknownPreset(format!(
            "{} (available: {})",
            name,
            config.preset_names().join(", ")
        ))
    })
}

fn fetch_url(url: &str, timeout_secs: u64) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    let response = client.get(url).send()?.error_for_status()?;
    Ok(response.text()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_preset_exact_and_case_insensitive() {
        let config = SynthConfig::default();
        let (name, url) = resolve_preset(&config, "FAIA Full Version").unwrap();
        assert_eq!(name, "FAIA Full Version");
        assert!(url.ends_with("FAIA_v_2.01_full.xsd"));

        let (name, _) = resolve_preset(&config, "faia reduced version b").unwrap();
        assert_eq!(name, "FAIA Reduced Version B");
    }

    #[test]
    fn test_preset_fuzzy_match() {
        let config = SynthConfig::default();
        let (name, _) = resolve_preset(&config, "full").unwrap();
        assert_eq!(name, "FAIA Full Version");
    }

    #[test]
    fn test_unknown_preset() {
        let config = SynthConfig::default();
        let err = resolve_preset(&config, "zzzz").unwrap_err();
        assert!(matches!(err, XsdError::UnknownPreset(_)));
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<xs:schema/>").unwrap();

        let source = SchemaSource::File(file.path().to_path_buf());
        let text = source.fetch(&SynthConfig::default()).unwrap();
        assert_eq!(text, "<xs:schema/>");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = SchemaSource::File(PathBuf::from("/nonexistent/schema.xsd"));
        assert!(matches!(
            source.fetch(&SynthConfig::default()),
            Err(XsdError::Io(_))
        ));
    }
}
