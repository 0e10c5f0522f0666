//! Application configuration for DocHub.
//!
//! User config lives at `~/.dochub/dochub.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocHubError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dochub.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dochub";

// ---------------------------------------------------------------------------
// Config structs (matching dochub.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Markdown ⇄ block conversion defaults.
    #[serde(default)]
    pub conversion: ConversionOptions,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root that workspace-relative markdown paths resolve against.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,

    /// Where converted output is written when no `--out` is given.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_workspace_root() -> String {
    ".".into()
}
fn default_output_dir() -> String {
    "var/converted".into()
}

// ---------------------------------------------------------------------------
// Conversion options
// ---------------------------------------------------------------------------

/// What to do with constructs that have no counterpart in the target format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedBlockPolicy {
    /// Drop the construct and count it as skipped.
    Ignore,
    /// Replace it with the closest supported construct and warn.
    #[default]
    Convert,
    /// Record an error and omit the construct.
    Error,
}

/// Marker used when serializing emphasis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmphasisMarker {
    #[default]
    #[serde(rename = "*")]
    Asterisk,
    #[serde(rename = "_")]
    Underscore,
}

impl EmphasisMarker {
    pub fn as_char(self) -> char {
        match self {
            Self::Asterisk => '*',
            Self::Underscore => '_',
        }
    }

    /// The other marker, used for italics nested inside bold.
    pub fn alternate(self) -> Self {
        match self {
            Self::Asterisk => Self::Underscore,
            Self::Underscore => Self::Asterisk,
        }
    }
}

/// Marker used when serializing bulleted list items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListMarker {
    #[default]
    #[serde(rename = "-")]
    Dash,
    #[serde(rename = "*")]
    Asterisk,
    #[serde(rename = "+")]
    Plus,
}

impl ListMarker {
    pub fn as_char(self) -> char {
        match self {
            Self::Dash => '-',
            Self::Asterisk => '*',
            Self::Plus => '+',
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeBlockStyle {
    #[default]
    Fenced,
    Indented,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineBreaks {
    #[default]
    Lf,
    Crlf,
}

impl LineBreaks {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

/// Options shared by both conversion directions.
///
/// Every field has a default, so a partial TOML table or JSON object
/// deserializes into a complete option set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Keep color and underline annotations (as inline HTML in markdown).
    pub preserve_colors: bool,
    /// Turn `> [!NOTE]` style quotes into callout blocks.
    pub convert_callouts: bool,
    /// Turn `<details>` sections into toggle blocks.
    pub convert_toggles: bool,
    /// Policy for constructs with no counterpart in the target format.
    pub handle_unsupported_blocks: UnsupportedBlockPolicy,
    /// Carry front matter across the conversion.
    pub include_metadata: bool,
    /// Deepest heading level emitted (1–6).
    pub max_heading_level: u8,
    pub emphasis_marker: EmphasisMarker,
    pub list_marker: ListMarker,
    pub code_block_style: CodeBlockStyle,
    pub line_breaks: LineBreaks,
    /// Spaces per nesting level in serialized lists.
    pub indent_size: usize,
    /// Segment text longer than the service limit instead of failing.
    pub split_long_text: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            preserve_colors: false,
            convert_callouts: true,
            convert_toggles: true,
            handle_unsupported_blocks: UnsupportedBlockPolicy::Convert,
            include_metadata: false,
            max_heading_level: 3,
            emphasis_marker: EmphasisMarker::Asterisk,
            list_marker: ListMarker::Dash,
            code_block_style: CodeBlockStyle::Fenced,
            line_breaks: LineBreaks::Lf,
            indent_size: 2,
            split_long_text: true,
        }
    }
}

impl ConversionOptions {
    /// Reject option values no conversion can honor.
    pub fn validate(&self) -> Result<()> {
        if !(1..=6).contains(&self.max_heading_level) {
            return Err(DocHubError::config(format!(
                "max_heading_level must be between 1 and 6, got {}",
                self.max_heading_level
            )));
        }
        if !(1..=8).contains(&self.indent_size) {
            return Err(DocHubError::config(format!(
                "indent_size must be between 1 and 8, got {}",
                self.indent_size
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dochub/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocHubError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dochub/dochub.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocHubError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocHubError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.conversion.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocHubError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocHubError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocHubError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("workspace_root"));
        assert!(toml_str.contains("max_heading_level = 3"));
        assert!(toml_str.contains("emphasis_marker = \"*\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.conversion, ConversionOptions::default());
        assert_eq!(parsed.defaults.output_dir, "var/converted");
    }

    #[test]
    fn partial_conversion_section_fills_defaults() {
        let toml_str = r#"
[conversion]
handle_unsupported_blocks = "error"
list_marker = "+"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(
            config.conversion.handle_unsupported_blocks,
            UnsupportedBlockPolicy::Error
        );
        assert_eq!(config.conversion.list_marker, ListMarker::Plus);
        assert_eq!(config.conversion.max_heading_level, 3);
        assert!(config.conversion.split_long_text);
    }

    #[test]
    fn partial_options_from_json() {
        let opts: ConversionOptions =
            serde_json::from_str(r#"{"preserve_colors": true, "emphasis_marker": "_"}"#)
                .expect("parse");
        assert!(opts.preserve_colors);
        assert_eq!(opts.emphasis_marker, EmphasisMarker::Underscore);
        assert_eq!(opts.line_breaks, LineBreaks::Lf);
    }

    #[test]
    fn options_validation() {
        assert!(ConversionOptions::default().validate().is_ok());

        let opts = ConversionOptions {
            max_heading_level: 7,
            ..Default::default()
        };
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("max_heading_level"));

        let opts = ConversionOptions {
            indent_size: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn load_config_from_file_rejects_bad_options() {
        let dir = std::env::temp_dir().join(format!("dochub-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("dochub.toml");
        std::fs::write(&path, "[conversion]\nmax_heading_level = 0\n").expect("write");

        let result = load_config_from(&path);
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
