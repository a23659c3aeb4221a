use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::DEFAULT_TEMPLATE;
use crate::UrielError;
use crate::UrielResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["uriel.toml", ".uriel.toml", ".config/uriel.toml"];

/// Configuration loaded from a `uriel.toml` file.
///
/// ```toml
/// [templates]
/// default = "page.html"
///
/// [exclude]
/// patterns = ["drafts/", "*.bak"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UrielConfig {
	#[serde(default)]
	pub templates: TemplatesConfig,
	/// Files under `nodes/` that never become nodes.
	#[serde(default)]
	pub exclude: ExcludeConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TemplatesConfig {
	/// Template used by nodes without a `template` header.
	#[serde(default = "default_template")]
	pub default: String,
}

impl Default for TemplatesConfig {
	fn default() -> Self {
		Self {
			default: default_template(),
		}
	}
}

fn default_template() -> String {
	DEFAULT_TEMPLATE.to_string()
}

/// Gitignore style patterns, relative to `nodes/`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ExcludeConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

impl UrielConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is none.
	pub fn load(root: &Path) -> UrielResult<Option<UrielConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config: UrielConfig =
			toml::from_str(&content).map_err(|e| UrielError::ConfigParse(e.to_string()))?;

		Ok(Some(config))
	}
}
