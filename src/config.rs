use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::tool::ExternalTool;

/// Name of the optional configuration file at the repository root.
pub const CONFIG_FILE: &str = "kumitate.json";

/// Build settings read from `kumitate.json`. Every field is optional, the
/// defaults describe the editor repository layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Source tree handed to the compiler.
    pub src_dir: Utf8PathBuf,
    /// Staged output tree.
    pub out_dir: Utf8PathBuf,
    /// Manifests checked against the root `package.json`.
    pub manifests: Vec<Utf8PathBuf>,
    pub compiler: ExternalTool,
    pub optimizer: ExternalTool,
    pub linter: ExternalTool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_dir: Utf8PathBuf::from("src"),
            out_dir: Utf8PathBuf::from("out-build"),
            manifests: vec![
                Utf8PathBuf::from("remote/package.json"),
                Utf8PathBuf::from("remote/web/package.json"),
                Utf8PathBuf::from("build/package.json"),
            ],
            compiler: ExternalTool::node("build/lib/compile.js"),
            optimizer: ExternalTool::node("build/lib/optimize.js"),
            linter: ExternalTool::node("build/hygiene.js"),
        }
    }
}

impl Config {
    /// Loads the configuration at `path`, falling back to the defaults when
    /// the file does not exist. A file that exists but doesn't parse is an
    /// error.
    pub fn load(path: &Utf8Path) -> Result<Config, ConfigError> {
        match crate::utils::read_json_optional::<Config>(path)? {
            Some(config) => {
                tracing::debug!("loaded configuration from {path}");
                Ok(config)
            }
            None => Ok(Config::default()),
        }
    }
}
