//! Startup: turns the process environment and the product manifests into an
//! immutable [`Environment`].
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;

use crate::config::Config;
use crate::core::{Environment, Metadata};
use crate::error::ConfigError;

/// Selects the code-cache directory.
pub const ENV_CACHE_PATH: &str = "VS_CODE_CACHE_PATH";
/// Marks a run from sources; enables `product.overrides.json`.
pub const ENV_DEV: &str = "VS_DEV";
/// Set for every tool spawned by the CLI.
pub const ENV_CLI: &str = "VS_CLI";
/// Working directory leaked by launching shells. Never read, and removed from
/// the environment of every spawned tool.
pub const ENV_CWD: &str = "VS_CWD";

const PRODUCT: &str = "product.json";
const PRODUCT_OVERRIDES: &str = "product.overrides.json";
const PACKAGE: &str = "package.json";

impl Environment {
    /// Builds the environment from the current process variables.
    pub fn from_process(root: impl Into<Utf8PathBuf>, config: Config) -> Result<Self, ConfigError> {
        Self::from_vars(root, config, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars(
        root: impl Into<Utf8PathBuf>,
        config: Config,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut env = Environment::new(root, config);

        if let Some(cache) = var(ENV_CACHE_PATH).filter(|value| !value.is_empty()) {
            env.cache_dir = env.root.join(cache);
        }

        env.dev = var(ENV_DEV).is_some_and(|value| !value.is_empty());
        env.product = load_metadata(&env.root.join(PRODUCT))?;

        if env.dev {
            match load_metadata_optional(&env.root.join(PRODUCT_OVERRIDES))? {
                Some(overrides) => {
                    tracing::debug!("applying {PRODUCT_OVERRIDES}");
                    env.product.merge(overrides);
                }
                None => tracing::debug!("no {PRODUCT_OVERRIDES}, using {PRODUCT} as is"),
            }
        }

        env.package = load_metadata(&env.root.join(PACKAGE))?;

        Ok(env)
    }
}

/// Absent metadata files yield empty metadata.
fn load_metadata(path: &Utf8Path) -> Result<Metadata, ConfigError> {
    Ok(load_metadata_optional(path)?.unwrap_or_default())
}

fn load_metadata_optional(path: &Utf8Path) -> Result<Option<Metadata>, ConfigError> {
    match crate::utils::read_json_optional::<Value>(path)? {
        Some(Value::Object(map)) => Ok(Some(Metadata::from(map))),
        Some(_) => Err(ConfigError::NotAnObject(path.to_owned())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use super::*;

    fn fixture() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        fs::write(
            root.join(PRODUCT),
            r#"{ "nameShort": "Code - OSS", "quality": "stable" }"#,
        )
        .unwrap();
        fs::write(root.join(PACKAGE), r#"{ "name": "code-oss-dev", "version": "1.0.0" }"#).unwrap();
        (dir, root)
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_plain_environment() {
        let (_dir, root) = fixture();
        fs::write(root.join(PRODUCT_OVERRIDES), r#"{ "quality": "insider" }"#).unwrap();

        let env = Environment::from_vars(&root, Config::default(), vars(&[])).unwrap();

        assert!(!env.dev);
        assert_eq!(env.cache_dir, root.join(".cache"));
        assert_eq!(env.product.get_str("quality"), Some("stable"));
        assert_eq!(env.package.get_str("name"), Some("code-oss-dev"));
    }

    #[test]
    fn test_dev_mode_applies_overrides() {
        let (_dir, root) = fixture();
        fs::write(root.join(PRODUCT_OVERRIDES), r#"{ "quality": "insider" }"#).unwrap();

        let env = Environment::from_vars(
            &root,
            Config::default(),
            vars(&[(ENV_DEV, "1"), (ENV_CACHE_PATH, "/tmp/code-cache")]),
        )
        .unwrap();

        assert!(env.dev);
        assert_eq!(env.cache_dir, Utf8PathBuf::from("/tmp/code-cache"));
        assert_eq!(env.product.get_str("nameShort"), Some("Code - OSS"));
        assert_eq!(env.product.get_str("quality"), Some("insider"));
    }

    #[test]
    fn test_dev_mode_tolerates_missing_overrides() {
        let (_dir, root) = fixture();
        let env = Environment::from_vars(&root, Config::default(), vars(&[(ENV_DEV, "1")])).unwrap();
        assert_eq!(env.product.get_str("quality"), Some("stable"));
    }

    #[test]
    fn test_malformed_overrides_are_fatal() {
        let (_dir, root) = fixture();
        fs::write(root.join(PRODUCT_OVERRIDES), "[1, 2").unwrap();
        let result = Environment::from_vars(&root, Config::default(), vars(&[(ENV_DEV, "1")]));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        fs::write(root.join(PRODUCT_OVERRIDES), "[1, 2]").unwrap();
        let result = Environment::from_vars(&root, Config::default(), vars(&[(ENV_DEV, "1")]));
        assert!(matches!(result, Err(ConfigError::NotAnObject(_))));
    }

    #[test]
    fn test_missing_metadata_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let env = Environment::from_vars(&root, Config::default(), vars(&[])).unwrap();
        assert!(env.product.is_empty());
        assert!(env.package.is_empty());
    }
}
