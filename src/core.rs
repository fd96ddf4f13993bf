use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::config::Config;

/// A 32-byte BLAKE3 hash used for change detection of build trees.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub(crate) fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub(crate) fn hash_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        Ok(blake3::Hasher::new().update_mmap(path)?.finalize().into())
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for &byte in self.0.iter() {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

/// Free-form JSON object metadata, such as the contents of `product.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(pub(crate) Map<String, Value>);

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow merge, keys from `other` win.
    pub(crate) fn merge(&mut self, other: Metadata) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Process-wide build settings, constructed once at startup and shared by
/// reference with every task.
///
/// All relative paths used by the build steps are resolved against `root`.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Repository root.
    pub root: Utf8PathBuf,
    /// Settings loaded from `kumitate.json`.
    pub config: Config,
    /// Directory for build caches, such as optimizer stamps.
    pub cache_dir: Utf8PathBuf,
    /// Running from sources, with `product.overrides.json` applied.
    pub dev: bool,
    /// Contents of `product.json`.
    pub product: Metadata,
    /// Contents of the root `package.json`.
    pub package: Metadata,
}

impl Environment {
    /// Creates an environment without consulting the process environment or
    /// any metadata files.
    pub fn new(root: impl Into<Utf8PathBuf>, config: Config) -> Self {
        let root = root.into();
        Self {
            cache_dir: root.join(".cache"),
            root,
            config,
            dev: false,
            product: Metadata::default(),
            package: Metadata::default(),
        }
    }

    /// Resolves a root-relative path.
    pub fn path(&self, relative: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        self.root.join(relative)
    }
}

/// The context passed to every task action.
pub struct TaskContext<'a> {
    /// Access to global configuration.
    pub env: &'a Environment,
    /// Tracing span assigned to the closest named task.
    pub(crate) span: tracing::Span,
}

impl TaskContext<'_> {
    /// Updates the progress message shown next to the running task.
    pub fn set_message(&self, message: &str) {
        self.span.pb_set_message(message);
    }
}
