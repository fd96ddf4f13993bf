use std::fmt::Display;
use std::fs;
use std::sync::LazyLock;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use console::Style;
use indicatif::ProgressStyle;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::de::DeserializeOwned;

use crate::core::Hash32;
use crate::error::{ConfigError, StepError};

const ANSI_BLUE: Style = Style::new().blue();

pub(crate) static STYLE_TASK: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_spinner()
        .template("{spinner:.blue} [{elapsed}] {msg}")
        .expect("invalid progress bar template")
});

pub(crate) fn as_overhead(s: Instant) -> impl Display {
    let f = format!("(+{}ms)", s.elapsed().as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Installs the global subscriber: formatted events routed through the
/// progress bars, filtered by `RUST_LOG` (default `info`).
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_indicatif::IndicatifLayer;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let indicatif = IndicatifLayer::new();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(indicatif.get_stderr_writer()),
        )
        .with(indicatif)
        .try_init()?;

    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;

    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Like [`read_json`], but a missing file is `Ok(None)`.
pub(crate) fn read_json_optional<T: DeserializeOwned>(
    path: &Utf8Path,
) -> Result<Option<T>, ConfigError> {
    match read_json(path) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Writes `content` unless the file already holds exactly that. Returns
/// whether anything was written.
pub(crate) fn write_if_changed(path: &Utf8Path, content: &str) -> Result<bool, StepError> {
    if fs::read_to_string(path).is_ok_and(|old| old == content) {
        return Ok(false);
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| StepError::Write {
            path: dir.to_owned(),
            source,
        })?;
    }

    fs::write(path, content).map_err(|source| StepError::Write {
        path: path.to_owned(),
        source,
    })?;

    Ok(true)
}

/// Lists every file below `dir`, relative to it, sorted. A missing directory
/// has no files.
pub(crate) fn list_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, StepError> {
    let pattern = format!("{}/**/*", glob::Pattern::escape(dir.as_str()));
    let mut files = Vec::new();

    for entry in glob::glob(&pattern)? {
        let path = Utf8PathBuf::try_from(entry?)?;
        if path.is_file() {
            let relative = path.strip_prefix(dir).unwrap_or(&path).to_owned();
            files.push(relative);
        }
    }

    files.sort();
    Ok(files)
}

/// Content digest of a whole tree, covering both file names and bytes.
pub(crate) fn digest_tree(dir: &Utf8Path) -> Result<Hash32, StepError> {
    let files = list_files(dir)?;

    let hashes = files
        .par_iter()
        .map(|file| Hash32::hash_file(dir.join(file)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut hasher = blake3::Hasher::new();
    for (file, hash) in files.iter().zip(&hashes) {
        hasher.update(file.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(hash.as_bytes());
    }

    Ok(hasher.finalize().into())
}
