//! On-disk cache of compiled dynamics models.
//!
//! Deriving a model is treated as expensive; the coefficients it produces are
//! small. The cache stores them as JSON under a file name derived from the
//! parameter set's exact cache key (see the `cache_key` methods in
//! [crate::parameters]), with a format version embedded in both the key and the
//! artifact so a stale artifact can never load with wrong semantics.
//!
//! Load failures are split into the two kinds the caller cares about: an
//! absent artifact is an expected cache miss; anything else (corrupt JSON,
//! version mismatch, unreadable file) is logged and treated as a miss too.
//! Either way the model is rebuilt and re-persisted, so a damaged cache never
//! fails the caller. Artifacts are written to a temporary file and renamed
//! into place; a crashed writer leaves no half-written artifact behind.

use crate::parameters::arm_dynamics::MODEL_FORMAT_VERSION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Errors the cache itself can raise. Load failures are not among them (they
/// degrade to a rebuild); these are failures to persist a freshly built model.
#[derive(Debug)]
pub enum CacheError {
    Io(io::Error),
    Serialization(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            CacheError::Io(ref err) => write!(f, "IO Error: {}", err),
            CacheError::Serialization(ref msg) => write!(f, "Serialization Error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        CacheError::Io(err)
    }
}

// Versioned wrapper around the persisted coefficients.
#[derive(serde::Serialize, serde::Deserialize)]
struct Envelope<C> {
    version: u32,
    coefficients: C,
}

// Why a cached artifact could not be used. Both outcomes degrade to a rebuild;
// they differ only in how loudly they are logged.
enum LoadFailure {
    // No artifact on disk. The expected first-run case.
    Miss,
    // An artifact exists but cannot be trusted.
    Unusable(String),
}

/// Returns the compiled coefficients for `key`, loading them from `dir` when a
/// usable artifact exists and rebuilding (then persisting) otherwise.
///
/// Rebuilding on load failure is transparent; the only errors surfaced are
/// failures to write the freshly built artifact. Calling this twice with the
/// same key and an equivalent `build` function yields coefficients producing
/// identical output, whether or not the first call's artifact was reused.
pub fn get_or_build<C, F>(dir: &Path, key: &str, build: F) -> Result<C, CacheError>
where
    C: Serialize + DeserializeOwned,
    F: FnOnce() -> C,
{
    let path = artifact_path(dir, key);

    match load(&path) {
        Ok(coefficients) => {
            debug!(key, "loaded compiled model from cache");
            return Ok(coefficients);
        }
        Err(LoadFailure::Miss) => {
            debug!(key, "compiled model not cached yet, deriving");
        }
        Err(LoadFailure::Unusable(reason)) => {
            warn!(key, %reason, "discarding unusable cache artifact, deriving");
        }
    }

    let coefficients = build();
    persist(&path, &coefficients)?;
    debug!(key, path = %path.display(), "compiled model persisted");
    Ok(coefficients)
}

/// The on-disk location of the artifact for `key`. Deterministic, so external
/// tooling can prune or inspect the cache directory.
pub fn artifact_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", key))
}

fn load<C: DeserializeOwned>(path: &Path) -> Result<C, LoadFailure> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(LoadFailure::Miss),
        Err(err) => return Err(LoadFailure::Unusable(err.to_string())),
    };

    let envelope: Envelope<C> = serde_json::from_str(&raw)
        .map_err(|err| LoadFailure::Unusable(err.to_string()))?;
    if envelope.version != MODEL_FORMAT_VERSION {
        return Err(LoadFailure::Unusable(format!(
            "format version {} does not match current {}",
            envelope.version, MODEL_FORMAT_VERSION
        )));
    }
    Ok(envelope.coefficients)
}

fn persist<C: Serialize>(path: &Path, coefficients: &C) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let envelope = Envelope { version: MODEL_FORMAT_VERSION, coefficients };
    let raw = serde_json::to_string_pretty(&envelope)
        .map_err(|err| CacheError::Serialization(err.to_string()))?;

    // Write-then-rename keeps concurrent readers from ever seeing a partial
    // artifact.
    let temporary = path.with_extension("json.tmp");
    fs::write(&temporary, raw)?;
    fs::rename(&temporary, path)?;
    Ok(())
}
