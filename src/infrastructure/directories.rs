use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::config::env::DirectoryConfig;

const FEATURE_CACHE_FILE: &str = "features.json";

/// Locations the service writes to. Both directories exist and the cache
/// directory accepted a write by the time a value is handed out.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Snapshot of the feature cache, read at startup and written on shutdown.
    pub feature_cache: PathBuf,
}

impl ResolvedPaths {
    pub fn prepare(cfg: &DirectoryConfig) -> Result<Self> {
        let logs_dir = create_dir("logs", Path::new(&cfg.logs_dir))?;
        let cache_dir = create_dir("cache", Path::new(&cfg.cache_dir))?;
        check_writable(&cache_dir)?;

        Ok(Self {
            feature_cache: cache_dir.join(FEATURE_CACHE_FILE),
            logs_dir,
            cache_dir,
        })
    }
}

fn create_dir(role: &str, path: &Path) -> Result<PathBuf> {
    if path.exists() && !path.is_dir() {
        bail!("{role} directory {} exists but is not a directory", path.display());
    }
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create {role} directory {}", path.display()))?;
    fs::canonicalize(path)
        .with_context(|| format!("failed to resolve {role} directory {}", path.display()))
}

fn check_writable(dir: &Path) -> Result<()> {
    let marker = dir.join(format!(".writable-{}", std::process::id()));
    fs::write(&marker, b"")
        .with_context(|| format!("cache directory {} is not writable", dir.display()))?;
    fs::remove_file(&marker)
        .with_context(|| format!("failed to clean up {}", marker.display()))
}
