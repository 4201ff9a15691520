use anyhow::Context;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

// Lock file inside the cache dir. Guards against two runs sharing one cache.
const LOCK_FILE: &str = ".lock";

fn lock_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(LOCK_FILE)
}

pub async fn try_acquire_run_lock(cache_dir: &Path) -> anyhow::Result<bool> {
    use tokio::io::AsyncWriteExt;

    tokio::fs::create_dir_all(cache_dir)
        .await
        .with_context(|| format!("failed to create cache dir {}", cache_dir.display()))?;

    let path = lock_path(cache_dir);
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await;

    let mut file = match file {
        Ok(f) => f,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to create lock file {}", path.display()));
        }
    };

    let owner = format!("pid={} started_at={}\n", std::process::id(), chrono::Utc::now().to_rfc3339());
    file.write_all(owner.as_bytes())
        .await
        .with_context(|| format!("failed to write lock file {}", path.display()))?;
    Ok(true)
}

pub async fn release_run_lock(cache_dir: &Path) -> anyhow::Result<()> {
    let path = lock_path(cache_dir);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to release lock file {}", path.display())),
    }
}
