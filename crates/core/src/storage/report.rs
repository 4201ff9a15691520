use anyhow::Context;
use std::io::ErrorKind;
use std::path::PathBuf;

#[async_trait::async_trait]
pub trait ReportStorage: Send + Sync {
    /// Persists an already formatted report and returns where it went.
    async fn save_report(&self, formatted: &[u8]) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct FileReportStorage {
    dir: PathBuf,
}

impl FileReportStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl ReportStorage for FileReportStorage {
    async fn save_report(&self, formatted: &[u8]) -> anyhow::Result<String> {
        use tokio::io::AsyncWriteExt;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create report dir {}", self.dir.display()))?;

        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();

        // Never overwrite an earlier report written within the same second.
        let mut suffix: u32 = 0;
        loop {
            let name = if suffix == 0 {
                format!("report_{stamp}.json")
            } else {
                format!("report_{stamp}_{suffix}.json")
            };
            let path = self.dir.join(name);

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(f) => f,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    suffix += 1;
                    continue;
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to create {}", path.display()));
                }
            };

            file.write_all(formatted)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("failed to flush {}", path.display()))?;

            tracing::info!(path = %path.display(), bytes = formatted.len(), "report written");
            return Ok(path.display().to_string());
        }
    }
}

/// Keeps every saved report in memory.
#[derive(Debug, Default)]
pub struct MemoryReportStorage {
    reports: tokio::sync::Mutex<Vec<Vec<u8>>>,
}

impl MemoryReportStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reports(&self) -> Vec<Vec<u8>> {
        self.reports.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ReportStorage for MemoryReportStorage {
    async fn save_report(&self, formatted: &[u8]) -> anyhow::Result<String> {
        let mut reports = self.reports.lock().await;
        reports.push(formatted.to_vec());
        Ok(format!("memory://report/{}", reports.len()))
    }
}
