use crate::domain::stock::StockInfo;
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::PathBuf;

const ENTRY_EXT: &str = "json";
const TMP_EXT: &str = "tmp";

/// Per-ticker results of the current run. An entry means "done, skip it".
#[async_trait::async_trait]
pub trait StockInfoCache: Send + Sync {
    async fn get_all(&self) -> anyhow::Result<Vec<StockInfo>>;

    /// Upsert keyed by ticker.
    async fn save(&self, stock_info: &StockInfo) -> anyhow::Result<()>;

    async fn clear(&self) -> anyhow::Result<()>;
}

/// One JSON file per ticker. Entries are written to a temp file and renamed
/// into place, so a crash mid-write never leaves a half-written entry.
#[derive(Debug, Clone)]
pub struct FileStockInfoCache {
    dir: PathBuf,
}

impl FileStockInfoCache {
    pub async fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create cache dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn entry_path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.{ENTRY_EXT}", file_stem_for(ticker)))
    }
}

#[async_trait::async_trait]
impl StockInfoCache for FileStockInfoCache {
    async fn get_all(&self) -> anyhow::Result<Vec<StockInfo>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to read cache dir {}", self.dir.display()))?;

        let mut out = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await.context("failed to list cache dir")? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }

            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "unreadable cache entry; ignoring");
                    continue;
                }
            };
            match serde_json::from_slice::<StockInfo>(&bytes) {
                Ok(info) => {
                    out.insert(info.ticker.clone(), info);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "corrupt cache entry; ignoring");
                }
            }
        }

        Ok(out.into_values().collect())
    }

    async fn save(&self, stock_info: &StockInfo) -> anyhow::Result<()> {
        let path = self.entry_path(&stock_info.ticker);
        let tmp = path.with_extension(TMP_EXT);
        let bytes = serde_json::to_vec_pretty(stock_info).context("failed to serialize cache entry")?;

        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to move cache entry into place: {}", path.display()))?;

        tracing::debug!(ticker = %stock_info.ticker, path = %path.display(), "cache entry saved");
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to read cache dir {}", self.dir.display()))?;

        let mut removed: usize = 0;
        while let Some(entry) = entries.next_entry().await.context("failed to list cache dir")? {
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if ext != Some(ENTRY_EXT) && ext != Some(TMP_EXT) {
                continue;
            }
            tokio::fs::remove_file(&path)
                .await
                .with_context(|| format!("failed to remove cache entry {}", path.display()))?;
            removed += 1;
        }

        tracing::debug!(removed, dir = %self.dir.display(), "cache cleared");
        Ok(())
    }
}

/// Process-local cache with the same contract as the file cache.
#[derive(Debug, Default)]
pub struct MemoryStockInfoCache {
    entries: tokio::sync::Mutex<BTreeMap<String, StockInfo>>,
}

impl MemoryStockInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl StockInfoCache for MemoryStockInfoCache {
    async fn get_all(&self) -> anyhow::Result<Vec<StockInfo>> {
        Ok(self.entries.lock().await.values().cloned().collect())
    }

    async fn save(&self, stock_info: &StockInfo) -> anyhow::Result<()> {
        self.entries
            .lock()
            .await
            .insert(stock_info.ticker.clone(), stock_info.clone());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

/// Escapes anything outside `[A-Za-z0-9._-]` as `%XX`, so distinct tickers
/// never share a file.
fn file_stem_for(ticker: &str) -> String {
    let mut out = String::with_capacity(ticker.len());
    for b in ticker.bytes() {
        if b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::expectation::ExpectationLevel;
    use chrono::Utc;

    pub(crate) fn stock(ticker: &str, price: f64) -> StockInfo {
        StockInfo {
            ticker: ticker.to_string(),
            current_price: price,
            price_target: Some(price * 1.1),
            price_expectation: ExpectationLevel::Bullish,
            recommendation_trend: vec![],
            trend_expectation: ExpectationLevel::Neutral,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pricetargets-{label}-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn file_stems_are_escaped() {
        assert_eq!(file_stem_for("AAPL"), "AAPL");
        assert_eq!(file_stem_for("BRK.B"), "BRK.B");
        assert_eq!(file_stem_for("BRK/B"), "BRK%2FB");
        assert_ne!(file_stem_for("A/B"), file_stem_for("A_B"));
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let dir = temp_dir("cache-upsert");
        let cache = FileStockInfoCache::open(&dir).await.unwrap();

        cache.save(&stock("AAA", 10.0)).await.unwrap();
        let second = stock("AAA", 12.0);
        cache.save(&second).await.unwrap();

        let all = cache.get_all().await.unwrap();
        assert_eq!(all, vec![second]);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn entries_survive_reopen_and_clear_empties() {
        let dir = temp_dir("cache-reopen");
        {
            let cache = FileStockInfoCache::open(&dir).await.unwrap();
            cache.save(&stock("AAA", 1.0)).await.unwrap();
            cache.save(&stock("BBB", 2.0)).await.unwrap();
        }

        let reopened = FileStockInfoCache::open(&dir).await.unwrap();
        let tickers: Vec<String> = reopened.get_all().await.unwrap().into_iter().map(|s| s.ticker).collect();
        assert_eq!(tickers, vec!["AAA", "BBB"]);

        reopened.clear().await.unwrap();
        assert!(reopened.get_all().await.unwrap().is_empty());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_entries_are_skipped() {
        let dir = temp_dir("cache-corrupt");
        let cache = FileStockInfoCache::open(&dir).await.unwrap();
        cache.save(&stock("AAA", 1.0)).await.unwrap();
        tokio::fs::write(dir.join("BROKEN.json"), b"{not json").await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), b"ignored").await.unwrap();

        let all = cache.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].ticker, "AAA");

        cache.clear().await.unwrap();
        assert!(dir.join("notes.txt").exists());
        assert!(!dir.join("BROKEN.json").exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn memory_cache_upsert_and_clear() {
        let cache = MemoryStockInfoCache::new();
        cache.save(&stock("AAA", 1.0)).await.unwrap();
        let newer = stock("AAA", 3.0);
        cache.save(&newer).await.unwrap();
        assert_eq!(cache.get_all().await.unwrap(), vec![newer]);

        cache.clear().await.unwrap();
        assert!(cache.is_empty().await);
    }
}
