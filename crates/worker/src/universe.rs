use anyhow::Context;
use pricetargets_core::domain::stock::normalize_ticker;
use std::collections::HashSet;
use std::path::PathBuf;

const DEFAULT_TICKERS_FILE: &str = "tickers.txt";

#[derive(Debug, Clone)]
pub struct UniverseOptions {
    /// Comma separated symbols given on the command line. Wins over the file.
    pub inline: Option<String>,

    /// One symbol per line; `#` starts a comment.
    pub tickers_file: PathBuf,
}

impl Default for UniverseOptions {
    fn default() -> Self {
        Self {
            inline: None,
            tickers_file: PathBuf::from(DEFAULT_TICKERS_FILE),
        }
    }
}

impl UniverseOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("TICKERS") {
            if !s.trim().is_empty() {
                out.inline = Some(s);
            }
        }

        if let Ok(s) = std::env::var("TICKERS_FILE") {
            if !s.trim().is_empty() {
                out.tickers_file = PathBuf::from(s);
            }
        }

        out
    }
}

/// Ordered, de-duplicated ticker list. An empty universe is a startup error.
pub fn load_tickers(opts: &UniverseOptions) -> anyhow::Result<Vec<String>> {
    let tickers = match opts.inline.as_deref() {
        Some(inline) => parse_tickers(inline),
        None => {
            let text = std::fs::read_to_string(&opts.tickers_file)
                .with_context(|| format!("failed to read tickers file {}", opts.tickers_file.display()))?;
            parse_tickers(&text)
        }
    };

    anyhow::ensure!(!tickers.is_empty(), "ticker universe is empty");
    Ok(tickers)
}

fn parse_tickers(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for line in text.lines() {
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };

        for raw in line.split([',', ' ', '\t']) {
            if let Some(ticker) = normalize_ticker(raw) {
                if seen.insert(ticker.clone()) {
                    out.push(ticker);
                }
            }
        }
    }

    out
}
