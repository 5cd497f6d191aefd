//! Area code prefix table
//!
//! Tab separated rows, the first column holding a numeric prefix such as
//! `06131`. The remaining columns (place names) are ignored.

use std::path::Path;

use tracing::{debug, error};

use crate::error::Result;

/// Prefix length assumed when no row matches (toll-free ranges, `0800`)
pub const DEFAULT_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct AreaCodeTable {
    /// Sorted longest first so the first hit is the longest match
    prefixes: Vec<String>,
}

impl AreaCodeTable {
    pub fn from_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        prefixes.dedup();
        Self { prefixes }
    }

    pub fn parse(text: &str) -> Self {
        Self::from_prefixes(
            text.lines()
                .filter_map(|row| row.split('\t').next())
                .map(str::trim),
        )
    }

    /// Load the table; a missing file is logged and yields an empty table
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                let table = Self::parse(&text);
                debug!("Loaded {} area codes from {}", table.len(), path.display());
                Ok(table)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!("{} not found", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Length of the longest prefix of `number` in the table
    pub fn prefix_len(&self, number: &str) -> usize {
        self.prefixes
            .iter()
            .find(|prefix| number.starts_with(prefix.as_str()))
            .map_or(DEFAULT_PREFIX_LEN, |prefix| prefix.len())
    }
}
