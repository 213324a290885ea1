//! Client-side save of the result CSV.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing::info;

/// `analysis_results_<YYYY-MM-DD>.csv` for `date`.
pub fn result_filename(date: NaiveDate) -> String {
    format!("analysis_results_{}.csv", date.format("%Y-%m-%d"))
}

/// First path in `dir` for `name` that does not exist yet; later saves on
/// the same day get a `_1`, `_2`, ... suffix.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Write `csv` into `dir` under today's (UTC) result name.
pub async fn save_download(dir: &Path, csv: &str) -> std::io::Result<PathBuf> {
    save_download_on(dir, csv, Utc::now().date_naive()).await
}

pub async fn save_download_on(dir: &Path, csv: &str, date: NaiveDate) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = unique_path(dir, &result_filename(date));
    tokio::fs::write(&path, csv.as_bytes()).await?;
    info!(path = %path.display(), bytes = csv.len(), "result saved");
    Ok(path)
}
