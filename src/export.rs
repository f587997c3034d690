use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::post::Post;

pub fn export_file_name(date: NaiveDate) -> String {
    format!("posts_filtered_{}.json", date.format("%Y-%m-%d"))
}

pub fn render_json(posts: &[&Post]) -> Result<String> {
    serde_json::to_string_pretty(posts).context("export: serialize working set")
}

/// Writes the working set into `dir` and returns the path of the new file.
pub fn export_working_set(posts: &[&Post], dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("export: create directory {}", dir.display()))?;
    let path = dir.join(export_file_name(date));
    let contents = render_json(posts)?;
    fs::write(&path, contents)
        .with_context(|| format!("export: write file {}", path.display()))?;
    tracing::info!(path = %path.display(), count = posts.len(), "exported working set");
    Ok(path)
}
