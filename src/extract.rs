//! Turns a batch's class listing into the downloadable link file.
use crate::catalog::model::{BatchContent, ClassEntry};
use crate::model::LinkEntry;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use uuid::Uuid;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

pub fn strip_html_tags(input: &str) -> String {
    HTML_TAG.replace_all(input, "").into_owned()
}

fn entry_from_class(class: &ClassEntry) -> Option<LinkEntry> {
    let link = class.link.as_deref().filter(|l| !l.is_empty())?;
    Some(LinkEntry {
        title: strip_html_tags(class.class_name.as_deref().unwrap_or_default()),
        link: link.to_string(),
    })
}

/// Free classes first, then every class of every paid topic, in source order.
/// Classes without a link are dropped.
pub fn extract_links(content: &BatchContent) -> Vec<LinkEntry> {
    let free = content.free_class.iter().flatten();
    let paid = content
        .paid_class
        .iter()
        .flatten()
        .flat_map(|topic| topic.classes.iter().flatten());
    free.chain(paid).filter_map(entry_from_class).collect()
}

/// One `title : link` line per entry, each newline-terminated.
pub fn render_links(entries: &[LinkEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_line());
        out.push('\n');
    }
    out
}

/// Batch title with spaces (and path separators) replaced by `_`, plus `.txt`.
pub fn export_file_name(batch_title: &str) -> String {
    let stem: String = batch_title
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    let stem = if stem.trim_matches('_').is_empty() || stem.starts_with('.') {
        format!("batch{stem}")
    } else {
        stem
    };
    format!("{stem}.txt")
}

/// Write the rendered file into `dir` under a unique name and return its path.
/// Concurrent exports of equally titled batches never share a file.
pub async fn write_export(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}_{file_name}", Uuid::new_v4().simple()));
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Delete a delivered export. A file that is already gone is not an error.
pub async fn remove_export(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}
