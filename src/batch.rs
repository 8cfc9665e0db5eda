use crate::download::{
    archive_file_name, partial_path, Credentials, Downloader, ProductCatalog, TokenProvider,
    Transfer, ARCHIVE_EXTENSION,
};
use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

impl DownloadSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Names of the products already archived in a destination directory.
#[derive(Debug, Clone, Default)]
pub struct LocalArchiveIndex {
    names: HashSet<String>,
}

impl LocalArchiveIndex {
    /// List `dir` once, creating it if it does not exist yet.
    pub fn scan(dir: &Path) -> Result<Self, FetchError> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let suffix = format!(".{ARCHIVE_EXTENSION}");
        let mut names = HashSet::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(&suffix) {
                    names.insert(stem.to_string());
                }
            }
        }
        Ok(Self { names })
    }

    pub fn contains(&self, product_name: &str) -> bool {
        self.names.contains(product_name)
    }

    pub fn insert(&mut self, product_name: &str) {
        self.names.insert(product_name.to_string());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Download every product in order. Failures are recorded, never raised.
pub async fn run<P>(
    downloader: &Downloader<'_, P>,
    credentials: &Credentials,
    product_names: &[String],
    destination_dir: &Path,
) -> DownloadSummary
where
    P: TokenProvider + ProductCatalog + Transfer,
{
    let mut index = match LocalArchiveIndex::scan(destination_dir) {
        Ok(index) => index,
        Err(err) => {
            warn!(dir = ?destination_dir, "Unable to list destination directory: {err}");
            LocalArchiveIndex::default()
        }
    };
    info!(
        products = product_names.len(),
        already_archived = index.len(),
        "Starting batch download"
    );

    let mut summary = DownloadSummary::default();
    for name in product_names {
        if index.contains(name) {
            info!(product = %name, "Already downloaded, skipping");
            summary.skipped += 1;
            continue;
        }

        match downloader
            .fetch(credentials, name, destination_dir, None)
            .await
        {
            Ok(_) => {
                summary.succeeded += 1;
                index.insert(name);
            }
            Err(err) => {
                error!(product = %name, "Download failed: {err}");
                summary.failed.push(name.clone());
                remove_leftovers(destination_dir, name);
            }
        }
    }

    info!(
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        "Batch download finished"
    );
    summary
}

fn remove_leftovers(destination_dir: &Path, product_name: &str) {
    let path = destination_dir.join(archive_file_name(product_name));
    for leftover in [partial_path(&path), path] {
        match fs::remove_file(&leftover) {
            Ok(()) => info!(path = ?leftover, "Removed file left by failed download"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = ?leftover, "Failed to remove file: {err}"),
        }
    }
}
