//! Storage import scanner.
//!
//! Walks the storage root once: files of the rentals subdirectory become
//! rental items, every other subdirectory whose name maps to a gallery
//! category becomes gallery images. Only files whose public URL is unknown
//! are imported, so running it again is a no-op.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use crate::db::models::{GalleryCategory, NewGalleryImage, NewRentalItem};
use crate::db::{categories, gallery, rentals, Store, StoreError};

pub const STORAGE_URL_PREFIX: &str = "/storage";
const FALLBACK_CATEGORY: &str = "other";
const RENTAL_DESCRIPTION: &str = "Importé automatiquement depuis le stockage";
const GALLERY_DESCRIPTION: &str = "Importé depuis le stockage";

/// Files whose lowercased name contains any `keywords` entry belong to `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new("flower", &["fleur", "bouquet", "flower"]),
        KeywordRule::new("centerpiece", &["table"]),
        KeywordRule::new("backdrop", &["arche", "arch", "mur", "wall", "backdrop"]),
        KeywordRule::new("animation", &["animation"]),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid keyword file {path}: {reason}")]
    Keywords { path: PathBuf, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads a JSON array of [`KeywordRule`]s, in priority order.
pub fn load_rules(path: &Path) -> Result<Vec<KeywordRule>, ScanError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rules: Vec<KeywordRule> = serde_json::from_str(&raw).map_err(|e| ScanError::Keywords {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(rules
        .into_iter()
        .map(|rule| KeywordRule {
            category: rule.category.trim().to_lowercase(),
            keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub root: PathBuf,
    pub rental_subdir: String,
    pub url_prefix: String,
    pub rules: Vec<KeywordRule>,
}

impl ScannerConfig {
    pub fn from_storage(storage: &StorageConfig) -> Result<Self, ScanError> {
        let rules = match &storage.keywords_file {
            Some(path) => load_rules(path)?,
            None => default_rules(),
        };
        Ok(Self {
            root: storage.storage_dir.clone(),
            rental_subdir: storage.rental_subdir.clone(),
            url_prefix: STORAGE_URL_PREFIX.to_string(),
            rules,
        })
    }
}

/// Category slug for a rental file name: the first rule with a matching keyword, else `other`.
pub fn infer_rental_category<'a>(file_name: &str, rules: &'a [KeywordRule]) -> &'a str {
    let name = file_name.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| !k.is_empty() && name.contains(k.as_str())))
        .map(|rule| rule.category.as_str())
        .unwrap_or(FALLBACK_CATEGORY)
}

/// `bouquet_rose.jpg` -> `Bouquet rose`.
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let spaced = stem.replace(['_', '-'], " ");

    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Maps a storage directory name to its gallery category, tolerating the
/// spellings found on disk.
pub fn normalize_gallery_dir(dir_name: &str) -> Option<GalleryCategory> {
    let name = dir_name.trim().to_lowercase();
    let canonical = match name.as_str() {
        "weeding" => "wedding",
        "baby shower" | "baby-shower" | "babyshower" => "baby_shower",
        "marry me" | "marry-me" => "marryme",
        "baptême" => "bapteme",
        other => other,
    };
    canonical.parse().ok()
}

/// Public URL of a stored file. Spaces in each segment become `%20`.
pub fn public_url(prefix: &str, segments: &[&str]) -> String {
    let mut url = prefix.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(&segment.replace(' ', "%20"));
    }
    url
}

/// The unencoded form stored by older imports.
fn legacy_url(prefix: &str, segments: &[&str]) -> String {
    let mut url = prefix.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(segment);
    }
    url
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub rentals: ImportCounts,
    pub gallery: ImportCounts,
    pub skipped_directories: Vec<String>,
}

#[derive(Debug)]
struct Entry {
    name: String,
    is_dir: bool,
}

/// Non-hidden entries of `dir` sorted by name. A missing directory is empty.
async fn list_dir(dir: &Path) -> Result<Vec<Entry>, ScanError> {
    let io_err = |source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut read = match tokio::fs::read_dir(dir).await {
        Ok(read) => read,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(e)),
    };

    let mut entries = Vec::new();
    while let Some(entry) = read.next_entry().await.map_err(io_err)? {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().await.map_err(io_err)?;
        if !file_type.is_file() && !file_type.is_dir() {
            continue;
        }
        entries.push(Entry {
            name,
            is_dir: file_type.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

pub async fn scan(store: &Store, config: &ScannerConfig) -> Result<ScanReport, ScanError> {
    tracing::info!(root = %config.root.display(), "Starting storage scan");

    let mut report = ScanReport {
        rentals: scan_rentals(store, config).await?,
        ..ScanReport::default()
    };
    scan_gallery(store, config, &mut report).await?;

    tracing::info!(
        rentals_imported = report.rentals.imported,
        rentals_skipped = report.rentals.skipped,
        rentals_failed = report.rentals.failed,
        gallery_imported = report.gallery.imported,
        gallery_skipped = report.gallery.skipped,
        gallery_failed = report.gallery.failed,
        skipped_directories = ?report.skipped_directories,
        "Storage scan completed"
    );
    Ok(report)
}

async fn scan_rentals(store: &Store, config: &ScannerConfig) -> Result<ImportCounts, ScanError> {
    let dir = config.root.join(&config.rental_subdir);
    let files = list_dir(&dir).await?;
    let mut counts = ImportCounts::default();
    if files.is_empty() {
        return Ok(counts);
    }

    let category_ids: HashMap<String, i64> = categories::list(store.pool(), None)
        .await?
        .into_iter()
        .map(|c| (c.slug, c.id))
        .collect();

    for file in files.iter().filter(|e| !e.is_dir) {
        let segments = [config.rental_subdir.as_str(), file.name.as_str()];
        let url = public_url(&config.url_prefix, &segments);
        let legacy = legacy_url(&config.url_prefix, &segments);

        match import_rental(store, config, &category_ids, &file.name, &url, &legacy).await {
            Ok(true) => counts.imported += 1,
            Ok(false) => counts.skipped += 1,
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "Failed to import rental item");
                counts.failed += 1;
            }
        }
    }
    Ok(counts)
}

async fn import_rental(
    store: &Store,
    config: &ScannerConfig,
    category_ids: &HashMap<String, i64>,
    file_name: &str,
    url: &str,
    legacy: &str,
) -> Result<bool, StoreError> {
    if rentals::url_known(store.pool(), &[url, legacy]).await? {
        return Ok(false);
    }

    let slug = infer_rental_category(file_name, &config.rules);
    let category_id = category_ids
        .get(slug)
        .or_else(|| category_ids.get(FALLBACK_CATEGORY))
        .copied();
    let title = title_from_file_name(file_name);

    rentals::insert(
        store.pool(),
        &NewRentalItem {
            title: title.clone(),
            description: RENTAL_DESCRIPTION.to_string(),
            price: 0.0,
            category_id,
            image_url: url.to_string(),
            featured: false,
            available: true,
        },
    )
    .await?;
    tracing::debug!(title = %title, category = slug, "Imported rental item");
    Ok(true)
}

async fn scan_gallery(store: &Store, config: &ScannerConfig, report: &mut ScanReport) -> Result<(), ScanError> {
    for dir in list_dir(&config.root).await? {
        if !dir.is_dir || dir.name == config.rental_subdir {
            continue;
        }
        let Some(category) = normalize_gallery_dir(&dir.name) else {
            tracing::warn!(directory = %dir.name, "Skipping storage directory with no gallery category");
            report.skipped_directories.push(dir.name);
            continue;
        };

        for file in list_dir(&config.root.join(&dir.name)).await? {
            if file.is_dir {
                continue;
            }
            let segments = [dir.name.as_str(), file.name.as_str()];
            let url = public_url(&config.url_prefix, &segments);
            let legacy = legacy_url(&config.url_prefix, &segments);

            match import_gallery_image(store, category, &file.name, &url, &legacy).await {
                Ok(true) => report.gallery.imported += 1,
                Ok(false) => report.gallery.skipped += 1,
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "Failed to import gallery image");
                    report.gallery.failed += 1;
                }
            }
        }
    }
    Ok(())
}

async fn import_gallery_image(
    store: &Store,
    category: GalleryCategory,
    file_name: &str,
    url: &str,
    legacy: &str,
) -> Result<bool, StoreError> {
    if gallery::url_known(store.pool(), &[url, legacy]).await? {
        return Ok(false);
    }

    gallery::insert(
        store.pool(),
        &NewGalleryImage {
            title: title_from_file_name(file_name),
            description: GALLERY_DESCRIPTION.to_string(),
            image_url: url.to_string(),
            category,
            file_name: file_name.to_string(),
            is_from_storage: true,
            featured: false,
            sort_order: 0,
        },
    )
    .await?;
    Ok(true)
}
