use std::fs::{self, create_dir_all, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::date::DEFAULT_DATE_FORMAT;
use crate::error::{Error, Result};
use crate::export::DEFAULT_SHEET_NAME;
use crate::pagination::{Labels, PaginationOptions, DEFAULT_ITEMS_PER_PAGE, DEFAULT_MAX_VISIBLE_PAGES};
use crate::types::SearchOptions;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportSettings {
    pub sheet_name: String,
    pub delimiter: String,
    pub include_header: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.into(),
            delimiter: ",".into(),
            include_header: true,
        }
    }
}

/// User defaults for paging, search, dates and export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub items_per_page: usize,
    pub max_visible_pages: usize,
    pub per_page_options: Vec<usize>,
    pub labels: Labels,
    pub search: SearchOptions,
    pub date_format: String,
    pub export: ExportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            max_visible_pages: DEFAULT_MAX_VISIBLE_PAGES,
            per_page_options: vec![10, 20, 50, 100],
            labels: Labels::default(),
            search: SearchOptions::default(),
            date_format: DEFAULT_DATE_FORMAT.into(),
            export: ExportSettings::default(),
        }
    }
}

impl Settings {
    /// Pager options seeded from these settings.
    pub fn pagination_options(&self, total_items: usize) -> PaginationOptions {
        PaginationOptions {
            total_items,
            items_per_page: self.items_per_page,
            max_visible_pages: self.max_visible_pages,
            per_page_options: self.per_page_options.clone(),
            labels: self.labels.clone(),
            ..PaginationOptions::default()
        }
    }
}

// Get the config file path, creating its directory
pub fn config_file_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "snappy-grid").ok_or(Error::NoConfigDir)?;
    let dir = dirs.config_dir();
    create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    Ok(dir.join(SETTINGS_FILE))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&config_file_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let body = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::json("settings", e))?;
    fs::write(path, body).map_err(|e| Error::io(path, e))?;
    debug!(path = %path.display(), "saved settings");
    Ok(())
}

/// Missing file yields defaults; a corrupt one is an error.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&config_file_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::json(path.display().to_string(), e))
}

/// Like [`load_settings`] but falls back to defaults on any failure.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|err| {
        warn!(%err, "using default settings");
        Settings::default()
    })
}

pub fn clear_settings() -> Result<()> {
    clear_settings_at(&config_file_path()?)
}

pub fn clear_settings_at(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}
