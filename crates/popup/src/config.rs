use crate::constants::{APP_DIR_NAME, DATABASE_FILE, DATA_DIR_ENV};
use std::path::PathBuf;

/// Where the popup keeps its data and how it presents results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    /// Produce HTML for markdown and HTML-like results.
    pub render_rich: bool,
}

impl PopupConfig {
    /// Defaults, with the data directory taken from `SMARTNOTES_DATA_DIR`
    /// when set.
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        Self {
            data_dir,
            ..Self::default()
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_render_rich(mut self, render_rich: bool) -> Self {
        self.render_rich = render_rich;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: DATABASE_FILE.to_string(),
            render_rich: true,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
