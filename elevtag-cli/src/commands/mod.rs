use std::path::PathBuf;

use anyhow::{Context, Result};
use elevtag::{Session, SessionConfig};

pub mod query;
pub mod sources;
pub mod tag;

/// Options shared by every subcommand.
pub struct Settings {
    pub data_dir: PathBuf,
    pub catalog: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub srtm_url: Option<String>,
}

impl Settings {
    pub fn config(&self) -> Result<SessionConfig> {
        let mut builder = SessionConfig::builder(&self.data_dir);
        if let Some(catalog) = &self.catalog {
            builder = builder.catalog_path(catalog);
        }
        if let Some(n) = self.concurrency {
            builder = builder.concurrency(n);
        }
        if let Some(template) = &self.srtm_url {
            builder = builder.srtm_url_template(template.clone());
        }
        builder.build().context("Invalid configuration")
    }

    pub fn session(&self) -> Result<Session> {
        Session::open(self.config()?).context("Failed to open session")
    }
}
