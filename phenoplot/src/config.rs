use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::helper_functions::project_root;
use crate::models::polars_err;
use crate::plotting::stacked_bar::{BarPosition, SampleOrder};

pub const CONFIG_ENV: &str = "PHENOPLOT_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub seed: u64,
    pub image_format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub stacked_position: BarPosition,
    pub sample_order: SampleOrder,
    /// Long table `sample, group, signature, exposure`; mock data when unset.
    pub signature_csv: Option<PathBuf>,
    /// Long table `sample, group, cell_type, value`; mock data when unset.
    pub immune_csv: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("figures"),
            seed: 42,
            image_format: ImageFormat::Png,
            width: 1200,
            height: 600,
            stacked_position: BarPosition::Stack,
            sample_order: SampleOrder::ById,
            signature_csv: None,
            immune_csv: None,
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> PolarsResult<Self> {
        let file = File::open(path).map_err(|e| polars_err(Box::new(e)))?;
        serde_json::from_reader(file).map_err(|e| polars_err(Box::new(e)))
    }

    /// `PHENOPLOT_CONFIG` if set, defaults otherwise. Relative paths are
    /// anchored at the project root.
    pub fn resolve() -> PolarsResult<Self> {
        let root = project_root();
        let mut cfg = match env::var_os(CONFIG_ENV) {
            Some(p) => {
                let p = PathBuf::from(p);
                let p = if p.is_relative() { root.join(p) } else { p };
                info!("Reading run configuration from {}", p.display());
                Self::from_json_file(&p)?
            }
            None => Self::default(),
        };
        for path in [
            Some(&mut cfg.output_dir),
            cfg.signature_csv.as_mut(),
            cfg.immune_csv.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        Ok(cfg)
    }

    pub fn figure_path(&self, stem: &str) -> PathBuf {
        self.output_dir
            .join(format!("{stem}.{}", self.image_format.extension()))
    }

    /// Record the configuration a run used beside its outputs.
    pub fn write_json(&self) -> PolarsResult<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(|e| polars_err(Box::new(e)))?;
        let path = self.output_dir.join("run_config.json");
        let body = serde_json::to_string_pretty(self).map_err(|e| polars_err(Box::new(e)))?;
        fs::write(&path, body).map_err(|e| polars_err(Box::new(e)))?;
        Ok(path)
    }
}
