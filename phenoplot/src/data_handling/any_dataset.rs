use polars::error::PolarsResult;
use polars::frame::DataFrame;
use tracing::{error, info};

use crate::helper_functions::{read_csv, require_columns};
use crate::models::Dataset;

/// A long-format table on disk. `required` lists the columns a pipeline
/// needs; loading fails if any is absent.
pub struct TableDataset {
    pub path: String,
    pub required: Vec<String>,
}

impl TableDataset {
    pub fn new(path: &str, required: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            required: required.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Dataset for TableDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading data from {}", &self.path);
        let df = match read_csv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read CSV {}: {}", self.path, e);
                return Err(e);
            }
        };
        let cols: Vec<&str> = self.required.iter().map(String::as_str).collect();
        require_columns(&df, &cols)?;
        info!("Loaded {} rows x {} columns", df.height(), df.width());
        Ok(df)
    }
}
