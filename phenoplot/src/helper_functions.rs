use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};

use crate::models::polars_err;

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

pub fn read_csv(file_path: &str) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(file_path)))?
        .finish()
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path) -> PolarsResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| polars_err(Box::new(e)))?;
    }
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Select the required columns, failing with `ColumnNotFound` for the first
/// one that is absent.
pub fn require_columns(df: &DataFrame, cols: &[&str]) -> PolarsResult<()> {
    for &c in cols {
        df.column(c)?;
    }
    debug!("Columns present: {cols:?}");
    Ok(())
}

pub fn str_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    let column = df.column(name)?;
    let column = match column.dtype() {
        DataType::String => column.clone(),
        _ => column.cast(&DataType::String)?,
    };
    let ca = column.str()?;
    ca.into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(str::to_string).ok_or_else(|| {
                PolarsError::ComputeError(format!("null in column `{name}` at row {i}").into())
            })
        })
        .collect()
}

pub fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    let ca = column.f64()?;
    ca.into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                PolarsError::ComputeError(format!("null in column `{name}` at row {i}").into())
            })
        })
        .collect()
}

// Expand a bit so points aren't on the border
pub fn expand_range(min_val: f64, max_val: f64, pct: f64) -> (f64, f64) {
    if (max_val - min_val).abs() < 1e-9 {
        return (min_val - 1.0, max_val + 1.0);
    }
    let range = max_val - min_val;
    let pad = range * pct;
    (min_val - pad, max_val + pad)
}
