use std::error::Error;

use polars::prelude::*;
use serde::Serialize;

/// Long-format column names shared by both pipelines.
pub const SAMPLE_COL: &str = "sample";
pub const GROUP_COL: &str = "group";
pub const VALUE_COL: &str = "value";

/// Partition label used when a comparison runs over the whole table.
pub const ALL_PARTITION: &str = "all";

pub fn polars_err(e: Box<dyn Error + Send + Sync>) -> PolarsError {
    PolarsError::ComputeError(format!("{}", e).into())
}

pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

/// Which columns of a long table play which role.
#[derive(Debug, Clone)]
pub struct AesMapping {
    pub sample: String,
    pub group: String,
    /// Stack fill for pipeline A, facet partition for pipeline B.
    pub category: Option<String>,
    pub value: String,
}

impl AesMapping {
    pub fn new(sample: &str, group: &str, category: Option<&str>, value: &str) -> Self {
        Self {
            sample: sample.to_string(),
            group: group.to_string(),
            category: category.map(str::to_string),
            value: value.to_string(),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        let mut cols = vec![self.sample.as_str(), self.group.as_str()];
        if let Some(c) = &self.category {
            cols.push(c.as_str());
        }
        cols.push(self.value.as_str());
        cols
    }
}

/// Closed, display-ordered set of phenotype labels (factor levels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhenotypeLevels(Vec<String>);

impl PhenotypeLevels {
    pub fn new<S: AsRef<str>>(levels: &[S]) -> PolarsResult<Self> {
        let mut out: Vec<String> = Vec::with_capacity(levels.len());
        for l in levels {
            let l = l.as_ref();
            if out.iter().any(|o| o == l) {
                return Err(PolarsError::Duplicate(
                    format!("phenotype level `{l}` listed twice").into(),
                ));
            }
            out.push(l.to_string());
        }
        Ok(Self(out))
    }

    /// Levels in order of first appearance.
    pub fn from_appearance<'a, I: IntoIterator<Item = &'a str>>(values: I) -> Self {
        let mut out: Vec<String> = Vec::new();
        for v in values {
            if !out.iter().any(|o| o == v) {
                out.push(v.to_string());
            }
        }
        Self(out)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// One pairwise group comparison inside a partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub partition: Option<String>,
    pub group_a: String,
    pub group_b: String,
    pub n_a: usize,
    pub n_b: usize,
    /// mean(group_b) - mean(group_a)
    pub estimate: f64,
    pub conf_low: f64,
    pub conf_high: f64,
    pub raw_p: f64,
    pub adjusted_p: f64,
    pub significance_label: String,
    pub bracket_y_position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaTable {
    pub partition: Option<String>,
    pub df_between: usize,
    pub df_within: usize,
    pub ss_between: f64,
    pub ss_within: f64,
    pub f_value: f64,
    pub p_value: f64,
}

impl AnovaTable {
    pub fn ms_within(&self) -> f64 {
        self.ss_within / self.df_within as f64
    }
}

pub fn comparisons_to_dataframe(rows: &[ComparisonResult]) -> PolarsResult<DataFrame> {
    let partition: Vec<Option<&str>> = rows.iter().map(|r| r.partition.as_deref()).collect();
    DataFrame::new(vec![
        Column::from(Series::new("partition".into(), partition)),
        Column::from(Series::new(
            "group1".into(),
            rows.iter().map(|r| r.group_a.as_str()).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "group2".into(),
            rows.iter().map(|r| r.group_b.as_str()).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "n1".into(),
            rows.iter().map(|r| r.n_a as u32).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "n2".into(),
            rows.iter().map(|r| r.n_b as u32).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "estimate".into(),
            rows.iter().map(|r| r.estimate).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "conf_low".into(),
            rows.iter().map(|r| r.conf_low).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "conf_high".into(),
            rows.iter().map(|r| r.conf_high).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "p".into(),
            rows.iter().map(|r| r.raw_p).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "p_adj".into(),
            rows.iter().map(|r| r.adjusted_p).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "p_adj_signif".into(),
            rows.iter()
                .map(|r| r.significance_label.as_str())
                .collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "y_position".into(),
            rows.iter().map(|r| r.bracket_y_position).collect::<Vec<_>>(),
        )),
    ])
}

pub fn anova_to_dataframe(rows: &[AnovaTable]) -> PolarsResult<DataFrame> {
    let partition: Vec<Option<&str>> = rows.iter().map(|r| r.partition.as_deref()).collect();
    DataFrame::new(vec![
        Column::from(Series::new("partition".into(), partition)),
        Column::from(Series::new(
            "df_between".into(),
            rows.iter().map(|r| r.df_between as u32).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "df_within".into(),
            rows.iter().map(|r| r.df_within as u32).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "ss_between".into(),
            rows.iter().map(|r| r.ss_between).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "ss_within".into(),
            rows.iter().map(|r| r.ss_within).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "F".into(),
            rows.iter().map(|r| r.f_value).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "p".into(),
            rows.iter().map(|r| r.p_value).collect::<Vec<_>>(),
        )),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_keep_first_appearance_order() {
        let lv = PhenotypeLevels::from_appearance(["MSS", "MSI", "MSS", "POLE"]);
        assert_eq!(lv.as_slice(), &["MSS", "MSI", "POLE"]);
        assert_eq!(lv.position("POLE"), Some(2));
        assert_eq!(lv.position("HRD"), None);
    }

    #[test]
    fn duplicate_levels_rejected() {
        assert!(PhenotypeLevels::new(&["a", "b", "a"]).is_err());
    }

    #[test]
    fn comparison_frame_has_one_row_per_result() {
        let row = ComparisonResult {
            partition: Some("CD8".into()),
            group_a: "A".into(),
            group_b: "B".into(),
            n_a: 3,
            n_b: 4,
            estimate: 1.0,
            conf_low: 0.5,
            conf_high: 1.5,
            raw_p: 0.01,
            adjusted_p: 0.03,
            significance_label: "*".into(),
            bracket_y_position: 4.2,
        };
        let df = comparisons_to_dataframe(&[row.clone(), row]).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 12);
    }
}
