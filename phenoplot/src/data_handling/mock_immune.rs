//! Synthetic immune cell-type measurements for the grouped comparison chart.

use polars::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use statrs::distribution::Normal;
use rand::distributions::Distribution;
use tracing::info;

use crate::models::{polars_err, Dataset, GROUP_COL, SAMPLE_COL, VALUE_COL};

pub const CELL_TYPE_COL: &str = "cell_type";

pub struct MockImmuneInfiltration {
    pub groups: Vec<String>,
    pub cell_types: Vec<String>,
    pub n_per_group: usize,
    /// `means[cell_type][group]`
    pub means: Vec<Vec<f64>>,
    pub sd: f64,
    pub seed: u64,
}

impl MockImmuneInfiltration {
    /// 3 phenotype groups x 2 cell types, 10 patients per group.
    pub fn example(seed: u64) -> Self {
        Self {
            groups: vec!["Desert".into(), "Excluded".into(), "Inflamed".into()],
            cell_types: vec!["CD8 T cells".into(), "Macrophages".into()],
            n_per_group: 10,
            means: vec![vec![4.0, 5.0, 8.0], vec![6.0, 6.5, 7.0]],
            sd: 1.0,
            seed,
        }
    }
}

impl Dataset for MockImmuneInfiltration {
    fn load(&self) -> PolarsResult<DataFrame> {
        if self.means.len() != self.cell_types.len()
            || self.means.iter().any(|m| m.len() != self.groups.len())
        {
            return Err(PolarsError::ShapeMismatch(
                "means must hold one row per cell type and one entry per group".into(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let rows = self.cell_types.len() * self.groups.len() * self.n_per_group;
        let mut samples = Vec::with_capacity(rows);
        let mut groups = Vec::with_capacity(rows);
        let mut cells = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);

        for (c, cell) in self.cell_types.iter().enumerate() {
            for (g, group) in self.groups.iter().enumerate() {
                let dist = Normal::new(self.means[c][g], self.sd)
                    .map_err(|e| polars_err(Box::new(e)))?;
                for i in 0..self.n_per_group {
                    samples.push(format!("{group}_{:02}", i + 1));
                    groups.push(group.clone());
                    cells.push(cell.clone());
                    values.push(dist.sample(&mut rng));
                }
            }
        }

        info!(
            "Generated {} immune measurements ({} groups x {} cell types, seed {})",
            rows,
            self.groups.len(),
            self.cell_types.len(),
            self.seed
        );

        DataFrame::new(vec![
            Column::from(Series::new(SAMPLE_COL.into(), samples)),
            Column::from(Series::new(GROUP_COL.into(), groups)),
            Column::from(Series::new(CELL_TYPE_COL.into(), cells)),
            Column::from(Series::new(VALUE_COL.into(), values)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper_functions::{f64_values, str_values};

    #[test]
    fn example_shape() {
        let df = MockImmuneInfiltration::example(42).load().unwrap();
        assert_eq!(df.height(), 60);
        let cells = str_values(&df, CELL_TYPE_COL).unwrap();
        assert_eq!(cells.iter().filter(|c| *c == "Macrophages").count(), 30);
    }

    #[test]
    fn draws_are_positive_and_seeded() {
        let a = MockImmuneInfiltration::example(42).load().unwrap();
        let b = MockImmuneInfiltration::example(42).load().unwrap();
        assert!(a.equals(&b));
        assert!(f64_values(&a, VALUE_COL).unwrap().iter().all(|v| *v > 0.0));
    }

    #[test]
    fn ragged_means_rejected() {
        let mut m = MockImmuneInfiltration::example(1);
        m.means[1].pop();
        assert!(m.load().is_err());
    }

    #[test]
    fn invalid_sd_surfaces_distribution_error() {
        let mut m = MockImmuneInfiltration::example(1);
        m.sd = -1.0;
        assert!(m.load().is_err());
    }
}
