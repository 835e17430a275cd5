//! Synthetic mutational-signature exposures for the stacked composition chart.
//!
//! Every sample belongs to exactly one phenotype group (assigned
//! round-robin) and carries one uniform `[0, 1)` exposure per signature.

use polars::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;

use crate::models::{Dataset, GROUP_COL, SAMPLE_COL};

pub const SIGNATURE_COL: &str = "signature";
pub const EXPOSURE_COL: &str = "exposure";

pub struct MockSignatureExposures {
    pub n_samples: usize,
    pub signatures: Vec<String>,
    pub groups: Vec<String>,
    pub seed: u64,
}

impl MockSignatureExposures {
    /// 10 samples x 3 signatures over 3 phenotype groups.
    pub fn example(seed: u64) -> Self {
        Self {
            n_samples: 10,
            signatures: vec!["SBS1".into(), "SBS5".into(), "SBS13".into()],
            groups: vec!["MSS".into(), "MSI".into(), "POLE".into()],
            seed,
        }
    }

    pub fn sample_id(i: usize) -> String {
        format!("S{:02}", i + 1)
    }
}

impl Dataset for MockSignatureExposures {
    fn load(&self) -> PolarsResult<DataFrame> {
        if self.groups.is_empty() || self.signatures.is_empty() {
            return Err(PolarsError::ComputeError(
                "mock exposures need at least one group and one signature".into(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let rows = self.n_samples * self.signatures.len();
        let mut samples = Vec::with_capacity(rows);
        let mut groups = Vec::with_capacity(rows);
        let mut sigs = Vec::with_capacity(rows);
        let mut exposures = Vec::with_capacity(rows);

        for i in 0..self.n_samples {
            let sample = Self::sample_id(i);
            let group = &self.groups[i % self.groups.len()];
            for sig in &self.signatures {
                samples.push(sample.clone());
                groups.push(group.clone());
                sigs.push(sig.clone());
                exposures.push(rng.gen::<f64>());
            }
        }

        info!(
            "Generated {} exposures ({} samples x {} signatures, seed {})",
            rows,
            self.n_samples,
            self.signatures.len(),
            self.seed
        );

        DataFrame::new(vec![
            Column::from(Series::new(SAMPLE_COL.into(), samples)),
            Column::from(Series::new(GROUP_COL.into(), groups)),
            Column::from(Series::new(SIGNATURE_COL.into(), sigs)),
            Column::from(Series::new(EXPOSURE_COL.into(), exposures)),
        ])
    }
}
