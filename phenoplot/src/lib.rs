//! Stacked composition charts and annotated group-comparison boxplots for
//! phenotype-grouped tabular data.

pub mod analysis;
pub mod config;
pub mod data_handling;
pub mod helper_functions;
pub mod models;
pub mod pipelines;
pub mod plotting;
