pub mod any_dataset;
pub mod mock_immune;
pub mod mock_signatures;
