pub mod anova;
pub mod brackets;
pub mod comparator;
pub mod describe;
pub mod pvalue;
pub mod tukey;
