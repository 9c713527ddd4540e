//! Hybrid classification: four scorers fused into one ranked result.

mod manager;

pub use manager::CategoryManager;
