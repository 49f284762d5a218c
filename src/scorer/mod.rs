pub mod crps;
pub mod crps_scorer;
pub mod evaluator;

pub use crps_scorer::{CrpsScorer, ScoringHorizon};
pub use evaluator::{CycleReport, Evaluator};
