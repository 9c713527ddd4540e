pub mod classification;
pub mod feedback;
pub mod incident;
pub mod model_version;
pub mod routing;

pub use classification::{CategoryCandidate, ClassificationResult, ScoreMethod};
pub use feedback::FeedbackRecord;
pub use incident::{Incident, Priority};
pub use model_version::{Algorithm, ModelStatus, ModelVersion};
pub use routing::{EscalationLevel, RoutingDecision};
