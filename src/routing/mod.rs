//! SLA-aware routing and time-driven escalation.

mod escalation;
mod load;
mod router;

pub use escalation::EscalationTracker;
pub use load::TeamLoadTracker;
pub use router::AutoRouter;
