pub mod engine;
pub mod escalation;
pub mod flap;

pub use engine::{AlertEngine, EngineHandle, EngineTask};
pub use escalation::EscalationManager;
pub use flap::FlapDetector;
