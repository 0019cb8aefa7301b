pub mod evaluator;
pub mod observation;

pub use evaluator::Evaluator;
pub use observation::{InterfaceObservation, ObservationKey};
