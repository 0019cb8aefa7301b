pub mod alert;
pub mod event;

pub use alert::{Alert, AlertKey, AlertKind, AlertState, Severity};
pub use event::{AlertEvent, EntityKey};
