pub mod error;
pub mod handlers;
pub mod logbuffer;
pub mod routes;
pub mod state;

pub use error::{ApiError, Result};
pub use logbuffer::{LogBuffer, LogBufferLayer, LogEntry};
pub use routes::router;
pub use state::{ApiState, StatusSource};
