pub mod status;
pub mod supervisor;

pub use status::ServerStatus;
pub use supervisor::Supervisor;
