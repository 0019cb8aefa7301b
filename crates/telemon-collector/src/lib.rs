pub mod backoff;
pub mod collector;
pub mod health;
pub mod tls;

pub use backoff::Backoff;
pub use collector::{
    CapabilitiesSummary, Collector, CollectorConfig, CollectorError, CollectorStreams,
};
pub use health::DeviceHealth;
pub use tls::TlsOptions;
