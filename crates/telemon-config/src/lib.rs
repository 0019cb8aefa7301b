pub mod loader;
pub mod types;
pub mod validate;

pub use loader::{ConfigError, ConfigLoader};
pub use types::{
    AdminState, AlertsConfig, BehaviorConfig, ChannelConfig, ChannelKind, CredentialEntry,
    CredentialsConfig, DesiredState, DeviceConfig, DeviceTlsConfig, FlapConfig, GlobalConfig,
    InterfaceIntent, MemberMode, MemberPolicy, MemberSpec, MonitorConfig, RouteRule,
    SeverityOverrides,
};
pub use validate::validate;
