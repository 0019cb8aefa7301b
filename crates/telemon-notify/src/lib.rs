pub mod message;
pub mod notifier;
pub mod providers;
pub mod router;

pub use message::{NotifyLevel, NotifyMessage};
pub use notifier::{Notifier, NotifyResult};
pub use providers::{AppriseNotifier, SlackNotifier, WebhookNotifier};
pub use router::NotifyRouter;
