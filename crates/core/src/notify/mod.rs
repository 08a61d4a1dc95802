//! Backlog notifications for unassigned tickets.

mod digest;
mod notifier;
mod sender;
mod subscribers;

pub use digest::{build_digest, escape_html, russian_plural, truncate_description, DESCRIPTION_LIMIT};
pub use notifier::{BacklogNotifier, NotifyOutcome, SkipReason};
pub use sender::{NotificationSender, NotifyError, TelegramSender};
pub use subscribers::{StaticSubscribers, Subscriber, SubscriberDirectory};
