//! Spoken notification path: a small speaker capability with a no-op
//! fallback, and the dispatcher that converts transcript and approval
//! signals into at most one utterance per logical event.

pub mod dispatcher;
pub mod speaker;

pub use dispatcher::{NotificationDispatcher, ALERT_PHRASE, SETTLE_DELAY};
pub use speaker::{select_voice, CollectSpeaker, NullSpeaker, Speaker, SystemSpeaker};
