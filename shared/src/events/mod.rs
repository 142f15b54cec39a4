mod event_queue;
mod queued_event;

pub use event_queue::{EventQueue, DEFAULT_EVENT_QUEUE_CAPACITY};
pub use queued_event::{EventKind, QueuedEvent};
