use log::warn;

use super::{EventKind, QueuedEvent};

pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Fixed-capacity FIFO ring buffer. When full, a push evicts the oldest
/// undelivered item, so the newest `capacity` items always survive.
pub struct EventQueue<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
    evicted: u64,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_QUEUE_CAPACITY)
    }
}

impl<T> EventQueue<T> {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
            evicted: 0,
        }
    }

    /// Always succeeds. Returns the evicted item when the queue was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let capacity = self.slots.len();
        let mut evicted_item = None;

        if self.len == capacity {
            evicted_item = self.slots[self.head].take();
            self.head = (self.head + 1) % capacity;
            self.len -= 1;
            if self.evicted == 0 {
                warn!("event queue full at {} entries, dropping oldest events", capacity);
            }
            self.evicted += 1;
        }

        let tail = (self.head + self.len) % capacity;
        self.slots[tail] = Some(item);
        self.len += 1;

        evicted_item
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        if self.len == 0 {
            // next eviction run gets logged again
            self.evicted = 0;
        }
        item
    }

    pub fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Items evicted since the queue was last drained.
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
        self.evicted = 0;
    }
}

impl EventQueue<QueuedEvent> {
    pub fn peek_kind(&self) -> EventKind {
        self.peek().map(|event| event.kind).unwrap_or(EventKind::None)
    }
}
