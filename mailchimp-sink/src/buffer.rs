use crate::types::SubscriberEntry;

/// Ordered, size-bounded collection of subscribers awaiting delivery.
///
/// The buffer only signals when it is full, the owner decides when to drain it.
#[derive(Debug)]
pub struct BatchBuffer {
    entries: Vec<SubscriberEntry>,
    max_size: usize,
}

impl BatchBuffer {
    /// Creates an empty buffer that reports full at `max_size` entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size,
        }
    }

    /// Adds `entry` after every entry already buffered.
    pub fn append(&mut self, entry: SubscriberEntry) {
        self.entries.push(entry);
    }

    /// Returns `true` once the buffer holds `max_size` entries or more.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_size
    }

    /// Takes every buffered entry in insertion order, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<SubscriberEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[SubscriberEntry] {
        &self.entries
    }
}
