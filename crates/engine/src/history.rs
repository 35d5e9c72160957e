use futdesk_core::OrderRecord;
use std::iter::Rev;
use std::slice::Iter;

/// Append-only log of orders the exchange acknowledged during this session.
#[derive(Debug, Default, Clone)]
pub struct OrderHistory {
    records: Vec<OrderRecord>,
}

impl OrderHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: OrderRecord) {
        self.records.push(record);
    }

    /// Newest first. The iterator is lazy and `Clone`, so it can be walked again.
    pub fn most_recent_first(&self) -> Rev<Iter<'_, OrderRecord>> {
        self.records.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
