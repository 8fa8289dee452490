//! Recycling of [`KeyRecord`] buffers between scorers and the saver.

use crossbeam_queue::ArrayQueue;

use crate::models::KeyRecord;

/// Bounded pool of cleared records.
///
/// Checkout hands out ownership, so a record can only be touched by whoever
/// holds it. Returning it clears the contents; the string buffers are kept
/// for the next checkout.
#[derive(Debug)]
pub struct RecordPool {
    slots: ArrayQueue<KeyRecord>,
}

impl RecordPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// A recycled record, or a fresh one when the pool is empty.
    pub fn checkout(&self) -> KeyRecord {
        self.slots.pop().unwrap_or_default()
    }

    /// Clear and return a record. Dropped when the pool is full.
    pub fn recycle(&self, mut record: KeyRecord) {
        record.clear();
        let _ = self.slots.push(record);
    }

    pub fn available(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Score;

    #[test]
    fn checkout_from_empty_pool_is_fresh() {
        let pool = RecordPool::new(2);
        assert_eq!(pool.checkout(), KeyRecord::default());
    }

    #[test]
    fn recycled_records_come_back_cleared() {
        let pool = RecordPool::new(2);
        let record = KeyRecord::new("ABCD", "pub", "priv", &Score::default());
        pool.recycle(record);
        assert_eq!(pool.available(), 1);

        let reused = pool.checkout();
        assert_eq!(reused, KeyRecord::default());
        assert!(reused.fingerprint.capacity() >= 4);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn full_pool_drops_extra_records() {
        let pool = RecordPool::new(1);
        pool.recycle(KeyRecord::default());
        pool.recycle(KeyRecord::default());
        assert_eq!(pool.available(), 1);
    }
}
