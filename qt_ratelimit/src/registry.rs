use std::collections::HashMap;

use crate::bucket::TokenBucket;
use crate::error::LimitError;
use crate::error::Result;

/// Named buckets for one exchange-limiter instance
///
/// The registry is owned exclusively by its [`Limiter`](crate::Limiter);
/// buckets never escape it and are mutated only through admission calls.
#[derive(Debug)]
pub(crate) struct BucketRegistry {
    index: HashMap<&'static str, usize>,
    buckets: Vec<TokenBucket>,
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self { index: HashMap::new(), buckets: Vec::new() }
    }

    /// Register a bucket under a unique name
    pub fn insert(&mut self, name: &'static str, bucket: TokenBucket) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(LimitError::InvalidConfig("duplicate bucket name"));
        }

        self.index.insert(name, self.buckets.len());
        self.buckets.push(bucket);
        Ok(())
    }

    /// Resolve a bucket name to its slot
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Get a bucket by slot, as resolved at construction time
    pub fn get(&self, slot: usize) -> &TokenBucket {
        &self.buckets[slot]
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Reset every bucket to full capacity
    pub fn reset_all(&self) {
        for bucket in &self.buckets {
            bucket.reset();
        }
    }
}
