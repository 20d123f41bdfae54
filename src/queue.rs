//! # Enrichment Queue Module
//!
//! ## Purpose
//! Persistent FIFO queue of enrichment tasks. The ingestion coordinator
//! enqueues newly created resolution ids; a worker drains them one at a time
//! into the enrichment pipeline.
//!
//! ## Input/Output Specification
//! - **Input**: Resolution ids of freshly ingested documents
//! - **Output**: Ids in enqueue order, one per worker iteration
//! - **Delivery**: At-least-once; the idempotent dedup keys and in-place
//!   enrichment writes make reprocessing safe

use crate::errors::Result;
use crate::ResolutionId;
use parking_lot::Mutex;
use uuid::Uuid;

/// Sled-backed enrichment task queue
pub struct EnrichmentQueue {
    db: sled::Db,
    tree: sled::Tree,
    // Serializes pop() so concurrent workers never hand out the same head.
    pop_lock: Mutex<()>,
}

impl EnrichmentQueue {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            db: db.clone(),
            tree: db.open_tree("enrichment_queue")?,
            pop_lock: Mutex::new(()),
        })
    }

    /// Open a queue backed by its own database (used when the store owns
    /// the primary database handle)
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let db = sled::open(path)?;
        Self::new(&db)
    }

    /// Append a task for the given resolution
    pub fn push(&self, resolution_id: ResolutionId) -> Result<()> {
        let seq = self.db.generate_id()?;
        self.tree
            .insert(seq.to_be_bytes(), resolution_id.as_bytes().to_vec())?;
        Ok(())
    }

    /// Take the oldest task, if any
    pub fn pop(&self) -> Result<Option<ResolutionId>> {
        let _guard = self.pop_lock.lock();

        match self.tree.iter().next() {
            Some(entry) => {
                let (key, value) = entry?;
                self.tree.remove(&key)?;
                let id = Uuid::from_slice(&value).map_err(|e| crate::IntelError::Internal {
                    message: format!("Invalid resolution id in queue: {}", e),
                })?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_queue() -> (EnrichmentQueue, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let queue = EnrichmentQueue::open(&dir.path().join("queue.db")).unwrap();
        (queue, dir)
    }

    #[test]
    fn test_fifo_order() {
        let (queue, _dir) = temp_queue();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        queue.push(first).unwrap();
        queue.push(second).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap(), Some(first));
        assert_eq!(queue.pop().unwrap(), Some(second));
        assert_eq!(queue.pop().unwrap(), None);
    }
}
