//! Queue bookkeeping.

use std::collections::HashMap;

use tokio::time::Instant;

use arena_protocol::{PlayerId, ZoneId};

use crate::error::QueueError;

/// One waiting player.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub player: PlayerId,
    pub hero_name: String,
    pub level: u32,
    /// Zone the player queued from. Matches never mix origin zones.
    pub origin: ZoneId,
    pub joined_at: Instant,
}

/// Where a player stands in their queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub queue: String,
    /// 1-based.
    pub position: usize,
    pub size: usize,
}

/// Pull a match out of `entries`, oldest origin zone first. Only entries from
/// a single origin zone are grouped, and only once that zone alone has at
/// least `min` players. At most `max` are taken, in join order.
pub fn take_match(
    entries: &mut Vec<QueueEntry>,
    min: usize,
    max: usize,
) -> Option<Vec<QueueEntry>> {
    let mut zones: Vec<ZoneId> = Vec::new();
    for entry in entries.iter() {
        if !zones.contains(&entry.origin) {
            zones.push(entry.origin);
        }
    }

    let zone = zones
        .into_iter()
        .find(|z| entries.iter().filter(|e| e.origin == *z).count() >= min.max(1))?;

    let mut taken = Vec::new();
    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries.drain(..) {
        if entry.origin == zone && taken.len() < max.max(1) {
            taken.push(entry);
        } else {
            kept.push(entry);
        }
    }
    *entries = kept;
    Some(taken)
}

/// Every queue plus the player index, mutated together.
#[derive(Debug, Default)]
pub struct QueueBook {
    queues: HashMap<String, Vec<QueueEntry>>,
    index: HashMap<PlayerId, String>,
}

impl QueueBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a player. Returns their status in the queue.
    pub fn join(&mut self, queue: &str, entry: QueueEntry) -> Result<QueueStatus, QueueError> {
        if let Some(existing) = self.index.get(&entry.player) {
            return Err(QueueError::AlreadyQueued(existing.clone()));
        }
        self.index.insert(entry.player, queue.to_string());
        let entries = self.queues.entry(queue.to_string()).or_default();
        entries.push(entry);
        Ok(QueueStatus {
            queue: queue.to_string(),
            position: entries.len(),
            size: entries.len(),
        })
    }

    /// Remove a player. Returns the queue they left.
    pub fn leave(&mut self, player: PlayerId) -> Option<String> {
        let queue = self.index.remove(&player)?;
        if let Some(entries) = self.queues.get_mut(&queue) {
            entries.retain(|e| e.player != player);
        }
        Some(queue)
    }

    pub fn status(&self, player: PlayerId) -> Option<QueueStatus> {
        let queue = self.index.get(&player)?;
        let entries = self.queues.get(queue)?;
        let position = entries.iter().position(|e| e.player == player)? + 1;
        Some(QueueStatus {
            queue: queue.clone(),
            position,
            size: entries.len(),
        })
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.index.contains_key(&player)
    }

    pub fn len(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, Vec::len)
    }

    /// Remove a match's worth of entries from the queue and the index.
    pub fn pop_match(&mut self, queue: &str, min: usize, max: usize) -> Option<Vec<QueueEntry>> {
        let entries = self.queues.get_mut(queue)?;
        let taken = take_match(entries, min, max)?;
        for entry in &taken {
            self.index.remove(&entry.player);
        }
        Some(taken)
    }
}
