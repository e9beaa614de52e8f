// src/shard.rs

//! Shard space and range arithmetic.
//!
//! The partition space is a fixed universe of integer shard indices
//! `[0, shards)`. Workers declare ownership of half-open ranges
//! `[offset, offset + length)` within it.

use serde::{Deserialize, Serialize};

use crate::error::{RanagError, Result};

/// A half-open interval of shard indices, `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardRange {
    /// First shard index in the range.
    pub offset: u32,
    /// Number of shards in the range.
    pub length: u32,
}

impl ShardRange {
    /// Create a new shard range.
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// One-past-the-last shard index. Widened to avoid overflow on
    /// not-yet-validated ranges.
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }

    /// Number of shards in this range.
    pub fn count(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Check if a shard index falls within this range.
    pub fn contains(&self, shard: u32) -> bool {
        shard >= self.offset && (shard as u64) < self.end()
    }

    /// Iterate over the shard indices in this range.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.offset..self.offset.saturating_add(self.length)
    }
}

/// The fixed universe of shard indices a deployment partitions work over.
///
/// The size is threaded in from configuration so tests can run against
/// small spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpace {
    shards: u32,
}

impl ShardSpace {
    pub fn new(shards: u32) -> Self {
        Self { shards }
    }

    /// Total number of shards in the space.
    pub fn shards(&self) -> u32 {
        self.shards
    }

    /// Check whether a shard index is inside both the range and the space.
    pub fn contains(&self, range: &ShardRange, shard: u32) -> bool {
        shard < self.shards && range.contains(shard)
    }

    /// Validate a single range against the space bounds.
    pub fn validate(&self, range: &ShardRange) -> Result<()> {
        let violations = self.check(range);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(RanagError::validation(violations))
        }
    }

    /// Validate a whole assignment, aggregating every violation found
    /// rather than failing on the first.
    pub fn validate_all(&self, ranges: &[ShardRange]) -> Result<()> {
        let violations = self.violations(ranges);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(RanagError::validation(violations))
        }
    }

    /// Every violation in an assignment, for callers aggregating their
    /// own validation reports.
    pub fn violations(&self, ranges: &[ShardRange]) -> Vec<String> {
        ranges.iter().flat_map(|r| self.check(r)).collect()
    }

    fn check(&self, range: &ShardRange) -> Vec<String> {
        let mut violations = Vec::new();
        if range.end() > self.shards as u64 {
            violations.push(format!(
                "range [{}, {}) exceeds shard space of {} shards",
                range.offset,
                range.end(),
                self.shards
            ));
        }
        violations
    }
}

/// Merge overlapping or adjacent ranges into a minimal sorted set.
pub fn consolidate(ranges: &[ShardRange]) -> Vec<ShardRange> {
    if ranges.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<ShardRange> = ranges.iter().copied().filter(|r| !r.is_empty()).collect();
    sorted.sort_by_key(|r| r.offset);

    let mut consolidated: Vec<ShardRange> = Vec::new();
    for range in sorted {
        match consolidated.last_mut() {
            Some(last) if range.offset as u64 <= last.end() => {
                let end = last.end().max(range.end());
                last.length = (end - last.offset as u64) as u32;
            }
            _ => consolidated.push(range),
        }
    }

    consolidated
}
