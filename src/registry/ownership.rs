// src/registry/ownership.rs

//! Coalesced interval index over worker shard assignments.
//!
//! `ownership` queries could be answered by expanding every declared range
//! into one map entry per shard, but for spaces in the tens of thousands of
//! shards that materialization is O(total range length). This index instead
//! sweeps range boundaries once and answers point queries by binary search.

use std::collections::HashMap;

use uuid::Uuid;

use crate::shard::{consolidate, ShardRange};

use super::Worker;

/// Point-queryable snapshot of which workers own which shards.
///
/// Built from a fixed set of workers; does not track later registry
/// mutations.
#[derive(Debug, Clone)]
pub struct ShardOwnership {
    /// Segment boundaries, sorted ascending. Segment `i` covers
    /// `[starts[i], starts[i + 1])`; the final segment is unbounded.
    starts: Vec<u32>,
    /// Worker ids owning each segment, parallel to `starts`.
    owners: Vec<Vec<Uuid>>,
}

impl ShardOwnership {
    /// Build the index from a set of workers.
    ///
    /// Each worker's ranges are consolidated first, so a worker declaring
    /// overlapping ranges still appears once per shard. Ranges across
    /// different workers may overlap freely.
    pub fn build(workers: &[Worker]) -> Self {
        // Boundary sweep: +1 at each range start, -1 at each range end.
        let mut events: Vec<(u32, bool, Uuid)> = Vec::new();
        for worker in workers {
            for range in consolidate(&worker.ranges) {
                if range.is_empty() {
                    continue;
                }
                events.push((range.offset, true, worker.id));
                let end = range.end().min(u32::MAX as u64) as u32;
                events.push((end, false, worker.id));
            }
        }
        events.sort_by_key(|&(pos, is_start, _)| (pos, is_start));

        let mut starts = vec![0];
        let mut owners: Vec<Vec<Uuid>> = vec![Vec::new()];
        let mut active: Vec<Uuid> = Vec::new();

        let mut i = 0;
        while i < events.len() {
            let pos = events[i].0;
            // Apply every event at this boundary before emitting a segment.
            while i < events.len() && events[i].0 == pos {
                let (_, is_start, id) = events[i];
                if is_start {
                    active.push(id);
                } else if let Some(at) = active.iter().position(|&a| a == id) {
                    active.remove(at);
                }
                i += 1;
            }

            if *starts.last().unwrap() == pos {
                *owners.last_mut().unwrap() = active.clone();
            } else {
                starts.push(pos);
                owners.push(active.clone());
            }
        }

        Self { starts, owners }
    }

    /// Worker ids owning the given shard.
    pub fn owners_of(&self, shard: u32) -> &[Uuid] {
        let segment = self.starts.partition_point(|&s| s <= shard) - 1;
        &self.owners[segment]
    }

    /// Shard indices with at least one owner, as coalesced ranges.
    pub fn covered_ranges(&self) -> Vec<ShardRange> {
        let mut ranges = Vec::new();
        for (i, owners) in self.owners.iter().enumerate() {
            if owners.is_empty() {
                continue;
            }
            let start = self.starts[i];
            let end = self
                .starts
                .get(i + 1)
                .copied()
                .expect("owned segment is always followed by a boundary");
            ranges.push(ShardRange::new(start, end - start));
        }
        consolidate(&ranges)
    }

    /// Materialize the full per-shard owner map. Intended for debugging
    /// and introspection; size is the total covered range length.
    pub fn owners_by_shard(&self) -> HashMap<u32, Vec<Uuid>> {
        let mut map = HashMap::new();
        for (i, owners) in self.owners.iter().enumerate() {
            if owners.is_empty() {
                continue;
            }
            let start = self.starts[i];
            let end = self.starts[i + 1];
            for shard in start..end {
                map.insert(shard, owners.clone());
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn make_worker(ranges: Vec<ShardRange>) -> Worker {
        let now = Utc::now();
        Worker {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            address: format!("{}.example.com:9000", Uuid::new_v4()),
            ranges,
            registered_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_index() {
        let ownership = ShardOwnership::build(&[]);
        assert!(ownership.owners_of(0).is_empty());
        assert!(ownership.owners_of(u32::MAX).is_empty());
        assert!(ownership.owners_by_shard().is_empty());
    }

    #[test]
    fn test_point_queries_match_containment() {
        let a = make_worker(vec![ShardRange::new(0, 1000), ShardRange::new(1000, 1000)]);
        let b = make_worker(vec![ShardRange::new(0, 1000)]);
        let ownership = ShardOwnership::build(&[a.clone(), b.clone()]);

        let at_500 = ownership.owners_of(500);
        assert_eq!(at_500.len(), 2);
        assert!(at_500.contains(&a.id));
        assert!(at_500.contains(&b.id));

        assert_eq!(ownership.owners_of(1500), &[a.id]);
        assert!(ownership.owners_of(2000).is_empty());
    }

    #[test]
    fn test_exhaustive_against_naive_containment() {
        let workers = vec![
            make_worker(vec![ShardRange::new(3, 10), ShardRange::new(20, 5)]),
            make_worker(vec![ShardRange::new(0, 7)]),
            make_worker(vec![ShardRange::new(8, 2), ShardRange::new(10, 12)]),
            make_worker(vec![]),
        ];
        let ownership = ShardOwnership::build(&workers);

        for shard in 0..40u32 {
            let mut expected: Vec<Uuid> = workers
                .iter()
                .filter(|w| w.ranges.iter().any(|r| r.contains(shard)))
                .map(|w| w.id)
                .collect();
            let mut actual = ownership.owners_of(shard).to_vec();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected, "owner mismatch at shard {shard}");
        }
    }

    #[test]
    fn test_worker_with_overlapping_own_ranges_appears_once() {
        let worker = make_worker(vec![ShardRange::new(0, 10), ShardRange::new(5, 10)]);
        let ownership = ShardOwnership::build(&[worker.clone()]);

        assert_eq!(ownership.owners_of(7), &[worker.id]);
    }

    #[test]
    fn test_covered_ranges() {
        let workers = vec![
            make_worker(vec![ShardRange::new(0, 10)]),
            make_worker(vec![ShardRange::new(5, 10)]),
            make_worker(vec![ShardRange::new(30, 5)]),
        ];
        let ownership = ShardOwnership::build(&workers);

        assert_eq!(
            ownership.covered_ranges(),
            vec![ShardRange::new(0, 15), ShardRange::new(30, 5)]
        );
    }

    #[test]
    fn test_materialized_map_matches_index() {
        let workers = vec![
            make_worker(vec![ShardRange::new(2, 3)]),
            make_worker(vec![ShardRange::new(4, 4)]),
        ];
        let ownership = ShardOwnership::build(&workers);
        let map = ownership.owners_by_shard();

        let covered: u32 = ownership.covered_ranges().iter().map(|r| r.count()).sum();
        assert_eq!(map.len() as u32, covered);
        for (&shard, owners) in &map {
            assert_eq!(owners.as_slice(), ownership.owners_of(shard));
        }
        assert!(!map.contains_key(&1));
        assert!(map.contains_key(&2));
    }
}
