//! Merges in-memory count tables into the durable word and co-occurrence
//! stores.

use cooc_core::{CountTables, PairKey};

use crate::error::Result;
use crate::kv::{self, KvStore};

/// Entries touched by one flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub words: usize,
    pub pairs: usize,
}

/// Adds deltas onto whatever the stores already hold. Values only ever
/// grow: an absent key reads as zero and every write is `old + delta`.
pub struct Aggregator<'s> {
    words: &'s KvStore,
    cooccurrences: &'s KvStore,
    flushes: usize,
}

impl<'s> Aggregator<'s> {
    pub fn new(words: &'s KvStore, cooccurrences: &'s KvStore) -> Self {
        Self {
            words,
            cooccurrences,
            flushes: 0,
        }
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Merge `tables` into the stores and clear them. Each store is written
    /// in one transaction, keys in sorted order.
    pub fn flush(&mut self, tables: &mut CountTables) -> Result<FlushStats> {
        if tables.is_empty() {
            return Ok(FlushStats::default());
        }

        let mut words: Vec<_> = tables.word_counts.iter().collect();
        words.sort();
        let word_entries = self.words.transaction(|tx| {
            for (word, delta) in &words {
                let current = match kv::get_on(tx, word)? {
                    Some(value) => kv::parse_count(word, &value)?,
                    None => 0,
                };
                kv::put_on(tx, word, &(current + **delta).to_string())?;
            }
            Ok(words.len())
        })?;

        let mut pairs: Vec<_> = tables.cooccurrences.iter().collect();
        pairs.sort();
        let pair_entries = self.cooccurrences.transaction(|tx| {
            for (pair, delta) in &pairs {
                let (key, current) = existing_orientation(tx, pair)?;
                kv::put_on(tx, &key, &(current + **delta).to_string())?;
            }
            Ok(pairs.len())
        })?;

        tables.clear();
        self.flushes += 1;
        let stats = FlushStats {
            words: word_entries,
            pairs: pair_entries,
        };
        tracing::info!(
            "flush {}: merged {} word counts and {} co-occurrence counts",
            self.flushes,
            stats.words,
            stats.pairs
        );
        Ok(stats)
    }
}

/// Key under which `pair` is already stored, in either orientation, with
/// its current count. New pairs keep their own orientation.
fn existing_orientation(conn: &rusqlite::Connection, pair: &PairKey) -> Result<(String, u64)> {
    for candidate in pair.orientations() {
        let key = candidate.encode();
        if let Some(value) = kv::get_on(conn, &key)? {
            let count = kv::parse_count(&key, &value)?;
            return Ok((key, count));
        }
    }
    Ok((pair.encode(), 0))
}
