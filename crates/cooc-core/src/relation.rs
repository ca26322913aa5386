//! Pairwise relation metrics between targets that share context words.

use std::collections::{BTreeMap, HashMap};

use crate::pair::PairKey;

/// Agreement between two association strengths, independent of argument
/// order. Same-sign inputs land in `(0, 1]`; mixed signs come out negative.
pub fn context_similarity(a: f64, b: f64) -> f64 {
    let (small, large) = if a.abs() <= b.abs() {
        (a.abs(), b.abs())
    } else {
        (b.abs(), a.abs())
    };
    if large == 0.0 {
        return 1.0;
    }
    let ratio = small / large;
    if a.signum() != b.signum() && small != 0.0 {
        -ratio
    } else {
        ratio
    }
}

/// Absolute PMI difference.
pub fn pmi_gap(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

/// Finalized metrics for one target pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelationMetrics {
    pub context_similarity: f64,
    pub pmi_gap: f64,
}

impl RelationMetrics {
    /// `context_similarity,pmi_gap` as stored in the relation table.
    pub fn encode(&self) -> String {
        format!("{},{}", self.context_similarity, self.pmi_gap)
    }

    pub fn decode(value: &str) -> Option<Self> {
        let (similarity, gap) = value.split_once(',')?;
        Some(Self {
            context_similarity: similarity.trim().parse().ok()?,
            pmi_gap: gap.trim().parse().ok()?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Accumulator {
    similarity_sum: f64,
    gap_sum: f64,
    weight_sum: f64,
    shared_words: u64,
}

impl Accumulator {
    fn add(&mut self, pmi_1: f64, pmi_2: f64) {
        let weight = pmi_1.max(pmi_2);
        self.similarity_sum += context_similarity(pmi_1, pmi_2) * weight;
        self.gap_sum += pmi_gap(pmi_1, pmi_2) * weight;
        self.weight_sum += weight;
        self.shared_words += 1;
    }

    fn finish(&self) -> Option<RelationMetrics> {
        if self.weight_sum == 0.0 {
            return None;
        }
        Some(RelationMetrics {
            context_similarity: self.similarity_sum / self.weight_sum,
            pmi_gap: self.gap_sum / self.weight_sum,
        })
    }
}

/// Groups PMI records by context word and folds every pair of distinct
/// targets sharing a word into a weighted average.
#[derive(Debug, Default)]
pub struct RelationFinder {
    min_shared_words: u64,
    by_word: BTreeMap<String, Vec<(String, f64)>>,
}

impl RelationFinder {
    /// Pairs need strictly more than `min_shared_words` shared context
    /// words to be reported.
    pub fn new(min_shared_words: u64) -> Self {
        Self {
            min_shared_words,
            by_word: BTreeMap::new(),
        }
    }

    /// Record one PMI entry. The pair is read as `(target, context word)`.
    pub fn add_pmi(&mut self, pair: PairKey, pmi: f64) {
        self.by_word
            .entry(pair.second)
            .or_default()
            .push((pair.first, pmi));
    }

    /// Compute metrics for every target pair with enough shared evidence,
    /// ordered by pair key.
    pub fn finish(self) -> Vec<(PairKey, RelationMetrics)> {
        let mut pairs: HashMap<PairKey, Accumulator> = HashMap::new();
        for sharing in self.by_word.values() {
            for (i, (target_1, pmi_1)) in sharing.iter().enumerate() {
                for (target_2, pmi_2) in &sharing[i + 1..] {
                    if target_1 == target_2 {
                        continue;
                    }
                    let key = PairKey::new(target_1.as_str(), target_2.as_str());
                    let key = if pairs.contains_key(&key) || !pairs.contains_key(&key.reversed()) {
                        key
                    } else {
                        key.reversed()
                    };
                    pairs.entry(key).or_default().add(*pmi_1, *pmi_2);
                }
            }
        }

        let mut relations: Vec<_> = pairs
            .into_iter()
            .filter(|(_, acc)| acc.shared_words > self.min_shared_words)
            .filter_map(|(key, acc)| acc.finish().map(|metrics| (key, metrics)))
            .collect();
        relations.sort_by(|a, b| a.0.cmp(&b.0));
        relations
    }
}
