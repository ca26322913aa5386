use crate::error::CoreError;
use crate::pair::PairKey;

/// `log2(c/N) - log2(c_t/N) - log2(c_w/N)`, computed in floating point.
pub fn pmi(cooccurrences: u64, target_count: u64, word_count: u64, total_words: u64) -> f64 {
    let n = total_words as f64;
    let p_pair = cooccurrences as f64 / n;
    let p_target = target_count as f64 / n;
    let p_word = word_count as f64 / n;
    p_pair.log2() - p_target.log2() - p_word.log2()
}

/// Scores co-occurrence records against a word-count table.
#[derive(Clone, Copy, Debug)]
pub struct PmiCalculator {
    threshold: u64,
    total_words: u64,
}

impl PmiCalculator {
    pub fn new(threshold: u64, total_words: u64) -> Self {
        Self {
            threshold,
            total_words,
        }
    }

    /// PMI for one pair, or `None` when its count does not exceed the
    /// threshold. A missing word count means the upstream stores disagree
    /// and is reported, never read as zero.
    pub fn score<F, E>(
        &self,
        pair: &PairKey,
        count: u64,
        mut word_count: F,
    ) -> std::result::Result<Option<f64>, E>
    where
        F: FnMut(&str) -> std::result::Result<Option<u64>, E>,
        E: From<CoreError>,
    {
        if count <= self.threshold {
            return Ok(None);
        }
        if self.total_words == 0 {
            return Err(CoreError::Consistency(format!(
                "pair {pair} has {count} co-occurrences but the total word count is zero"
            ))
            .into());
        }
        let mut lookup = |word: &str| -> std::result::Result<u64, E> {
            match word_count(word)? {
                Some(c) if c > 0 => Ok(c),
                _ => Err(CoreError::Consistency(format!(
                    "'{word}' from pair {pair} has no word count"
                ))
                .into()),
            }
        };
        let first = lookup(&pair.first)?;
        let second = lookup(&pair.second)?;
        Ok(Some(pmi(count, first, second, self.total_words)))
    }
}
