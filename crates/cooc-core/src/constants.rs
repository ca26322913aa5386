/// Separates the two halves of a pair key (`target,word`).
/// Normalization strips commas, so no word can contain it.
pub const PAIR_SEPARATOR: char = ',';

/// Separates the two target names in a feature row's pair name.
pub const PAIR_NAME_SEPARATOR: char = '-';

/// Documents processed between aggregator flushes and index syncs.
pub const DEFAULT_SYNC_FREQUENCY: usize = 10_000;

/// Rendered in place of a value that was never observed.
pub const MISSING_MARKER: &str = "?";

/// Correlation above which a pair counts as mildly related.
pub const MILD_THRESHOLD: f64 = 0.1;

/// Correlation above which a pair counts as strongly related.
pub const STRONG_THRESHOLD: f64 = 0.3;
