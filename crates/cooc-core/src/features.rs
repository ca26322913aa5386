//! Feature rows and their attribute-relation rendering.

use crate::constants::{MISSING_MARKER, PAIR_NAME_SEPARATOR};
use crate::pair::PairKey;
use crate::relation::RelationMetrics;
use crate::truth::TruthFunction;

pub const RELATION_NAME: &str = "relatedness";

/// One labeled instance per related target pair.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRow {
    pub pair: PairKey,
    pub metrics: RelationMetrics,
    /// PMI between the two targets themselves; `None` if they never
    /// co-occurred above the PMI threshold.
    pub pmi: Option<f64>,
    /// Raw co-occurrence count between the targets, zero if never seen.
    pub cooccurrences: u64,
    /// Present only when a truth function is in use; `None` marks a pair
    /// missing from the truth table.
    pub truth: Option<Option<&'static str>>,
}

impl FeatureRow {
    pub fn pair_name(&self) -> String {
        format!(
            "{}{PAIR_NAME_SEPARATOR}{}",
            self.pair.first, self.pair.second
        )
    }
}

/// Fixed attribute schema, with the truth column when a function is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureSchema {
    pub truth_function: Option<TruthFunction>,
}

impl FeatureSchema {
    pub fn new(truth_function: Option<TruthFunction>) -> Self {
        Self { truth_function }
    }

    pub fn header(&self) -> String {
        let mut out = format!("@RELATION {RELATION_NAME}\n\n");
        for name in [
            "context similarity",
            "normal similarity",
            "pmi between targets",
            "times targets cooccurred",
        ] {
            out.push_str(&format!("@ATTRIBUTE '{name}' NUMERIC\n"));
        }
        out.push_str("@ATTRIBUTE 'pair name' STRING\n");
        if let Some(function) = self.truth_function {
            out.push_str(&format!(
                "@ATTRIBUTE 'truth value' {{{}}}\n",
                function.labels().join(",")
            ));
        }
        out.push_str("\n@DATA\n");
        out
    }

    pub fn render_row(&self, row: &FeatureRow) -> String {
        let pmi = row
            .pmi
            .map(|p| p.to_string())
            .unwrap_or_else(|| MISSING_MARKER.to_string());
        let mut line = format!(
            "{},{},{},{},'{}'",
            row.metrics.context_similarity,
            row.metrics.pmi_gap,
            pmi,
            row.cooccurrences,
            escape(&row.pair_name()),
        );
        if self.truth_function.is_some() {
            line.push(',');
            line.push_str(row.truth.flatten().unwrap_or(MISSING_MARKER));
        }
        line.push('\n');
        line
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pmi: Option<f64>, truth: Option<Option<&'static str>>) -> FeatureRow {
        FeatureRow {
            pair: PairKey::new("diabetes", "depression"),
            metrics: RelationMetrics {
                context_similarity: 0.5,
                pmi_gap: 1.25,
            },
            pmi,
            cooccurrences: 3,
            truth,
        }
    }

    #[test]
    fn test_header_without_truth() {
        let header = FeatureSchema::new(None).header();
        assert!(header.starts_with("@RELATION relatedness"));
        assert!(header.contains("@ATTRIBUTE 'pmi between targets' NUMERIC"));
        assert!(header.contains("@ATTRIBUTE 'pair name' STRING"));
        assert!(!header.contains("truth value"));
        assert!(header.ends_with("@DATA\n"));
    }

    #[test]
    fn test_header_with_truth_labels() {
        let header = FeatureSchema::new(Some(TruthFunction::TwoWayMild)).header();
        assert!(header.contains("@ATTRIBUTE 'truth value' {MILD_POS,NONE}"));
    }

    #[test]
    fn test_row_populated() {
        let line = FeatureSchema::new(None).render_row(&row(Some(2.0), None));
        assert_eq!(line, "0.5,1.25,2,3,'diabetes-depression'\n");
    }

    #[test]
    fn test_row_missing_markers() {
        let schema = FeatureSchema::new(Some(TruthFunction::TwoWayStrong));
        let line = schema.render_row(&row(None, Some(None)));
        assert_eq!(line, "0.5,1.25,?,3,'diabetes-depression',?\n");
        let labeled = schema.render_row(&row(Some(0.0), Some(Some("NONE"))));
        assert_eq!(labeled, "0.5,1.25,0,3,'diabetes-depression',NONE\n");
    }
}
