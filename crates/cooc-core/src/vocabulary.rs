use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, Result};
use crate::tokenizer::{normalize_phrase, parse_word_list};

/// Targets to track plus the synonyms that rewrite to them.
#[derive(Clone, Debug, Default)]
pub struct Vocabulary {
    targets: HashSet<String>,
    synonyms: HashMap<String, String>,
    /// Word length of the longest target or synonym; bounds the phrase scan.
    max_span: usize,
}

impl Vocabulary {
    pub fn new(targets: HashSet<String>, synonyms: HashMap<String, String>) -> Self {
        let max_span = targets
            .iter()
            .chain(synonyms.keys())
            .map(|phrase| phrase.split(' ').count())
            .max()
            .unwrap_or(1);
        Self {
            targets,
            synonyms,
            max_span,
        }
    }

    /// Build from the contents of a target list and an optional synonym file.
    pub fn parse(targets: &str, synonyms: Option<&str>) -> Result<Self> {
        let synonyms = match synonyms {
            Some(content) => parse_synonyms(content)?,
            None => HashMap::new(),
        };
        Ok(Self::new(parse_word_list(targets), synonyms))
    }

    pub fn is_target(&self, word: &str) -> bool {
        self.targets.contains(word)
    }

    /// Canonical target for a synonym phrase.
    pub fn canonical(&self, phrase: &str) -> Option<&str> {
        self.synonyms.get(phrase).map(String::as_str)
    }

    pub fn targets(&self) -> &HashSet<String> {
        &self.targets
    }

    pub fn max_span(&self) -> usize {
        self.max_span
    }
}

/// Parse `synonym:target` lines. Blank lines are skipped; any other line
/// must have exactly one `:` with non-empty text on both sides.
pub fn parse_synonyms(content: &str) -> Result<HashMap<String, String>> {
    let mut synonyms = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = || CoreError::Format {
            line: index + 1,
            message: "lines should be in the format 'synonym:target'".into(),
        };
        let (synonym, target) = line.split_once(':').ok_or_else(malformed)?;
        if target.contains(':') {
            return Err(malformed());
        }
        let (synonym, target) = (normalize_phrase(synonym), normalize_phrase(target));
        if synonym.is_empty() || target.is_empty() {
            return Err(malformed());
        }
        synonyms.insert(synonym, target);
    }
    Ok(synonyms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_synonyms() {
        let map = parse_synonyms("Sugar Diabetes:diabetes\n\nlow mood: Depression\n").unwrap();
        assert_eq!(map.get("sugar diabetes").unwrap(), "diabetes");
        assert_eq!(map.get("low mood").unwrap(), "depression");
    }

    #[test]
    fn test_parse_synonyms_missing_colon_reports_line() {
        let err = parse_synonyms("a:b\nno delimiter here\n").unwrap_err();
        assert_eq!(
            err,
            CoreError::Format {
                line: 2,
                message: "lines should be in the format 'synonym:target'".into()
            }
        );
    }

    #[test]
    fn test_parse_synonyms_empty_side() {
        assert!(matches!(
            parse_synonyms("blues:"),
            Err(CoreError::Format { line: 1, .. })
        ));
        assert!(matches!(
            parse_synonyms(":depression"),
            Err(CoreError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_synonyms_extra_colon() {
        assert!(matches!(
            parse_synonyms("x:y\na:b:c"),
            Err(CoreError::Format { line: 2, .. })
        ));
    }

    #[test]
    fn test_max_span() {
        let vocab = Vocabulary::parse("diabetes\ntype 2 diabetes", Some("adult onset sugar disease:diabetes"))
            .unwrap();
        assert_eq!(vocab.max_span(), 4);
        assert!(vocab.is_target("type 2 diabetes"));
        assert_eq!(vocab.canonical("adult onset sugar disease"), Some("diabetes"));
    }

    #[test]
    fn test_empty_vocabulary_span() {
        assert_eq!(Vocabulary::default().max_span(), 0);
        assert_eq!(Vocabulary::parse("", None).unwrap().max_span(), 1);
    }
}
