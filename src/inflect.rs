//! Word-form inflection for naming-convention checks.
//!
//! The analyzer consumes the [`Inflection`] trait so tests can pin word
//! forms without depending on the dictionary. The default implementation
//! wraps the `Inflector` crate with an irregular-forms table checked
//! first, because the dictionary handles `person`/`people` and friends
//! inconsistently across versions.

use inflector::Inflector;

/// Irregular singular/plural pairs checked before the dictionary.
static IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("medium", "media"),
];

/// Pluralization capability.
pub trait Inflection: Send + Sync {
    fn pluralize(&self, word: &str) -> String;
    fn singularize(&self, word: &str) -> String;

    /// Whether the word is already in plural form. Uninflectable words
    /// (`series`, `sheep`) count as plural and never trip naming checks.
    fn is_plural(&self, word: &str) -> bool {
        self.pluralize(&self.singularize(word)) == word
    }
}

/// Rails-style conventions over snake_case names; only the last `_`
/// segment is inflected, so `staff_person` becomes `staff_people`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionInflector;

impl Inflection for ConventionInflector {
    fn pluralize(&self, word: &str) -> String {
        let (prefix, segment) = split_last_segment(word);
        let lowered = segment.to_ascii_lowercase();
        for (singular, plural) in IRREGULAR_PLURALS {
            if lowered == *singular {
                return format!("{}{}", prefix, plural);
            }
            if lowered == *plural {
                return word.to_string();
            }
        }
        format!("{}{}", prefix, segment.to_plural())
    }

    fn singularize(&self, word: &str) -> String {
        let (prefix, segment) = split_last_segment(word);
        let lowered = segment.to_ascii_lowercase();
        for (singular, plural) in IRREGULAR_PLURALS {
            if lowered == *plural {
                return format!("{}{}", prefix, singular);
            }
            if lowered == *singular {
                return word.to_string();
            }
        }
        format!("{}{}", prefix, segment.to_singular())
    }
}

fn split_last_segment(word: &str) -> (&str, &str) {
    match word.rfind('_') {
        Some(idx) => (&word[..idx + 1], &word[idx + 1..]),
        None => ("", word),
    }
}
