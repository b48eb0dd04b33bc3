//! English pluralization rule table

use std::collections::HashSet;

use regex::Regex;

/// Singular/plural pairs that no suffix rule produces.
const IRREGULARS: &[(&str, &str)] = &[
    ("person", "people"),
    ("woman", "women"),
    ("man", "men"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("cactus", "cacti"),
    ("criterion", "criteria"),
];

/// Words with identical singular and plural forms.
const UNCOUNTABLES: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "deer",
    "news",
    "metadata",
];

/// Suffix rules for pluralization, most specific first.
const PLURAL_RULES: &[(&str, &str)] = &[
    ("(quiz)$", "${1}zes"),
    ("^(oxen)$", "${1}"),
    ("^(ox)$", "${1}en"),
    ("^(m|l)ice$", "${1}ice"),
    ("^(m|l)ouse$", "${1}ice"),
    ("(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
    ("(x|ch|ss|sh)$", "${1}es"),
    ("([^aeiouy]|qu)y$", "${1}ies"),
    ("(hive)$", "${1}s"),
    ("(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
    ("sis$", "ses"),
    ("([ti])a$", "${1}a"),
    ("([ti])um$", "${1}a"),
    ("(buffal|tomat|potat|her)o$", "${1}oes"),
    ("(bu)s$", "${1}ses"),
    ("(alias|status)$", "${1}es"),
    ("(octop|vir)i$", "${1}i"),
    ("(octop|vir)us$", "${1}i"),
    ("^(ax|test)is$", "${1}es"),
    ("s$", "s"),
    ("$", "s"),
];

/// Suffix rules for singularization, most specific first.
const SINGULAR_RULES: &[(&str, &str)] = &[
    ("(database)s$", "${1}"),
    ("(quiz)zes$", "${1}"),
    ("(matr)ices$", "${1}ix"),
    ("(vert|ind)ices$", "${1}ex"),
    ("^(ox)en", "${1}"),
    ("(alias|status)(?:es)?$", "${1}"),
    ("(octop|vir)(?:us|i)$", "${1}us"),
    ("^(a)x[ie]s$", "${1}xis"),
    ("(cris|test)(?:is|es)$", "${1}is"),
    ("(shoe)s$", "${1}"),
    ("(buffal|tomat|potat|her)oes$", "${1}o"),
    ("(bus)(?:es)?$", "${1}"),
    ("^(m|l)ice$", "${1}ouse"),
    ("(x|ch|ss|sh)es$", "${1}"),
    ("(m)ovies$", "${1}ovie"),
    ("(s)eries$", "${1}eries"),
    ("([^aeiouy]|qu)ies$", "${1}y"),
    ("([lr])ves$", "${1}f"),
    ("(tive)s$", "${1}"),
    ("(hive)s$", "${1}"),
    ("([^f])ves$", "${1}fe"),
    ("(^analy)(?:sis|ses)$", "${1}sis"),
    (
        "((a)naly|(b)a|(d)iagno|(p)arenthe|(p)rogno|(s)ynop|(t)he)(?:sis|ses)$",
        "${1}sis",
    ),
    ("([ti])a$", "${1}um"),
    ("(ss)$", "${1}"),
    ("s$", ""),
];

/// Deterministic singular/plural transform for English identifiers.
///
/// Lookup order: non-ASCII input is returned unchanged, then the uncountable
/// and irregular tables, then the first matching suffix rule. The result
/// keeps the input's case pattern.
///
/// # Example
///
/// ```
/// use odata_lib::naming::Pluralizer;
///
/// let p = Pluralizer::new();
/// assert_eq!(p.pluralize("Category"), "Categories");
/// assert_eq!(p.singularize("People"), "Person");
/// ```
#[derive(Debug, Clone)]
pub struct Pluralizer {
    irregulars: Vec<(String, String)>,
    uncountables: HashSet<String>,
    plurals: Vec<(Regex, &'static str)>,
    singulars: Vec<(Regex, &'static str)>,
}

/// Compiles rules case-insensitively. An invalid pattern is logged and skipped.
fn compile(rules: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .filter_map(|(pattern, replacement)| match Regex::new(&format!("(?i){}", pattern)) {
            Ok(regex) => Some((regex, *replacement)),
            Err(e) => {
                log::warn!("Skipping pluralization rule '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Casing {
    Lower,
    Upper,
    Capitalized,
    Mixed,
}

fn casing(word: &str) -> Casing {
    let has_lower = word.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = word.chars().any(|c| c.is_ascii_uppercase());
    if !has_upper {
        Casing::Lower
    } else if !has_lower {
        Casing::Upper
    } else if word.starts_with(|c: char| c.is_ascii_uppercase())
        && word.chars().skip(1).all(|c| !c.is_ascii_uppercase())
    {
        Casing::Capitalized
    } else {
        Casing::Mixed
    }
}

fn recase(word: &str, casing: Casing) -> String {
    match casing {
        Casing::Lower | Casing::Mixed => word.to_ascii_lowercase(),
        Casing::Upper => word.to_ascii_uppercase(),
        Casing::Capitalized => {
            let lower = word.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => lower,
            }
        }
    }
}

/// Position where `suffix` starts in `word` if it ends the last sub-word
/// (start of string, camel-case hump, or after a separator).
fn word_suffix(word: &str, suffix: &str) -> Option<usize> {
    if word.len() < suffix.len() || !word.to_ascii_lowercase().ends_with(suffix) {
        return None;
    }
    let start = word.len() - suffix.len();
    let bytes = word.as_bytes();
    let at_boundary = start == 0
        || bytes[start].is_ascii_uppercase()
        || matches!(bytes[start - 1], b'_' | b'.' | b'-' | b' ');
    at_boundary.then_some(start)
}

impl Default for Pluralizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pluralizer {
    /// Creates a pluralizer with the built-in English rule table.
    pub fn new() -> Self {
        Self {
            irregulars: IRREGULARS
                .iter()
                .map(|(s, p)| (s.to_string(), p.to_string()))
                .collect(),
            uncountables: UNCOUNTABLES.iter().map(|w| w.to_string()).collect(),
            plurals: compile(PLURAL_RULES),
            singulars: compile(SINGULAR_RULES),
        }
    }

    /// Adds an irregular singular/plural pair, checked before the built-in ones.
    pub fn with_irregular(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
        let pair = (
            singular.into().to_ascii_lowercase(),
            plural.into().to_ascii_lowercase(),
        );
        self.irregulars.insert(0, pair);
        self
    }

    /// Adds a word whose singular and plural forms are identical.
    pub fn with_uncountable(mut self, word: impl Into<String>) -> Self {
        self.uncountables.insert(word.into().to_ascii_lowercase());
        self
    }

    /// Returns the plural form of `word`.
    pub fn pluralize(&self, word: &str) -> String {
        self.inflect(word, true)
    }

    /// Returns the singular form of `word`.
    pub fn singularize(&self, word: &str) -> String {
        self.inflect(word, false)
    }

    /// Returns `true` if `word` is already in plural form.
    pub fn is_plural(&self, word: &str) -> bool {
        self.pluralize(word).eq_ignore_ascii_case(word)
            && !self.singularize(word).eq_ignore_ascii_case(word)
    }

    fn inflect(&self, word: &str, plural: bool) -> String {
        if word.is_empty() || !word.is_ascii() {
            return word.to_string();
        }

        if self
            .uncountables
            .iter()
            .any(|u| word_suffix(word, u).is_some())
        {
            return word.to_string();
        }

        if let Some(result) = self.irregular(word, plural) {
            return result;
        }

        let rules = if plural { &self.plurals } else { &self.singulars };
        let result = rules
            .iter()
            .find(|(regex, _)| regex.is_match(word))
            .map(|(regex, replacement)| regex.replace(word, *replacement).into_owned())
            .unwrap_or_else(|| word.to_string());

        if casing(word) == Casing::Upper {
            result.to_ascii_uppercase()
        } else {
            result
        }
    }

    fn irregular(&self, word: &str, plural: bool) -> Option<String> {
        for (singular, plural_form) in &self.irregulars {
            let (from, to) = if plural {
                (singular, plural_form)
            } else {
                (plural_form, singular)
            };
            if word_suffix(word, to).is_some() && word_suffix(word, from).is_none() {
                return Some(word.to_string());
            }
            if let Some(start) = word_suffix(word, from) {
                let tail = &word[start..];
                return Some(word[..start].to_string() + &recase(to, casing(tail)));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_rule_compiles() {
        let pluralizer = Pluralizer::new();
        assert_eq!(pluralizer.plurals.len(), PLURAL_RULES.len());
        assert_eq!(pluralizer.singulars.len(), SINGULAR_RULES.len());
        assert_eq!(compile(&[("(unclosed", "x"), ("s$", "")]).len(), 1);
    }

    #[test]
    fn test_regular_plurals() {
        let p = Pluralizer::new();
        assert_eq!(p.pluralize("product"), "products");
        assert_eq!(p.pluralize("Category"), "Categories");
        assert_eq!(p.pluralize("address"), "addresses");
        assert_eq!(p.pluralize("box"), "boxes");
        assert_eq!(p.pluralize("quiz"), "quizzes");
        assert_eq!(p.pluralize("knife"), "knives");
        assert_eq!(p.pluralize("wolf"), "wolves");
        assert_eq!(p.pluralize("hero"), "heroes");
        assert_eq!(p.pluralize("key"), "keys");
        assert_eq!(p.pluralize("Status"), "Statuses");
        assert_eq!(p.pluralize("matrix"), "matrices");
    }

    #[test]
    fn test_already_plural_is_stable() {
        let p = Pluralizer::new();
        assert_eq!(p.pluralize("Products"), "Products");
        assert_eq!(p.pluralize("Categories"), "Categories");
        assert_eq!(p.pluralize("People"), "People");
        assert_eq!(p.singularize("Product"), "Product");
    }

    #[test]
    fn test_irregulars_keep_case_pattern() {
        let p = Pluralizer::new();
        assert_eq!(p.pluralize("person"), "people");
        assert_eq!(p.pluralize("Person"), "People");
        assert_eq!(p.pluralize("PERSON"), "PEOPLE");
        assert_eq!(p.singularize("Children"), "Child");
        assert_eq!(p.pluralize("SalesPerson"), "SalesPeople");
        assert_eq!(p.singularize("Women"), "Woman");
    }

    #[test]
    fn test_uncountables() {
        let p = Pluralizer::new();
        assert_eq!(p.pluralize("Equipment"), "Equipment");
        assert_eq!(p.singularize("series"), "series");
        assert_eq!(p.pluralize("sheep"), "sheep");
    }

    #[test]
    fn test_upper_case_input() {
        let p = Pluralizer::new();
        assert_eq!(p.pluralize("CATEGORY"), "CATEGORIES");
        assert_eq!(p.singularize("ORDERS"), "ORDER");
    }

    #[test]
    fn test_non_ascii_passes_through() {
        let p = Pluralizer::new();
        assert_eq!(p.pluralize("Künstler"), "Künstler");
        assert_eq!(p.singularize("Straße"), "Straße");
        assert_eq!(p.pluralize(""), "");
    }

    #[test]
    fn test_round_trip_outside_irregulars() {
        let p = Pluralizer::new();
        for word in [
            "Product",
            "Category",
            "OrderDetail",
            "address",
            "Box",
            "bus",
            "quiz",
            "knife",
            "wolf",
            "matrix",
            "index",
            "hero",
            "analysis",
            "crisis",
            "datum",
            "octopus",
            "Employee",
            "day",
            "archive",
            "Status",
        ] {
            let plural = p.pluralize(word);
            assert_eq!(p.singularize(&plural), word, "via {}", plural);
        }
    }

    #[test]
    fn test_custom_irregular() {
        let p = Pluralizer::new().with_irregular("cafe", "cafes_special");
        assert_eq!(p.pluralize("Cafe"), "Cafes_special");
        assert_eq!(p.singularize("cafes_special"), "cafe");
    }

    #[test]
    fn test_is_plural() {
        let p = Pluralizer::new();
        assert!(p.is_plural("Products"));
        assert!(!p.is_plural("Product"));
    }
}
