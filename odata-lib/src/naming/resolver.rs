//! Matching requested names against catalog names

use std::sync::Arc;

use serde::Deserialize;

use super::Pluralizer;

/// Strategy used to match a requested name against an actual catalog name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    /// Exact match on the last dot-separated segment.
    Strict,
    /// Case-insensitive match ignoring non-alphanumeric characters.
    Alphanumeric,
    /// Alphanumeric match, or a match through singular/plural forms.
    #[default]
    BestMatch,
}

/// Lowercases `name` and drops every non-alphanumeric character.
pub fn homogenize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Resolves requested names to catalog names with a fixed strategy.
///
/// Given the same candidates, requested name and strategy the result is
/// always the same: candidates are scanned in order, and a strict hit is
/// preferred over an alphanumeric one, which is preferred over a
/// pluralization bridge.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    strategy: NameMatch,
    pluralizer: Arc<Pluralizer>,
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new(NameMatch::default(), Arc::new(Pluralizer::new()))
    }
}

impl NameMatcher {
    /// Creates a matcher with the given strategy and shared pluralizer.
    pub fn new(strategy: NameMatch, pluralizer: Arc<Pluralizer>) -> Self {
        Self {
            strategy,
            pluralizer,
        }
    }

    /// Returns the active strategy.
    pub fn strategy(&self) -> NameMatch {
        self.strategy
    }

    /// Returns the shared pluralizer.
    pub fn pluralizer(&self) -> &Pluralizer {
        &self.pluralizer
    }

    /// Returns `true` if `actual` matches `requested` under the active strategy.
    pub fn is_match(&self, actual: &str, requested: &str) -> bool {
        match self.strategy {
            NameMatch::Strict => strict_match(actual, requested),
            NameMatch::Alphanumeric => {
                strict_match(actual, requested) || alphanumeric_match(actual, requested)
            }
            NameMatch::BestMatch => {
                strict_match(actual, requested)
                    || alphanumeric_match(actual, requested)
                    || self.plural_match(actual, requested)
            }
        }
    }

    /// Finds the best candidate for `requested`.
    pub fn find<'a, T>(
        &self,
        candidates: &'a [T],
        name_of: impl Fn(&T) -> &str,
        requested: &str,
    ) -> Option<&'a T> {
        let strict = candidates
            .iter()
            .find(|c| strict_match(name_of(c), requested));
        if strict.is_some() || self.strategy == NameMatch::Strict {
            return strict;
        }

        let alphanumeric = candidates
            .iter()
            .find(|c| alphanumeric_match(name_of(c), requested));
        if alphanumeric.is_some() || self.strategy == NameMatch::Alphanumeric {
            return alphanumeric;
        }

        candidates
            .iter()
            .find(|c| self.plural_match(name_of(c), requested))
    }

    fn plural_match(&self, actual: &str, requested: &str) -> bool {
        let actual = last_segment(actual);
        let requested = homogenize(last_segment(requested));
        homogenize(&self.pluralizer.pluralize(actual)) == requested
            || homogenize(&self.pluralizer.singularize(actual)) == requested
    }
}

fn strict_match(actual: &str, requested: &str) -> bool {
    last_segment(actual) == last_segment(requested)
}

fn alphanumeric_match(actual: &str, requested: &str) -> bool {
    homogenize(last_segment(actual)) == homogenize(last_segment(requested))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(strategy: NameMatch) -> NameMatcher {
        NameMatcher::new(strategy, Arc::new(Pluralizer::new()))
    }

    #[test]
    fn test_homogenize() {
        assert_eq!(homogenize("Order_Details"), "orderdetails");
        assert_eq!(homogenize("unit-price"), "unitprice");
    }

    #[test]
    fn test_strict() {
        let m = matcher(NameMatch::Strict);
        assert!(m.is_match("Products", "Products"));
        assert!(m.is_match("NorthwindModel.Product", "Product"));
        assert!(!m.is_match("Products", "products"));
        assert!(!m.is_match("Products", "Product"));
    }

    #[test]
    fn test_alphanumeric() {
        let m = matcher(NameMatch::Alphanumeric);
        assert!(m.is_match("Order_Details", "orderDetails"));
        assert!(!m.is_match("Order_Details", "OrderDetail"));
    }

    #[test]
    fn test_best_match_bridges_plurals() {
        let m = matcher(NameMatch::BestMatch);
        assert!(m.is_match("Products", "Product"));
        assert!(m.is_match("Product", "products"));
        assert!(m.is_match("Categories", "category"));
        assert!(m.is_match("People", "person"));
        assert!(!m.is_match("Products", "Orders"));
    }

    #[test]
    fn test_find_prefers_strict_hit() {
        let m = matcher(NameMatch::BestMatch);
        let names = vec!["Product", "Products"];
        assert_eq!(m.find(&names, |n| *n, "Products"), Some(&"Products"));
        assert_eq!(m.find(&names, |n| *n, "Product"), Some(&"Product"));

        let names = vec!["product", "Product"];
        assert_eq!(m.find(&names, |n| *n, "Product"), Some(&"Product"));
    }

    #[test]
    fn test_find_falls_back_in_order() {
        let m = matcher(NameMatch::BestMatch);
        let names = vec!["Orders", "order_details", "Categories"];
        assert_eq!(m.find(&names, |n| *n, "OrderDetails"), Some(&"order_details"));
        assert_eq!(m.find(&names, |n| *n, "category"), Some(&"Categories"));
        assert_eq!(m.find(&names, |n| *n, "Suppliers"), None);

        let strict = matcher(NameMatch::Strict);
        assert_eq!(strict.find(&names, |n| *n, "Category"), None);
    }
}
