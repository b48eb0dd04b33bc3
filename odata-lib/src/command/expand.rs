//! Expand specifications for association inlining

use super::OrderBy;
use crate::expr::Expr;

/// Describes one expanded association and the options applied to it.
///
/// Names are resolved against the catalog when the owning command is
/// resolved; an association that does not exist fails resolution.
///
/// # Example
///
/// ```
/// use odata_lib::command::ExpandSpec;
/// use odata_lib::command::OrderBy;
///
/// let expand = ExpandSpec::new("Subordinates")
///     .select(["LastName", "FirstName"])
///     .order_by(OrderBy::asc("LastName"))
///     .expand("Orders", |e| e.select(["OrderDate"]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandSpec {
    pub(crate) navigation: String,
    pub(crate) select: Vec<String>,
    pub(crate) filter: Option<Expr>,
    pub(crate) order_by: OrderBy,
    pub(crate) top: Option<u64>,
    pub(crate) skip: Option<u64>,
    pub(crate) levels: Option<u32>,
    pub(crate) expands: Vec<ExpandSpec>,
}

impl ExpandSpec {
    /// Creates a spec for a single association.
    pub fn new(navigation: impl Into<String>) -> Self {
        Self {
            navigation: navigation.into(),
            select: Vec::new(),
            filter: None,
            order_by: OrderBy::default(),
            top: None,
            skip: None,
            levels: None,
            expands: Vec::new(),
        }
    }

    /// Builds nested specs from a `/`- or `.`-separated association path.
    ///
    /// Returns `None` for an empty path or one with an empty segment.
    pub fn from_path(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split(['/', '.']).map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        let mut segments = segments.into_iter().rev();
        let mut spec = ExpandSpec::new(segments.next()?);
        for segment in segments {
            let mut parent = ExpandSpec::new(segment);
            parent.expands.push(spec);
            spec = parent;
        }
        Some(spec)
    }

    /// Adds fields to select from the expanded entity.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Adds a filter on the expanded entities; repeated calls are and-ed.
    pub fn filter(mut self, filter: impl Into<Expr>) -> Self {
        let filter = filter.into();
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Adds ordering for the expanded entities.
    pub fn order_by(mut self, order: impl Into<OrderBy>) -> Self {
        self.order_by.extend(order.into());
        self
    }

    /// Limits the number of expanded entities.
    pub fn top(mut self, n: u64) -> Self {
        self.top = Some(n);
        self
    }

    /// Skips expanded entities.
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Expands a recursive association `levels` deep.
    pub fn levels(mut self, levels: u32) -> Self {
        self.levels = Some(levels);
        self
    }

    /// Adds a nested expand within this expand.
    pub fn expand<F>(mut self, navigation: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(ExpandSpec) -> ExpandSpec,
    {
        self.expands.push(build(ExpandSpec::new(navigation)));
        self
    }

    /// Adds an already built nested spec.
    pub fn expand_spec(mut self, spec: ExpandSpec) -> Self {
        self.expands.push(spec);
        self
    }

    /// Returns the association name as requested.
    pub fn navigation(&self) -> &str {
        &self.navigation
    }

    /// Returns the nesting depth of this spec (1 for a leaf).
    pub fn depth(&self) -> usize {
        1 + self.expands.iter().map(ExpandSpec::depth).max().unwrap_or(0)
    }
}
