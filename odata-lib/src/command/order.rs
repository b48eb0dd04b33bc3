//! `$orderby` clauses

/// Sort direction of one `$orderby` item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Ordered list of sort keys; earlier keys take precedence.
///
/// Paths may cross associations (`Category/CategoryName`).
///
/// # Example
///
/// ```
/// use odata_lib::command::OrderBy;
///
/// let order = OrderBy::desc("UnitPrice").then_asc("ProductName");
/// assert_eq!(order.fields().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBy {
    pub(crate) fields: Vec<(String, Direction)>,
}

impl OrderBy {
    pub fn asc(path: impl Into<String>) -> Self {
        Self::default().then(path, Direction::Asc)
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self::default().then(path, Direction::Desc)
    }

    /// Appends a sort key with an explicit direction.
    pub fn then(mut self, path: impl Into<String>, direction: Direction) -> Self {
        self.fields.push((path.into(), direction));
        self
    }

    pub fn then_asc(self, path: impl Into<String>) -> Self {
        self.then(path, Direction::Asc)
    }

    pub fn then_desc(self, path: impl Into<String>) -> Self {
        self.then(path, Direction::Desc)
    }

    /// Appends the keys of `other` after the existing ones.
    pub fn extend(&mut self, other: OrderBy) {
        self.fields.extend(other.fields);
    }

    pub fn fields(&self) -> &[(String, Direction)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A bare path sorts ascending.
impl From<&str> for OrderBy {
    fn from(path: &str) -> Self {
        OrderBy::asc(path)
    }
}

impl<S: Into<String>> From<(S, Direction)> for OrderBy {
    fn from((path, direction): (S, Direction)) -> Self {
        OrderBy::default().then(path, direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_keep_order() {
        let mut order = OrderBy::from(("LastName", Direction::Desc));
        order.extend(OrderBy::asc("FirstName"));
        assert_eq!(
            order.fields(),
            &[
                ("LastName".to_string(), Direction::Desc),
                ("FirstName".to_string(), Direction::Asc)
            ]
        );
    }
}
