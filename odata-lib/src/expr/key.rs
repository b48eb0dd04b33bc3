//! Filter-to-key decomposition

use super::BinaryOperator;
use super::Expr;
use crate::model::Value;

impl Expr {
    /// Decomposes a pure conjunction of `reference eq literal` comparisons
    /// into `(name, value)` pairs, in the order they appear.
    ///
    /// Returns `None` when the expression contains anything else (other
    /// operators, disjunctions, nested paths, functions) or names the same
    /// property twice.
    pub fn equality_map(&self) -> Option<Vec<(String, Value)>> {
        let mut pairs = Vec::new();
        collect_equalities(self, &mut pairs)?;
        for (i, (name, _)) in pairs.iter().enumerate() {
            if pairs[..i].iter().any(|(other, _)| other == name) {
                return None;
            }
        }
        Some(pairs)
    }
}

fn collect_equalities(expr: &Expr, pairs: &mut Vec<(String, Value)>) -> Option<()> {
    match expr {
        Expr::Binary {
            op: BinaryOperator::And,
            left,
            right,
        } => {
            collect_equalities(left, pairs)?;
            collect_equalities(right, pairs)
        }
        Expr::Binary {
            op: BinaryOperator::Eq,
            left,
            right,
        } => {
            let (name, value) = match (left.as_ref(), right.as_ref()) {
                (Expr::Reference(path), Expr::Literal(value))
                | (Expr::Literal(value), Expr::Reference(path)) => (path.as_simple()?, value),
                _ => return None,
            };
            if value.is_null() {
                return None;
            }
            pairs.push((name.to_string(), value.clone()));
            Some(())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::prop;

    #[test]
    fn test_single_equality() {
        let map = prop("ProductID").eq(1).equality_map().unwrap();
        assert_eq!(map, vec![("ProductID".to_string(), Value::Int(1))]);
    }

    #[test]
    fn test_conjunction_in_order() {
        let map = prop("OrderID")
            .eq(10)
            .and(prop("ProductID").eq(2))
            .equality_map()
            .unwrap();
        assert_eq!(map[0].0, "OrderID");
        assert_eq!(map[1].0, "ProductID");
    }

    #[test]
    fn test_literal_on_left() {
        let map = Expr::literal(1).eq(prop("ProductID")).equality_map().unwrap();
        assert_eq!(map[0].0, "ProductID");
    }

    #[test]
    fn test_not_decomposable() {
        assert!(prop("ProductID").ne(1).equality_map().is_none());
        assert!(prop("A").eq(1).or(prop("B").eq(2)).equality_map().is_none());
        assert!(prop("A").eq(1).and(prop("A").eq(2)).equality_map().is_none());
        assert!(prop("Address/City").eq("x").equality_map().is_none());
        assert!(prop("A").eq(prop("B")).equality_map().is_none());
        assert!(prop("A").is_null().equality_map().is_none());
    }
}
