//! Typed and late-bound reference builders

use std::marker::PhantomData;

use super::Expr;
use super::MemberPath;
use crate::model::Value;

/// Creates a reference to a property path (`Address.City` or `Address/City`).
pub fn prop(path: &str) -> Expr {
    Expr::Reference(MemberPath::parse(path))
}

/// Root of a late-bound reference chain.
///
/// ```
/// use odata_lib::expr::dynamic;
///
/// let city = dynamic().member("Address").member("City");
/// let filter = city.expr().eq("London");
/// ```
pub fn dynamic() -> DynamicRef {
    DynamicRef {
        path: MemberPath::default(),
    }
}

/// A reference path recorded member by member.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DynamicRef {
    path: MemberPath,
}

impl DynamicRef {
    /// Records a member access.
    pub fn member(&self, name: &str) -> DynamicRef {
        DynamicRef {
            path: self.path.child(name),
        }
    }

    /// Returns the recorded path as a reference node.
    pub fn expr(&self) -> Expr {
        Expr::Reference(self.path.clone())
    }
}

impl From<DynamicRef> for Expr {
    fn from(r: DynamicRef) -> Self {
        Expr::Reference(r.path)
    }
}

/// A property reference whose comparisons only accept values of type `T`.
///
/// # Example
///
/// ```
/// use odata_lib::expr::Field;
///
/// const PRODUCT_ID: Field<i32> = Field::new("ProductID");
/// const NAME: Field<String> = Field::new("ProductName");
///
/// let filter = PRODUCT_ID.gt(10).and(NAME.starts_with("Ch"));
/// ```
#[derive(Debug)]
pub struct Field<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> Field<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the untyped reference node.
    pub fn expr(&self) -> Expr {
        prop(self.name)
    }

    pub fn is_null(&self) -> Expr {
        self.expr().is_null()
    }

    pub fn is_not_null(&self) -> Expr {
        self.expr().is_not_null()
    }
}

impl<T: Into<Value>> Field<T> {
    pub fn eq(&self, value: T) -> Expr {
        self.expr().eq(Expr::Literal(value.into()))
    }

    pub fn ne(&self, value: T) -> Expr {
        self.expr().ne(Expr::Literal(value.into()))
    }

    pub fn gt(&self, value: T) -> Expr {
        self.expr().gt(Expr::Literal(value.into()))
    }

    pub fn ge(&self, value: T) -> Expr {
        self.expr().ge(Expr::Literal(value.into()))
    }

    pub fn lt(&self, value: T) -> Expr {
        self.expr().lt(Expr::Literal(value.into()))
    }

    pub fn le(&self, value: T) -> Expr {
        self.expr().le(Expr::Literal(value.into()))
    }

    /// Compares against another field of the same type.
    pub fn eq_field(&self, other: Field<T>) -> Expr {
        self.expr().eq(other.expr())
    }
}

impl Field<String> {
    pub fn contains(&self, needle: &str) -> Expr {
        self.expr().contains(needle)
    }

    pub fn starts_with(&self, prefix: &str) -> Expr {
        self.expr().starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: &str) -> Expr {
        self.expr().ends_with(suffix)
    }

    pub fn length(&self) -> Expr {
        self.expr().length()
    }

    pub fn to_lower(&self) -> Expr {
        self.expr().to_lower()
    }

    pub fn to_upper(&self) -> Expr {
        self.expr().to_upper()
    }
}

impl<T> From<Field<T>> for Expr {
    fn from(field: Field<T>) -> Self {
        field.expr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_records_reference() {
        let r = dynamic().member("Address").member("City");
        assert_eq!(r.expr(), prop("Address/City"));
        assert_eq!(Expr::from(r), prop("Address.City"));
    }

    #[test]
    fn test_typed_field() {
        const ID: Field<i32> = Field::new("ProductID");
        assert_eq!(ID.eq(1), prop("ProductID").eq(1));
        assert_eq!(ID.name(), "ProductID");
    }
}
