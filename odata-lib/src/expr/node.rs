//! Expression tree

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::Function;
use crate::model::EnumValue;
use crate::model::Value;

/// A `/`-separated member path such as `Address/City`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MemberPath {
    segments: Vec<String>,
}

impl MemberPath {
    /// Parses a path, accepting both `.` and `/` as separators.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split(['.', '/'])
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the path with `name` appended.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(MemberPath::parse(name).segments);
        Self { segments }
    }

    /// Returns the single segment of a one-segment path.
    pub fn as_simple(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl std::fmt::Display for MemberPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Flag test on enum values (modern protocol only).
    Has,
}

impl BinaryOperator {
    /// Wire keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "eq",
            BinaryOperator::Ne => "ne",
            BinaryOperator::Gt => "gt",
            BinaryOperator::Ge => "ge",
            BinaryOperator::Lt => "lt",
            BinaryOperator::Le => "le",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Add => "add",
            BinaryOperator::Sub => "sub",
            BinaryOperator::Mul => "mul",
            BinaryOperator::Div => "div",
            BinaryOperator::Mod => "mod",
            BinaryOperator::Has => "has",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 6,
            BinaryOperator::Add | BinaryOperator::Sub => 5,
            BinaryOperator::Gt
            | BinaryOperator::Ge
            | BinaryOperator::Lt
            | BinaryOperator::Le
            | BinaryOperator::Has => 4,
            BinaryOperator::Eq | BinaryOperator::Ne => 3,
            BinaryOperator::And => 2,
            BinaryOperator::Or => 1,
        }
    }

    /// `true` if `a op (b op c)` equals `(a op b) op c`.
    pub fn is_associative(&self) -> bool {
        matches!(
            self,
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Add | BinaryOperator::Mul
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LambdaKind {
    Any,
    All,
}

/// An immutable expression node.
///
/// Build trees with [`prop`](super::prop), [`Field`](super::Field) or
/// [`dynamic`](super::dynamic) and combine them with the methods below; every
/// combinator consumes its operands and returns a new node.
///
/// # Example
///
/// ```
/// use odata_lib::expr::prop;
///
/// let filter = prop("UnitPrice").gt(20)
///     .and(prop("ProductName").starts_with("Ch").or(prop("Discontinued").eq(true)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Reference(MemberPath),
    Literal(Value),
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
    /// Member access on a non-reference expression.
    Member {
        target: Box<Expr>,
        name: String,
    },
    /// `collection/any(x:predicate)` or `collection/all(x:predicate)`.
    Lambda {
        collection: Box<Expr>,
        kind: LambdaKind,
        variable: String,
        predicate: Box<Expr>,
    },
}

impl Expr {
    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    fn call(function: Function, args: Vec<Expr>) -> Expr {
        Expr::Call { function, args }
    }

    /// Creates a literal node.
    pub fn literal(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Ne, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Ge, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Le, other)
    }

    /// `self eq null`
    pub fn is_null(self) -> Expr {
        self.eq(Value::Null)
    }

    /// `self ne null`
    pub fn is_not_null(self) -> Expr {
        self.ne(Value::Null)
    }

    /// Enum flag test: `self has NS.Flags'Member'`.
    pub fn has(self, flag: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Has, flag)
    }

    // =========================================================================
    // Logical
    // =========================================================================

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOperator::Not,
            operand: Box::new(self),
        }
    }

    /// Joins expressions with `and`; `None` for an empty input.
    pub fn conjunction(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Joins expressions with `or`; `None` for an empty input.
    pub fn disjunction(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::or)
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Add, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Sub, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Mul, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Div, other)
    }

    pub fn modulo(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Mod, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOperator::Negate,
            operand: Box::new(self),
        }
    }

    // =========================================================================
    // String functions
    // =========================================================================

    pub fn contains(self, needle: impl Into<Expr>) -> Expr {
        Expr::call(Function::Contains, vec![self, needle.into()])
    }

    pub fn starts_with(self, prefix: impl Into<Expr>) -> Expr {
        Expr::call(Function::StartsWith, vec![self, prefix.into()])
    }

    pub fn ends_with(self, suffix: impl Into<Expr>) -> Expr {
        Expr::call(Function::EndsWith, vec![self, suffix.into()])
    }

    pub fn length(self) -> Expr {
        Expr::call(Function::Length, vec![self])
    }

    pub fn index_of(self, needle: impl Into<Expr>) -> Expr {
        Expr::call(Function::IndexOf, vec![self, needle.into()])
    }

    pub fn substring(self, start: impl Into<Expr>) -> Expr {
        Expr::call(Function::Substring, vec![self, start.into()])
    }

    pub fn substring_len(self, start: impl Into<Expr>, length: impl Into<Expr>) -> Expr {
        Expr::call(Function::Substring, vec![self, start.into(), length.into()])
    }

    pub fn replace(self, from: impl Into<Expr>, to: impl Into<Expr>) -> Expr {
        Expr::call(Function::Replace, vec![self, from.into(), to.into()])
    }

    pub fn to_lower(self) -> Expr {
        Expr::call(Function::ToLower, vec![self])
    }

    pub fn to_upper(self) -> Expr {
        Expr::call(Function::ToUpper, vec![self])
    }

    pub fn trim(self) -> Expr {
        Expr::call(Function::Trim, vec![self])
    }

    pub fn concat(self, other: impl Into<Expr>) -> Expr {
        Expr::call(Function::Concat, vec![self, other.into()])
    }

    // =========================================================================
    // Date, time and math functions
    // =========================================================================

    pub fn year(self) -> Expr {
        Expr::call(Function::Year, vec![self])
    }

    pub fn month(self) -> Expr {
        Expr::call(Function::Month, vec![self])
    }

    pub fn day(self) -> Expr {
        Expr::call(Function::Day, vec![self])
    }

    pub fn hour(self) -> Expr {
        Expr::call(Function::Hour, vec![self])
    }

    pub fn minute(self) -> Expr {
        Expr::call(Function::Minute, vec![self])
    }

    pub fn second(self) -> Expr {
        Expr::call(Function::Second, vec![self])
    }

    pub fn fractional_seconds(self) -> Expr {
        Expr::call(Function::FractionalSeconds, vec![self])
    }

    pub fn date(self) -> Expr {
        Expr::call(Function::Date, vec![self])
    }

    pub fn time(self) -> Expr {
        Expr::call(Function::Time, vec![self])
    }

    /// `now()`
    pub fn now() -> Expr {
        Expr::call(Function::Now, Vec::new())
    }

    pub fn round(self) -> Expr {
        Expr::call(Function::Round, vec![self])
    }

    pub fn floor(self) -> Expr {
        Expr::call(Function::Floor, vec![self])
    }

    pub fn ceiling(self) -> Expr {
        Expr::call(Function::Ceiling, vec![self])
    }

    // =========================================================================
    // Type functions, members and lambdas
    // =========================================================================

    /// `cast(self,Type)`
    pub fn cast(self, type_name: &str) -> Expr {
        Expr::call(Function::Cast, vec![self, Expr::literal(type_name)])
    }

    /// `isof(self,Type)`
    pub fn is_of(self, type_name: &str) -> Expr {
        Expr::call(Function::IsOf, vec![self, Expr::literal(type_name)])
    }

    /// Accesses a member: extends a reference path, or wraps other nodes.
    pub fn member(self, name: &str) -> Expr {
        match self {
            Expr::Reference(path) => Expr::Reference(path.child(name)),
            other => Expr::Member {
                target: Box::new(other),
                name: name.to_string(),
            },
        }
    }

    /// `self/any(variable:predicate)` where `predicate` receives the
    /// range variable as a reference.
    pub fn any(self, variable: &str, predicate: impl FnOnce(Expr) -> Expr) -> Expr {
        self.lambda(LambdaKind::Any, variable, predicate)
    }

    /// `self/all(variable:predicate)`
    pub fn all(self, variable: &str, predicate: impl FnOnce(Expr) -> Expr) -> Expr {
        self.lambda(LambdaKind::All, variable, predicate)
    }

    fn lambda(self, kind: LambdaKind, variable: &str, predicate: impl FnOnce(Expr) -> Expr) -> Expr {
        let range = Expr::Reference(MemberPath::from_segments(vec![variable.to_string()]));
        Expr::Lambda {
            collection: Box::new(self),
            kind,
            variable: variable.to_string(),
            predicate: Box::new(predicate(range)),
        }
    }
}

// =============================================================================
// From implementations
// =============================================================================

macro_rules! literal_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Expr::Literal(Value::from(v))
                }
            }
        )*
    };
}

literal_from!(
    bool,
    u8,
    i8,
    i16,
    i32,
    i64,
    f32,
    f64,
    Decimal,
    String,
    &str,
    Uuid,
    DateTime<Utc>,
    NaiveDateTime,
    NaiveDate,
    NaiveTime,
    TimeDelta,
    Vec<u8>,
    EnumValue,
    Value,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::prop;

    #[test]
    fn test_member_path_parse() {
        let path = MemberPath::parse("Address.City");
        assert_eq!(path.to_string(), "Address/City");
        assert_eq!(MemberPath::parse("Name").as_simple(), Some("Name"));
    }

    #[test]
    fn test_nodes_are_immutable_snapshots() {
        let base = prop("Price");
        let a = base.clone().gt(10);
        let b = base.clone().lt(5);
        assert_ne!(a, b);
        assert_eq!(base, prop("Price"));
    }

    #[test]
    fn test_member_extends_reference() {
        assert_eq!(
            prop("Address").member("City"),
            Expr::Reference(MemberPath::parse("Address/City"))
        );
    }

    #[test]
    fn test_conjunction() {
        assert_eq!(Expr::conjunction(Vec::new()), None);
        let joined = Expr::conjunction([prop("A").eq(1), prop("B").eq(2)]).unwrap();
        assert!(matches!(joined, Expr::Binary { op: BinaryOperator::And, .. }));
    }
}
