//! Expression formatting

use super::BinaryOperator;
use super::Expr;
use super::LambdaKind;
use super::UnaryOperator;
use crate::error::Error;
use crate::protocol::ProtocolAdapter;

/// Formats expression trees into filter text for one protocol version.
///
/// Output is not percent-escaped; escaping happens once when the command
/// is composed into a URI.
#[derive(Debug, Clone, Copy)]
pub struct ExprFormatter<'a> {
    adapter: &'a dyn ProtocolAdapter,
}

impl<'a> ExprFormatter<'a> {
    pub fn new(adapter: &'a dyn ProtocolAdapter) -> Self {
        Self { adapter }
    }

    /// Formats `expr`.
    pub fn format(&self, expr: &Expr) -> Result<String, Error> {
        match expr {
            Expr::Reference(path) => Ok(path.to_string()),
            Expr::Literal(value) => Ok(self.adapter.format_literal(value)),
            Expr::Unary { op, operand } => {
                let inner = self.format(operand)?;
                let inner = if matches!(operand.as_ref(), Expr::Binary { .. }) {
                    format!("({})", inner)
                } else {
                    inner
                };
                Ok(match op {
                    UnaryOperator::Not => format!("not {}", inner),
                    UnaryOperator::Negate => format!("-{}", inner),
                })
            }
            Expr::Binary { op, left, right } => {
                let keyword = self.adapter.binary_operator(*op)?;
                let left_text = self.format(left)?;
                let right_text = self.format(right)?;
                let left_text = if needs_parens(*op, left, false) {
                    format!("({})", left_text)
                } else {
                    left_text
                };
                let right_text = if needs_parens(*op, right, true) {
                    format!("({})", right_text)
                } else {
                    right_text
                };
                Ok(format!("{} {} {}", left_text, keyword, right_text))
            }
            Expr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|a| self.format(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.adapter.format_function(*function, &args)
            }
            Expr::Member { target, name } => Ok(format!("{}/{}", self.format(target)?, name)),
            Expr::Lambda {
                collection,
                kind,
                variable,
                predicate,
            } => {
                let operator = match kind {
                    LambdaKind::Any => "any",
                    LambdaKind::All => "all",
                };
                Ok(format!(
                    "{}/{}({}:{})",
                    self.format(collection)?,
                    operator,
                    variable,
                    self.format(predicate)?
                ))
            }
        }
    }
}

/// A child binds looser than its parent, or sits on the right of a
/// non-associative operator of the same precedence.
fn needs_parens(parent: BinaryOperator, child: &Expr, is_right: bool) -> bool {
    let Expr::Binary { op: child_op, .. } = child else {
        return false;
    };
    let (parent_prec, child_prec) = (parent.precedence(), child_op.precedence());
    child_prec < parent_prec || (is_right && child_prec == parent_prec && !parent.is_associative())
}
