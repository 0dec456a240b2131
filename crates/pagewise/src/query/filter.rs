//! Filter expressions.

use std::cmp::Ordering;

use super::value::{ItemAttributes, Value};

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Attribute equals the value.
    Eq,
    /// Attribute differs from the value.
    Ne,
    /// Attribute is less than the value.
    Lt,
    /// Attribute is less than or equal to the value.
    Le,
    /// Attribute is greater than the value.
    Gt,
    /// Attribute is greater than or equal to the value.
    Ge,
    /// Text attribute contains the text value.
    Contains,
    /// Text attribute starts with the text value.
    StartsWith,
    /// Text attribute ends with the text value.
    EndsWith,
    /// Attribute is null or missing. The value is ignored.
    IsNull,
}

impl CompareOp {
    /// Evaluate the operator for an attribute value `lhs` and operand `rhs`.
    pub fn eval(self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            Self::IsNull => lhs.is_null(),
            Self::Eq => lhs.partial_compare(rhs) == Some(Ordering::Equal),
            Self::Ne => lhs.partial_compare(rhs) != Some(Ordering::Equal),
            Self::Lt => lhs.partial_compare(rhs) == Some(Ordering::Less),
            Self::Le => matches!(
                lhs.partial_compare(rhs),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt => lhs.partial_compare(rhs) == Some(Ordering::Greater),
            Self::Ge => matches!(
                lhs.partial_compare(rhs),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Contains => text_op(lhs, rhs, |a, b| a.contains(b)),
            Self::StartsWith => text_op(lhs, rhs, |a, b| a.starts_with(b)),
            Self::EndsWith => text_op(lhs, rhs, |a, b| a.ends_with(b)),
        }
    }
}

fn text_op(lhs: &Value, rhs: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    match (lhs.as_str(), rhs.as_str()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

/// A boolean filter over item attributes.
///
/// # Example
///
/// ```
/// use pagewise::query::{CompareOp, FilterExpr};
///
/// let adults_named_a = FilterExpr::compare("age", CompareOp::Ge, 18)
///     .and(FilterExpr::compare("name", CompareOp::StartsWith, "A"));
/// assert_eq!(adults_named_a.conditions().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// A single attribute condition.
    Compare {
        attribute: String,
        op: CompareOp,
        value: Value,
    },
    /// All sub-expressions match. Empty matches everything.
    And(Vec<FilterExpr>),
    /// At least one sub-expression matches. Empty matches nothing.
    Or(Vec<FilterExpr>),
    /// The sub-expression does not match.
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Create a single attribute condition.
    pub fn compare(attribute: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            attribute: attribute.into(),
            op,
            value: value.into(),
        }
    }

    /// Shorthand for an equality condition.
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Eq, value)
    }

    /// Combine with another expression so both must match.
    ///
    /// Nested conjunctions are flattened.
    pub fn and(self, other: FilterExpr) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            expr => vec![expr],
        };
        match other {
            Self::And(more) => parts.extend(more),
            expr => parts.push(expr),
        }
        Self::And(parts)
    }

    /// Combine with another expression so either may match.
    pub fn or(self, other: FilterExpr) -> Self {
        let mut parts = match self {
            Self::Or(parts) => parts,
            expr => vec![expr],
        };
        match other {
            Self::Or(more) => parts.extend(more),
            expr => parts.push(expr),
        }
        Self::Or(parts)
    }

    /// Negate this expression.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Combine two optional filters with `And`.
    pub fn combine(base: Option<&FilterExpr>, user: Option<&FilterExpr>) -> Option<FilterExpr> {
        match (base, user) {
            (None, None) => None,
            (Some(f), None) | (None, Some(f)) => Some(f.clone()),
            (Some(b), Some(u)) => Some(b.clone().and(u.clone())),
        }
    }

    /// Evaluate this expression against an item.
    pub fn matches<T: ItemAttributes + ?Sized>(&self, item: &T) -> bool {
        match self {
            Self::Compare {
                attribute,
                op,
                value,
            } => {
                let lhs = item.attribute(attribute).unwrap_or(Value::Null);
                op.eval(&lhs, value)
            }
            Self::And(parts) => parts.iter().all(|p| p.matches(item)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(item)),
            Self::Not(inner) => !inner.matches(item),
        }
    }

    /// Iterate over all attribute conditions as `(attribute, op)` pairs.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, CompareOp)> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out.into_iter()
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<(&'a str, CompareOp)>) {
        match self {
            Self::Compare { attribute, op, .. } => out.push((attribute.as_str(), *op)),
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_conditions(out);
                }
            }
            Self::Not(inner) => inner.collect_conditions(out),
        }
    }
}
