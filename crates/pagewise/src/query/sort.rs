//! Sort orders.

use std::cmp::Ordering;

use super::value::{ItemAttributes, Value};

/// Sort direction of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One attribute of a sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub attribute: String,
    pub direction: SortDirection,
}

/// An ordered list of sort keys. Later keys break ties of earlier ones.
///
/// # Example
///
/// ```
/// use pagewise::query::SortOrder;
///
/// let order = SortOrder::asc("last_name").then_asc("first_name");
/// assert_eq!(order.keys().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl SortOrder {
    /// Sort ascending by one attribute.
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self::by(attribute, SortDirection::Ascending)
    }

    /// Sort descending by one attribute.
    pub fn desc(attribute: impl Into<String>) -> Self {
        Self::by(attribute, SortDirection::Descending)
    }

    /// Sort by one attribute in the given direction.
    pub fn by(attribute: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            keys: vec![SortKey {
                attribute: attribute.into(),
                direction,
            }],
        }
    }

    /// Add an ascending tie breaker.
    pub fn then_asc(self, attribute: impl Into<String>) -> Self {
        self.then(attribute, SortDirection::Ascending)
    }

    /// Add a descending tie breaker.
    pub fn then_desc(self, attribute: impl Into<String>) -> Self {
        self.then(attribute, SortDirection::Descending)
    }

    /// Add a tie breaker.
    pub fn then(mut self, attribute: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(SortKey {
            attribute: attribute.into(),
            direction,
        });
        self
    }

    /// The sort keys, most significant first.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// The same keys with every direction flipped.
    pub fn reversed(&self) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .map(|k| SortKey {
                    attribute: k.attribute.clone(),
                    direction: match k.direction {
                        SortDirection::Ascending => SortDirection::Descending,
                        SortDirection::Descending => SortDirection::Ascending,
                    },
                })
                .collect(),
        }
    }

    /// Compare two items under this order.
    pub fn compare<T: ItemAttributes + ?Sized>(&self, a: &T, b: &T) -> Ordering {
        for key in &self.keys {
            let va = a.attribute(&key.attribute).unwrap_or(Value::Null);
            let vb = b.attribute(&key.attribute).unwrap_or(Value::Null);
            let ord = va.sort_cmp(&vb);
            let ord = match key.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable sort of `items` under this order.
    pub fn sort<T: ItemAttributes>(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}
