//! Item identity.

use std::fmt::Debug;
use std::hash::Hash;

/// A value with a stable identifier.
///
/// Identifiers must be equal for two values that represent the same backing
/// record, even when the values themselves differ (e.g. after an edit).
/// Selections and modification bookkeeping work on identifiers only.
pub trait Identifiable {
    /// The identifier type.
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Returns this value's identifier.
    fn id(&self) -> Self::Id;
}

/// Anything a pageable collection can hold.
///
/// Implemented automatically for every cloneable, thread-safe
/// [`Identifiable`] type.
pub trait Item: Identifiable + Clone + Send + Sync + 'static {}

impl<T> Item for T where T: Identifiable + Clone + Send + Sync + 'static {}

/// Shorthand for an item's identifier type.
pub type ItemId<T> = <T as Identifiable>::Id;
