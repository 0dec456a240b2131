//! Shared value holders.
//!
//! A [`Property<T>`] holds one value behind a lock. Setting it never
//! notifies anybody: the owner compares the new value, asks vetoable
//! listeners and announces the change itself, so a vetoed change leaves the
//! property untouched.
//!
//! # Example
//!
//! ```
//! use pagewise_core::{ChangeNotifier, Property};
//!
//! let page = Property::new(0usize);
//! let page_changed = ChangeNotifier::<(usize, usize)>::new();
//!
//! let (old, new) = (page.get(), 3);
//! if old != new && page_changed.request(&(old, new)).is_ok() {
//!     page.set_silent(new);
//!     page_changed.notify((old, new));
//! }
//! assert_eq!(page.get(), 3);
//! ```

use std::fmt;

use parking_lot::RwLock;

/// A value read and replaced through shared references.
///
/// # Thread Safety
///
/// `Property<T>` uses interior mutability with `RwLock` and is `Send + Sync`
/// for `T: Send + Sync`.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Replace the value. Nothing is compared or announced.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&*self.value.read()).finish()
    }
}

static_assertions::assert_impl_all!(Property<Option<String>>: Send, Sync);
