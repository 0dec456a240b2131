//! Two-phase change notification.
//!
//! [`ChangeNotifier`] pairs a [`VetoableSignal`] with a [`Signal`] carrying
//! the same event type. A mutating operation first calls
//! [`request`](ChangeNotifier::request); if no listener vetoes, it applies the
//! change and then calls [`notify`](ChangeNotifier::notify).
//!
//! ```
//! use pagewise_core::{ChangeNotifier, Veto};
//!
//! let notifier = ChangeNotifier::<u32>::new();
//! notifier.connect_vetoable(|&n| if n == 0 { Err(Veto::new("zero")) } else { Ok(()) });
//! notifier.connect(|n| println!("committed {n}"));
//!
//! let mut value = 1;
//! if notifier.request(&7).is_ok() {
//!     value = 7;
//!     notifier.notify(value);
//! }
//! assert_eq!(value, 7);
//! ```

use crate::error::Veto;
use crate::signal::{ConnectionId, Signal};
use crate::veto::VetoableSignal;

/// A vetoable signal and a committed-change signal for one event type.
pub struct ChangeNotifier<E> {
    /// Asked before a change is applied.
    pub vetoable: VetoableSignal<E>,
    /// Emitted after a change was applied.
    pub changed: Signal<E>,
}

impl<E: Send + 'static> Default for ChangeNotifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + 'static> ChangeNotifier<E> {
    /// Create a notifier with no listeners.
    pub fn new() -> Self {
        Self {
            vetoable: VetoableSignal::new(),
            changed: Signal::new(),
        }
    }

    /// Connect a listener for committed changes.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.changed.connect(slot)
    }

    /// Connect a listener that may veto pending changes.
    pub fn connect_vetoable<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&E) -> Result<(), Veto> + Send + Sync + 'static,
    {
        self.vetoable.connect(slot)
    }

    /// Ask for permission to apply the change described by `event`.
    pub fn request(&self, event: &E) -> Result<(), Veto> {
        self.vetoable.check(event)
    }

    /// Announce a change that has been applied.
    pub fn notify(&self, event: E) {
        self.changed.emit(event);
    }

}
