//! Vetoable signals.
//!
//! A [`VetoableSignal`] asks every connected listener for permission before a
//! change is made. Listeners answer with `Ok(())` or a [`Veto`]; the first
//! veto stops delivery and is handed back to the caller, which must then
//! abandon the change.
//!
//! # Example
//!
//! ```
//! use pagewise_core::{Veto, VetoableSignal};
//!
//! let before_page_change = VetoableSignal::<usize>::new();
//! before_page_change.connect(|&page| {
//!     if page > 10 { Err(Veto::new("too far")) } else { Ok(()) }
//! });
//!
//! assert!(before_page_change.check(&3).is_ok());
//! assert!(before_page_change.check(&12).is_err());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::error::Veto;
use crate::logging::targets;
use crate::signal::ConnectionId;

type VetoSlot<Args> = Arc<dyn Fn(&Args) -> Result<(), Veto> + Send + Sync>;

struct VetoConnection<Args> {
    slot: VetoSlot<Args>,
    seq: u64,
}

/// A signal whose listeners may refuse the announced change.
pub struct VetoableSignal<Args> {
    connections: Mutex<SlotMap<ConnectionId, VetoConnection<Args>>>,
    next_seq: AtomicU64,
}

impl<Args: Send + 'static> Default for VetoableSignal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Send + 'static> VetoableSignal<Args> {
    /// Create a new vetoable signal with no listeners.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Connect a listener that may veto announced changes.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) -> Result<(), Veto> + Send + Sync + 'static,
    {
        let connection = VetoConnection {
            slot: Arc::new(slot),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.connections.lock().insert(connection)
    }

    /// Disconnect a listener. Returns `true` if it was connected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Get the number of connected listeners.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Ask every listener for permission, in connection order.
    ///
    /// Returns the first veto. Listeners after the vetoing one are not asked.
    pub fn check(&self, args: &Args) -> Result<(), Veto> {
        let connections = self.connections.lock();
        let mut ordered: Vec<_> = connections
            .values()
            .map(|conn| (conn.seq, conn.slot.clone()))
            .collect();
        drop(connections);
        ordered.sort_unstable_by_key(|(seq, _)| *seq);

        for (_, slot) in ordered {
            if let Err(veto) = slot(args) {
                tracing::debug!(target: targets::SIGNAL, reason = veto.reason(), "change vetoed");
                return Err(veto);
            }
        }
        Ok(())
    }
}

static_assertions::assert_impl_all!(VetoableSignal<u64>: Send, Sync);
