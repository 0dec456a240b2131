//! Core notification primitives for Pagewise.
//!
//! This crate provides the small observer toolkit the collection layer is
//! built on:
//!
//! - **Signals**: synchronous, ordered, type-safe notifications
//! - **Vetoable signals**: listeners may refuse a change before it happens
//! - **Change notifiers**: the vetoable and committed signal pair used by
//!   every mutating operation
//! - **Properties**: shared value holders whose owner decides when to notify
//!
//! # Example
//!
//! ```
//! use pagewise_core::{ChangeNotifier, Property, Veto};
//!
//! let page = Property::new(0usize);
//! let notifier = ChangeNotifier::<(usize, usize)>::new();
//! notifier.connect_vetoable(|&(_, new)| {
//!     if new > 99 { Err(Veto::new("no such page")) } else { Ok(()) }
//! });
//!
//! let old = page.get();
//! if notifier.request(&(old, 5)).is_ok() {
//!     page.set_silent(5);
//!     notifier.notify((old, 5));
//! }
//! assert_eq!(page.get(), 5);
//! assert!(notifier.request(&(5, 100)).is_err());
//! ```

pub mod error;
pub mod logging;
pub mod notifier;
pub mod property;
pub mod signal;
pub mod veto;

pub use error::Veto;
pub use notifier::ChangeNotifier;
pub use property::Property;
pub use signal::{ConnectionId, Signal};
pub use veto::VetoableSignal;
