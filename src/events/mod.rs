//! # Events Module
//!
//! Progress reporting for scans.
//!
//! The engine emits events through a channel so any front end can follow
//! a scan without the engine knowing about it.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Hash(HashEvent::Progress(p)) => println!("Hashed {}/{}", p.completed, p.total),
//!             Event::Reconcile(ReconcileEvent::Moved { from, to, .. }) => {
//!                 println!("{} -> {}", from.display(), to.display())
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(session, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
