//! Event channel over crossbeam-channel.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Sends events from the scan engine.
///
/// Cloneable, so hashing workers can report progress directly.
#[derive(Clone)]
pub struct EventSender {
    inner: Option<Sender<Event>>,
}

impl EventSender {
    /// Send an event. Events nobody listens for are discarded.
    pub fn send(&self, event: Event) {
        if let Some(sender) = &self.inner {
            let _ = sender.send(event);
        }
    }
}

/// Receives events on the listening side (CLI progress bar, tests).
///
/// Iteration ends once every sender has been dropped.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Factory for sender/receiver pairs
pub struct EventChannel;

impl EventChannel {
    /// Create an unbounded event channel
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender {
                inner: Some(sender),
            },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender whose events go nowhere
pub fn null_sender() -> EventSender {
    EventSender { inner: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ScanEvent, ScanProgress, SessionEvent};
    use std::path::PathBuf;
    use std::thread;

    #[test]
    fn events_can_be_sent_across_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                directories_scanned: 5,
                files_found: 25,
                current_path: PathBuf::from("/books"),
            })));
        });

        handle.join().unwrap();

        let events: Vec<Event> = receiver.iter().collect();
        match events.as_slice() {
            [Event::Scan(ScanEvent::Progress(p))] => assert_eq!(p.files_found, 25),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn events_after_receiver_dropped_are_discarded() {
        let (sender, receiver) = EventChannel::new();
        drop(receiver);

        sender.send(Event::Scan(ScanEvent::Completed { total_files: 0 }));
    }

    #[test]
    fn null_sender_does_not_panic() {
        let sender = null_sender();
        sender.send(Event::Session(SessionEvent::Aborted {
            reason: "cancelled".to_string(),
        }));
    }
}
