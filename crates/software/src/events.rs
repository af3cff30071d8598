//! The inputs the engine reacts to, and the FIFO they wait in.

use heapless::Deque;

use crate::{error::Error, pots::POT_COUNT};

/// Number of events that may be waiting at once.
pub const EVENT_QUEUE_CAPACITY: usize = 32;

/// Something the engine must react to. Producers post these; [`Engine::process_next`] handles them one at a time in
/// arrival order.
///
/// [`Engine::process_next`]: crate::engine::Engine::process_next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// One sequencer tick (see [`TICK_PERIOD`](crate::configuration::timing::TICK_PERIOD)).
    Tick,
    /// One long-press timer firing (see [`KEY_TIMER_PERIOD`](crate::configuration::timing::KEY_TIMER_PERIOD)).
    KeyTimer,
    /// A grid key changed state.
    GridKey {
        /// Column, 0–15.
        x: u8,
        /// Row, 0–7.
        y: u8,
        /// `true` on key-down.
        pressed: bool,
    },
    /// The front-panel button changed state.
    Front {
        /// `true` on press.
        pressed: bool,
    },
    /// Fresh raw readings from every pot.
    Pots([u16; POT_COUNT]),
    /// A USB-MIDI Event Packet.
    MidiPacket([u8; 4]),
    /// A MIDI controller was connected; the engine switches to MIDI performance.
    MidiConnected,
    /// The MIDI controller went away; the engine returns to grid performance.
    MidiDisconnected,
    /// A grid was connected.
    GridConnected {
        /// Whether the grid shows levels rather than on/off.
        varibright: bool,
    },
    /// A remote command is waiting in the given slot of the [`RemoteQueue`](crate::remote::RemoteQueue).
    Remote(u8),
    /// Write the live preset to the selected slot.
    SavePreset,
}

/// Bounded FIFO of pending [`Event`]s.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Deque<Event, EVENT_QUEUE_CAPACITY>,
}

impl EventQueue {
    /// Appends an event; fails without side effects when full.
    pub fn push(&mut self, event: Event) -> Result<(), Error> {
        self.events.push_back(event).map_err(|_| {
            warn!("Event queue full; dropping {}", event);
            Error::EventQueueFull
        })
    }

    /// Removes the oldest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Number of waiting events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut queue = EventQueue::default();
        queue.push(Event::Tick).unwrap();
        queue.push(Event::Remote(3)).unwrap();
        queue.push(Event::KeyTimer).unwrap();

        assert_eq!(Some(Event::Tick), queue.pop(), "Expected left but got right");
        assert_eq!(Some(Event::Remote(3)), queue.pop());
        assert_eq!(Some(Event::KeyTimer), queue.pop());
        assert_eq!(None, queue.pop());
    }

    #[test]
    fn full_queue_drops_newest() {
        let mut queue = EventQueue::default();
        for _ in 0..EVENT_QUEUE_CAPACITY {
            queue.push(Event::Tick).unwrap();
        }
        assert_eq!(Err(Error::EventQueueFull), queue.push(Event::SavePreset));
        assert_eq!(EVENT_QUEUE_CAPACITY, queue.len());
        assert!((0..EVENT_QUEUE_CAPACITY).all(|_| queue.pop() == Some(Event::Tick)));
        assert!(queue.is_empty());
    }
}
