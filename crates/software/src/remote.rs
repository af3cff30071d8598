//! The bounded queue between the remote control bus and the engine.
//!
//! The bus receiver claims a slot and posts [`Event::Remote`](crate::events::Event::Remote) naming it; the engine
//! frees the slot when it processes the event. When every slot is occupied the command is dropped and the sender
//! must try again.

use num_derive::FromPrimitive;

use crate::error::Error;

/// Number of commands that may be waiting at once.
pub const REMOTE_CAPACITY: usize = 8;

/// Remote bus opcodes.
#[derive(Clone, Copy, Debug, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    /// Load the preset with the given index (0–7).
    Preset = 0,
    /// Nonzero selects the external clock, zero the internal one.
    ClockMode = 1,
    /// Nonzero steps playback by one event under the external clock.
    Clock = 2,
    /// Nonzero restarts the current pattern from the top, ending any recording.
    Reset = 3,
    /// Select the pattern with the given index (0–15), keeping playback running if it was.
    Pattern = 4,
    /// Transpose the current pattern by a signed, row-major offset.
    Transpose = 5,
    /// Nonzero stops playback, ending any recording.
    Stop = 6,
    /// Play one of the four long shapes (1–4) at the last anchor.
    Triple = 7,
    /// Pattern time transform: 1 doubles, 2 halves, 3 linearizes.
    Magic = 8,
}

/// A command as received from the bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteCommand {
    /// Raw opcode; unknown opcodes are carried through and ignored at dispatch.
    pub opcode: u8,
    /// Big-endian payload.
    pub payload: u16,
}

impl RemoteCommand {
    /// Decodes a 3-byte bus frame: opcode, payload high byte, payload low byte.
    pub fn from_frame(frame: [u8; 3]) -> Self {
        Self {
            opcode: frame[0],
            payload: u16::from_be_bytes([frame[1], frame[2]]),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Slot {
    waiting: bool,
    command: RemoteCommand,
}

/// Fixed slots for commands awaiting dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteQueue {
    slots: [Slot; REMOTE_CAPACITY],
    waiting_count: u8,
}

impl RemoteQueue {
    /// Claims a free slot for `command` and returns its index.
    pub fn enqueue(&mut self, command: RemoteCommand) -> Result<u8, Error> {
        if usize::from(self.waiting_count) >= REMOTE_CAPACITY {
            warn!("Remote queue full; dropping opcode {}", command.opcode);
            return Err(Error::RemoteQueueFull);
        }
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| !slot.waiting)
            .ok_or(Error::RemoteQueueFull)?;
        slot.waiting = true;
        slot.command = command;
        self.waiting_count += 1;
        Ok(index as u8)
    }

    /// Frees a slot and returns the command it held, or `None` if the slot wasn't occupied.
    pub fn take(&mut self, slot: u8) -> Option<RemoteCommand> {
        let slot = self.slots.get_mut(usize::from(slot))?;
        if !slot.waiting {
            return None;
        }
        slot.waiting = false;
        self.waiting_count -= 1;
        Some(slot.command)
    }

    /// Number of occupied slots.
    pub fn waiting_count(&self) -> usize {
        usize::from(self.waiting_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    fn command(opcode: u8) -> RemoteCommand {
        RemoteCommand { opcode, payload: 1 }
    }

    #[test]
    fn ninth_command_is_dropped() {
        let mut queue = RemoteQueue::default();
        for i in 0..REMOTE_CAPACITY {
            assert_eq!(Ok(i as u8), queue.enqueue(command(i as u8)));
        }
        assert_eq!(
            Err(Error::RemoteQueueFull),
            queue.enqueue(command(8)),
            "Expected left but got right"
        );
        assert_eq!(REMOTE_CAPACITY, queue.waiting_count());

        assert_eq!(Some(command(3)), queue.take(3));
        assert_eq!(REMOTE_CAPACITY - 1, queue.waiting_count());
        assert_eq!(Ok(3), queue.enqueue(command(8)), "Freed slot should be reused");
        assert_eq!(REMOTE_CAPACITY, queue.waiting_count());
    }

    #[test]
    fn take_of_free_slot_is_ignored() {
        let mut queue = RemoteQueue::default();
        assert_eq!(None, queue.take(0));
        assert_eq!(None, queue.take(200));
        assert_eq!(0, queue.waiting_count());
    }

    #[test]
    fn frame_payload_is_big_endian() {
        assert_eq!(
            RemoteCommand {
                opcode: 5,
                payload: 0xFFF6
            },
            RemoteCommand::from_frame([5, 0xFF, 0xF6])
        );
    }

    #[test]
    fn opcodes() {
        assert_eq!(Some(Opcode::Transpose), Opcode::from_u8(5));
        assert_eq!(Some(Opcode::Magic), Opcode::from_u8(8));
        assert_eq!(None, Opcode::from_u8(9));
    }
}
