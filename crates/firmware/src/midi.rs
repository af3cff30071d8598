//! USB-MIDI device. A host session stands in for the keyboard: connecting hands the outputs to MIDI, disconnecting
//! gives them back to the grid.

use crate::{EngineMutex, UsbDriver, post};
use defmt::{panic, *};
use embassy_stm32::{peripherals::USB_OTG_FS, usb};
use embassy_usb::{UsbDevice, class::midi::MidiClass, driver::EndpointError};
use lattice_lib::events::Event;

#[embassy_executor::task]
pub async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

#[embassy_executor::task]
pub async fn midi_task(mut class: MidiClass<'static, UsbDriver>, engine: &'static EngineMutex) -> ! {
    loop {
        class.wait_connection().await;
        info!("Connected");
        post(engine, Event::MidiConnected).await;
        let _ = receive(&mut class, engine).await;
        info!("Disconnected");
        post(engine, Event::MidiDisconnected).await;
    }
}

struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Forwards every USB-MIDI Event Packet in each transfer to the engine.
async fn receive(
    class: &mut MidiClass<'static, usb::Driver<'static, USB_OTG_FS>>,
    engine: &'static EngineMutex,
) -> Result<(), Disconnected> {
    let mut buf = [0; 64];
    loop {
        let n = class.read_packet(&mut buf).await?;
        for packet in buf[..n].chunks_exact(4) {
            post(engine, Event::MidiPacket([packet[0], packet[1], packet[2], packet[3]])).await;
        }
    }
}
