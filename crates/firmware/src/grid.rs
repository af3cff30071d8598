//! Serial link to a monome grid.
//!
//! The grid reports key changes as 3-byte messages and takes LED updates one 8×8 quadrant at a time: a packed
//! on/off bitmap for mono grids or 32 bytes of 4-bit levels for varibright grids.

use crate::{EngineMutex, post};
use defmt::*;
use embassy_stm32::{
    mode::Async,
    usart::{UartRx, UartTx},
};
use embassy_time::Ticker;
use lattice_lib::{
    configuration::timing::REFRESH_PERIOD,
    display::Frame,
    events::Event,
};

pub const BAUD_RATE: u32 = 115_200;

/// Whether the attached grid shows levels. The serial protocol has no handshake for it.
const VARIBRIGHT: bool = true;

const KEY_UP: u8 = 0x20;
const KEY_DOWN: u8 = 0x21;
const LED_MAP: u8 = 0x14;
const LED_LEVEL_MAP: u8 = 0x1A;

/// Quadrant origins, left then right.
const QUADRANTS: [(u8, u8); 2] = [(0, 0), (8, 0)];

#[embassy_executor::task]
pub async fn key_task(mut rx: UartRx<'static, Async>, engine: &'static EngineMutex) -> ! {
    post(engine, Event::GridConnected { varibright: VARIBRIGHT }).await;

    let mut message = [0; 3];
    loop {
        if let Err(e) = rx.read(&mut message).await {
            warn!("Grid read failed: {}", e);
            continue;
        }
        let [header, x, y] = message;
        let pressed = match header {
            KEY_DOWN => true,
            KEY_UP => false,
            _ => {
                debug!("Ignoring grid message {:#04x}", header);
                continue;
            }
        };
        post(engine, Event::GridKey { x, y, pressed }).await;
    }
}

#[embassy_executor::task]
pub async fn refresh_task(mut tx: UartTx<'static, Async>, engine: &'static EngineMutex) -> ! {
    let mut ticker = Ticker::every(REFRESH_PERIOD);
    let mut frame = Frame::default();
    loop {
        ticker.next().await;

        let varibright = {
            let mut engine = engine.lock().await;
            if !engine.take_frame(&mut frame) {
                continue;
            }
            engine.is_varibright()
        };

        for (quadrant, (x0, y0)) in QUADRANTS.into_iter().enumerate() {
            let result = if varibright {
                tx.write(&level_map(&frame, x0, y0)).await
            } else {
                let mut message = [0; 11];
                message[..3].copy_from_slice(&[LED_MAP, x0, y0]);
                message[3..].copy_from_slice(&frame.quadrant_bitmap(quadrant as u8));
                tx.write(&message).await
            };
            if let Err(e) = result {
                warn!("Grid write failed: {}", e);
            }
        }
    }
}

/// Builds a level-map message for the quadrant at `(x0, y0)`: two cells per byte, left cell in the high nibble.
fn level_map(frame: &Frame, x0: u8, y0: u8) -> [u8; 35] {
    let mut message = [0; 35];
    message[..3].copy_from_slice(&[LED_LEVEL_MAP, x0, y0]);
    for (i, byte) in message[3..].iter_mut().enumerate() {
        let y = y0 + (i / 4) as u8;
        let x = x0 + (i % 4) as u8 * 2;
        *byte = frame.get(x, y) << 4 | frame.get(x + 1, y);
    }
    message
}
