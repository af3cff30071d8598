//! The remote-control bus: a receive-only UART carrying 3-byte `(opcode, hi, lo)` frames.

use crate::{EVENTS_POSTED, EngineMutex};
use defmt::*;
use embassy_stm32::{mode::Async, usart::UartRx};

pub const BAUD_RATE: u32 = 31_250;

#[embassy_executor::task]
pub async fn remote_task(mut rx: UartRx<'static, Async>, engine: &'static EngineMutex) -> ! {
    let mut frame = [0; 3];
    loop {
        if let Err(e) = rx.read(&mut frame).await {
            warn!("Remote read failed: {}", e);
            continue;
        }
        match engine.lock().await.remote_frame(frame) {
            Ok(()) => EVENTS_POSTED.signal(()),
            Err(e) => warn!("Dropping remote frame {}: {}", frame, e),
        }
    }
}
