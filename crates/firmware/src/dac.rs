//! Output stage: two dual 12-bit DACs daisy-chained on one SPI bus, plus the gate.

use crate::{EngineMutex, URGENT_WRITE};
use defmt::*;
use embassy_futures::select::{Either, select};
use embassy_stm32::{gpio::Output, mode::Blocking, spi::Spi};
use embassy_time::Ticker;
use lattice_lib::{
    configuration::timing::RAMP_PERIOD,
    ramp::{CHANNEL_COUNT, dac_frames},
};

/// The pair of chained DACs behind a single chip select.
pub struct Dac {
    spi: Spi<'static, Blocking>,
    chip_select: Output<'static>,
}

impl Dac {
    pub fn new(spi: Spi<'static, Blocking>, chip_select: Output<'static>) -> Self {
        Self { spi, chip_select }
    }

    /// Writes all four output codes. Each frame addresses one DAC in the chain; the chip select is pulsed between
    /// frames to latch them.
    pub fn write(&mut self, codes: [u16; CHANNEL_COUNT]) {
        for frame in dac_frames(codes) {
            self.chip_select.set_low();
            if let Err(e) = self.spi.blocking_write(&frame) {
                error!("DAC write failed: {}", e);
            }
            self.chip_select.set_high();
        }
    }
}

/// Advances the output ramps every [`RAMP_PERIOD`] and writes them out, along with the gate. Handlers that need
/// their changes heard sooner (note-on, pitch bend) cut the wait short through [`URGENT_WRITE`].
#[embassy_executor::task]
pub async fn ramp_task(mut dac: Dac, mut gate: Output<'static>, engine: &'static EngineMutex) -> ! {
    let mut ticker = Ticker::every(RAMP_PERIOD);
    loop {
        let codes = match select(ticker.next(), URGENT_WRITE.wait()).await {
            Either::First(()) => engine.lock().await.advance_ramps(),
            Either::Second(codes) => codes,
        };
        dac.write(codes);

        if engine.lock().await.gate_is_high() {
            gate.set_high();
        } else {
            gate.set_low();
        }
    }
}
