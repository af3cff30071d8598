//! Lattice is [Embassy](https://embassy.dev)-based firmware for a performance controller with four control-voltage
//! outputs and a gate. The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an F7-series STM32
//! microcontroller.
//!
//! Gestures drawn on a [monome grid](https://monome.org/docs/grid/) become pitches, CV levels and gate events, and can
//! be recorded into looping patterns. When a USB-MIDI controller is connected the outputs follow its notes instead.
//! All of the behavior lives in [`lattice_lib`]; this crate wires the microcontroller's peripherals to it.
//!
//! For details about the hardware or how to use the device, see the `README`.

#![no_std]
#![no_main]

mod dac;
mod grid;
mod midi;
mod remote;
mod storage;

use crate::{dac::Dac, storage::FlashStorage};
use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::{
    Config,
    adc::{Adc, AdcChannel, AnyAdcChannel, SampleTime},
    bind_interrupts,
    exti::ExtiInput,
    flash::Flash,
    gpio::{Level, Output, Pull, Speed},
    peripherals::{self, ADC1},
    spi::{self, Spi},
    time::Hertz,
    usart::{self, Uart, UartRx},
    usb,
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex, signal::Signal};
use embassy_time::{Duration, Ticker, Timer};
use embassy_usb::{Builder, class::midi::MidiClass};
use lattice_lib::{
    configuration::timing,
    engine::Engine,
    events::Event,
    pots::POT_COUNT,
    ramp::CHANNEL_COUNT,
};
use static_cell::StaticCell;

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
        USART2 => usart::InterruptHandler<peripherals::USART2>;
        USART6 => usart::InterruptHandler<peripherals::USART6>;
    }
);

type EngineMutex = mutex::Mutex<CriticalSectionRawMutex, Engine<FlashStorage>>;
type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

/// Wakes the engine task after an event has been queued.
static EVENTS_POSTED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Output codes that must reach the DAC before the next ramp period.
static URGENT_WRITE: Signal<CriticalSectionRawMutex, [u16; CHANNEL_COUNT]> = Signal::new();

/// Queues an event for the engine and wakes it. Events that don't fit are dropped.
async fn post(engine: &'static EngineMutex, event: Event) {
    if let Err(error) = engine.lock().await.post(event) {
        warn!("Dropping {}: {}", event, error);
    }
    EVENTS_POSTED.signal(());
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing Lattice");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // per section 5.2 of RM0410: the 48MHz clock used for USB OTG FS is derived from the main PLL VCO (PLLQ clock)
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    let storage = FlashStorage::new(Flash::new_blocking(p.FLASH));
    static ENGINE: StaticCell<EngineMutex> = StaticCell::new();
    let engine = ENGINE.init(mutex::Mutex::new(unwrap!(Engine::new(storage))));

    unwrap!(spawner.spawn(engine_task(engine)));

    // two dual DACs, daisy-chained on SPI1, share one chip select
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(4_000_000);
    let spi = Spi::new_blocking_txonly(p.SPI1, p.PA5, p.PA7, spi_config);
    let chip_select = Output::new(p.PD14, Level::High, Speed::VeryHigh);
    let gate = Output::new(p.PG0, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(dac::ramp_task(Dac::new(spi, chip_select), gate, engine)));

    unwrap!(spawner.spawn(timer_task(engine, timing::TICK_PERIOD, Event::Tick)));
    unwrap!(spawner.spawn(timer_task(engine, timing::KEY_TIMER_PERIOD, Event::KeyTimer)));

    let mut adc = Adc::new(p.ADC1);
    adc.set_sample_time(SampleTime::CYCLES144);
    let pots = [p.PA3.degrade_adc(), p.PC0.degrade_adc(), p.PC3.degrade_adc()];
    unwrap!(spawner.spawn(pots_task(adc, pots, engine)));

    let button = ExtiInput::new(p.PC13, p.EXTI13, Pull::None);
    unwrap!(spawner.spawn(front_task(button, engine)));

    let mut grid_config = usart::Config::default();
    grid_config.baudrate = grid::BAUD_RATE;
    let grid_uart = unwrap!(Uart::new(
        p.USART2,
        p.PD6,
        p.PD5,
        Irqs,
        p.DMA1_CH6,
        p.DMA1_CH5,
        grid_config
    ));
    let (grid_tx, grid_rx) = grid_uart.split();
    unwrap!(spawner.spawn(grid::key_task(grid_rx, engine)));
    unwrap!(spawner.spawn(grid::refresh_task(grid_tx, engine)));

    let mut remote_config = usart::Config::default();
    remote_config.baudrate = remote::BAUD_RATE;
    let remote_rx = unwrap!(UartRx::new(p.USART6, Irqs, p.PG9, p.DMA2_CH1, remote_config));
    unwrap!(spawner.spawn(remote::remote_task(remote_rx, engine)));

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // USB devices which are self-powered (i.e., that can stay powered on if unplugged from the host)
    // need to enable vbus_detection to comply with the USB spec. Per section 6.10 of the Nucleo board
    // manual (UM1974), CN13 (the USB port) cannot power the board; external power is necessary.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics;
    // 0x0001 is its test product ID
    let vendor_id = 0x1209;
    let product_id = 0x0001;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("Pawpaw Works");
    config.product = Some("Lattice");
    config.self_powered = true;
    config.max_power = 0;

    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    let class = MidiClass::new(&mut builder, 0, 1, 64);
    let usb = builder.build();

    unwrap!(spawner.spawn(midi::usb_task(usb)));
    unwrap!(spawner.spawn(midi::midi_task(class, engine)));
}

/// Runs queued events through the engine, one handler at a time.
#[embassy_executor::task]
async fn engine_task(engine: &'static EngineMutex) -> ! {
    loop {
        EVENTS_POSTED.wait().await;
        let mut engine = engine.lock().await;
        while engine.process_next() {
            if let Some(codes) = engine.take_urgent_write() {
                URGENT_WRITE.signal(codes);
            }
        }
    }
}

/// Posts `event` once per `period`.
#[embassy_executor::task(pool_size = 2)]
async fn timer_task(engine: &'static EngineMutex, period: Duration, event: Event) -> ! {
    let mut ticker = Ticker::every(period);
    loop {
        ticker.next().await;
        post(engine, event).await;
    }
}

/// Reads the three pots at whatever rate the engine's current mode asks for.
#[embassy_executor::task]
async fn pots_task(
    mut adc: Adc<'static, ADC1>,
    mut pots: [AnyAdcChannel<ADC1>; POT_COUNT],
    engine: &'static EngineMutex,
) -> ! {
    loop {
        let period = engine.lock().await.pot_poll_period();
        Timer::after(period).await;
        let readings = pots.each_mut().map(|pot| adc.blocking_read(pot));
        post(engine, Event::Pots(readings)).await;
    }
}

/// Reports presses and releases of the front-panel button (the Nucleo's user button).
#[embassy_executor::task]
async fn front_task(mut button: ExtiInput<'static>, engine: &'static EngineMutex) -> ! {
    loop {
        button.wait_for_any_edge().await;
        post(engine, Event::Front {
            pressed: button.is_high(),
        })
        .await;
    }
}
