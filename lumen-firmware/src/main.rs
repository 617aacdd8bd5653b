//! Lumen - LoRaWAN Class C DMX512 controller firmware
//!
//! Main firmware binary for RP2040 boards with an RUI3 LoRaWAN modem on
//! UART1 and an RS-485 DMX transceiver on UART0.
//!
//! Task layout:
//! - output task on a high-priority interrupt executor (one frame / 25 ms)
//! - dispatch task on the thread executor (radio, commands, uplinks)
//! - modem reader task (line framing, packet flag)
//! - test button task (local commands)

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::{UART0, UART1};
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUartTx, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use lumen_core::config::ControllerConfig;
use lumen_core::dispatch::CommandDispatcher;
use lumen_core::output::OutputTransmitter;
use lumen_core::radio::ReceiveCoordinator;
use lumen_drivers::dmx::UartDmxBus;
use lumen_drivers::modem::{AtModem, ModemConfig};
use lumen_hal::BusConfig;
use lumen_hal_rp2040::flash::Rp2040FlashStore;
use lumen_hal_rp2040::uart::{modem_config, uart_config};

mod channels;
mod tasks;

use crate::channels::{FRAME, OUTPUT_STATUS, PACKET_FLAG};
use crate::tasks::ChannelTransport;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    UART1_IRQ => BufferedInterruptHandler<UART1>;
});

/// Executor for the DMX output task, pre-empts everything else
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

// Static cells for UART buffers (must live forever)
// The DMX buffer holds a whole frame so a cycle never waits on the FIFO
static DMX_TX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();
static MODEM_TX_BUF: StaticCell<[u8; 640]> = StaticCell::new();
static MODEM_RX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();

/// DMX break line is asserted by driving the pin high
const BREAK_ACTIVE_HIGH: bool = true;

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Lumen firmware starting...");

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = ControllerConfig::default();

    // DMX output: UART0 TX on GPIO0, break line on GPIO2
    let dmx_tx = BufferedUartTx::new(
        p.UART0,
        Irqs,
        p.PIN_0,
        DMX_TX_BUF.init([0u8; 1024]),
        uart_config(&BusConfig::dmx()),
    );
    let break_pin = Output::new(p.PIN_2, Level::Low);
    let bus = UartDmxBus::new(dmx_tx, break_pin, BREAK_ACTIVE_HIGH);
    let transmitter = OutputTransmitter::new(bus, config.output);

    info!("DMX UART initialized");

    // Modem: UART1 on GPIO4 (TX) / GPIO5 (RX)
    let tx_buf = MODEM_TX_BUF.init([0u8; 640]);
    let rx_buf = MODEM_RX_BUF.init([0u8; 1024]);

    let uart = Uart::new_blocking(p.UART1, p.PIN_4, p.PIN_5, modem_config());
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (modem_tx, modem_rx) = uart.split();

    let modem = AtModem::new(ChannelTransport::new(modem_tx), ModemConfig::default());
    let coordinator = ReceiveCoordinator::new(modem, &PACKET_FLAG, config.radio);

    info!("Modem UART initialized");

    // Settings partition at the end of flash
    let store = Rp2040FlashStore::new(p.FLASH, p.DMA_CH0);

    let dispatcher = CommandDispatcher::new(
        coordinator,
        &FRAME,
        &OUTPUT_STATUS,
        store,
        config.uplink,
    );

    // Test button on GPIO15, active low
    let button = Input::new(p.PIN_15, Pull::Up);

    // Output task runs above the thread executor
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    high_spawner.spawn(tasks::output_task(transmitter)).unwrap();

    spawner.spawn(tasks::radio_irq_task(modem_rx)).unwrap();
    spawner.spawn(tasks::dispatch_task(dispatcher)).unwrap();
    spawner.spawn(tasks::button_task(button)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!(
            "Main loop heartbeat: {} frames, {} errors",
            OUTPUT_STATUS.cycles(),
            OUTPUT_STATUS.errors()
        );
    }
}
