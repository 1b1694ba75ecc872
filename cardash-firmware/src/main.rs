//! CarDash - Dashboard Controller Firmware
//!
//! Main firmware binary for RP2040-based dashboard controllers. Speaks the
//! CarDash link protocol to a host over UART0: parameter get/set, the
//! parameter dictionary, periodic telemetry and the host commands.
//!
//! ```text
//! UART0 ─► uart_rx ─► RX ring ─► link ─► TX ring ─► uart_tx ─► UART0
//!                                  ▲
//!                     telemetry ───┘
//! ```

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel, InterruptHandler as AdcInterruptHandler};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::Pull;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use cardash_core::{ParamTable, SampleLog};
use cardash_protocol::ring::{self, RingSink};
use cardash_protocol::{HelloInfo, Link, MsgType, RxRing, TxRing};

mod channels;
mod config;
mod handlers;
mod tasks;

use crate::config::{
    FIRMWARE_VERSION, LOG_CAPACITY, PARAM_COUNT, PARAM_DEFS, TELEMETRY_DEFS, UART,
};

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    ADC_IRQ_FIFO => AdcInterruptHandler;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

// Byte rings between the UART tasks and the link task
static RX_RING: StaticCell<RxRing> = StaticCell::new();
static TX_RING: StaticCell<TxRing> = StaticCell::new();

// Link task state (too large for a task future)
static LINK: StaticCell<Link> = StaticCell::new();
static PARAMS: StaticCell<ParamTable<PARAM_COUNT>> = StaticCell::new();
static LOG: StaticCell<SampleLog<LOG_CAPACITY>> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!(
        "CarDash firmware {}.{}.{} starting...",
        FIRMWARE_VERSION[0], FIRMWARE_VERSION[1], FIRMWARE_VERSION[2]
    );

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Setup UART for the host link
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, config::uart_config(&UART));
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("UART initialized at {} baud", UART.baudrate);

    // Rings: uart_rx -> link -> uart_tx
    let (rx_producer, rx_consumer) = ring::split(RX_RING.init(RxRing::new()));
    let (tx_producer, tx_consumer) = ring::split(TX_RING.init(TxRing::new()));

    // Protocol endpoint and command handlers
    let link = LINK.init(Link::new(HelloInfo::new(FIRMWARE_VERSION)));
    link.register_handler(MsgType::TimeSync, handlers::time_sync)
        .unwrap();
    link.register_handler(MsgType::RunExperiment, handlers::run_experiment)
        .unwrap();
    link.register_handler(MsgType::ExportLog, handlers::export_log)
        .unwrap();
    link.register_handler(MsgType::ApplyProfile, handlers::apply_profile)
        .unwrap();

    let params = PARAMS.init(ParamTable::new(&PARAM_DEFS, &TELEMETRY_DEFS));
    info!(
        "{} parameters, {} telemetry channels",
        PARAM_COUNT,
        TELEMETRY_DEFS.len()
    );

    // Setup ADC for telemetry (VSYS/3 on GPIO29, internal temperature sensor)
    let adc = Adc::new(p.ADC, Irqs, embassy_rp::adc::Config::default());
    let inputs = tasks::TelemetryInputs {
        adc,
        vsys: Channel::new_pin(p.PIN_29, Pull::None),
        temp_sensor: Channel::new_temp_sensor(p.ADC_TEMP_SENSOR),
    };

    info!("ADC initialized");

    // Spawn tasks
    spawner.spawn(tasks::uart_rx_task(rx, rx_producer)).unwrap();
    spawner.spawn(tasks::uart_tx_task(tx, tx_consumer)).unwrap();
    spawner
        .spawn(tasks::link_task(tasks::LinkResources {
            link,
            params,
            log: LOG.init(SampleLog::new()),
            sink: RingSink::new(rx_consumer, tx_producer),
        }))
        .unwrap();
    spawner.spawn(tasks::telemetry_task(inputs)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
