//! Boot sequence and the tasks of both cores.
//!
//! Core 0 runs only the control task. Core 1 gets its own executor with the
//! maintenance task and the USB console, so nothing it does can delay the
//! control loop.

use defmt_rtt as _;
use embassy_executor::{Executor, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use pico_core::config::{self, Config};
use pico_core::error::{FatalError, report_fatal};
use pico_core::handoff::{CoreLauncher, ReportChannel, StatusBoard};
use pico_core::sink::SharedSink;
use pico_core::telemetry::EventLog;
use static_cell::StaticCell;

use crate::board;
use crate::console::{ConsoleSink, DROPPED_LINES, LINE_QUEUE};
use crate::hw::{ControlPins, Core1Launcher};

mod control_task;
mod maintenance_task;
mod usb_task;

/// Time given to RTT and USB to flush a fatal report before the panic.
pub(super) const FLUSH_GRACE: Duration = Duration::from_millis(200);

pub(super) type Console = SharedSink<CriticalSectionRawMutex, ConsoleSink<'static>>;

pub(super) static CONSOLE: Console = SharedSink::new(ConsoleSink::new(&LINE_QUEUE, &DROPPED_LINES));
pub(super) static STATUS_BOARD: StatusBoard = StatusBoard::new();
pub(super) static REPORTS: ReportChannel<CriticalSectionRawMutex> = Channel::new();

static CONFIG: StaticCell<Config> = StaticCell::new();
static CORE1_EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = embassy_rp::init(embassy_rp::config::Config::default());

    let config: &'static Config = match config::load(board::BOARD) {
        Ok(config) => CONFIG.init(config),
        Err(error) => halt(error.into()).await,
    };
    defmt::info!(
        "boot: board={} control={}ms maintenance={}ms",
        config.board(),
        config.control_period_ms(),
        config.maintenance_period_ms()
    );

    let pins = ControlPins::claim(config);
    let usb = p.USB;

    let launched = Core1Launcher::new(p.CORE1).launch(move || {
        let executor = CORE1_EXECUTOR.init(Executor::new());
        executor.run(|spawner| {
            spawner.spawn(maintenance_task::run(config).expect("failed to spawn maintenance task"));
            spawner.spawn(usb_task::run(usb).expect("failed to spawn USB task"));
        })
    });
    if let Err(error) = launched {
        halt(error.into()).await;
    }

    spawner.spawn(
        control_task::run(config, pins.button, pins.led).expect("failed to spawn control task"),
    );
}

/// Reports a startup failure and stops. There is no single-core fallback.
async fn halt(error: FatalError) -> ! {
    STATUS_BOARD.request_halt();
    defmt::error!("boot: {}", error);
    let _ = report_fatal(&mut &CONSOLE, &error, &EventLog::new());
    Timer::after(FLUSH_GRACE).await;
    panic!("startup failed");
}
