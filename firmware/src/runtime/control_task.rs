use embassy_rp::gpio::{Input, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Instant, Timer};
use pico_core::config::Config;
use pico_core::control::ControlLoop;
use pico_core::error::{FatalError, IoError, report_fatal};
use pico_core::handoff::REPORT_QUEUE_DEPTH;
use pico_core::maintenance::MaintenanceReport;
use pico_core::schedule::FixedRateSchedule;

use super::{CONSOLE, Console, FLUSH_GRACE, REPORTS, STATUS_BOARD};

type Reports = Receiver<'static, CriticalSectionRawMutex, MaintenanceReport, REPORT_QUEUE_DEPTH>;
type FirmwareControl =
    ControlLoop<'static, Input<'static>, Output<'static>, &'static Console, Reports>;

#[embassy_executor::task]
pub async fn run(config: &'static Config, button: Input<'static>, led: Output<'static>) -> ! {
    let mut control = ControlLoop::new(config, button, led, &CONSOLE, &STATUS_BOARD)
        .with_reports(REPORTS.receiver());

    if let Err(error) = control.start() {
        fail(&mut control, error).await;
    }

    let mut schedule =
        FixedRateSchedule::from_millis(config.control_period_ms(), Instant::now().as_micros());
    loop {
        if let Err(error) = control.step() {
            fail(&mut control, error).await;
        }

        let wake = schedule.advance(Instant::now().as_micros());
        if wake.missed > 0 {
            defmt::warn!("core0: overrun, skipped {} periods", wake.missed);
            control.record_overrun(wake.missed);
        }
        Timer::at(Instant::from_micros(wake.deadline_us)).await;
    }
}

/// Stops everything after an I/O failure on core 0.
async fn fail(control: &mut FirmwareControl, error: IoError) -> ! {
    STATUS_BOARD.request_halt();
    control.force_output_off();
    defmt::error!("core0: {} at tick {}", error, control.tick());

    let _ = report_fatal(&mut &CONSOLE, &FatalError::from(error), control.events());
    Timer::after(FLUSH_GRACE).await;
    panic!("control loop halted");
}
