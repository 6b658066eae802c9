use embassy_time::{Instant, Timer};
use pico_core::config::Config;
use pico_core::maintenance::{MaintenanceLoop, MaintenanceStep};
use pico_core::schedule::FixedRateSchedule;

use super::{CONSOLE, REPORTS, STATUS_BOARD};

#[embassy_executor::task]
pub async fn run(config: &'static Config) -> ! {
    let mut maintenance =
        MaintenanceLoop::new(config, &STATUS_BOARD, &CONSOLE).with_reports(REPORTS.sender());
    maintenance.start();

    let mut schedule =
        FixedRateSchedule::from_millis(config.maintenance_period_ms(), Instant::now().as_micros());
    loop {
        match maintenance.step() {
            MaintenanceStep::Idle => {}
            MaintenanceStep::Heartbeat(report) => {
                if !report.system_ok {
                    defmt::warn!("core1: {}", report);
                }
            }
            MaintenanceStep::Halted => {
                defmt::warn!(
                    "core1: halt requested, parking (skipped={} dropped={})",
                    maintenance.skipped_lines(),
                    maintenance.dropped_reports()
                );
                loop {
                    core::future::pending::<()>().await;
                }
            }
        }

        let wake = schedule.advance(Instant::now().as_micros());
        Timer::at(Instant::from_micros(wake.deadline_us)).await;
    }
}
