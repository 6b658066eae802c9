use core::panic::PanicInfo;
use defmt::error;

use crate::runtime::STATUS_BOARD;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // Park the other core's maintenance loop as well.
    STATUS_BOARD.request_halt();

    let core = embassy_rp::pac::SIO.cpuid().read();
    error!("core{}: PANIC: {}", core, defmt::Display2Format(info));
    cortex_m::asm::udf();
}
