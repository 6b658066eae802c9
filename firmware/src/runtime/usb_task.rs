use embassy_futures::join::join;
use embassy_futures::select::{Either, select};
use embassy_rp::Peri;
use embassy_rp::peripherals::USB;
use embassy_usb::driver::EndpointError;
use portable_atomic::Ordering;
use static_cell::StaticCell;

use crate::board;
use crate::console::{DROPPED_LINES, LINE_QUEUE};
use crate::usb::{self, OutgoingFrame, UsbDeviceStrings};

embassy_rp::bind_interrupts!(struct UsbIrqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::task]
pub async fn run(usb: Peri<'static, USB>) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_rp::usb::Driver::new(usb, UsbIrqs);

    let usb::UsbConsole {
        mut device,
        sender,
        control,
    } = usb::UsbConsole::new(driver, storage, UsbDeviceStrings::for_board(board::BOARD));

    join(device.run(), run_console(sender, control)).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_console<D>(
    mut sender: embassy_usb::class::cdc_acm::Sender<'static, D>,
    control: embassy_usb::class::cdc_acm::ControlChanged<'static>,
) -> !
where
    D: embassy_usb::driver::Driver<'static>,
{
    let lines = LINE_QUEUE.receiver();
    let mut pending: Option<OutgoingFrame> = None;

    loop {
        sender.wait_connection().await;
        wait_for_dtr(&control, &mut sender).await;

        defmt::info!(
            "usb: console connected ({} lines dropped so far)",
            DROPPED_LINES.load(Ordering::Relaxed)
        );

        loop {
            match select(
                async {
                    if pending.is_none() {
                        pending = Some(OutgoingFrame::new(lines.receive().await));
                    }
                    // A frame interrupted by a control change resumes where it stopped.
                    if let Some(outgoing) = pending.as_mut() {
                        while let Some(packet) = outgoing.next_packet() {
                            sender.write_packet(packet).await?;
                            outgoing.mark_sent();
                        }
                    }
                    pending = None;
                    Ok::<(), EndpointError>(())
                },
                control.control_changed(),
            )
            .await
            {
                Either::First(Ok(())) => {}
                Either::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console disabled");
                    pending.take();
                    break;
                }
                Either::First(Err(EndpointError::BufferOverflow)) => {
                    defmt::warn!("usb: console write error, dropping line");
                    pending.take();
                }
                Either::Second(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: console host dropped DTR");
                        pending.take();
                        break;
                    }
                }
            }
        }
    }
}

async fn wait_for_dtr<D>(
    control: &embassy_usb::class::cdc_acm::ControlChanged<'static>,
    sender: &mut embassy_usb::class::cdc_acm::Sender<'static, D>,
) where
    D: embassy_usb::driver::Driver<'static>,
{
    while !sender.dtr() {
        control.control_changed().await;
    }
}
