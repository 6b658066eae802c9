//! Single CDC ACM console device.
//!
//! The device exposes one CDC ACM interface that only carries log output from
//! the firmware to the host. Frames from the console queue are split into
//! full-speed bulk packets by [`packets`].

use crate::console::ConsoleFrame;

/// Bulk endpoint size for full-speed CDC ACM.
pub const MAX_PACKET_SIZE: u16 = 64;

/// User-visible strings advertised in the USB descriptors.
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceStrings {
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: Option<&'static str>,
}

impl UsbDeviceStrings {
    /// Strings for `board`, which doubles as the serial number.
    pub const fn for_board(board: pico_core::config::BoardId) -> Self {
        Self {
            manufacturer: "Pico Dual Core",
            product: "Pico Dual Core Console",
            serial_number: Some(board.name()),
        }
    }
}

/// Splits `frame` into bulk packets.
///
/// A frame whose length is an exact multiple of the packet size is followed by
/// a zero-length packet so the host sees the transfer end.
pub fn packets(frame: &[u8]) -> impl Iterator<Item = &[u8]> {
    let size = usize::from(MAX_PACKET_SIZE);
    let needs_zlp = !frame.is_empty() && frame.len() % size == 0;
    frame.chunks(size).chain(needs_zlp.then_some(&[][..]))
}

/// A console frame being written out, packet by packet.
///
/// Packets already handed to the endpoint are not sent again when the write is
/// interrupted and resumed.
pub struct OutgoingFrame {
    frame: ConsoleFrame,
    sent: usize,
}

impl OutgoingFrame {
    pub const fn new(frame: ConsoleFrame) -> Self {
        Self { frame, sent: 0 }
    }

    /// The first packet not yet marked as sent.
    pub fn next_packet(&self) -> Option<&[u8]> {
        packets(&self.frame).nth(self.sent)
    }

    pub fn mark_sent(&mut self) {
        self.sent += 1;
    }
}

#[cfg(target_os = "none")]
const CONTROL_BUFFER_LEN: usize = 64;
#[cfg(target_os = "none")]
const CONFIG_DESCRIPTOR_LEN: usize = 256;
#[cfg(target_os = "none")]
const BOS_DESCRIPTOR_LEN: usize = 256;
#[cfg(target_os = "none")]
const MSOS_DESCRIPTOR_LEN: usize = 256;

/// Backing storage for the Embassy USB builder and the CDC ACM class.
#[cfg(target_os = "none")]
pub struct UsbDeviceStorage {
    control_buf: [u8; CONTROL_BUFFER_LEN],
    config_descriptor: [u8; CONFIG_DESCRIPTOR_LEN],
    bos_descriptor: [u8; BOS_DESCRIPTOR_LEN],
    msos_descriptor: [u8; MSOS_DESCRIPTOR_LEN],
    console_state: embassy_usb::class::cdc_acm::State<'static>,
}

#[cfg(target_os = "none")]
impl UsbDeviceStorage {
    pub fn new() -> Self {
        Self {
            control_buf: [0; CONTROL_BUFFER_LEN],
            config_descriptor: [0; CONFIG_DESCRIPTOR_LEN],
            bos_descriptor: [0; BOS_DESCRIPTOR_LEN],
            msos_descriptor: [0; MSOS_DESCRIPTOR_LEN],
            console_state: embassy_usb::class::cdc_acm::State::new(),
        }
    }
}

/// The USB device plus the split halves of its console port.
#[cfg(target_os = "none")]
pub struct UsbConsole<D>
where
    D: embassy_usb::driver::Driver<'static>,
{
    pub device: embassy_usb::UsbDevice<'static, D>,
    pub sender: embassy_usb::class::cdc_acm::Sender<'static, D>,
    pub control: embassy_usb::class::cdc_acm::ControlChanged<'static>,
}

#[cfg(target_os = "none")]
impl<D> UsbConsole<D>
where
    D: embassy_usb::driver::Driver<'static>,
{
    pub fn new(
        driver: D,
        storage: &'static mut UsbDeviceStorage,
        strings: UsbDeviceStrings,
    ) -> Self {
        let mut config = embassy_usb::Config::new(0x1209, 0x0001);
        config.manufacturer = Some(strings.manufacturer);
        config.product = Some(strings.product);
        config.serial_number = strings.serial_number;
        config.max_packet_size_0 = 64;
        config.max_power = 100;

        let mut builder = embassy_usb::Builder::new(
            driver,
            config,
            &mut storage.config_descriptor,
            &mut storage.bos_descriptor,
            &mut storage.msos_descriptor,
            &mut storage.control_buf,
        );

        let class = embassy_usb::class::cdc_acm::CdcAcmClass::new(
            &mut builder,
            &mut storage.console_state,
            MAX_PACKET_SIZE,
        );
        // Host input is ignored; the receiver half is dropped.
        let (sender, _receiver, control) = class.split_with_control();

        Self {
            device: builder.build(),
            sender,
            control,
        }
    }
}
