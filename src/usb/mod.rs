//! Handles creation of the embassy USB stack.
//!
//! The device presents a single vendor class interface with one bulk OUT
//! endpoint.  The host writes raw samples to it, one byte per sample.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub(crate) mod bulk;

pub use bulk::bulk_task;

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::{Driver as RpUsbDriver, Endpoint, InterruptHandler, Out};
use embassy_usb::descriptor::{SynchronizationType, UsageType};
use embassy_usb::driver::{Driver, Endpoint as DriverEndpoint, EndpointType};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::{ConstStaticCell, StaticCell};

use crate::constants::{
    MANUFACTURER, MAX_EP_PACKET_SIZE, MAX_PACKET_SIZE_0, PRODUCT, PRODUCT_ID, USB_CLASS,
    USB_POWER_MA, USB_PROTOCOL, USB_SUB_CLASS, VENDOR_ID,
};

// Bind the hardware USB interrupt to the USB stack.  Interrupts are the
// primary mechanism the USB stack uses to receive data from hardware.
bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => InterruptHandler<USB>;
});

/// The USB device type, as run by [`usb_task`].
pub type UsbDeviceType = UsbDevice<'static, RpUsbDriver<'static, USB>>;

/// The bulk OUT endpoint samples arrive on.
pub type SampleEndpoint = Endpoint<'static, USB, Out>;

// The USB_DEVICE is stored as a static to allow us to spawn a task using the
// USB runner.  StaticCell::init() gives us a 'static mutable reference to
// pass into usb_task().
static USB_DEVICE: StaticCell<UsbDeviceType> = StaticCell::new();

// The following statics are used to store the USB descriptor buffers and
// control buffer.  We store them as statics to avoid lifetime issues when
// creating the USB builder.
//
// The ownership of these is passed to the USB builder.
static CONFIG_DESC: ConstStaticCell<[u8; 256]> = ConstStaticCell::new([0; 256]);
static BOS_DESC: ConstStaticCell<[u8; 256]> = ConstStaticCell::new([0; 256]);
static MSOS_DESC: ConstStaticCell<[u8; 256]> = ConstStaticCell::new([0; 256]);
static CONTROL_BUF: ConstStaticCell<[u8; 64]> = ConstStaticCell::new([0; 64]);

/// Used to create the embassy USB stack.
pub struct UsbStack {}

impl UsbStack {
    /// Creates the USB stack.
    ///
    /// # Arguments
    /// - `p_usb` - The USB peripheral
    /// - `serial` - This device's USB serial number
    ///
    /// # Returns
    /// The USB device, for [`usb_task`], and the bulk OUT endpoint, for
    /// [`bulk_task`].
    pub fn create_static(
        p_usb: USB,
        serial: &'static str,
    ) -> (&'static mut UsbDeviceType, SampleEndpoint) {
        let mut driver = RpUsbDriver::new(p_usb, Irqs);

        let mut config = Config::new(VENDOR_ID, PRODUCT_ID);
        config.manufacturer = Some(MANUFACTURER);
        config.product = Some(PRODUCT);
        config.serial_number = Some(serial);
        config.max_power = USB_POWER_MA;
        config.max_packet_size_0 = MAX_PACKET_SIZE_0;

        // Set the device class, subclass, and protocol.
        config.device_class = USB_CLASS;
        config.device_sub_class = USB_SUB_CLASS;
        config.device_protocol = USB_PROTOCOL;

        // The default is composite with IADs, which gives use device class
        // code 0xEF, with is a miscellaneous device.
        config.composite_with_iads = false;

        // Allocate the OUT endpoint before the driver moves into the builder.
        // There is only one, so we take whatever number we're given.
        let ep_out = match driver.alloc_endpoint_out(EndpointType::Bulk, MAX_EP_PACKET_SIZE, 0) {
            Ok(ep) => ep,
            Err(_) => defmt::panic!("Unable to allocate OUT endpoint"),
        };

        let mut builder = Builder::new(
            driver,
            config,
            CONFIG_DESC.take(),
            BOS_DESC.take(),
            MSOS_DESC.take(),
            CONTROL_BUF.take(),
        );

        // Set up the function and interface for the Vendor class
        let mut func = builder.function(USB_CLASS, USB_SUB_CLASS, USB_PROTOCOL);
        let mut interface = func.interface();
        let mut alt = interface.alt_setting(USB_CLASS, USB_SUB_CLASS, USB_PROTOCOL, None);
        alt.endpoint_descriptor(
            &ep_out.info().clone(),
            SynchronizationType::NoSynchronization,
            UsageType::DataEndpoint,
            &[],
        );

        // Drop func, to allow us to use the builder again.  Otherwise builder is
        // already borrowed mutably by func.
        drop(func);

        let usb = builder.build();
        let usb = USB_DEVICE.init(usb);

        debug!("USB stack created, OUT endpoint {}", ep_out.info().addr);

        (usb, ep_out)
    }
}

// Method to run the USB stack.
#[embassy_executor::task]
pub async fn usb_task(usb: &'static mut UsbDeviceType) -> ! {
    info!("USB task started");

    // Run the USB Device runner.  This loop is the internal implemenation of
    // usb.run().
    loop {
        // Run the USB stack until it suspends.  This is a blocking call and
        // is not safely cancellable.  If cancelled, disable() must be called
        // to fully reset the peripheral before calling any other methods.
        usb.run_until_suspend().await;

        // Cancel-safe
        usb.wait_resume().await;
    }
}
