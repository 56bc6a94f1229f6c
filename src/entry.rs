//! Firmware entry point, shared by the firmware binaries, and panic
//! handling.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_executor::Spawner;
use embassy_time::Timer;

use crate::constants::{LOOP_LOG_INTERVAL, SERIAL};
use crate::infra::gpio::Gpio;
use crate::infra::watchdog::{create_watchdog, watchdog_task};
use crate::line::LinkPinConfig;
use crate::link::{LinkConfig, RetryPolicy};
use crate::task::{FirmwareLink, link_task, spawn_or_reboot};
use crate::usb::{UsbStack, bulk_task, usb_task};
use crate::util::built::log_fw_info;

/// Sets up the device and spawns its tasks.  Called from the binary's
/// `main()`.
///
/// Start-up faults, such as the link's lines being misconfigured, are fatal.
pub async fn common_main(spawner: Spawner, bin_name: &str) -> ! {
    let p = embassy_rp::init(Default::default());

    log_fw_info(bin_name, SERIAL);

    // Start the watchdog first, so it polices the rest of start-up.
    let watchdog = create_watchdog(p.WATCHDOG);
    spawn_or_reboot(spawner.spawn(watchdog_task(watchdog)), "Watchdog");

    // Build the link.
    let mut gpio = Gpio::new([
        p.PIN_0.into(),
        p.PIN_1.into(),
        p.PIN_2.into(),
        p.PIN_3.into(),
        p.PIN_4.into(),
        p.PIN_5.into(),
        p.PIN_6.into(),
        p.PIN_7.into(),
        p.PIN_8.into(),
        p.PIN_9.into(),
        p.PIN_10.into(),
        p.PIN_11.into(),
        p.PIN_12.into(),
        p.PIN_13.into(),
        p.PIN_14.into(),
        p.PIN_15.into(),
        p.PIN_16.into(),
        p.PIN_17.into(),
        p.PIN_18.into(),
        p.PIN_19.into(),
        p.PIN_20.into(),
        p.PIN_21.into(),
        p.PIN_22.into(),
        p.PIN_23.into(),
        p.PIN_24.into(),
        p.PIN_25.into(),
        p.PIN_26.into(),
        p.PIN_27.into(),
        p.PIN_28.into(),
        p.PIN_29.into(),
    ]);
    let pins = LinkPinConfig::default();
    let lines = match gpio.take_link_lines(&pins) {
        Ok(lines) => lines,
        Err(e) => defmt::panic!("Failed to claim link lines: {}", e),
    };
    let config = LinkConfig::default();
    let link = match FirmwareLink::from_config(lines, config, RetryPolicy::default()) {
        Ok(link) => link,
        Err(e) => defmt::panic!("Failed to create link: {}", e),
    };
    info!("Link ready, {}", config);

    // Now USB.
    let (usb, read_ep) = UsbStack::create_static(p.USB, SERIAL);
    spawn_or_reboot(spawner.spawn(usb_task(usb)), "USB");
    spawn_or_reboot(spawner.spawn(link_task(link, watchdog)), "Link");
    spawn_or_reboot(spawner.spawn(bulk_task(read_ep)), "Bulk");

    // Nothing else to do - our tasks do the work.
    loop {
        Timer::after(LOOP_LOG_INTERVAL).await;
        trace!("Main loop");
    }
}

/// Reboot the device.
pub fn reboot() -> ! {
    info!("Rebooting");
    cortex_m::peripheral::SCB::sys_reset()
}

/// Handles panics raised via defmt, including defmt::panic!() and
/// defmt::unwrap!().
pub fn defmt_panic_handler() -> ! {
    error!("Panic");
    reboot()
}

/// Handles core panics.
pub fn panic_handler(info: &core::panic::PanicInfo) -> ! {
    error!("Panic: {}", defmt::Display2Format(info));
    reboot()
}
