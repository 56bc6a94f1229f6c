//! Implements the firmware's tasks that aren't part of the USB stack or
//! watchdog, and task spawning support.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_futures::select::{Either, select};
use embassy_rp::gpio::{Input, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Instant, Timer};

use crate::constants::{LINK_IDLE_TIMER, LINK_WATCHDOG_TIMER, LOOP_LOG_INTERVAL, SAMPLE_CHANNEL_SIZE};
use crate::entry::reboot;
use crate::error::LinkError;
use crate::infra::watchdog::{TaskId, WatchdogType};
use crate::link::{Delivery, RetryPolicy, SampleLink};

// Threading and tasks model
//
// Everything runs on core 0, from the Spawner passed into main():
// - the embassy USB stack
// - the bulk task, which reads samples from the host
// - the link task, which sends them to the peripheral
// - the watchdog task.
//
// The bulk and link tasks are joined by SAMPLE_CHANNEL.  The link task is
// the only consumer, so samples go to the peripheral in the order they
// arrived, one full handshake at a time.

/// The link, as built from the Pico's GPIOs.
pub type FirmwareLink = SampleLink<
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Input<'static>,
    RetryPolicy,
>;

/// Raw samples from the host, waiting to be sent to the peripheral.
pub static SAMPLE_CHANNEL: Channel<CriticalSectionRawMutex, u8, SAMPLE_CHANNEL_SIZE> =
    Channel::new();

/// Method to spawn tasks.
///
/// Using the Spawner object to spawn can fail, because too many instances of
/// that task are already running.  By default only 1 is alllowed at once, but
/// is configurable with e.g. #[embassy_executor::task(pool_size = 4).
///
/// We handle that by rebooting - but it shouldn't happen if processes are only
/// spawned at start of day.
///
/// Example:
/// ```ignore
/// spawn_or_reboot(spawner.spawn(my_task()), "my_task");
/// ```
pub fn spawn_or_reboot<T, E: defmt::Format>(spawn_result: Result<T, E>, task_name: &str) {
    match spawn_result {
        Ok(_) => debug!("Spawned task {}", task_name),
        Err(e) => {
            error!("Failed to spawn task: {}, error: {}", task_name, e);
            reboot();
        }
    }
}

/// Drains SAMPLE_CHANNEL into the link.
///
/// The ack waits can't feed the watchdog, so every attempt at a sample
/// timing out must still fit within [`LINK_WATCHDOG_TIMER`].  A fatal line
/// fault stops feeding the watchdog altogether, which resets the device.
#[embassy_executor::task]
pub async fn link_task(mut link: FirmwareLink, watchdog: &'static WatchdogType) -> ! {
    info!("Link task started");

    let id = TaskId::LinkTransmitter;
    watchdog.register_task(&id, LINK_WATCHDOG_TIMER).await;

    let mut next_log_instant = Instant::now();
    loop {
        let now = Instant::now();
        if now >= next_log_instant {
            trace!("Link loop, stats {}", link.stats());
            next_log_instant += LOOP_LOG_INTERVAL;
        }

        watchdog.feed(&id).await;

        // Wait for a sample, but not for so long that the watchdog starves.
        // Channel::receive() is cancel safe.
        let sample = match select(SAMPLE_CHANNEL.receive(), Timer::after(LINK_IDLE_TIMER)).await {
            Either::First(sample) => sample,
            Either::Second(()) => continue,
        };

        match link.send_sample(i32::from(sample)).await {
            Ok(Delivery::Delivered { attempts }) if attempts > 1 => {
                debug!("Sample {} delivered after {} attempts", sample, attempts);
            }
            Ok(Delivery::Delivered { .. }) => (),
            Ok(Delivery::Skipped) => warn!("Peripheral unresponsive, skipped sample {}", sample),
            Err(e) if e.is_fatal() => fatal_link_error(e).await,
            Err(e) => warn!("Sample {} not sent: {}", sample, e),
        }
    }
}

// Park the task without feeding the watchdog, so the device resets.  Log the
// error periodically until it does, so it is visible over the probe.
async fn fatal_link_error(e: LinkError) -> ! {
    error!("Fatal link error: {} - awaiting watchdog reset", e);
    loop {
        Timer::after(LOOP_LOG_INTERVAL).await;
        error!("Fatal link error: {}", e);
    }
}
