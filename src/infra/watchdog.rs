//! Contains a multi-task capable watchdog, that ensures all expected threads
//! are running, and resets the device if not.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::peripherals::WATCHDOG as p_WATCHDOG;
use static_cell::StaticCell;
use task_watchdog::embassy_rp::{WatchdogRunner, watchdog_run};
use task_watchdog::{Id, WatchdogConfig};

use crate::constants::{WATCHDOG_CHECK_INTERVAL, WATCHDOG_HW_TIMEOUT};

// Create a type alias for the WatchdogRunner to make it easier to use.
pub type WatchdogType = WatchdogRunner<TaskId, NUM_TASK_IDS>;

// We use the WATCHDOG static to store the Watchdog object, so it can be
// handed to the tasks it polices.
static WATCHDOG: StaticCell<WatchdogType> = StaticCell::new();

/// The tasks which are policed by the watchdog.
#[derive(Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum TaskId {
    /// The link task, which sends samples to the peripheral.
    LinkTransmitter = 0,

    // We cannot police USB as it needs to run permanently.  The same goes
    // for the Bulk task, which blocks in the OUT endpoint read(), and on a
    // full sample channel.
    //
    /// The is the number of tasks which are policed by the watchdog.
    Num,
}
impl Id for TaskId {}
const NUM_TASK_IDS: usize = TaskId::Num as usize;

/// A helper function to create the watchdog.
pub fn create_watchdog(p_watchdog: p_WATCHDOG) -> &'static WatchdogType {
    let config = WatchdogConfig {
        hardware_timeout: WATCHDOG_HW_TIMEOUT,
        check_interval: WATCHDOG_CHECK_INTERVAL,
    };

    let watchdog = WatchdogRunner::new(p_watchdog, config);

    // Make watchdog static so it can be shared with tasks
    WATCHDOG.init(watchdog)
}

/// A task to run the watchdog.
#[embassy_executor::task]
pub async fn watchdog_task(watchdog: &'static WatchdogType) -> ! {
    info!("Watchdog task started");
    watchdog_run(watchdog.create_task()).await
}
