//! This module handles USB Bulk transfers on the OUT endpoint, passing each
//! received byte to the link task as a raw sample.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_usb::driver::{Endpoint as DriverEndpoint, EndpointOut};

use super::SampleEndpoint;
use crate::constants::MAX_EP_PACKET_SIZE_USIZE;
use crate::task::SAMPLE_CHANNEL;

/// Handles bulk transfers on the OUT endpoint.
pub struct Bulk {
    read_ep: SampleEndpoint,
}

impl Bulk {
    pub fn new(read_ep: SampleEndpoint) -> Self {
        Self { read_ep }
    }

    /// Runs the OUT bulk handler, by
    /// * waiting until the OUT endpoint is enabled
    /// * reading in packets
    /// * queueing each byte for the link task.
    pub async fn run(&mut self) -> ! {
        loop {
            debug!("Waiting for OUT endpoint to be enabled");
            // We can wait forever, as we don't watchdog police this task.
            self.read_ep.wait_enabled().await;
            info!("OUT endpoint enabled");

            loop {
                let mut data = [0; MAX_EP_PACKET_SIZE_USIZE];

                match self.read_ep.read(&mut data).await {
                    Ok(size) => {
                        trace!("Received {} samples", size);
                        for &sample in &data[..size] {
                            // This blocks if the channel is full - i.e. the
                            // peripheral isn't keeping up.  We then stop
                            // reading USB, and the host is NAKed.
                            SAMPLE_CHANNEL.send(sample).await;
                        }
                    }
                    Err(e) => {
                        // This occurs if the endpoint is disabled - so we go
                        // around the outer loop again waiting for it to be
                        // re-enabled.
                        warn!("Error reading from OUT endpoint: {:?}", e);
                        break;
                    }
                }
            }

            debug!("OUT endpoint disabled");
        }
    }
}

/// Bulk task runner.
#[embassy_executor::task]
pub async fn bulk_task(read_ep: SampleEndpoint) -> ! {
    info!("Bulk task started");

    let mut bulk = Bulk::new(read_ep);
    bulk.run().await
}
