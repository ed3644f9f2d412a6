// SPDX-License-Identifier: GPL-3.0-only

//! Key listener thread
//!
//! Polls an [`InputPoller`] and forwards key codes into a queue, so the
//! display loop can wait on frames and key presses with one multiplexed wait.

use super::control::PipelineControl;
use super::queue::BoundedClosableQueue;
use crate::backends::InputPoller;
use crate::constants::ESC_KEY;
use crate::errors::{AppError, AppResult};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct KeyListener {
    thread_handle: JoinHandle<()>,
}

impl KeyListener {
    /// Spawn the listener; it stops once the pipeline is exiting or after
    /// forwarding [`ESC_KEY`]
    pub fn start(
        mut poller: Box<dyn InputPoller>,
        keys: BoundedClosableQueue<u8>,
        control: Arc<PipelineControl>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let thread_handle = thread::Builder::new()
            .name("key-listener".to_string())
            .spawn(move || {
                debug!("Key listener started");
                while !control.is_exiting() {
                    let key = match poller.poll_key(timeout) {
                        Ok(Some(key)) => key,
                        Ok(None) => continue,
                        Err(e) => {
                            // Without input there is no way to quit; shut down instead
                            warn!(error = %e, "Input polling failed, requesting shutdown");
                            ESC_KEY
                        }
                    };

                    if keys.try_put(key).is_err() {
                        debug!(key, "Key queue full, dropping key");
                    }
                    if key == ESC_KEY {
                        break;
                    }
                }
                info!("Key listener exiting");
            })
            .map_err(|e| AppError::Other(format!("failed to spawn key listener: {}", e)))?;

        Ok(Self { thread_handle })
    }

    pub fn is_running(&self) -> bool {
        !self.thread_handle.is_finished()
    }

    pub fn join(self) {
        if let Err(e) = self.thread_handle.join() {
            warn!("Key listener thread panicked: {:?}", e);
        }
    }
}
