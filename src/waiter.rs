// Copyright 2021-2022 Farcaster Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

//! Bounded polling of chain state until a transaction is confirmed.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::chain;
use crate::config::ConfirmationConfig;

/// Reasons a confirmation wait ends without a value.
#[derive(Error, Debug)]
pub enum WaitError {
    /// The transaction was still pending when the deadline elapsed.
    #[error("Transaction not confirmed before the deadline")]
    DeadlineExceeded,
    /// The wait was cancelled.
    #[error("Confirmation wait cancelled")]
    Cancelled,
    /// The chain returned a non retryable error.
    #[error("Chain error: {0}")]
    Chain(#[from] chain::Error),
}

/// Polls a chain query every `poll_interval` while it reports [`chain::Error::Pending`], for at
/// most `timeout` counted from the first poll.
///
/// A poll is never scheduled at or past the deadline: with the default 15 seconds interval and 5
/// minutes timeout, a transaction pending for the first 19 polls is still observed on the 20th,
/// one pending for the first 20 polls is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl ConfirmationWaiter {
    /// Create a waiter polling every `poll_interval` for at most `timeout`.
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Run `poll` until it returns a value, a non pending error, the deadline elapses, or `cancel`
    /// is triggered. Cancellation is observed while sleeping between polls.
    pub async fn wait<T, F, Fut>(&self, cancel: &CancellationToken, mut poll: F) -> Result<T, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, chain::Error>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match poll().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_pending() => {
                    if started.elapsed() + self.poll_interval >= self.timeout {
                        return Err(WaitError::DeadlineExceeded);
                    }
                    trace!(attempt, "transaction pending, polling again");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(WaitError::Cancelled),
                        _ = time::sleep(self.poll_interval) => {}
                    }
                }
                Err(err) => return Err(WaitError::Chain(err)),
            }
        }
    }
}

impl Default for ConfirmationWaiter {
    fn default() -> Self {
        Self::from(&ConfirmationConfig::default())
    }
}

impl From<&ConfirmationConfig> for ConfirmationWaiter {
    fn from(config: &ConfirmationConfig) -> Self {
        Self::new(config.poll_interval, config.timeout)
    }
}
