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

//! Driver configuration.
//!
//! Only the deployment specific identities are required, every timing parameter has a default.
//! Durations are written as integer seconds:
//!
//! ```yaml
//! contract:
//!   swap_contract: "0x17f54245073bfed168a51c3d13b536e39e406063"
//!   refund_margin: 7200
//! asset:
//!   asset: "TFT:GBOVQKJYHXRR3DX6NOX2RRYFRCUMSADGDESTDNBDS6CDVLGVESRTAC47"
//! confirmation:
//!   poll_interval: 15
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::{AssetId, ContractAddress};

/// Default safety margin required on the contract-chain lock expiry.
pub const CONTRACT_REFUND_MARGIN: Duration = Duration::from_secs(2 * 60 * 60);
/// Default safety margin required on the asset-chain lock expiry.
pub const ASSET_REFUND_MARGIN: Duration = Duration::from_secs(60 * 60);
/// Default interval between two confirmation polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Default deadline of a confirmation wait.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Inconsistent driver configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The buyer lock must outlive the seller lock, otherwise the buyer can refund before the
    /// seller redeems with the revealed secret.
    #[error(
        "Contract refund margin ({contract:?}) must be greater than the asset refund margin ({asset:?})"
    )]
    RefundMargins {
        /// Configured contract-chain margin.
        contract: Duration,
        /// Configured asset-chain margin.
        asset: Duration,
    },
    /// Polling without sleeping.
    #[error("Confirmation poll interval cannot be zero")]
    ZeroPollInterval,
    /// Not a single retry fits before the deadline.
    #[error("Confirmation poll interval ({interval:?}) must be shorter than the timeout ({timeout:?})")]
    PollIntervalTooLong {
        /// Configured interval.
        interval: Duration,
        /// Configured deadline.
        timeout: Duration,
    },
}

/// Configuration shared by every swap run by a [`Driver`](crate::Driver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Contract-chain parameters.
    pub contract: ContractConfig,
    /// Asset-chain parameters.
    pub asset: AssetConfig,
    /// Confirmation polling parameters.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

impl DriverConfig {
    /// Create a configuration with default timings.
    pub fn new(swap_contract: ContractAddress, asset: AssetId) -> Self {
        Self {
            contract: ContractConfig {
                swap_contract,
                refund_margin: CONTRACT_REFUND_MARGIN,
                check_refund_address: true,
            },
            asset: AssetConfig {
                asset,
                refund_margin: ASSET_REFUND_MARGIN,
            },
            confirmation: ConfirmationConfig::default(),
        }
    }

    /// Check the timing parameters are consistent with each other.
    pub fn validate(&self) -> Result<(), Error> {
        if self.contract.refund_margin <= self.asset.refund_margin {
            return Err(Error::RefundMargins {
                contract: self.contract.refund_margin,
                asset: self.asset.refund_margin,
            });
        }
        self.confirmation.validate()
    }
}

/// Contract-chain parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Address of the lock contract every buyer lock must live in.
    pub swap_contract: ContractAddress,
    /// Minimum time left before the buyer can refund its lock.
    #[serde(with = "secs", default = "contract_refund_margin")]
    pub refund_margin: Duration,
    /// Require the lock to refund to the buyer announced address.
    #[serde(default = "enabled")]
    pub check_refund_address: bool,
}

/// Asset-chain parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// The traded asset.
    pub asset: AssetId,
    /// Minimum time left before the seller can refund its lock.
    #[serde(with = "secs", default = "asset_refund_margin")]
    pub refund_margin: Duration,
}

/// Confirmation polling parameters, see [`ConfirmationWaiter`](crate::waiter::ConfirmationWaiter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Interval between two polls.
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    /// Deadline counted from the first poll.
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl ConfirmationConfig {
    /// Check the interval is positive and shorter than the deadline.
    pub fn validate(&self) -> Result<(), Error> {
        if self.poll_interval.is_zero() {
            return Err(Error::ZeroPollInterval);
        }
        if self.poll_interval >= self.timeout {
            return Err(Error::PollIntervalTooLong {
                interval: self.poll_interval,
                timeout: self.timeout,
            });
        }
        Ok(())
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            timeout: CONFIRMATION_TIMEOUT,
        }
    }
}

fn contract_refund_margin() -> Duration {
    CONTRACT_REFUND_MARGIN
}

fn asset_refund_margin() -> Duration {
    ASSET_REFUND_MARGIN
}

fn enabled() -> bool {
    true
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
