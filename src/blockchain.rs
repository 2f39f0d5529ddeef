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

//! Defines the blockchains taking part in a swap and the identities used on each of them:
//! addresses, lock references, and the asset traded on the asset chain.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::impl_hex_serde;

/// Errors when parsing blockchain identities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The asset identifier is not formatted as `CODE:ISSUER`.
    #[error("Invalid asset identifier: {0}")]
    InvalidAsset(String),
}

fixed_hash::construct_fixed_hash!(
    /// An account address on the contract chain.
    pub struct ContractAddress(20);
);

impl_hex_serde!(ContractAddress, 20);

/// An account address on the asset chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
#[display(inner)]
pub struct AssetAddress(pub String);

/// The asset traded on the asset chain, identified by its code and the address of its issuer.
///
/// Formatted and serialized as `CODE:ISSUER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId {
    code: String,
    issuer: AssetAddress,
}

impl AssetId {
    /// Create an asset identifier.
    pub fn new(code: impl Into<String>, issuer: AssetAddress) -> Self {
        AssetId {
            code: code.into(),
            issuer,
        }
    }

    /// The asset code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The asset issuer.
    pub fn issuer(&self) -> &AssetAddress {
        &self.issuer
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.issuer)
    }
}

impl FromStr for AssetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((code, issuer)) if !code.is_empty() && !issuer.is_empty() => Ok(AssetId::new(
                code,
                AssetAddress(issuer.to_string()),
            )),
            _ => Err(Error::InvalidAsset(s.to_string())),
        }
    }
}

impl TryFrom<String> for AssetId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        AssetId::from_str(&s)
    }
}

impl From<AssetId> for String {
    fn from(asset: AssetId) -> Self {
        asset.to_string()
    }
}

/// Opaque reference to a lock created on the contract chain, typically the lock transaction as
/// submitted. Used by the counterparty to audit the lock and by both parties to redeem it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
#[display(inner)]
pub struct LockHandle(pub String);

/// Reference to the holding account created on the asset chain by the participating party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
#[display(inner)]
pub struct HoldingAccount(pub String);

/// A pre-signed refund transaction of the asset-chain holding account, only valid after the lock
/// expiry. Kept as the chain-encoded blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefundTx(pub String);

/// Identifier of a transaction submitted on either chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
#[display(inner)]
pub struct TxId(pub String);

/// A point in time expressed in seconds since the Unix epoch, used for lock expiries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
#[display("{0}s")]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from seconds since the Unix epoch.
    pub const fn from_unix(secs: u64) -> Self {
        Timestamp(secs)
    }

    /// The current system time, clamped to the epoch if the clock is set before it.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Timestamp(secs)
    }

    /// Seconds since the Unix epoch.
    pub fn as_unix(&self) -> u64 {
        self.0
    }

    /// Add a duration, saturating at the maximum representable time.
    pub fn saturating_add(&self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_add(duration.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_asset_id() {
        let asset = AssetId::from_str("TFT:GA47YZA3PKFUZMPLQ3B5F2E3CJIB57TGGU7SPCQT2WAEYKN766PWIMB3")
            .unwrap();
        assert_eq!(asset.code(), "TFT");
        assert_eq!(
            asset.issuer(),
            &AssetAddress("GA47YZA3PKFUZMPLQ3B5F2E3CJIB57TGGU7SPCQT2WAEYKN766PWIMB3".into())
        );
        assert_eq!(
            asset.to_string(),
            "TFT:GA47YZA3PKFUZMPLQ3B5F2E3CJIB57TGGU7SPCQT2WAEYKN766PWIMB3"
        );
        assert!(AssetId::from_str("TFT").is_err());
        assert!(AssetId::from_str(":ISSUER").is_err());
        assert!(AssetId::from_str("TFT:").is_err());
    }

    #[test]
    fn asset_id_serde_as_string() {
        let asset = AssetId::new("TFT", AssetAddress("ISSUER".into()));
        let json = serde_json::to_string(&asset).unwrap();
        assert_eq!(json, "\"TFT:ISSUER\"");
        assert_eq!(serde_json::from_str::<AssetId>(&json).unwrap(), asset);
        assert!(serde_json::from_str::<AssetId>("\"nope\"").is_err());
    }

    #[test]
    fn contract_address_hex() {
        let addr =
            ContractAddress::from_str("0x17f54245073bfed168a51c3d13b536e39e406063").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x17f54245073bfed168a51c3d13b536e39e406063\"");
        assert_eq!(serde_json::from_str::<ContractAddress>(&json).unwrap(), addr);
        assert!(ContractAddress::from_str("0x17f5").is_err());
    }

    #[test]
    fn timestamp_arithmetic() {
        let t = Timestamp::from_unix(1_000);
        assert_eq!(t.saturating_add(Duration::from_secs(7200)).as_unix(), 8_200);
        assert_eq!(
            Timestamp::from_unix(u64::MAX).saturating_add(Duration::from_secs(1)),
            Timestamp::from_unix(u64::MAX)
        );
        assert!(Timestamp::now() > t);
    }
}
