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

//! Protocol messages exchanged between buyer and seller over the transport.
//!
//! Messages are JSON objects tagged with a `type` discriminant, one variant per protocol step:
//!
//! ```text
//! buyer                               seller
//!   | -- buy ----------------------------> |
//!   | <--------------------------- accept -- |
//!   | -- initiateLock -------------------> |
//!   | <------------------ participateLock -- |
//!   | -- redeemed -----------------------> |
//! ```
//!
//! Every message embeds the sale identifier it belongs to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::{AssetAddress, ContractAddress, HoldingAccount, LockHandle, RefundTx};
use crate::crypto::{Secret, SecretHash};
use crate::trade::{Amount, SaleId};

/// Errors when encoding or decoding protocol messages.
#[derive(Error, Debug)]
pub enum Error {
    /// The content is not a well formed protocol message.
    #[error("Malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The message could not be serialized.
    #[error("Cannot encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// The message is well formed but not the one expected.
    #[error("Unexpected {found} message, expected {expected}")]
    Unexpected {
        /// The message kind expected at this point of the protocol.
        expected: MessageKind,
        /// The message kind received.
        found: MessageKind,
    },
}

/// The kind of a protocol message, without its content.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[display(Debug)]
pub enum MessageKind {
    /// See [`Buy`].
    Buy,
    /// See [`Accept`].
    Accept,
    /// See [`InitiateLock`].
    InitiateLock,
    /// See [`ParticipateLock`].
    ParticipateLock,
    /// See [`Redeemed`].
    Redeemed,
}

/// `buy` is sent by the buyer to the seller to request an amount of the sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buy {
    /// The sale identifier.
    pub id: SaleId,
    /// Amount of asset units requested.
    pub amount: Amount,
}

/// `accept` is sent by the seller and fixes the amount and price of the swap. The contract-chain
/// collateral is `amount * price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accept {
    /// The sale identifier.
    pub id: SaleId,
    /// Seller contract-chain address, recipient of the buyer lock.
    pub contract_address: ContractAddress,
    /// Seller asset-chain address.
    pub asset_address: AssetAddress,
    /// Amount of asset units accepted, never more than requested.
    pub amount: Amount,
    /// Price of one asset unit.
    pub price: Amount,
}

/// `initiateLock` is sent by the buyer after submitting the contract-chain lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateLock {
    /// The sale identifier.
    pub id: SaleId,
    /// Hash of the secret embedded in the lock.
    pub secret_hash: SecretHash,
    /// Buyer contract-chain address, where the lock refunds to.
    pub contract_address: ContractAddress,
    /// Buyer asset-chain address, recipient of the seller lock.
    pub asset_address: AssetAddress,
    /// Reference to the submitted contract-chain lock.
    pub lock: LockHandle,
}

/// `participateLock` is sent by the seller after creating the asset-chain holding account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipateLock {
    /// The sale identifier.
    pub id: SaleId,
    /// The holding account locking the asset.
    pub holding_account: HoldingAccount,
    /// The seller pre-signed refund transaction of the holding account.
    pub refund_tx: RefundTx,
}

/// `redeemed` is sent by the buyer once it redeemed the asset, it reveals the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redeemed {
    /// The sale identifier.
    pub id: SaleId,
    /// The secret unlocking the contract-chain lock.
    pub secret: Secret,
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Buyer requests an amount.
    Buy(Buy),
    /// Seller accepts the request.
    Accept(Accept),
    /// Buyer locked on the contract chain.
    InitiateLock(InitiateLock),
    /// Seller locked on the asset chain.
    ParticipateLock(ParticipateLock),
    /// Buyer redeemed and reveals the secret.
    Redeemed(Redeemed),
}

impl Message {
    /// The kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Buy(_) => MessageKind::Buy,
            Message::Accept(_) => MessageKind::Accept,
            Message::InitiateLock(_) => MessageKind::InitiateLock,
            Message::ParticipateLock(_) => MessageKind::ParticipateLock,
            Message::Redeemed(_) => MessageKind::Redeemed,
        }
    }

    /// The sale identifier embedded in the message.
    pub fn sale_id(&self) -> &SaleId {
        match self {
            Message::Buy(m) => &m.id,
            Message::Accept(m) => &m.id,
            Message::InitiateLock(m) => &m.id,
            Message::ParticipateLock(m) => &m.id,
            Message::Redeemed(m) => &m.id,
        }
    }

    /// Serialize the message to its wire format.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::Encode)
    }

    /// Parse a message from its wire format.
    pub fn decode(content: &str) -> Result<Self, Error> {
        serde_json::from_str(content).map_err(Error::Malformed)
    }

    /// Parse a message and check that it is of the `expected` kind.
    pub fn decode_expected(content: &str, expected: MessageKind) -> Result<Self, Error> {
        let msg = Self::decode(content)?;
        match msg.kind() {
            found if found == expected => Ok(msg),
            found => Err(Error::Unexpected { expected, found }),
        }
    }
}

impl From<Buy> for Message {
    fn from(m: Buy) -> Self {
        Message::Buy(m)
    }
}

impl From<Accept> for Message {
    fn from(m: Accept) -> Self {
        Message::Accept(m)
    }
}

impl From<InitiateLock> for Message {
    fn from(m: InitiateLock) -> Self {
        Message::InitiateLock(m)
    }
}

impl From<ParticipateLock> for Message {
    fn from(m: ParticipateLock) -> Self {
        Message::ParticipateLock(m)
    }
}

impl From<Redeemed> for Message {
    fn from(m: Redeemed) -> Self {
        Message::Redeemed(m)
    }
}
