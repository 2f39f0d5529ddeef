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

//! # Hashlock Swap
//!
//! Driver for hashed-time-lock atomic swaps between an account-based **contract chain** and an
//! **asset chain**. A buyer locks contract-chain collateral under the hash of a secret it alone
//! knows, the seller locks the asset under the same hash, the buyer redeems the asset and in doing
//! so reveals the secret, and the seller uses the secret to redeem the collateral.
//!
//! The crate provides:
//!
//! - the wire [`message`]s exchanged between buyer and seller,
//! - the [`audit`] of counterparty locks against independently fetched chain state,
//! - the [`waiter`] that polls until a transaction is confirmed,
//! - the per-swap state machine and its task in [`driver`].
//!
//! Chain clients and the messaging bus are external and consumed through the traits defined in
//! [`chain`] and [`transport`].

#![cfg_attr(docsrs, feature(doc_cfg))]

use thiserror::Error;

#[macro_use]
extern crate amplify;

pub mod audit;
pub mod blockchain;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod driver;
pub(crate) mod hash;
pub mod message;
pub mod role;
pub mod session;
pub mod swap;
pub mod trade;
pub mod transport;
pub mod waiter;

pub use driver::{Driver, SwapHandle};

/// A list of possible errors when driving a hashed-time-lock swap. Each error can carry the
/// underlying error of the component that failed.
#[derive(Error, Debug)]
pub enum Error {
    /// A chain client error while locking, auditing, or redeeming.
    #[error("Chain error: {0}")]
    Chain(#[from] chain::Error),
    /// A transport error while subscribing or publishing.
    #[error("Transport error: {0}")]
    Transport(#[from] transport::Error),
    /// A protocol message could not be encoded or decoded.
    #[error("Message error: {0}")]
    Message(#[from] message::Error),
    /// A stage transition not allowed by the protocol was requested.
    #[error("Invalid stage transition from {from} to {to}")]
    InvalidTransition {
        /// The current stage.
        from: swap::Stage,
        /// The requested stage.
        to: swap::Stage,
    },
    /// The driver configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    /// A swap of this sale is still running on the driver.
    #[error("A swap of sale {0} is already in progress")]
    SaleInProgress(trade::SaleId),
}

/// Result of an high level computation such as in the driver.
pub type Res<T> = Result<T, Error>;
