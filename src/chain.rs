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

//! Client interfaces the swap driver uses to act on each blockchain.
//!
//! Implementations own signing keys and know how to build, submit, and decode calls against the
//! lock contract (contract chain) or the holding account scheme (asset chain). Clients are shared
//! between all running swaps and must be safe to call concurrently.

use std::error;

use async_trait::async_trait;
use thiserror::Error;

use crate::blockchain::{
    AssetAddress, AssetId, ContractAddress, HoldingAccount, LockHandle, RefundTx, Timestamp, TxId,
};
use crate::crypto::{Secret, SecretHash};
use crate::trade::Amount;

/// Errors returned by chain clients. [`Self::Pending`] is the only retryable condition.
#[derive(Error, Debug)]
pub enum Error {
    /// The transaction is known but not yet confirmed.
    #[error("Transaction not confirmed yet")]
    Pending,
    /// The referenced lock or transaction cannot be found or decoded.
    #[error("Lock not found: {0}")]
    NotFound(String),
    /// Any chain error not part of this list: dial, submission, or decoding failures.
    #[error("Chain client error: {0}")]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Creates a new chain error of type other with an arbitrary payload.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Self::Other(error.into())
    }

    /// Consumes the `Error`, returning its inner error (if any).
    ///
    /// If this [`enum@Error`] was constructed via [`new`] then this function will return [`Some`],
    /// otherwise it will return [`None`].
    ///
    /// [`new`]: Error::new
    ///
    pub fn into_inner(self) -> Option<Box<dyn error::Error + Send + Sync>> {
        match self {
            Self::Other(error) => Some(error),
            _ => None,
        }
    }

    /// Return `true` if the error is the retryable pending condition.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Result of initiating a lock on the contract chain.
#[derive(Debug, Clone)]
pub struct InitiateOutput {
    /// Reference to the lock, sent to the counterparty.
    pub lock_handle: LockHandle,
    /// Hash embedded in the lock.
    pub secret_hash: SecretHash,
    /// Secret generated for this lock, known only to the initiator.
    pub secret: Secret,
    /// Address the lock refunds to, the initiator's own address.
    pub initiator_address: ContractAddress,
}

/// Parameters of a contract-chain lock as read from chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAudit {
    /// Value held by the lock, in contract-chain units.
    pub locked_value: u128,
    /// Address of the contract the lock was created in.
    pub contract_address: ContractAddress,
    /// Address that can redeem the lock with the secret.
    pub recipient_address: ContractAddress,
    /// Address that can refund the lock after expiry.
    pub refund_address: ContractAddress,
    /// Hash the lock is bound to.
    pub secret_hash: SecretHash,
    /// Time after which the lock can be refunded.
    pub expiry: Timestamp,
}

/// Result of a participate lock on the asset chain.
#[derive(Debug, Clone)]
pub struct ParticipateOutput {
    /// The holding account created for the lock.
    pub holding_account: HoldingAccount,
    /// Pre-signed refund transaction, usable only after the lock expiry.
    pub refund_tx: RefundTx,
}

/// Parameters of an asset-chain lock as read from chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAudit {
    /// Amount of asset held by the holding account.
    pub locked_value: Amount,
    /// Asset held by the holding account.
    pub asset: AssetId,
    /// Holding account the audited refund transaction spends from.
    pub holding_address: HoldingAccount,
    /// Address that can redeem the lock with the secret.
    pub recipient_address: AssetAddress,
    /// Hash the lock is bound to.
    pub secret_hash: SecretHash,
    /// Time after which the refund transaction becomes valid.
    pub expiry: Timestamp,
}

/// Result of a redeem on either chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemOutput {
    /// The redeem transaction identifier.
    pub redeem_tx: TxId,
}

/// Client for the contract chain, where the buyer initiates the swap.
#[async_trait]
pub trait ContractChain: Send + Sync {
    /// Address of the local account.
    fn address(&self) -> ContractAddress;

    /// Lock `value` for `recipient`, generating a new secret and embedding its hash in the lock.
    async fn initiate_lock(
        &self,
        recipient: ContractAddress,
        value: u128,
    ) -> Result<InitiateOutput, Error>;

    /// Read the parameters of the lock from chain state. Returns [`Error::Pending`] while the lock
    /// transaction is not confirmed.
    async fn audit_lock(&self, lock: &LockHandle) -> Result<ContractAudit, Error>;

    /// Redeem the lock with the secret matching `secret_hash`.
    async fn redeem_lock(
        &self,
        lock: &LockHandle,
        secret_hash: &SecretHash,
        secret: &Secret,
    ) -> Result<RedeemOutput, Error>;
}

/// Client for the asset chain, where the seller participates in the swap.
#[async_trait]
pub trait AssetChain: Send + Sync {
    /// Address of the local account.
    fn address(&self) -> AssetAddress;

    /// Lock `amount` of the asset for `counterparty` under `secret_hash` in a new holding account.
    async fn participate_lock(
        &self,
        counterparty: &AssetAddress,
        amount: Amount,
        secret_hash: &SecretHash,
    ) -> Result<ParticipateOutput, Error>;

    /// Read the parameters of the lock from the refund transaction and the holding account state.
    async fn audit_lock(
        &self,
        refund_tx: &RefundTx,
        holding_account: &HoldingAccount,
    ) -> Result<AssetAudit, Error>;

    /// Redeem the holding account with the secret.
    async fn redeem_lock(
        &self,
        holding_account: &HoldingAccount,
        secret: &Secret,
    ) -> Result<RedeemOutput, Error>;
}
