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

//! Audit of counterparty locks.
//!
//! A party never trusts the lock parameters announced in a message. It fetches the lock from
//! chain state with its own client and validates the result against what was negotiated. The
//! checks run in a fixed order and stop at the first failure:
//!
//! 1. the locked value covers the expected value, overpayment is accepted,
//! 2. the lock lives in the expected contract, or holds the expected asset in the expected
//!    holding account,
//! 3. the local party is the recipient,
//! 4. the embedded secret hash is the negotiated one,
//! 5. the refund address is the counterparty's announced address (contract chain, optional),
//! 6. the expiry leaves at least the configured safety margin.
//!
//! Audits are pure functions and never fail with an error: a rejected lock is described by an
//! [`AuditFailure`].

use std::time::Duration;

use thiserror::Error;

use crate::blockchain::{AssetAddress, AssetId, ContractAddress, HoldingAccount, Timestamp};
use crate::chain::{AssetAudit, ContractAudit};
use crate::crypto::SecretHash;
use crate::trade::Amount;

/// Reason a counterparty lock was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditFailure {
    /// The lock holds less than the expected value.
    #[error("Locked value {found} is lower than expected {expected}")]
    InsufficientValue {
        /// Value negotiated in protocol.
        expected: u128,
        /// Value found on chain.
        found: u128,
    },
    /// The lock was not created in the expected swap contract.
    #[error("Lock created in unexpected contract {0:#x}")]
    WrongContract(ContractAddress),
    /// The holding account holds another asset.
    #[error("Holding account holds unexpected asset {0}")]
    WrongAsset(AssetId),
    /// The refund transaction does not spend from the announced holding account.
    #[error("Refund transaction spends from unexpected holding account {0}")]
    WrongHoldingAccount(HoldingAccount),
    /// The local party is not the recipient of the lock.
    #[error("Lock recipient is not the local party")]
    WrongRecipient,
    /// The lock is bound to another secret hash.
    #[error("Lock secret hash does not match the negotiated hash")]
    SecretHashMismatch,
    /// The lock refunds to an address other than the counterparty's.
    #[error("Lock refunds to unexpected address {0:#x}")]
    WrongRefundAddress(ContractAddress),
    /// The lock expires too soon to be redeemed safely.
    #[error("Lock expiry {expiry} is not beyond the minimum {minimum}")]
    InsufficientTimeMargin {
        /// Expiry found on chain.
        expiry: Timestamp,
        /// Earliest acceptable expiry, exclusive.
        minimum: Timestamp,
    },
}

/// What a contract-chain lock must satisfy, as negotiated in protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractExpectation {
    /// Minimum locked value, `amount * price`.
    pub value: u128,
    /// The swap contract the lock must live in.
    pub contract_address: ContractAddress,
    /// The local party's address.
    pub recipient: ContractAddress,
    /// The hash announced in the initiate message.
    pub secret_hash: SecretHash,
    /// The initiator's announced address, checked only when set.
    pub refund_address: Option<ContractAddress>,
}

/// What an asset-chain lock must satisfy, as negotiated in protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetExpectation {
    /// Minimum locked amount of the asset.
    pub value: Amount,
    /// The traded asset.
    pub asset: AssetId,
    /// The holding account announced in the participate message.
    pub holding_account: HoldingAccount,
    /// The local party's address.
    pub recipient: AssetAddress,
    /// The hash established when the buyer initiated.
    pub secret_hash: SecretHash,
}

/// Audit a contract-chain lock read from chain state. `margin` is the minimum time left before
/// the initiator can refund, counted from `now`.
pub fn audit_contract_lock(
    audit: &ContractAudit,
    expected: &ContractExpectation,
    now: Timestamp,
    margin: Duration,
) -> Result<(), AuditFailure> {
    if audit.locked_value < expected.value {
        return Err(AuditFailure::InsufficientValue {
            expected: expected.value,
            found: audit.locked_value,
        });
    }
    if audit.contract_address != expected.contract_address {
        return Err(AuditFailure::WrongContract(audit.contract_address));
    }
    if audit.recipient_address != expected.recipient {
        return Err(AuditFailure::WrongRecipient);
    }
    if audit.secret_hash != expected.secret_hash {
        return Err(AuditFailure::SecretHashMismatch);
    }
    if let Some(refund) = expected.refund_address {
        if audit.refund_address != refund {
            return Err(AuditFailure::WrongRefundAddress(audit.refund_address));
        }
    }
    check_expiry(audit.expiry, now, margin)
}

/// Audit an asset-chain lock decoded from the refund transaction and the holding account state.
pub fn audit_asset_lock(
    audit: &AssetAudit,
    expected: &AssetExpectation,
    now: Timestamp,
    margin: Duration,
) -> Result<(), AuditFailure> {
    if audit.locked_value < expected.value {
        return Err(AuditFailure::InsufficientValue {
            expected: u128::from(expected.value.as_units()),
            found: u128::from(audit.locked_value.as_units()),
        });
    }
    if audit.asset != expected.asset {
        return Err(AuditFailure::WrongAsset(audit.asset.clone()));
    }
    if audit.holding_address != expected.holding_account {
        return Err(AuditFailure::WrongHoldingAccount(
            audit.holding_address.clone(),
        ));
    }
    if audit.recipient_address != expected.recipient {
        return Err(AuditFailure::WrongRecipient);
    }
    if audit.secret_hash != expected.secret_hash {
        return Err(AuditFailure::SecretHashMismatch);
    }
    check_expiry(audit.expiry, now, margin)
}

// The expiry must be strictly after now + margin.
fn check_expiry(expiry: Timestamp, now: Timestamp, margin: Duration) -> Result<(), AuditFailure> {
    let minimum = now.saturating_add(margin);
    if expiry <= minimum {
        return Err(AuditFailure::InsufficientTimeMargin { expiry, minimum });
    }
    Ok(())
}
