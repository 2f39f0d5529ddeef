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

//! Defines a swap between the contract chain and the asset chain: its identifier, the protocol
//! stages each role goes through, and the status observed from outside the swap task.
//!
//! ```text
//! seller: OpenSale ──buy──> AcceptedBuy ──initiateLock──> ParticipateLock ──redeemed──> Done
//! buyer:  StartBuy ──accept──> SetupLock ──participateLock──> ClaimLock ──────────────> Done
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditFailure;
use crate::blockchain::LockHandle;
use crate::chain;
use crate::crypto::{Secret, SecretHash};
use crate::message::MessageKind;
use crate::role::SwapRole;
use crate::trade::{self, Amount, Sale, SaleId};
use crate::transport::{self, PeerId};
use crate::waiter::WaitError;
use crate::Res;

/// The process local identifier of a swap. This is a wrapper around a random [`Uuid`],
/// generated once per swap and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
#[display(inner)]
pub struct SwapId(pub Uuid);

impl SwapId {
    /// Generate a new random identifier.
    pub fn random() -> Self {
        SwapId(Uuid::new_v4())
    }
}

impl From<Uuid> for SwapId {
    fn from(u: Uuid) -> Self {
        SwapId(u)
    }
}

/// A protocol stage. Stages are totally ordered and a swap only ever moves forward, one step at
/// a time, along the path of its role.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[display(Debug)]
pub enum Stage {
    /// Seller waits for a buy request.
    OpenSale,
    /// Buyer sent its request and waits for the seller acceptance.
    StartBuy,
    /// Seller accepted and waits for the buyer lock.
    AcceptedBuy,
    /// Buyer locked on the contract chain and waits for the seller lock.
    SetupLock,
    /// Seller locked on the asset chain and waits for the secret.
    ParticipateLock,
    /// Buyer redeemed the asset and revealed the secret.
    ClaimLock,
    /// Terminal stage, the local party received its counter-asset.
    Done,
}

impl Stage {
    /// The first stage of `role`.
    pub fn initial(role: SwapRole) -> Self {
        match role {
            SwapRole::Seller => Stage::OpenSale,
            SwapRole::Buyer => Stage::StartBuy,
        }
    }

    /// The stage following this one for `role`, `None` if terminal or not on the role's path.
    pub fn next(&self, role: SwapRole) -> Option<Stage> {
        match (role, self) {
            (SwapRole::Seller, Stage::OpenSale) => Some(Stage::AcceptedBuy),
            (SwapRole::Seller, Stage::AcceptedBuy) => Some(Stage::ParticipateLock),
            (SwapRole::Seller, Stage::ParticipateLock) => Some(Stage::Done),
            (SwapRole::Buyer, Stage::StartBuy) => Some(Stage::SetupLock),
            (SwapRole::Buyer, Stage::SetupLock) => Some(Stage::ClaimLock),
            (SwapRole::Buyer, Stage::ClaimLock) => Some(Stage::Done),
            _ => None,
        }
    }

    /// The only message `role` accepts at this stage.
    pub fn expected_message(&self, role: SwapRole) -> Option<MessageKind> {
        match (role, self) {
            (SwapRole::Seller, Stage::OpenSale) => Some(MessageKind::Buy),
            (SwapRole::Seller, Stage::AcceptedBuy) => Some(MessageKind::InitiateLock),
            (SwapRole::Seller, Stage::ParticipateLock) => Some(MessageKind::Redeemed),
            (SwapRole::Buyer, Stage::StartBuy) => Some(MessageKind::Accept),
            (SwapRole::Buyer, Stage::SetupLock) => Some(MessageKind::ParticipateLock),
            _ => None,
        }
    }

    /// Return `true` for the terminal stage.
    pub fn is_done(&self) -> bool {
        matches!(self, Stage::Done)
    }
}

/// Why a swap stopped making progress. A stalled swap never resumes, funds already locked are
/// recovered with the on-chain refund path once the locks expire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Stall {
    /// A counterparty lock failed its audit.
    #[error("Audit failed: {0}")]
    Audit(AuditFailure),
    /// A transaction stayed pending past the confirmation deadline.
    #[error("Transaction not confirmed in time")]
    ConfirmationTimeout,
    /// A chain operation failed.
    #[error("Chain operation failed: {0}")]
    Chain(String),
    /// The transport failed to publish a message or closed the inbound stream.
    #[error("Transport failed: {0}")]
    Transport(String),
    /// The revealed secret does not match the negotiated hash.
    #[error("Revealed secret does not match the secret hash")]
    InvalidSecret,
    /// A local invariant was broken.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl From<AuditFailure> for Stall {
    fn from(f: AuditFailure) -> Self {
        Stall::Audit(f)
    }
}

impl From<chain::Error> for Stall {
    fn from(e: chain::Error) -> Self {
        Stall::Chain(e.to_string())
    }
}

impl From<transport::Error> for Stall {
    fn from(e: transport::Error) -> Self {
        Stall::Transport(e.to_string())
    }
}

impl From<crate::Error> for Stall {
    fn from(e: crate::Error) -> Self {
        match e {
            crate::Error::Chain(e) => e.into(),
            crate::Error::Transport(e) => e.into(),
            e => Stall::Invariant(e.to_string()),
        }
    }
}

/// Whether a swap is still running and, if not, how it ended.
#[derive(Display, Debug, Clone, PartialEq, Eq)]
#[display(Debug)]
pub enum SwapStatus {
    /// The swap task consumes messages.
    Active,
    /// The swap stopped on a failure, see [`Stall`].
    Stalled(Stall),
    /// The swap reached [`Stage::Done`].
    Done,
    /// The swap was cancelled by an operator.
    Cancelled,
}

impl SwapStatus {
    /// Return `true` if the swap will not make any further progress.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SwapStatus::Active)
    }
}

impl From<Stall> for SwapStatus {
    fn from(s: Stall) -> Self {
        SwapStatus::Stalled(s)
    }
}

impl From<AuditFailure> for SwapStatus {
    fn from(f: AuditFailure) -> Self {
        SwapStatus::Stalled(f.into())
    }
}

impl From<chain::Error> for SwapStatus {
    fn from(e: chain::Error) -> Self {
        SwapStatus::Stalled(e.into())
    }
}

impl From<transport::Error> for SwapStatus {
    fn from(e: transport::Error) -> Self {
        SwapStatus::Stalled(e.into())
    }
}

impl From<crate::Error> for SwapStatus {
    fn from(e: crate::Error) -> Self {
        SwapStatus::Stalled(e.into())
    }
}

impl From<WaitError> for SwapStatus {
    fn from(e: WaitError) -> Self {
        match e {
            WaitError::Cancelled => SwapStatus::Cancelled,
            WaitError::DeadlineExceeded => SwapStatus::Stalled(Stall::ConfirmationTimeout),
            WaitError::Chain(e) => e.into(),
        }
    }
}

/// Snapshot of a swap as published to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapState {
    /// Current protocol stage.
    pub stage: Stage,
    /// Current status.
    pub status: SwapStatus,
}

/// The mutable state of one swap, owned by its task.
#[derive(Debug)]
pub struct Swap {
    /// The swap identifier.
    pub id: SwapId,
    /// The local role.
    pub role: SwapRole,
    /// The sale the swap belongs to, for a seller its quantity is the available amount.
    pub sale: Sale,
    /// The amount of asset units, requested by a buyer then fixed by the seller acceptance.
    pub amount: Amount,
    /// The counterparty, bound at the first exchange.
    pub counterparty: Option<PeerId>,
    /// The secret, only ever set for the buyer.
    pub secret: Option<Secret>,
    /// The secret hash, set when the buyer locks or the seller validates the buyer lock.
    pub secret_hash: Option<SecretHash>,
    /// The buyer contract-chain lock.
    pub lock_handle: Option<LockHandle>,
    stage: Stage,
}

impl Swap {
    /// Create the seller side of a swap for `sale`.
    pub fn sell(sale: Sale) -> Self {
        let amount = sale.quantity;
        Self::new(SwapRole::Seller, sale, amount, None)
    }

    /// Create the buyer side of a swap requesting `amount` of `sale` from `seller`.
    pub fn buy(sale: Sale, amount: Amount, seller: PeerId) -> Self {
        Self::new(SwapRole::Buyer, sale, amount, Some(seller))
    }

    fn new(role: SwapRole, sale: Sale, amount: Amount, counterparty: Option<PeerId>) -> Self {
        Swap {
            id: SwapId::random(),
            role,
            sale,
            amount,
            counterparty,
            secret: None,
            secret_hash: None,
            lock_handle: None,
            stage: Stage::initial(role),
        }
    }

    /// The sale identifier used to filter inbound messages.
    pub fn sale_id(&self) -> &SaleId {
        &self.sale.id
    }

    /// Price of one asset unit.
    pub fn price(&self) -> Amount {
        self.sale.price
    }

    /// The current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Contract-chain collateral of the swap at the negotiated amount and price.
    pub fn collateral(&self) -> u128 {
        trade::collateral(self.amount, self.sale.price)
    }

    /// Move to `to`, which must be the successor of the current stage for this role.
    pub fn advance(&mut self, to: Stage) -> Res<()> {
        match self.stage.next(self.role) {
            Some(next) if next == to => {
                self.stage = to;
                Ok(())
            }
            _ => Err(crate::Error::InvalidTransition {
                from: self.stage,
                to,
            }),
        }
    }
}
