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

//! The swap driver.
//!
//! Opening a sale or starting a buy subscribes to the sale topic and spawns one task owning the
//! [`Swap`]. The task consumes inbound messages one at a time, so handlers of the same swap never
//! run concurrently and the swap needs no lock. Each handler validates the message, performs at
//! most one state changing chain operation, advances the stage, and publishes the next message.
//!
//! Messages that do not belong to the swap at its current stage are ignored. Any failure after
//! that point stops the swap with a [`Stall`] reason, observable through its [`SwapHandle`].
//! Nothing is rolled back and no refund is triggered: locked funds stay recoverable on chain
//! once the locks expire.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::audit::{self, AssetExpectation, ContractExpectation};
use crate::blockchain::Timestamp;
use crate::chain::{AssetChain, ContractChain};
use crate::config::DriverConfig;
use crate::message::{self, Message};
use crate::role::SwapRole;
use crate::session::SessionManager;
use crate::swap::{Stage, Stall, Swap, SwapId, SwapState, SwapStatus};
use crate::trade::{Amount, Sale, SaleId};
use crate::transport::{self, Envelope, Inbox, PeerId, Transport};
use crate::waiter::ConfirmationWaiter;
use crate::{Error, Res};

/// Result of a stage handler. The error side is the terminal status the swap ends with.
type Step = Result<(), SwapStatus>;

struct Shared {
    transport: Arc<dyn Transport>,
    contract: Arc<dyn ContractChain>,
    asset: Arc<dyn AssetChain>,
    config: DriverConfig,
    waiter: ConfirmationWaiter,
}

/// Runs swaps against one pair of chain clients and one transport. Cloning the driver is cheap
/// and clones share the same registry of swaps.
///
/// The registry holds at most one swap per sale. Every message names only its sale, so two swaps
/// of the same sale would both act on it.
#[derive(Clone)]
pub struct Driver {
    shared: Arc<Shared>,
    swaps: Arc<SessionManager<SaleId, SwapHandle>>,
    shutdown: CancellationToken,
}

impl Driver {
    /// Create a driver. No swap runs until [`Driver::open_sale`] or [`Driver::buy`] is called.
    ///
    /// Fails if `config` is inconsistent, see [`DriverConfig::validate`].
    pub fn new(
        transport: Arc<dyn Transport>,
        contract: Arc<dyn ContractChain>,
        asset: Arc<dyn AssetChain>,
        config: DriverConfig,
    ) -> Res<Self> {
        config.validate()?;
        let waiter = ConfirmationWaiter::from(&config.confirmation);
        Ok(Self {
            shared: Arc::new(Shared {
                transport,
                contract,
                asset,
                config,
                waiter,
            }),
            swaps: Arc::new(SessionManager::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Open a sale and wait for a buyer. The whole quantity of the sale is available to the
    /// first accepted buy request.
    ///
    /// Fails with [`Error::SaleInProgress`](crate::Error::SaleInProgress) if a swap of the sale
    /// is still running.
    pub async fn open_sale(&self, sale: Sale) -> Res<SwapHandle> {
        let swap = Swap::sell(sale);
        let (handle, state) = self.register(&swap)?;
        let inbox = match self.shared.transport.subscribe(swap.sale_id().as_str()).await {
            Ok(inbox) => inbox,
            Err(err) => {
                self.unregister(&handle);
                return Err(err.into());
            }
        };
        info!(swap_id = %swap.id, sale_id = %swap.sale_id(), "starting atomic swap sale");
        self.spawn(swap, inbox, handle.clone(), state);
        Ok(handle)
    }

    /// Request `amount` units of `sale` from `seller` and run the buyer side of the swap.
    ///
    /// The buy request is published before the swap task starts, an error means no swap was
    /// started and nothing stays registered.
    pub async fn buy(&self, seller: PeerId, sale: Sale, amount: Amount) -> Res<SwapHandle> {
        let swap = Swap::buy(sale, amount, seller.clone());
        let (handle, state) = self.register(&swap)?;
        match self.request(&seller, swap.sale_id(), amount).await {
            Ok(inbox) => {
                info!(swap_id = %swap.id, sale_id = %swap.sale_id(), %amount, "starting atomic swap buy, notified seller");
                self.spawn(swap, inbox, handle.clone(), state);
                Ok(handle)
            }
            Err(err) => {
                self.unregister(&handle);
                Err(err)
            }
        }
    }

    async fn request(&self, seller: &PeerId, sale_id: &SaleId, amount: Amount) -> Res<Inbox> {
        let inbox = self.shared.transport.subscribe(sale_id.as_str()).await?;
        let content = Message::from(message::Buy {
            id: sale_id.clone(),
            amount,
        })
        .encode()?;
        self.shared
            .transport
            .publish(seller, &transport::sale_tags(sale_id), content)
            .await?;
        Ok(inbox)
    }

    /// Reserve the sale slot of `swap`. A swap of the same sale in a terminal status is replaced.
    fn register(&self, swap: &Swap) -> Res<(SwapHandle, watch::Sender<SwapState>)> {
        let (state_tx, state_rx) = watch::channel(SwapState {
            stage: swap.stage(),
            status: SwapStatus::Active,
        });
        let handle = SwapHandle {
            id: swap.id,
            role: swap.role,
            sale_id: swap.sale_id().clone(),
            state: state_rx,
            cancel: self.shutdown.child_token(),
        };
        let sale_id = swap.sale_id().clone();
        let registered = self
            .swaps
            .get_or_insert_with(sale_id.clone(), || handle.clone());
        if registered.id == handle.id {
            return Ok((handle, state_tx));
        }
        let finished = self
            .swaps
            .remove_if(&sale_id, |h| h.id == registered.id && h.status().is_terminal())
            .is_some();
        if finished && self.swaps.insert_new(sale_id.clone(), handle.clone()) {
            debug!(%sale_id, previous = %registered.id, "replaced finished swap of the sale");
            return Ok((handle, state_tx));
        }
        warn!(%sale_id, running = %registered.id, "swap of the sale already in progress");
        Err(Error::SaleInProgress(sale_id))
    }

    fn unregister(&self, handle: &SwapHandle) {
        self.swaps.remove_if(&handle.sale_id, |h| h.id == handle.id);
    }

    fn spawn(
        &self,
        swap: Swap,
        inbox: Inbox,
        handle: SwapHandle,
        state: watch::Sender<SwapState>,
    ) {
        let span = info_span!(
            "swap",
            swap_id = %swap.id,
            sale_id = %swap.sale_id(),
            role = %swap.role
        );
        let task = SwapTask {
            shared: Arc::clone(&self.shared),
            swap,
            inbox,
            cancel: handle.cancel,
            state,
        };
        tokio::spawn(task.run().instrument(span));
    }

    /// The handle of a registered swap.
    pub fn swap(&self, id: &SwapId) -> Option<SwapHandle> {
        self.swaps().into_iter().find(|h| h.id == *id)
    }

    /// The handle of the swap registered for `sale_id`.
    pub fn sale(&self, sale_id: &SaleId) -> Option<SwapHandle> {
        self.swaps.get(sale_id)
    }

    /// Handles of every registered swap.
    pub fn swaps(&self) -> Vec<SwapHandle> {
        self.swaps.sessions().into_iter().map(|(_, h)| h).collect()
    }

    /// Cancel a registered swap. Returns `false` if the swap is unknown.
    pub fn cancel(&self, id: &SwapId) -> bool {
        match self.swap(id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Forget every swap in a terminal status and return how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.swaps.len();
        self.swaps.retain(|_, h| !h.status().is_terminal());
        before.saturating_sub(self.swaps.len())
    }

    /// Cancel every running swap of this driver.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Observes and controls one running swap.
#[derive(Debug, Clone)]
pub struct SwapHandle {
    id: SwapId,
    role: SwapRole,
    sale_id: SaleId,
    state: watch::Receiver<SwapState>,
    cancel: CancellationToken,
}

impl SwapHandle {
    /// The swap identifier.
    pub fn id(&self) -> SwapId {
        self.id
    }

    /// The local role.
    pub fn role(&self) -> SwapRole {
        self.role
    }

    /// The sale the swap belongs to.
    pub fn sale_id(&self) -> &SaleId {
        &self.sale_id
    }

    /// Latest published state.
    pub fn state(&self) -> SwapState {
        self.state.borrow().clone()
    }

    /// Latest published stage.
    pub fn stage(&self) -> Stage {
        self.state.borrow().stage
    }

    /// Latest published status.
    pub fn status(&self) -> SwapStatus {
        self.state.borrow().status.clone()
    }

    /// Ask the swap task to stop. A swap already in a terminal status is left unchanged.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the state satisfies `pred` and return it. Returns the last state if the swap
    /// task ended before.
    pub async fn wait_until<F>(&self, mut pred: F) -> SwapState
    where
        F: FnMut(&SwapState) -> bool,
    {
        let mut rx = self.state.clone();
        loop {
            {
                let state = rx.borrow_and_update();
                if pred(&state) {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    /// Wait until the swap reaches a terminal status.
    pub async fn finished(&self) -> SwapState {
        self.wait_until(|s| s.status.is_terminal()).await
    }
}

struct SwapTask {
    shared: Arc<Shared>,
    swap: Swap,
    inbox: Inbox,
    cancel: CancellationToken,
    state: watch::Sender<SwapState>,
}

impl SwapTask {
    async fn run(mut self) {
        debug!(stage = %self.swap.stage(), "start to handle swap messages");
        let status = loop {
            let envelope = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break SwapStatus::Cancelled,
                envelope = self.inbox.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break Stall::Transport("inbound stream closed".into()).into(),
                },
            };
            if let Err(status) = self.on_envelope(envelope).await {
                break status;
            }
            if self.swap.stage().is_done() {
                break SwapStatus::Done;
            }
        };
        match &status {
            SwapStatus::Stalled(Stall::Audit(reason)) => {
                warn!(stage = %self.swap.stage(), %reason, "counterparty lock rejected, swap stalled")
            }
            SwapStatus::Stalled(reason) => {
                error!(stage = %self.swap.stage(), %reason, "swap stalled")
            }
            SwapStatus::Cancelled => info!(stage = %self.swap.stage(), "swap cancelled"),
            _ => info!("swap completed"),
        }
        self.publish_state(status);
    }

    fn publish_state(&self, status: SwapStatus) {
        self.state.send_replace(SwapState {
            stage: self.swap.stage(),
            status,
        });
    }

    fn advance(&mut self, to: Stage) -> Step {
        self.swap.advance(to)?;
        debug!(stage = %to, "stage advanced");
        self.publish_state(SwapStatus::Active);
        Ok(())
    }

    async fn send(&self, msg: Message) -> Step {
        let recipient = self
            .swap
            .counterparty
            .clone()
            .ok_or_else(|| Stall::Invariant("no counterparty to publish to".into()))?;
        let content = msg.encode().map_err(|e| Stall::Invariant(e.to_string()))?;
        self.shared
            .transport
            .publish(&recipient, &transport::sale_tags(self.swap.sale_id()), content)
            .await?;
        Ok(())
    }

    async fn on_envelope(&mut self, envelope: Envelope) -> Step {
        let Envelope { sender, content } = envelope;
        debug!(stage = %self.swap.stage(), %sender, "got swap driver message");
        let expected = match self.swap.stage().expected_message(self.swap.role) {
            Some(kind) => kind,
            None => return Ok(()),
        };
        if let Some(counterparty) = &self.swap.counterparty {
            if counterparty != &sender {
                debug!(%sender, "ignore message from another participant");
                return Ok(());
            }
        }
        let msg = match Message::decode_expected(&content, expected) {
            Ok(msg) => msg,
            Err(err) => {
                debug!(error = %err, "could not decode message for the current stage");
                return Ok(());
            }
        };
        if msg.sale_id() != self.swap.sale_id() {
            debug!(sale_id = %msg.sale_id(), "ignore message which is not intended for this swap");
            return Ok(());
        }
        match msg {
            Message::Buy(buy) => self.on_buy(sender, buy).await,
            Message::Accept(accept) => self.on_accept(accept).await,
            Message::InitiateLock(initiate) => self.on_initiate_lock(initiate).await,
            Message::ParticipateLock(participate) => self.on_participate_lock(participate).await,
            Message::Redeemed(redeemed) => self.on_redeemed(redeemed).await,
        }
    }

    // seller, OpenSale
    async fn on_buy(&mut self, sender: PeerId, buy: message::Buy) -> Step {
        let amount = match self.swap.sale.accept_amount(buy.amount) {
            Some(amount) => amount,
            None => {
                debug!(requested = %buy.amount, available = %self.swap.sale.quantity, "cannot serve buy request, ignore");
                return Ok(());
            }
        };
        self.swap.amount = amount;
        self.swap.counterparty = Some(sender);
        let accept = message::Accept {
            id: self.swap.sale_id().clone(),
            contract_address: self.shared.contract.address(),
            asset_address: self.shared.asset.address(),
            amount,
            price: self.swap.price(),
        };
        self.advance(Stage::AcceptedBuy)?;
        self.send(accept.into()).await?;
        info!(%amount, price = %self.swap.price(), "sent atomic swap buy offer");
        Ok(())
    }

    // buyer, StartBuy
    async fn on_accept(&mut self, accept: message::Accept) -> Step {
        if accept.price != self.swap.price() {
            debug!(price = %accept.price, "accept carries another price, ignore");
            return Ok(());
        }
        if accept.amount.is_zero() || accept.amount > self.swap.amount {
            debug!(amount = %accept.amount, "accept carries an amount not requested, ignore");
            return Ok(());
        }
        info!(amount = %accept.amount, "seller accepted our buy offer");
        self.swap.amount = accept.amount;

        let value = self.swap.collateral();
        let output = self
            .shared
            .contract
            .initiate_lock(accept.contract_address, value)
            .await?;
        if !output.secret_hash.verify(&output.secret) {
            return Err(Stall::Chain("initiated lock secret does not match its hash".into()).into());
        }
        info!(lock = %output.lock_handle, %value, "submitted contract-chain lock");

        let initiate = message::InitiateLock {
            id: self.swap.sale_id().clone(),
            secret_hash: output.secret_hash,
            contract_address: output.initiator_address,
            asset_address: self.shared.asset.address(),
            lock: output.lock_handle.clone(),
        };
        self.swap.secret = Some(output.secret);
        self.swap.secret_hash = Some(output.secret_hash);
        self.swap.lock_handle = Some(output.lock_handle);
        self.advance(Stage::SetupLock)?;
        self.send(initiate.into()).await?;
        info!("set up atomic swap on contract chain, notified seller");
        Ok(())
    }

    // seller, AcceptedBuy
    async fn on_initiate_lock(&mut self, initiate: message::InitiateLock) -> Step {
        info!(lock = %initiate.lock, "received initiate lock message");
        let contract = &self.shared.contract;
        let lock = &initiate.lock;
        let found = self
            .shared
            .waiter
            .wait(&self.cancel, || contract.audit_lock(lock))
            .await?;

        let config = &self.shared.config.contract;
        let expected = ContractExpectation {
            value: self.swap.collateral(),
            contract_address: config.swap_contract,
            recipient: contract.address(),
            secret_hash: initiate.secret_hash,
            refund_address: config
                .check_refund_address
                .then_some(initiate.contract_address),
        };
        audit::audit_contract_lock(&found, &expected, Timestamp::now(), config.refund_margin)?;
        info!("validated contract-chain lock, setting up asset-chain side");

        self.swap.secret_hash = Some(initiate.secret_hash);
        self.swap.lock_handle = Some(initiate.lock.clone());
        let output = self
            .shared
            .asset
            .participate_lock(&initiate.asset_address, self.swap.amount, &initiate.secret_hash)
            .await?;
        info!(holding_account = %output.holding_account, "participated on asset chain");

        let participate = message::ParticipateLock {
            id: self.swap.sale_id().clone(),
            holding_account: output.holding_account,
            refund_tx: output.refund_tx,
        };
        self.advance(Stage::ParticipateLock)?;
        self.send(participate.into()).await?;
        info!("set up atomic swap on asset chain, notified buyer");
        Ok(())
    }

    // buyer, SetupLock
    async fn on_participate_lock(&mut self, participate: message::ParticipateLock) -> Step {
        let secret_hash = self
            .swap
            .secret_hash
            .ok_or_else(|| Stall::Invariant("buyer has no secret hash".into()))?;
        let asset = &self.shared.asset;
        let (refund_tx, holding_account) = (&participate.refund_tx, &participate.holding_account);
        let found = self
            .shared
            .waiter
            .wait(&self.cancel, || asset.audit_lock(refund_tx, holding_account))
            .await?;

        let config = &self.shared.config.asset;
        let expected = AssetExpectation {
            value: self.swap.amount,
            asset: config.asset.clone(),
            holding_account: participate.holding_account.clone(),
            recipient: asset.address(),
            secret_hash,
        };
        audit::audit_asset_lock(&found, &expected, Timestamp::now(), config.refund_margin)?;
        info!("asset-chain lock validated, redeem it");

        let secret = self
            .swap
            .secret
            .clone()
            .ok_or_else(|| Stall::Invariant("buyer has no secret".into()))?;
        let output = asset
            .redeem_lock(&participate.holding_account, &secret)
            .await?;
        info!(tx = %output.redeem_tx, "asset-chain lock redeemed");

        let redeemed = message::Redeemed {
            id: self.swap.sale_id().clone(),
            secret,
        };
        self.advance(Stage::ClaimLock)?;
        self.send(redeemed.into()).await?;
        info!("redeemed atomic swap on asset chain, notified seller");
        self.advance(Stage::Done)
    }

    // seller, ParticipateLock
    async fn on_redeemed(&mut self, redeemed: message::Redeemed) -> Step {
        let secret_hash = self
            .swap
            .secret_hash
            .ok_or_else(|| Stall::Invariant("seller has no secret hash".into()))?;
        let lock = self
            .swap
            .lock_handle
            .clone()
            .ok_or_else(|| Stall::Invariant("seller has no lock to redeem".into()))?;
        if !secret_hash.verify(&redeemed.secret) {
            return Err(Stall::InvalidSecret.into());
        }
        let output = self
            .shared
            .contract
            .redeem_lock(&lock, &secret_hash, &redeemed.secret)
            .await?;
        info!(tx = %output.redeem_tx, "redeemed atomic swap on contract chain");
        self.advance(Stage::Done)
    }
}
