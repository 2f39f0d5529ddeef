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

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hashlock_swap::blockchain::{
    AssetAddress, AssetId, ContractAddress, HoldingAccount, LockHandle, RefundTx, Timestamp, TxId,
};
use hashlock_swap::chain::{
    self, AssetAudit, AssetChain, ContractAudit, ContractChain, InitiateOutput, ParticipateOutput,
    RedeemOutput,
};
use hashlock_swap::config::DriverConfig;
use hashlock_swap::crypto::{Secret, SecretHash};
use hashlock_swap::message::Message;
use hashlock_swap::trade::{Amount, Sale, SaleId};
use hashlock_swap::transport::memory::{MemoryBus, MemoryTransport};
use hashlock_swap::transport::{Envelope, Inbox, PeerId};
use hashlock_swap::Driver;

pub const SALE: &str = "sale-1";

pub fn swap_contract() -> ContractAddress {
    ContractAddress::repeat_byte(0xcc)
}

pub fn asset() -> AssetId {
    AssetId::new("TFT", AssetAddress("GISSUER".into()))
}

pub fn config() -> DriverConfig {
    DriverConfig::new(swap_contract(), asset())
}

pub fn sale(quantity: u64, price: u64) -> Sale {
    Sale::new(
        SaleId::new(SALE).unwrap(),
        Amount::from(quantity),
        Amount::from(price),
    )
}

#[derive(Debug, Clone)]
struct ContractLock {
    value: u128,
    initiator: ContractAddress,
    recipient: ContractAddress,
    secret_hash: SecretHash,
    expiry: Timestamp,
    redeemed: bool,
}

/// Contract chain shared by every client of a test.
#[derive(Default)]
pub struct ContractLedger {
    locks: Mutex<HashMap<LockHandle, ContractLock>>,
    balances: Mutex<HashMap<ContractAddress, u128>>,
    /// Number of audits answered with `Pending` before the lock is visible.
    pub pending_audits: AtomicUsize,
    /// Rewrites what the chain reports for an audited lock.
    pub tamper: Mutex<Option<Box<dyn Fn(&mut ContractAudit) + Send + Sync>>>,
    /// Lifetime of new locks.
    pub lock_time: Mutex<Option<Duration>>,
    pub initiate_calls: AtomicUsize,
    pub audit_calls: AtomicUsize,
    pub redeem_calls: AtomicUsize,
}

impl ContractLedger {
    pub fn balance(&self, address: &ContractAddress) -> u128 {
        self.balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    pub fn locked_value(&self) -> u128 {
        self.locks.lock().unwrap().values().map(|l| l.value).sum()
    }

    pub fn client(self: &Arc<Self>, address: ContractAddress) -> MockContractChain {
        MockContractChain {
            address,
            ledger: Arc::clone(self),
        }
    }
}

pub struct MockContractChain {
    address: ContractAddress,
    ledger: Arc<ContractLedger>,
}

#[async_trait]
impl ContractChain for MockContractChain {
    fn address(&self) -> ContractAddress {
        self.address
    }

    async fn initiate_lock(
        &self,
        recipient: ContractAddress,
        value: u128,
    ) -> Result<InitiateOutput, chain::Error> {
        let n = self.ledger.initiate_calls.fetch_add(1, Ordering::SeqCst);
        let (secret, secret_hash) = Secret::generate_with_hash();
        let lock_time = self
            .ledger
            .lock_time
            .lock()
            .unwrap()
            .unwrap_or(Duration::from_secs(48 * 3600));
        let handle = LockHandle(format!("0xlock{}", n));
        self.ledger.locks.lock().unwrap().insert(
            handle.clone(),
            ContractLock {
                value,
                initiator: self.address,
                recipient,
                secret_hash,
                expiry: Timestamp::now().saturating_add(lock_time),
                redeemed: false,
            },
        );
        Ok(InitiateOutput {
            lock_handle: handle,
            secret_hash,
            secret,
            initiator_address: self.address,
        })
    }

    async fn audit_lock(&self, lock: &LockHandle) -> Result<ContractAudit, chain::Error> {
        self.ledger.audit_calls.fetch_add(1, Ordering::SeqCst);
        let pending = &self.ledger.pending_audits;
        if pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(chain::Error::Pending);
        }
        let locks = self.ledger.locks.lock().unwrap();
        let found = locks
            .get(lock)
            .ok_or_else(|| chain::Error::NotFound(lock.to_string()))?;
        let mut audit = ContractAudit {
            locked_value: found.value,
            contract_address: swap_contract(),
            recipient_address: found.recipient,
            refund_address: found.initiator,
            secret_hash: found.secret_hash,
            expiry: found.expiry,
        };
        if let Some(tamper) = self.ledger.tamper.lock().unwrap().as_ref() {
            tamper(&mut audit);
        }
        Ok(audit)
    }

    async fn redeem_lock(
        &self,
        lock: &LockHandle,
        secret_hash: &SecretHash,
        secret: &Secret,
    ) -> Result<RedeemOutput, chain::Error> {
        self.ledger.redeem_calls.fetch_add(1, Ordering::SeqCst);
        let mut locks = self.ledger.locks.lock().unwrap();
        let found = locks
            .get_mut(lock)
            .ok_or_else(|| chain::Error::NotFound(lock.to_string()))?;
        if found.redeemed || found.secret_hash != *secret_hash || !secret_hash.verify(secret) {
            return Err(chain::Error::new("lock cannot be redeemed"));
        }
        found.redeemed = true;
        *self
            .ledger
            .balances
            .lock()
            .unwrap()
            .entry(found.recipient)
            .or_default() += found.value;
        Ok(RedeemOutput {
            redeem_tx: TxId(format!("redeem-{}", lock)),
        })
    }
}

#[derive(Debug, Clone)]
struct Holding {
    amount: Amount,
    asset: AssetId,
    recipient: AssetAddress,
    secret_hash: SecretHash,
    expiry: Timestamp,
    redeemed: bool,
}

/// Asset chain shared by every client of a test.
#[derive(Default)]
pub struct AssetLedger {
    holdings: Mutex<HashMap<HoldingAccount, Holding>>,
    balances: Mutex<HashMap<AssetAddress, u64>>,
    /// Amount actually locked by participants, whatever they were asked to lock.
    pub lock_amount: Mutex<Option<Amount>>,
    pub participate_calls: AtomicUsize,
    pub audit_calls: AtomicUsize,
    pub redeem_calls: AtomicUsize,
}

impl AssetLedger {
    pub fn balance(&self, address: &AssetAddress) -> u64 {
        self.balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    pub fn client(self: &Arc<Self>, address: &str) -> MockAssetChain {
        MockAssetChain {
            address: AssetAddress(address.into()),
            ledger: Arc::clone(self),
        }
    }
}

pub struct MockAssetChain {
    address: AssetAddress,
    ledger: Arc<AssetLedger>,
}

#[async_trait]
impl AssetChain for MockAssetChain {
    fn address(&self) -> AssetAddress {
        self.address.clone()
    }

    async fn participate_lock(
        &self,
        counterparty: &AssetAddress,
        amount: Amount,
        secret_hash: &SecretHash,
    ) -> Result<ParticipateOutput, chain::Error> {
        let n = self.ledger.participate_calls.fetch_add(1, Ordering::SeqCst);
        let amount = self.ledger.lock_amount.lock().unwrap().unwrap_or(amount);
        let holding_account = HoldingAccount(format!("GHOLDING{}", n));
        self.ledger.holdings.lock().unwrap().insert(
            holding_account.clone(),
            Holding {
                amount,
                asset: asset(),
                recipient: counterparty.clone(),
                secret_hash: *secret_hash,
                expiry: Timestamp::now().saturating_add(Duration::from_secs(24 * 3600)),
                redeemed: false,
            },
        );
        Ok(ParticipateOutput {
            refund_tx: RefundTx(format!("refund:{}", holding_account)),
            holding_account,
        })
    }

    async fn audit_lock(
        &self,
        refund_tx: &RefundTx,
        _holding_account: &HoldingAccount,
    ) -> Result<AssetAudit, chain::Error> {
        self.ledger.audit_calls.fetch_add(1, Ordering::SeqCst);
        let account = refund_tx
            .0
            .strip_prefix("refund:")
            .map(|a| HoldingAccount(a.to_string()))
            .ok_or_else(|| chain::Error::new("cannot decode refund transaction"))?;
        let holdings = self.ledger.holdings.lock().unwrap();
        let found = holdings
            .get(&account)
            .ok_or_else(|| chain::Error::NotFound(account.to_string()))?;
        Ok(AssetAudit {
            locked_value: found.amount,
            asset: found.asset.clone(),
            holding_address: account.clone(),
            recipient_address: found.recipient.clone(),
            secret_hash: found.secret_hash,
            expiry: found.expiry,
        })
    }

    async fn redeem_lock(
        &self,
        holding_account: &HoldingAccount,
        secret: &Secret,
    ) -> Result<RedeemOutput, chain::Error> {
        self.ledger.redeem_calls.fetch_add(1, Ordering::SeqCst);
        let mut holdings = self.ledger.holdings.lock().unwrap();
        let found = holdings
            .get_mut(holding_account)
            .ok_or_else(|| chain::Error::NotFound(holding_account.to_string()))?;
        if found.redeemed || !found.secret_hash.verify(secret) {
            return Err(chain::Error::new("holding account cannot be redeemed"));
        }
        found.redeemed = true;
        *self
            .ledger
            .balances
            .lock()
            .unwrap()
            .entry(found.recipient.clone())
            .or_default() += found.amount.as_units();
        Ok(RedeemOutput {
            redeem_tx: TxId(format!("redeem-{}", holding_account)),
        })
    }
}

pub fn buyer_contract_address() -> ContractAddress {
    ContractAddress::from_str("0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0").unwrap()
}

pub fn seller_contract_address() -> ContractAddress {
    ContractAddress::from_str("0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e").unwrap()
}

pub const BUYER_ASSET_ADDRESS: &str = "GBUYER";
pub const SELLER_ASSET_ADDRESS: &str = "GSELLER";

/// Two participants connected to the same chains and bus.
pub struct Harness {
    pub bus: MemoryBus,
    pub contract: Arc<ContractLedger>,
    pub asset: Arc<AssetLedger>,
    pub buyer: Driver,
    pub seller: Driver,
    pub buyer_peer: PeerId,
    pub seller_peer: PeerId,
}

impl Harness {
    pub fn new() -> Self {
        let bus = MemoryBus::new();
        let contract = Arc::new(ContractLedger::default());
        let asset = Arc::new(AssetLedger::default());
        let buyer = Driver::new(
            Arc::new(bus.connect("buyer")),
            Arc::new(contract.client(buyer_contract_address())),
            Arc::new(asset.client(BUYER_ASSET_ADDRESS)),
            config(),
        )
        .unwrap();
        let seller = Driver::new(
            Arc::new(bus.connect("seller")),
            Arc::new(contract.client(seller_contract_address())),
            Arc::new(asset.client(SELLER_ASSET_ADDRESS)),
            config(),
        )
        .unwrap();
        Harness {
            bus,
            contract,
            asset,
            buyer,
            seller,
            buyer_peer: PeerId::from("buyer"),
            seller_peer: PeerId::from("seller"),
        }
    }
}

/// A participant driven by hand from a test.
pub struct Peer {
    pub transport: MemoryTransport,
    pub inbox: Inbox,
}

impl Peer {
    pub async fn join(bus: &MemoryBus, name: &str, topic: &str) -> Self {
        use hashlock_swap::transport::Transport;
        let transport = bus.connect(name);
        let inbox = transport.subscribe(topic).await.unwrap();
        Peer { transport, inbox }
    }

    /// Publish on the topic of [`SALE`], whatever sale the message names.
    pub async fn send(&self, to: &PeerId, msg: impl Into<Message>) {
        use hashlock_swap::transport::{sale_tags, Transport};
        let msg = msg.into();
        let tags = sale_tags(&SaleId::new(SALE).unwrap());
        self.transport
            .publish(to, &tags, msg.encode().unwrap())
            .await
            .unwrap();
    }

    pub async fn recv(&mut self) -> Message {
        let Envelope { content, .. } = self.inbox.recv().await.unwrap();
        Message::decode(&content).unwrap()
    }

    pub fn is_empty(&mut self) -> bool {
        self.inbox.try_recv().is_err()
    }
}

/// Let spawned tasks process everything queued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
