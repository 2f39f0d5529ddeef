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

//! Trade structures. A seller publishes a [`Sale`] of asset-chain assets at a fixed price per
//! unit, buyers discover it outside of this crate and request an amount of it.
//!
//! Amounts are integer quantities in the smallest unit of each chain. The contract-chain
//! collateral for a swap is `amount * price` computed in `u128` with [`collateral`], it is exact
//! and cannot overflow for any pair of `u64` inputs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors used when manipulating amounts and sales.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The amount string is not a valid unsigned integer.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    /// The sale identifier is empty.
    #[error("Empty sale identifier")]
    EmptySaleId,
}

/// The identifier of a sale, as published by the seller. Every protocol message embeds it and
/// messages carrying another identifier are discarded by the swap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
#[display(inner)]
pub struct SaleId(String);

impl SaleId {
    /// Create a sale identifier, fails if the identifier is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::EmptySaleId);
        }
        Ok(SaleId(id))
    }

    /// The identifier as a string slice, used as the transport topic.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SaleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SaleId::new(s)
    }
}

/// An amount of units, either of the traded asset or of the price per asset unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
#[display(inner)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from raw units.
    pub const fn from_units(units: u64) -> Self {
        Amount(units)
    }

    /// Return the amount in raw units.
    pub fn as_units(&self) -> u64 {
        self.0
    }

    /// Return `true` if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Amount(units)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Amount)
            .map_err(|_| Error::InvalidAmount(s.to_string()))
    }
}

/// The contract-chain collateral to lock for `amount` asset units at `price` per unit.
///
/// This value is computed once when the buyer locks and once when the seller audits, both sides
/// use the amount and price embedded in the accept message.
pub fn collateral(amount: Amount, price: Amount) -> u128 {
    u128::from(amount.0) * u128::from(price.0)
}

/// A sale opened by a seller: the available quantity of asset units and the price of one unit in
/// contract-chain units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sale {
    /// The sale unique identifier.
    pub id: SaleId,
    /// Quantity of asset units available.
    pub quantity: Amount,
    /// Price of one asset unit.
    pub price: Amount,
}

impl Sale {
    /// Create a new sale.
    pub fn new(id: SaleId, quantity: Amount, price: Amount) -> Self {
        Sale {
            id,
            quantity,
            price,
        }
    }

    /// Return the amount that can be sold for a buyer request, or `None` when the request is
    /// empty or exceeds the available quantity.
    pub fn accept_amount(&self, requested: Amount) -> Option<Amount> {
        if requested.is_zero() || requested > self.quantity {
            None
        } else {
            Some(requested)
        }
    }
}
