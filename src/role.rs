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

//! Roles used to distinguish participants during a swap.
//!
//! The role decides which half of the protocol a participant executes and on which blockchain it
//! creates its lock:
//!
//! | Role | Holds | Locks on | Lock kind |
//! |---|---|---|---|
//! | [`SwapRole::Buyer`] | contract-chain funds | contract chain | initiate (chooses the secret) |
//! | [`SwapRole::Seller`] | asset-chain funds | asset chain | participate (only knows the hash) |

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors when parsing a role.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The given string does not name a role.
    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// Possible roles during the swap phase.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum SwapRole {
    /// The buyer starts with contract-chain funds and exchanges them for asset-chain assets. It
    /// initiates the contract-chain lock and is the only party generating the secret.
    Buyer,
    /// The seller opens a sale of asset-chain assets. It participates on the asset chain with the
    /// hash received from the buyer.
    Seller,
}

impl FromStr for SwapRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buyer" | "buyer" => Ok(SwapRole::Buyer),
            "Seller" | "seller" => Ok(SwapRole::Seller),
            _ => Err(Error::UnknownRole(s.to_string())),
        }
    }
}
