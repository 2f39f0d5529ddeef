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

//! Secret and secret hash of a hashed time lock.
//!
//! The [`Secret`] is a capability: whoever knows it can redeem both locks. It does not implement
//! `Display` and its `Debug` output is redacted, so it cannot end up in logs by accident. It is
//! serialized only inside the final reveal message.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::hash::{impl_hex_serde, HexString};

/// Length in bytes of the secret and of its hash.
pub const SECRET_LEN: usize = 32;

fixed_hash::construct_fixed_hash!(
    /// The SHA-256 digest of a [`Secret`], embedded in both on-chain locks.
    pub struct SecretHash(32);
);

impl_hex_serde!(SecretHash, 32);

impl SecretHash {
    /// Hash the given secret.
    pub fn of(secret: &Secret) -> Self {
        SecretHash::from_slice(&Sha256::digest(&secret.0))
    }

    /// Return `true` if this hash is the hash of `secret`.
    pub fn verify(&self, secret: &Secret) -> bool {
        SecretHash::of(secret) == *self
    }
}

/// The 32 bytes preimage unlocking a hashed time lock.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    /// Generate a new secret from the operating system random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Secret(bytes)
    }

    /// Create a secret from raw bytes.
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Secret(bytes)
    }

    /// Expose the raw bytes, only to hand them to a redeem call.
    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// Generate a new secret and its hash.
    pub fn generate_with_hash() -> (Self, SecretHash) {
        let secret = Secret::generate();
        let hash = SecretHash::of(&secret);
        (secret, hash)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Secret, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = deserializer.deserialize_str(HexString(SECRET_LEN))?;
        let mut secret = [0u8; SECRET_LEN];
        secret.copy_from_slice(&bytes);
        Ok(Secret(secret))
    }
}
