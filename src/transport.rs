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

//! Direct messaging between swap participants.
//!
//! The transport is a relay-based bus: a participant subscribes to a topic (the sale identifier)
//! and receives every direct message addressed to it and tagged with that topic. Delivery is best
//! effort and at least once, the driver never relies on an acknowledgement.

use std::error;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::trade::SaleId;

pub mod memory;

/// Tag name marking the topic of a direct message.
pub const TOPIC_TAG: &str = "s";

/// Errors returned by the transport.
#[derive(Error, Debug)]
pub enum Error {
    /// The local connection to the relay is closed.
    #[error("Transport connection closed")]
    Closed,
    /// The message has no topic tag.
    #[error("Missing topic tag")]
    MissingTopic,
    /// Any transport error not part of this list.
    #[error("Transport error: {0}")]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Creates a new transport error of type other with an arbitrary payload.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Self::Other(error.into())
    }
}

/// Identity of a participant on the transport, e.g. its public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
#[display(inner)]
pub struct PeerId(pub String);

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        PeerId(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(s.to_string())
    }
}

/// A message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The participant who published the message.
    pub sender: PeerId,
    /// The raw message content.
    pub content: String,
}

/// Stream of messages received on a subscribed topic.
pub type Inbox = mpsc::UnboundedReceiver<Envelope>;

/// Direct messaging bus shared by all swaps of a process.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a stream of the direct messages addressed to the local participant on `topic`.
    async fn subscribe(&self, topic: &str) -> Result<Inbox, Error>;

    /// Publish `content` to `recipient`, tagged with `tags`.
    async fn publish(&self, recipient: &PeerId, tags: &[String], content: String)
        -> Result<(), Error>;
}

/// Tags scoping a message to a sale.
pub fn sale_tags(sale_id: &SaleId) -> Vec<String> {
    vec![TOPIC_TAG.to_string(), sale_id.to_string()]
}

/// Extract the topic from a list of tags, the value following [`TOPIC_TAG`].
pub fn topic_of(tags: &[String]) -> Option<&str> {
    tags.iter()
        .position(|t| t == TOPIC_TAG)
        .and_then(|i| tags.get(i + 1))
        .map(|t| t.as_str())
}
