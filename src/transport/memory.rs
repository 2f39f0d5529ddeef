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

//! In-process transport. All participants connected to the same [`MemoryBus`] exchange direct
//! messages through unbounded channels, with the same topic scoping as the relay transport.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use tracing::trace;

use super::{topic_of, Envelope, Error, Inbox, PeerId, Transport};

#[derive(Debug)]
struct Subscriber {
    peer: PeerId,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// A bus connecting in-process participants.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    topics: Arc<DashMap<String, Vec<Subscriber>>>,
    offline: Arc<DashSet<PeerId>>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a participant to the bus.
    pub fn connect(&self, peer: impl Into<PeerId>) -> MemoryTransport {
        MemoryTransport {
            bus: self.clone(),
            peer: peer.into(),
        }
    }

    /// Make publishing from `peer` fail with [`Error::Closed`] while `offline` is set.
    pub fn set_offline(&self, peer: &PeerId, offline: bool) {
        if offline {
            self.offline.insert(peer.clone());
        } else {
            self.offline.remove(peer);
        }
    }

    /// Close every subscription of `peer`, ending its inbound streams.
    pub fn drop_subscriptions(&self, peer: &PeerId) {
        for mut entry in self.topics.iter_mut() {
            entry.value_mut().retain(|s| &s.peer != peer);
        }
    }

    fn deliver(&self, topic: &str, recipient: &PeerId, envelope: Envelope) -> usize {
        let mut delivered = 0;
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.retain(|s| !s.tx.is_closed());
            for subscriber in subscribers.iter().filter(|s| &s.peer == recipient) {
                if subscriber.tx.send(envelope.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

/// The connection of one participant to a [`MemoryBus`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    bus: MemoryBus,
    peer: PeerId,
}

impl MemoryTransport {
    /// Identity of this participant on the bus.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn subscribe(&self, topic: &str) -> Result<Inbox, Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.bus
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber {
                peer: self.peer.clone(),
                tx,
            });
        Ok(rx)
    }

    async fn publish(
        &self,
        recipient: &PeerId,
        tags: &[String],
        content: String,
    ) -> Result<(), Error> {
        if self.bus.offline.contains(&self.peer) {
            return Err(Error::Closed);
        }
        let topic = topic_of(tags).ok_or(Error::MissingTopic)?;
        let envelope = Envelope {
            sender: self.peer.clone(),
            content,
        };
        let delivered = self.bus.deliver(topic, recipient, envelope);
        trace!(%recipient, topic, delivered, "published direct message");
        Ok(())
    }
}
