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

//! Keyed session state shared between concurrent callers.

use std::fmt;
use std::hash::Hash;

use dashmap::DashMap;

/// A concurrency-safe map from a caller-scoped identifier to its session. Sessions are created on
/// first access and cloned out on read, so no lock is held across an `await`.
pub struct SessionManager<K, S>
where
    K: Eq + Hash,
{
    sessions: DashMap<K, S>,
}

impl<K, S> SessionManager<K, S>
where
    K: Eq + Hash + Clone,
    S: Clone,
{
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Return the session of `key`, creating it with `init` if absent. `init` runs at most once
    /// per key even under concurrent calls.
    pub fn get_or_insert_with<F>(&self, key: K, init: F) -> S
    where
        F: FnOnce() -> S,
    {
        // Fast path: check without taking the entry lock
        if let Some(session) = self.sessions.get(&key) {
            return session.value().clone();
        }
        self.sessions.entry(key).or_insert_with(init).value().clone()
    }

    /// Insert `session` under `key` only if no session exists yet. Returns `false` if one did.
    pub fn insert_new(&self, key: K, session: S) -> bool {
        match self.sessions.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(session);
                true
            }
        }
    }

    /// Return the session of `key` if any.
    pub fn get(&self, key: &K) -> Option<S> {
        self.sessions.get(key).map(|s| s.value().clone())
    }

    /// Remove and return the session of `key`.
    pub fn remove(&self, key: &K) -> Option<S> {
        self.sessions.remove(key).map(|(_, s)| s)
    }

    /// Remove and return the session of `key` if it matches `pred`.
    pub fn remove_if<F>(&self, key: &K, pred: F) -> Option<S>
    where
        F: FnOnce(&S) -> bool,
    {
        self.sessions.remove_if(key, |_, s| pred(s)).map(|(_, s)| s)
    }

    /// Keep only the sessions matching `keep`.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&K, &S) -> bool,
    {
        self.sessions.retain(|k, s| keep(k, s));
    }

    /// Snapshot of every session.
    pub fn sessions(&self) -> Vec<(K, S)> {
        self.sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Return `true` if there is no session.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<K, S> Default for SessionManager<K, S>
where
    K: Eq + Hash + Clone,
    S: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> fmt::Debug for SessionManager<K, S>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
