// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Event channels the state container subscribes to.
//!
//! Two feeds exist: auth-state transitions (sign-in here or elsewhere,
//! token refresh, sign-out) and row-change pushes scoped to the current
//! user's profile and subscription rows. Any push triggers a wholesale
//! re-fetch rather than an incremental merge; per-user event frequency is
//! low enough that correctness wins over efficiency.

use crate::models::{Identity, Session};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Auth-state transition.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn { user: Identity, session: Session },
    TokenRefreshed { session: Session },
    SignedOut,
}

/// Which row a change push refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedTable {
    Profiles,
    Subscriptions,
}

/// Row-change push from the live feed.
#[derive(Debug, Clone)]
pub struct RowChange {
    pub table: ChangedTable,
    pub user_id: String,
}

/// Broadcast handle for auth-state transitions.
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Emit an event. No receivers is fine (container disposed).
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }
}

/// Broadcast handle for the row-change push feed.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<RowChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, change: RowChange) {
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RowChange> {
        self.tx.subscribe()
    }
}
