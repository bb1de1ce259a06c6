// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Browser-context persisted state.
//!
//! Cookies are keyed by (name, domain, path) the way a browser keys them,
//! which is why deletion has a broadened variant: clearing a cookie whose
//! origin attributes are unknown means deleting every variant of the name.

use dashmap::DashMap;
use std::sync::Arc;

/// Marker preserved across the sign-out storage wipe so interleaved auth
/// events can tell a logout is in progress.
pub const LOGGING_OUT_KEY: &str = "logging-out";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CookieKey {
    name: String,
    domain: Option<String>,
    path: String,
}

/// Cookie store for one browser context.
#[derive(Default)]
pub struct CookieStore {
    cookies: DashMap<CookieKey, String>,
}

impl CookieStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set a host-only cookie at path `/`.
    pub fn set(&self, name: &str, value: &str) {
        self.set_with(name, value, None, "/");
    }

    /// Set a cookie with explicit domain/path attributes.
    pub fn set_with(&self, name: &str, value: &str, domain: Option<&str>, path: &str) {
        self.cookies.insert(
            CookieKey {
                name: name.to_string(),
                domain: domain.map(String::from),
                path: path.to_string(),
            },
            value.to_string(),
        );
    }

    /// Read a cookie by name, whichever variant matches first.
    pub fn get(&self, name: &str) -> Option<String> {
        self.cookies
            .iter()
            .find(|entry| entry.key().name == name)
            .map(|entry| entry.value().clone())
    }

    /// Delete the default (host-only, `/`) variant of a cookie.
    pub fn delete(&self, name: &str) {
        self.cookies.remove(&CookieKey {
            name: name.to_string(),
            domain: None,
            path: "/".to_string(),
        });
    }

    /// Delete every variant of a cookie across domains and paths.
    pub fn delete_everywhere(&self, name: &str) {
        self.cookies.retain(|key, _| key.name != name);
    }

    /// All cookie names currently present.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cookies
            .iter()
            .map(|entry| entry.key().name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Enumerate and delete everything. Sign-out teardown.
    pub fn clear_all(&self) {
        for name in self.names() {
            self.delete_everywhere(&name);
        }
    }
}

/// Local storage for one browser context. Transient UI state only.
#[derive(Default)]
pub struct LocalStorage {
    items: DashMap<String, String>,
}

impl LocalStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.items.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.items.remove(key);
    }

    /// Wholesale clear, keeping only the named keys.
    pub fn clear_preserving(&self, keep: &[&str]) {
        self.items.retain(|key, _| keep.contains(&key.as_str()));
    }
}
