//! Generation-scoped in-memory resources.
//!
//! Every build stages its resources under a fresh generation number and
//! installs them in one step, releasing whatever the previous generation held.
//! Addresses embed the generation, so a stale address never resolves to a
//! newer build's content.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

/// URL prefix every resource address starts with.
pub const PREVIEW_PREFIX: &str = "/preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Script,
    Stylesheet,
    Document,
}

impl ResourceKind {
    pub fn content_type(self) -> &'static str {
        match self {
            ResourceKind::Script => "text/javascript; charset=utf-8",
            ResourceKind::Stylesheet => "text/css; charset=utf-8",
            ResourceKind::Document => "text/html; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub body: String,
}

/// Resources staged by one build, not yet visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSet {
    generation: u64,
    entries: BTreeMap<String, Resource>,
}

impl ResourceSet {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stage `body` for project `path`; returns its address.
    pub fn add(&mut self, path: &str, kind: ResourceKind, body: String) -> String {
        let address = address_for(self.generation, path);
        self.entries.insert(address.clone(), Resource { kind, body });
        address
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ResourceStore {
    next_generation: u64,
    live_generation: Option<u64>,
    live: BTreeMap<String, Resource>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a staging set for the next build.
    pub fn stage(&mut self) -> ResourceSet {
        self.next_generation += 1;
        ResourceSet {
            generation: self.next_generation,
            entries: BTreeMap::new(),
        }
    }

    /// Make `set` the live generation. Returns how many resources of the
    /// superseded generation were released.
    pub fn install(&mut self, set: ResourceSet) -> usize {
        let released = self.live.len();
        self.live = set.entries;
        self.live_generation = Some(set.generation);
        debug!(
            generation = set.generation,
            live = self.live.len(),
            released,
            "installed preview resources"
        );
        released
    }

    /// Drop every live resource.
    pub fn release_all(&mut self) -> usize {
        let released = self.live.len();
        self.live.clear();
        self.live_generation = None;
        if released > 0 {
            debug!(released, "released preview resources");
        }
        released
    }

    pub fn get(&self, address: &str) -> Option<&Resource> {
        self.live.get(address)
    }

    pub fn live_generation(&self) -> Option<u64> {
        self.live_generation
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live resources by address.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.live.iter().map(|(address, resource)| (address.as_str(), resource))
    }
}

/// `/preview/{generation}/{path}`.
pub fn address_for(generation: u64, path: &str) -> String {
    format!("{PREVIEW_PREFIX}/{generation}/{}", path.trim_start_matches('/'))
}
