use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected across the index and detail passes
#[derive(Default)]
pub struct LoadStats {
    pub namespaces_declared: AtomicU64,
    pub pages_indexed: AtomicU64,
    pub unknown_namespaces: AtomicU64,
    pub pages_visited: AtomicU64,
    pub fragments_skipped: AtomicU64,
    pub redirects_skipped: AtomicU64,
    pub facts_failed: AtomicU64,
    pub countries_assigned: AtomicU64,
    pub links_inserted: AtomicU64,
    pub dangling_references: AtomicU64,
    pub store_errors: AtomicU64,
}

/// Plain snapshot of [`LoadStats`] for printing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub namespaces_declared: u64,
    pub pages_indexed: u64,
    pub unknown_namespaces: u64,
    pub pages_visited: u64,
    pub fragments_skipped: u64,
    pub redirects_skipped: u64,
    pub facts_failed: u64,
    pub countries_assigned: u64,
    pub links_inserted: u64,
    pub dangling_references: u64,
    pub store_errors: u64,
}

impl LoadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespaces(&self, count: u64) {
        self.namespaces_declared.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_pages_indexed(&self) {
        self.pages_indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unknown_namespaces(&self) {
        self.unknown_namespaces.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pages_visited(&self) {
        self.pages_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fragments_skipped(&self) {
        self.fragments_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects_skipped(&self) {
        self.redirects_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_facts_failed(&self) {
        self.facts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_countries(&self) {
        self.countries_assigned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_links(&self, count: u64) {
        self.links_inserted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_dangling(&self) {
        self.dangling_references.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_store_errors(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_indexed(&self) -> u64 {
        self.pages_indexed.load(Ordering::Relaxed)
    }

    pub fn store_errors(&self) -> u64 {
        self.store_errors.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> LoadSummary {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        LoadSummary {
            namespaces_declared: get(&self.namespaces_declared),
            pages_indexed: get(&self.pages_indexed),
            unknown_namespaces: get(&self.unknown_namespaces),
            pages_visited: get(&self.pages_visited),
            fragments_skipped: get(&self.fragments_skipped),
            redirects_skipped: get(&self.redirects_skipped),
            facts_failed: get(&self.facts_failed),
            countries_assigned: get(&self.countries_assigned),
            links_inserted: get(&self.links_inserted),
            dangling_references: get(&self.dangling_references),
            store_errors: get(&self.store_errors),
        }
    }
}
