use crate::config::{FAMILY_NAMESPACE, PERSON_NAMESPACE, PROGRESS_INTERVAL};
use crate::country::{infer_country, CountryLookup};
use crate::facts::page_facts;
use crate::fragment::read_fragment;
use crate::models::{FactKind, FactRecord, PageRef};
use crate::namespace::{split_title, NamespaceTable};
use crate::stats::LoadStats;
use crate::store::{walk_pages, DetailWriter, Store};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs::File;
use tracing::{debug, info, trace, warn};

/// Namespace ids the detail pass links against, resolved once up front.
struct LinkTargets {
    person: Option<i64>,
    family: Option<i64>,
}

impl LinkTargets {
    fn new(namespaces: &NamespaceTable) -> Self {
        let person = namespaces.id_of(PERSON_NAMESPACE);
        let family = namespaces.id_of(FAMILY_NAMESPACE);
        if person.is_none() || family.is_none() {
            warn!(
                person = ?person,
                family = ?family,
                "Person or Family namespace not declared; some links cannot resolve"
            );
        }
        Self { person, family }
    }

    /// Namespace that references from a `kind` page point into.
    fn for_references_of(&self, kind: FactKind) -> Option<i64> {
        match kind {
            FactKind::Person => self.family,
            FactKind::Family => self.person,
        }
    }
}

/// Detail pass: re-reads every Person and Family page by its stored byte
/// range, assigns countries and records link edges.
///
/// Runs in one transaction committed after all pages. Per-page failures
/// (unreadable fragment, redirect, malformed facts, a rejected row) are
/// logged, counted and skipped.
pub fn run_extraction(
    store: &mut Store,
    dump: &File,
    namespaces: &NamespaceTable,
    lookup: &impl CountryLookup,
    stats: &LoadStats,
) -> Result<()> {
    let targets = LinkTargets::new(namespaces);
    let pb = ProgressBar::new_spinner();
    let mut visited: u64 = 0;

    info!("Starting detail pass");
    let tx = store.begin()?;
    {
        let mut writer = DetailWriter::new(&tx)?;
        walk_pages(&tx, |page| {
            visited += 1;
            stats.inc_pages_visited();
            if visited % PROGRESS_INTERVAL == 0 {
                pb.set_message(format!("Processing page {}", visited));
                pb.tick();
            }
            process_page(&page, dump, &targets, lookup, &mut writer, stats);
            Ok(())
        })?;
    }
    tx.commit().context("Failed to commit detail transaction")?;
    pb.finish_and_clear();

    let summary = stats.summary();
    info!(
        pages = summary.pages_visited,
        countries = summary.countries_assigned,
        links = summary.links_inserted,
        dangling = summary.dangling_references,
        "Detail pass complete"
    );
    Ok(())
}

fn process_page(
    page: &PageRef,
    dump: &File,
    targets: &LinkTargets,
    lookup: &impl CountryLookup,
    writer: &mut DetailWriter<'_>,
    stats: &LoadStats,
) {
    let kind = match page.namespace.as_str() {
        PERSON_NAMESPACE => FactKind::Person,
        FAMILY_NAMESPACE => FactKind::Family,
        _ => return,
    };
    trace!(id = page.id, ns = %page.namespace, name = %page.name, start = page.start, end = page.end, "Visiting page");

    let fragment = match read_fragment(dump, page.start, page.end) {
        Ok(f) => f,
        Err(e) => {
            warn!(id = page.id, name = %page.name, error = %format!("{:#}", e), "Skipping unreadable page");
            stats.inc_fragments_skipped();
            return;
        }
    };

    if split_title(&fragment.title).1 != page.name && fragment.title != page.name {
        warn!(id = page.id, stored = %page.name, found = %fragment.title, "Fragment title does not match stored page");
        stats.inc_fragments_skipped();
        return;
    }

    if fragment.is_redirect() {
        debug!(id = page.id, name = %page.name, "Skipping redirect page");
        stats.inc_redirects_skipped();
        return;
    }

    let record = match page_facts(kind, fragment.text()) {
        Ok(record) => record,
        Err(empty) => {
            stats.inc_facts_failed();
            empty
        }
    };

    if let FactRecord::Person(person) = &record {
        if let Some(code) = infer_country(person, lookup) {
            match writer.set_country(page.id, &code) {
                Ok(()) => stats.inc_countries(),
                Err(e) => {
                    warn!(id = page.id, error = %e, "Failed to set country");
                    stats.inc_store_errors();
                }
            }
        }
    }

    let Some(target_ns) = targets.for_references_of(kind) else {
        return;
    };
    for title in record.references() {
        match writer.link(page.id, target_ns, title) {
            Ok(0) => {
                trace!(from = page.id, title, "Dangling reference");
                stats.inc_dangling();
            }
            Ok(n) => {
                debug!(from = page.id, title, ns = target_ns, "Linked");
                stats.add_links(n as u64);
            }
            Err(e) => {
                warn!(from = page.id, title, error = %e, "Failed to insert link");
                stats.inc_store_errors();
            }
        }
    }
}
