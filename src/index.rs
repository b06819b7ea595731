use crate::config::PROGRESS_INTERVAL;
use crate::models::PageRecord;
use crate::namespace::NamespaceTable;
use crate::parser::{DumpItem, DumpScanner};
use crate::stats::LoadStats;
use crate::store::{IndexWriter, Store};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info, warn};

/// Index pass: records every page's namespace, name and byte range.
///
/// Runs in one transaction that commits only after the whole dump has been
/// scanned, so a token error leaves the store untouched. Returns the
/// namespace table for the detail pass.
pub fn build_index(store: &mut Store, dump_path: &Path, stats: &LoadStats) -> Result<NamespaceTable> {
    info!("Building index from: {}", dump_path.display());
    let scanner = DumpScanner::open(dump_path)?;
    index_from_scanner(store, scanner, stats)
}

pub fn index_from_scanner<R: BufRead>(
    store: &mut Store,
    scanner: DumpScanner<R>,
    stats: &LoadStats,
) -> Result<NamespaceTable> {
    let existing = store.page_count()?;
    if existing > 0 {
        warn!(existing, "Pages table already populated; indexing again duplicates rows");
    }

    let pb = ProgressBar::new_spinner();
    let mut namespaces = NamespaceTable::default();
    let tx = store.begin()?;
    {
        let mut writer = IndexWriter::new(&tx)?;
        let mut next_id: i64 = 0;

        for item in scanner {
            match item.context("Failed to scan dump")? {
                DumpItem::Namespaces(records) => {
                    for ns in &records {
                        if let Err(e) = writer.insert_namespace(ns) {
                            warn!(id = ns.id, name = %ns.name, error = %e, "Failed to insert namespace");
                            stats.inc_store_errors();
                        }
                    }
                    stats.add_namespaces(records.len() as u64);
                    namespaces = NamespaceTable::from_records(records);
                    info!(count = namespaces.len(), "Namespaces declared");
                }
                DumpItem::Page(page) => {
                    let resolved = namespaces.resolve(&page.title);
                    if !resolved.known {
                        warn!(title = %page.title, "No namespace for page title");
                        stats.inc_unknown_namespaces();
                    }
                    let record = PageRecord {
                        id: next_id,
                        namespace: resolved.namespace,
                        name: resolved.name,
                        start: page.start,
                        end: page.end,
                        country: None,
                    };
                    debug!(id = record.id, ns = record.namespace, name = %record.name, start = record.start, end = record.end, "Indexed page");
                    match writer.insert_page(&record) {
                        Ok(()) => stats.inc_pages_indexed(),
                        Err(e) => {
                            warn!(id = record.id, error = %e, "Failed to insert page");
                            stats.inc_store_errors();
                        }
                    }
                    next_id += 1;
                    if next_id as u64 % PROGRESS_INTERVAL == 0 {
                        pb.set_message(format!("Indexing page {}", next_id));
                        pb.tick();
                    }
                }
            }
        }
    }
    tx.commit().context("Failed to commit index transaction")?;
    pb.finish_and_clear();

    info!(
        pages = stats.pages_indexed(),
        namespaces = namespaces.len(),
        "Index built successfully"
    );
    Ok(namespaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DUMP: &str = r#"<mediawiki>
  <siteinfo>
    <namespaces>
      <namespace key="0" />
      <namespace key="108">Person</namespace>
      <namespace key="110">Family</namespace>
    </namespaces>
  </siteinfo>
  <page><title>Family:Smith-1</title></page>
  <page><title>Person:Jones-2</title></page>
  <page><title>Odd:Prefix</title></page>
</mediawiki>"#;

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    fn index(store: &mut Store, xml: &str, stats: &LoadStats) -> Result<NamespaceTable> {
        index_from_scanner(store, DumpScanner::from_reader(Cursor::new(xml.as_bytes())), stats)
    }

    #[test]
    fn pages_get_sequential_ids_and_namespaces() {
        let mut store = store();
        let stats = LoadStats::new();
        let table = index(&mut store, DUMP, &stats).unwrap();

        assert_eq!(table.id_of("Family"), Some(110));
        let pages = store.pages().unwrap();
        let rows: Vec<_> = pages.iter().map(|p| (p.id, p.namespace, p.name.as_str())).collect();
        assert_eq!(
            rows,
            vec![(0, 110, "Smith-1"), (1, 108, "Jones-2"), (2, 0, "Odd:Prefix")]
        );
        assert!(pages.iter().all(|p| p.country.is_none()));
        assert_eq!(stats.pages_indexed(), 3);
        assert_eq!(store.namespaces().unwrap().len(), 3);
    }

    #[test]
    fn stored_ranges_are_ordered() {
        let mut store = store();
        index(&mut store, DUMP, &LoadStats::new()).unwrap();
        let pages = store.pages().unwrap();
        for pair in pages.windows(2) {
            assert!(pair[0].start < pair[0].end);
            assert!(pair[0].end <= pair[1].start);
        }
        assert!(pages.last().unwrap().end as usize <= DUMP.len());
    }

    #[test]
    fn token_error_commits_nothing() {
        let mut store = store();
        let broken = "<mediawiki><namespaces><namespace key=\"0\" /></namespaces><page><title>A</title></page><page><title>B</title>";
        assert!(index(&mut store, broken, &LoadStats::new()).is_err());
        assert_eq!(store.page_count().unwrap(), 0);
        assert!(store.namespaces().unwrap().is_empty());
    }

    #[test]
    fn rejected_page_is_not_counted_as_indexed() {
        let mut store = store();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_jones BEFORE INSERT ON pages WHEN NEW.name = 'Jones-2'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let stats = LoadStats::new();
        index(&mut store, DUMP, &stats).unwrap();

        let ids: Vec<i64> = store.pages().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(stats.pages_indexed(), 2);
        assert_eq!(stats.store_errors(), 1);
    }

    #[test]
    fn pages_without_declarations_are_unknown() {
        let mut store = store();
        let stats = LoadStats::new();
        index(&mut store, "<mediawiki><page><title>Person:X</title></page></mediawiki>", &stats).unwrap();
        let pages = store.pages().unwrap();
        assert_eq!(pages[0].namespace, crate::config::UNKNOWN_NAMESPACE_ID);
        assert_eq!(stats.summary().unknown_namespaces, 1);
    }
}
