use crate::models::{LinkRecord, NamespaceRecord, PageRecord, PageRef};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, Statement, Transaction};
use std::path::Path;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS namespaces (
    id INTEGER,
    name TEXT
);
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER,
    namespace INTEGER,
    name TEXT,
    start INTEGER,
    "end" INTEGER,
    country TEXT
);
CREATE TABLE IF NOT EXISTS links (
    from_id INTEGER,
    to_id INTEGER
);
CREATE INDEX IF NOT EXISTS idx_pages_id ON pages(id);
CREATE INDEX IF NOT EXISTS idx_pages_namespace_name ON pages(namespace, name);
"#;

/// Pages in id order with their namespace names, as walked by the detail pass.
const PAGE_WALK_SQL: &str = r#"SELECT pages.id, namespaces.name, pages.name, pages.start, pages."end"
    FROM pages JOIN namespaces ON namespaces.id = pages.namespace
    ORDER BY pages.id"#;

/// SQLite store holding `namespaces`, `pages` and `links`.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store: {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn ensure_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to create schema")
    }

    /// Deletes every row from the three tables.
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM links; DELETE FROM pages; DELETE FROM namespaces;")
            .context("Failed to clear store")?;
        info!("Store cleared");
        Ok(())
    }

    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction()
            .context("Failed to start transaction")
    }

    pub fn page_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
            .context("Failed to count pages")?;
        Ok(n as u64)
    }

    pub fn namespaces(&self) -> Result<Vec<NamespaceRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM namespaces ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(NamespaceRecord {
                    id: row.get(0)?,
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn pages(&self) -> Result<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT id, namespace, name, start, "end", country FROM pages ORDER BY id"#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PageRecord {
                    id: row.get(0)?,
                    namespace: row.get(1)?,
                    name: row.get(2)?,
                    start: row.get::<_, i64>(3)? as u64,
                    end: row.get::<_, i64>(4)? as u64,
                    country: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn links(&self) -> Result<Vec<LinkRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT from_id, to_id FROM links ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LinkRecord {
                    from: row.get(0)?,
                    to: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

/// Prepared inserts for the index pass.
pub struct IndexWriter<'tx> {
    insert_namespace: Statement<'tx>,
    insert_page: Statement<'tx>,
}

impl<'tx> IndexWriter<'tx> {
    pub fn new(tx: &'tx Transaction<'_>) -> Result<Self> {
        Ok(Self {
            insert_namespace: tx
                .prepare("INSERT INTO namespaces (id, name) VALUES (?1, ?2)")
                .context("Failed to prepare namespace insert")?,
            insert_page: tx
                .prepare(
                    r#"INSERT INTO pages (id, namespace, name, start, "end") VALUES (?1, ?2, ?3, ?4, ?5)"#,
                )
                .context("Failed to prepare page insert")?,
        })
    }

    pub fn insert_namespace(&mut self, ns: &NamespaceRecord) -> rusqlite::Result<()> {
        self.insert_namespace.execute(params![ns.id, ns.name])?;
        Ok(())
    }

    pub fn insert_page(&mut self, page: &PageRecord) -> rusqlite::Result<()> {
        self.insert_page.execute(params![
            page.id,
            page.namespace,
            page.name,
            page.start as i64,
            page.end as i64
        ])?;
        Ok(())
    }
}

/// Prepared statements for the detail pass: country updates and link edges.
pub struct DetailWriter<'tx> {
    set_country: Statement<'tx>,
    insert_link: Statement<'tx>,
}

impl<'tx> DetailWriter<'tx> {
    pub fn new(conn: &'tx Connection) -> Result<Self> {
        Ok(Self {
            set_country: conn
                .prepare("UPDATE pages SET country = ?1 WHERE id = ?2")
                .context("Failed to prepare country update")?,
            insert_link: conn
                .prepare(
                    "INSERT INTO links (from_id, to_id)
                     SELECT ?1, id FROM pages WHERE namespace = ?2 AND name = ?3",
                )
                .context("Failed to prepare link insert")?,
        })
    }

    pub fn set_country(&mut self, page_id: i64, code: &str) -> rusqlite::Result<()> {
        self.set_country.execute(params![code, page_id])?;
        Ok(())
    }

    /// Adds an edge from `from` to every stored page in `namespace` named
    /// exactly `title`. Returns the number of edges added; zero means the
    /// reference is dangling.
    pub fn link(&mut self, from: i64, namespace: i64, title: &str) -> rusqlite::Result<usize> {
        self.insert_link.execute(params![from, namespace, title])
    }
}

/// Streams `PageRef`s in ascending id order to `visit`.
pub fn walk_pages<F>(conn: &Connection, mut visit: F) -> Result<()>
where
    F: FnMut(PageRef) -> Result<()>,
{
    let mut stmt = conn
        .prepare(PAGE_WALK_SQL)
        .context("Failed to prepare page walk")?;
    let mut rows = stmt.query([]).context("Failed to query pages")?;
    while let Some(row) = rows.next().context("Failed to read page row")? {
        let page = PageRef {
            id: row.get(0)?,
            namespace: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            name: row.get(2)?,
            start: row.get::<_, i64>(3)? as u64,
            end: row.get::<_, i64>(4)? as u64,
        };
        visit(page)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        let tx = store.begin().unwrap();
        {
            let mut writer = IndexWriter::new(&tx).unwrap();
            for (id, name) in [(0, ""), (108, "Person"), (110, "Family")] {
                writer
                    .insert_namespace(&NamespaceRecord { id, name: name.to_string() })
                    .unwrap();
            }
            let pages = [(5, 108, "Jones-2"), (9, 110, "Roe-3"), (10, 0, "Roe-3")];
            for (i, (id, ns, name)) in pages.into_iter().enumerate() {
                writer
                    .insert_page(&PageRecord {
                        id,
                        namespace: ns,
                        name: name.to_string(),
                        start: i as u64 * 100,
                        end: i as u64 * 100 + 50,
                        country: None,
                    })
                    .unwrap();
            }
        }
        tx.commit().unwrap();
        store
    }

    #[test]
    fn schema_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.page_count().unwrap(), 0);
    }

    #[test]
    fn resolved_link_inserts_one_edge() {
        let store = seeded();
        let mut writer = DetailWriter::new(store.connection()).unwrap();
        assert_eq!(writer.link(5, 110, "Roe-3").unwrap(), 1);
        drop(writer);
        assert_eq!(store.links().unwrap(), vec![LinkRecord { from: 5, to: 9 }]);
    }

    #[test]
    fn dangling_link_inserts_nothing() {
        let store = seeded();
        let mut writer = DetailWriter::new(store.connection()).unwrap();
        assert_eq!(writer.link(5, 110, "Doe-12").unwrap(), 0);
        drop(writer);
        assert!(store.links().unwrap().is_empty());
    }

    #[test]
    fn link_matches_namespace_and_exact_case() {
        let store = seeded();
        let mut writer = DetailWriter::new(store.connection()).unwrap();
        assert_eq!(writer.link(5, 108, "Roe-3").unwrap(), 0);
        assert_eq!(writer.link(5, 110, "roe-3").unwrap(), 0);
    }

    #[test]
    fn repeated_links_are_kept() {
        let store = seeded();
        let mut writer = DetailWriter::new(store.connection()).unwrap();
        writer.link(5, 110, "Roe-3").unwrap();
        writer.link(5, 110, "Roe-3").unwrap();
        drop(writer);
        assert_eq!(store.links().unwrap().len(), 2);
    }

    #[test]
    fn country_update_targets_one_page() {
        let store = seeded();
        let mut writer = DetailWriter::new(store.connection()).unwrap();
        writer.set_country(5, "US").unwrap();
        drop(writer);
        let pages = store.pages().unwrap();
        assert_eq!(pages[0].country.as_deref(), Some("US"));
        assert_eq!(pages[1].country, None);
    }

    #[test]
    fn walk_joins_namespace_names_in_id_order() {
        let store = seeded();
        let mut seen = Vec::new();
        walk_pages(store.connection(), |p| {
            seen.push((p.id, p.namespace, p.name));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (5, "Person".to_string(), "Jones-2".to_string()),
                (9, "Family".to_string(), "Roe-3".to_string()),
                (10, String::new(), "Roe-3".to_string()),
            ]
        );
    }

    #[test]
    fn uncommitted_transaction_rolls_back() {
        let mut store = seeded();
        {
            let tx = store.begin().unwrap();
            let mut writer = IndexWriter::new(&tx).unwrap();
            writer
                .insert_page(&PageRecord {
                    id: 11,
                    namespace: 0,
                    name: "Lost".to_string(),
                    start: 500,
                    end: 600,
                    country: None,
                })
                .unwrap();
        }
        assert_eq!(store.page_count().unwrap(), 3);
    }

    #[test]
    fn clear_empties_tables() {
        let store = seeded();
        store.clear().unwrap();
        assert_eq!(store.page_count().unwrap(), 0);
        assert!(store.namespaces().unwrap().is_empty());
    }
}
