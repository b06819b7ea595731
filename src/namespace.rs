use crate::config::UNKNOWN_NAMESPACE_ID;
use crate::models::NamespaceRecord;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use rustc_hash::FxHashMap;

static TITLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^([A-Za-z]+(?: talk)?):(.+)$").unwrap());

/// Splits `"Person:John Smith"` into `("Person", "John Smith")`.
///
/// Titles without a `Word:` or `Word talk:` prefix come back unchanged with
/// an empty namespace.
pub fn split_title(title: &str) -> (&str, &str) {
    match TITLE_PREFIX.captures(title) {
        Some(caps) => {
            let ns = caps.get(1).map_or("", |m| m.as_str());
            let rest = caps.get(2).map_or(title, |m| m.as_str());
            (ns, rest)
        }
        None => ("", title),
    }
}

/// Namespace name to id lookup, built once from the dump's declaration block
/// (or reloaded from the store) and passed explicitly to both passes.
#[derive(Debug, Clone, Default)]
pub struct NamespaceTable {
    by_name: FxHashMap<String, i64>,
    records: Vec<NamespaceRecord>,
}

/// Where a page title lands once its prefix has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTitle {
    pub namespace: i64,
    pub name: String,
    /// False when neither the prefix nor the main namespace was declared
    pub known: bool,
}

impl NamespaceTable {
    pub fn from_records(records: Vec<NamespaceRecord>) -> Self {
        let by_name = records.iter().map(|r| (r.name.clone(), r.id)).collect();
        Self { by_name, records }
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn
            .prepare("SELECT id, name FROM namespaces ORDER BY id")
            .context("Failed to prepare namespace query")?;
        let records = stmt
            .query_map([], |row| {
                Ok(NamespaceRecord {
                    id: row.get(0)?,
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read namespaces")?;
        Ok(Self::from_records(records))
    }

    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolves a full page title to a namespace id and stored name.
    ///
    /// A prefix that is not a declared namespace is part of a main-namespace
    /// title, so the full title is kept. Without a declared main namespace
    /// the page gets `UNKNOWN_NAMESPACE_ID`.
    pub fn resolve(&self, title: &str) -> ResolvedTitle {
        let (prefix, bare) = split_title(title);
        if let Some(id) = self.id_of(prefix) {
            return ResolvedTitle {
                namespace: id,
                name: bare.to_string(),
                known: true,
            };
        }
        match self.id_of("") {
            Some(main) => ResolvedTitle {
                namespace: main,
                name: title.to_string(),
                known: true,
            },
            None => ResolvedTitle {
                namespace: UNKNOWN_NAMESPACE_ID,
                name: title.to_string(),
                known: false,
            },
        }
    }
}
