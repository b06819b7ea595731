use crate::config::PERSON_NAMESPACE;
use crate::country::CountryTable;
use anyhow::{Context, Result};
use csv::Writer;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct NamespaceCount<'a> {
    namespace: &'a str,
    count: u64,
}

#[derive(Debug, Serialize)]
struct CountryPopulation<'a> {
    country: &'a str,
    name: &'a str,
    population: u64,
}

#[derive(Debug, Serialize)]
struct PageOffset<'a> {
    title: &'a str,
    start: u64,
    end: u64,
}

fn namespace_label(name: Option<String>, id: i64) -> String {
    match name {
        Some(n) if n.is_empty() => "(main)".to_string(),
        Some(n) => n,
        None => format!("(unknown {})", id),
    }
}

/// Page totals per namespace, largest first, followed by a `TOTAL` row.
/// Returns the number of namespace rows written.
pub fn namespace_totals<W: Write>(conn: &Connection, out: W) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            "SELECT pages.namespace, namespaces.name, COUNT(*) AS n
             FROM pages LEFT JOIN namespaces ON namespaces.id = pages.namespace
             GROUP BY pages.namespace
             ORDER BY n DESC, pages.namespace",
        )
        .context("Failed to prepare namespace totals")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)? as u64,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut writer = Writer::from_writer(out);
    let mut total = 0;
    for (id, name, count) in &rows {
        let label = namespace_label(name.clone(), *id);
        writer.serialize(NamespaceCount { namespace: &label, count: *count })?;
        total += count;
    }
    writer.serialize(NamespaceCount { namespace: "TOTAL", count: total })?;
    writer.flush().context("Failed to write namespace totals")?;
    Ok(rows.len())
}

/// Person pages per assigned country code, largest first.
pub fn country_population<W: Write>(conn: &Connection, table: &CountryTable, out: W) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            "SELECT pages.country, COUNT(*) AS n
             FROM pages JOIN namespaces ON namespaces.id = pages.namespace
             WHERE namespaces.name = ?1 AND pages.country IS NOT NULL AND pages.country != ''
             GROUP BY pages.country
             ORDER BY n DESC, pages.country",
        )
        .context("Failed to prepare country population")?;
    let rows = stmt
        .query_map(params![PERSON_NAMESPACE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut writer = Writer::from_writer(out);
    for (code, population) in &rows {
        writer.serialize(CountryPopulation {
            country: code,
            name: table.name_for(code).unwrap_or(""),
            population: *population,
        })?;
    }
    writer.flush().context("Failed to write country population")?;
    Ok(rows.len())
}

/// Full title and byte range of every page, in id order.
pub fn page_offsets<W: Write>(conn: &Connection, out: W) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            r#"SELECT namespaces.name, pages.name, pages.start, pages."end"
               FROM pages LEFT JOIN namespaces ON namespaces.id = pages.namespace
               ORDER BY pages.id"#,
        )
        .context("Failed to prepare offsets query")?;
    let mut rows = stmt.query([])?;
    let mut writer = Writer::from_writer(out);
    let mut written = 0;
    while let Some(row) = rows.next()? {
        let ns: Option<String> = row.get(0)?;
        let name: String = row.get(1)?;
        let title = match ns.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{}:{}", ns, name),
            _ => name,
        };
        writer.serialize(PageOffset {
            title: &title,
            start: row.get::<_, i64>(2)? as u64,
            end: row.get::<_, i64>(3)? as u64,
        })?;
        written += 1;
    }
    writer.flush().context("Failed to write offsets")?;
    Ok(written)
}
