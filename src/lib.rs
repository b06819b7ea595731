//! Kindex: WeRelate dump indexing and family-graph linking into SQLite
//!
//! This crate loads a WeRelate genealogy wiki XML dump into a relational store
//! in two passes over the same uncompressed file:
//!
//! 1. **Index Pass** -- Stream the dump once, record the namespace
//!    declarations and, for every page, its namespace, name and the exact byte
//!    range of its `<page>` element
//! 2. **Detail Pass** -- Walk the indexed pages in id order, seek to each
//!    Person and Family page, parse its structured facts, infer a country for
//!    people and insert Person/Family link edges
//!
//! Each pass runs in a single transaction; a fatal error in either pass
//! leaves the earlier committed pass intact.
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming XML scanner reporting page byte ranges
//! - [`namespace`] -- Title prefix splitting and the namespace lookup table
//! - [`fragment`] -- Random-access page reads and redirect detection
//! - [`facts`] -- Facts/narrative split and typed fact parsing
//! - [`country`] -- Place normalization and country inference
//! - [`store`] -- SQLite schema, inserts, link resolution and queries
//! - [`index`] -- Index pass driver
//! - [`extract`] -- Detail pass driver
//! - [`report`] -- CSV reports over a loaded store
//! - [`models`] -- Core data types (PageRecord, FactRecord, Person, Family)
//! - [`stats`] -- Counters for both passes
//! - [`config`] -- Constants and load settings
//!
//! # Example Usage
//!
//! ```bash
//! # Index and link in one go, starting from empty tables
//! kindex load --db werelate.db --dump pages.xml --clean
//!
//! # Re-run only the detail pass against an existing index
//! kindex detail --db werelate.db --dump pages.xml
//!
//! # Person counts per country
//! kindex report countries --db werelate.db > countries.csv
//! ```

pub mod config;
pub mod country;
pub mod extract;
pub mod facts;
pub mod fragment;
pub mod index;
pub mod models;
pub mod namespace;
pub mod parser;
pub mod report;
pub mod stats;
pub mod store;
