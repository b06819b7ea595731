use std::path::PathBuf;

/// Progress update interval (tick every N pages)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Namespace holding person pages
pub const PERSON_NAMESPACE: &str = "Person";

/// Namespace holding family pages
pub const FAMILY_NAMESPACE: &str = "Family";

/// Stored for pages whose namespace could not be resolved at all
pub const UNKNOWN_NAMESPACE_ID: i64 = -1;

/// Boilerplate token stripped from the narrative text of a page
pub const BOILERPLATE_MARKER: &str = "<show_sources_images_notes/>";

/// Body prefix marking a redirect page (matched case-insensitively)
pub const REDIRECT_MARKER: &str = "#REDIRECT";

/// Inputs for a full load run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub store_path: PathBuf,
    pub dump_path: PathBuf,
    /// Delete existing rows before indexing
    pub clean: bool,
    /// Run `CREATE TABLE IF NOT EXISTS` before touching the store
    pub create_schema: bool,
}
