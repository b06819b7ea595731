use crate::config::REDIRECT_MARKER;
use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

static REDIRECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^\s*{}", regex::escape(REDIRECT_MARKER))).unwrap()
});

/// A single `<page>` element re-read from the dump by byte range.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageFragment {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub redirect: Option<RedirectTag>,
    #[serde(rename = "revision", default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectTag {
    #[serde(rename = "@title", default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Revision {
    #[serde(default)]
    text: BodyText,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BodyText {
    #[serde(rename = "$text", default)]
    value: String,
}

impl PageFragment {
    /// Raw body of the latest revision.
    pub fn text(&self) -> &str {
        self.revisions
            .last()
            .map(|r| r.text.value.as_str())
            .unwrap_or("")
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some() || REDIRECT_REGEX.is_match(self.text())
    }
}

/// Reads exactly `end - start` bytes at `start` and decodes them as a page.
///
/// Takes `&File` so one handle can serve the whole detail pass.
pub fn read_fragment(file: &File, start: u64, end: u64) -> Result<PageFragment> {
    if end <= start {
        bail!("Empty byte range {}..{}", start, end);
    }
    let len = usize::try_from(end - start).context("Byte range too large")?;
    let mut buf = vec![0u8; len];
    let mut handle = file;
    handle
        .seek(SeekFrom::Start(start))
        .with_context(|| format!("Failed to seek to byte {}", start))?;
    handle
        .read_exact(&mut buf)
        .with_context(|| format!("Failed to read bytes {}..{}", start, end))?;
    parse_fragment(&buf)
}

pub fn parse_fragment(bytes: &[u8]) -> Result<PageFragment> {
    let xml = std::str::from_utf8(bytes).context("Page fragment is not valid UTF-8")?;
    quick_xml::de::from_str(xml).context("Failed to parse page fragment")
}
