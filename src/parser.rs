use crate::models::NamespaceRecord;
use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const READ_BUFFER: usize = 256 * 1024;

enum Found {
    Page { tag_len: u64 },
    Namespaces,
    Eof,
    Other,
}

/// A page element located by the scanner. `start..end` covers the bytes from
/// the `<` of `<page>` through the `>` of `</page>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPage {
    pub title: String,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpItem {
    Namespaces(Vec<NamespaceRecord>),
    Page(ScannedPage),
}

/// Forward-only scanner over a dump. Yields the namespace declarations and
/// one item per page in document order without keeping page bodies.
///
/// Any token error ends the iteration after yielding it.
pub struct DumpScanner<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl DumpScanner<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dump file: {}", path.display()))?;
        Ok(Self::from_reader(BufReader::with_capacity(READ_BUFFER, file)))
    }
}

impl<R: BufRead> DumpScanner<R> {
    pub fn from_reader(inner: R) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::new(),
            done: false,
        }
    }

    fn offset(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn next_item(&mut self) -> Result<Option<DumpItem>> {
        loop {
            self.buf.clear();
            let found = match self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| format!("XML error near byte {}", self.reader.buffer_position()))?
            {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"page" => Found::Page { tag_len: raw_tag_len(&e) },
                    b"namespaces" => Found::Namespaces,
                    _ => Found::Other,
                },
                Event::Eof => Found::Eof,
                _ => Found::Other,
            };
            match found {
                Found::Page { tag_len } => {
                    let start = self
                        .offset()
                        .checked_sub(tag_len)
                        .context("Page start tag ends before it begins")?;
                    let title = self.read_page()?;
                    let end = self.offset();
                    return Ok(Some(DumpItem::Page(ScannedPage { title, start, end })));
                }
                Found::Namespaces => {
                    return Ok(Some(DumpItem::Namespaces(self.read_namespaces()?)));
                }
                Found::Eof => return Ok(None),
                Found::Other => {}
            }
        }
    }

    /// Consumes the rest of a `<page>` subtree, returning its title.
    fn read_page(&mut self) -> Result<String> {
        let mut depth = 1usize;
        let mut in_title = false;
        let mut title = String::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    depth += 1;
                    in_title = depth == 2 && e.local_name().as_ref() == b"title";
                }
                Event::End(_) => {
                    depth -= 1;
                    in_title = false;
                    if depth == 0 {
                        return Ok(title);
                    }
                }
                Event::Text(t) if in_title => title.push_str(&t.unescape()?),
                Event::CData(c) if in_title => {
                    title.push_str(&String::from_utf8_lossy(&c.into_inner()))
                }
                Event::Eof => bail!("Unexpected end of dump inside <page>"),
                _ => {}
            }
        }
    }

    /// Decodes `<namespace key="..">name</namespace>` entries up to `</namespaces>`.
    fn read_namespaces(&mut self) -> Result<Vec<NamespaceRecord>> {
        let mut records = Vec::new();
        let mut current: Option<NamespaceRecord> = None;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"namespace" => {
                    current = Some(NamespaceRecord {
                        id: namespace_key(&e)?,
                        name: String::new(),
                    });
                }
                Event::Empty(e) if e.local_name().as_ref() == b"namespace" => {
                    records.push(NamespaceRecord {
                        id: namespace_key(&e)?,
                        name: String::new(),
                    });
                }
                Event::Text(t) => {
                    if let Some(ns) = current.as_mut() {
                        ns.name.push_str(&t.unescape()?);
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"namespace" => records.extend(current.take()),
                    b"namespaces" => return Ok(records),
                    _ => {}
                },
                Event::Eof => bail!("Unexpected end of dump inside <namespaces>"),
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for DumpScanner<R> {
    type Item = Result<DumpItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Length of the start tag as it appeared in the input, angle brackets included.
fn raw_tag_len(e: &BytesStart<'_>) -> u64 {
    e.len() as u64 + 2
}

fn namespace_key(e: &BytesStart<'_>) -> Result<i64> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"key" {
            let value = attr.unescape_value()?;
            return value
                .trim()
                .parse()
                .with_context(|| format!("Invalid namespace key: {}", value));
        }
    }
    bail!("Namespace declaration without a key attribute")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DUMP: &str = r#"<mediawiki>
  <siteinfo>
    <namespaces>
      <namespace key="0" case="first-letter" />
      <namespace key="1" case="first-letter">Talk</namespace>
      <namespace key="108" case="first-letter">Person</namespace>
    </namespaces>
  </siteinfo>
  <page>
    <title>Person:Ann &amp; Bob</title>
    <revision><text xml:space="preserve">&lt;person/&gt;</text></revision>
  </page>
  <page>
    <title>Main Page</title>
    <revision><text xml:space="preserve">Welcome</text></revision>
  </page>
</mediawiki>"#;

    fn scan(xml: &str) -> Vec<DumpItem> {
        DumpScanner::from_reader(Cursor::new(xml.as_bytes()))
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    fn pages(items: &[DumpItem]) -> Vec<&ScannedPage> {
        items
            .iter()
            .filter_map(|i| match i {
                DumpItem::Page(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn namespaces_come_first() {
        let items = scan(DUMP);
        match &items[0] {
            DumpItem::Namespaces(ns) => {
                assert_eq!(ns.len(), 3);
                assert_eq!(ns[0], NamespaceRecord { id: 0, name: String::new() });
                assert_eq!(ns[2], NamespaceRecord { id: 108, name: "Person".into() });
            }
            other => panic!("expected namespaces, got {:?}", other),
        }
    }

    #[test]
    fn page_titles_are_unescaped() {
        let items = scan(DUMP);
        let titles: Vec<_> = pages(&items).iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Person:Ann & Bob", "Main Page"]);
    }

    #[test]
    fn offsets_cover_exact_page_element() {
        let items = scan(DUMP);
        for page in pages(&items) {
            let slice = &DUMP[page.start as usize..page.end as usize];
            assert!(slice.starts_with("<page>"), "bad start: {:?}", slice);
            assert!(slice.ends_with("</page>"), "bad end: {:?}", slice);
        }
    }

    #[test]
    fn offsets_are_increasing_and_disjoint() {
        let items = scan(DUMP);
        let pages = pages(&items);
        for pair in pages.windows(2) {
            assert!(pair[0].start < pair[0].end);
            assert!(pair[0].end <= pair[1].start);
        }
        assert!(pages.last().unwrap().end as usize <= DUMP.len());
    }

    #[test]
    fn start_tag_with_attributes_is_measured() {
        let xml = "<mediawiki><page  lang=\"en\"><title>X</title></page></mediawiki>";
        let items = scan(xml);
        let page = pages(&items)[0].clone();
        assert_eq!(&xml[page.start as usize..page.end as usize], "<page  lang=\"en\"><title>X</title></page>");
    }

    #[test]
    fn truncated_dump_is_an_error() {
        let xml = "<mediawiki><page><title>X</title>";
        let result: Result<Vec<_>> = DumpScanner::from_reader(Cursor::new(xml.as_bytes())).collect();
        assert!(result.is_err());
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(scan("<mediawiki></mediawiki>").is_empty());
    }
}
