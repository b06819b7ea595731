use crate::config::BOILERPLATE_MARKER;
use crate::models::{Citation, Event, FactKind, FactRecord, Family, Name, Person, TitleRef};
use serde::Deserialize;
use tracing::{debug, warn};

/// Structured facts block and trailing narrative of one page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitBody<'a> {
    pub facts: &'a str,
    pub text: String,
}

/// Markup skipped whole by the boundary scan: (opener, terminator)
const OPAQUE_SECTIONS: [(&[u8], &[u8]); 2] = [(b"<!--", b"-->"), (b"<![CDATA[", b"]]>")];

#[derive(Clone, Copy)]
enum ScanState {
    Structured,
    InTag { start: usize, quote: Option<u8> },
}

/// Byte offset just past the first tag that closes the facts block:
/// `</person>`, `</family>`, `<person/>` or `<family/>`, any case.
///
/// Quoted attribute values are skipped so a `>` or a closing tag inside an
/// attribute does not end the block. Comments and CDATA sections are opaque.
pub fn facts_boundary(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut state = ScanState::Structured;
    let mut i = 0;
    'scan: while i < bytes.len() {
        match state {
            ScanState::Structured => {
                i += memchr::memchr(b'<', &bytes[i..])?;
                for (open, close) in OPAQUE_SECTIONS {
                    if bytes[i..].starts_with(open) {
                        let from = i + open.len();
                        i = from + memchr::memmem::find(&bytes[from..], close)? + close.len();
                        continue 'scan;
                    }
                }
                state = ScanState::InTag { start: i, quote: None };
            }
            ScanState::InTag { start, quote: Some(q) } => {
                if bytes[i] == q {
                    state = ScanState::InTag { start, quote: None };
                }
            }
            ScanState::InTag { start, quote: None } => match bytes[i] {
                b'"' | b'\'' => {
                    state = ScanState::InTag { start, quote: Some(bytes[i]) };
                }
                b'<' => {
                    state = ScanState::InTag { start: i, quote: None };
                }
                b'>' => {
                    if closes_facts(&bytes[start + 1..i]) {
                        return Some(i + 1);
                    }
                    state = ScanState::Structured;
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// `inner` is the tag content between `<` and `>`.
fn closes_facts(inner: &[u8]) -> bool {
    let inner = inner.trim_ascii();
    let name = if let Some(rest) = inner.strip_prefix(b"/") {
        rest.trim_ascii()
    } else if let Some(rest) = inner.strip_suffix(b"/") {
        let rest = rest.trim_ascii();
        let end = rest
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(rest.len());
        &rest[..end]
    } else {
        return false;
    };
    name.eq_ignore_ascii_case(b"person") || name.eq_ignore_ascii_case(b"family")
}

/// Splits a page body at the end of its facts block.
///
/// Without a boundary the whole body is narrative and the facts are empty.
pub fn split_facts(body: &str) -> SplitBody<'_> {
    let (facts, rest) = match facts_boundary(body) {
        Some(pos) => body.split_at(pos),
        None => {
            warn!(len = body.len(), "No facts block boundary in page body");
            ("", body)
        }
    };
    SplitBody {
        facts,
        text: clean_text(rest),
    }
}

fn clean_text(text: &str) -> String {
    text.replace(BOILERPLATE_MARKER, "")
        .trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
        .to_string()
}

/// Union of the person and family layouts; the namespace decides which
/// fields are kept.
#[derive(Debug, Default, Deserialize)]
struct RawFacts {
    #[serde(default)]
    name: Name,
    #[serde(default)]
    gender: String,
    #[serde(default)]
    event_fact: Vec<Event>,
    #[serde(default)]
    source_citation: Vec<Citation>,
    #[serde(default)]
    child_of_family: Vec<TitleRef>,
    #[serde(default)]
    spouse_of_family: Vec<TitleRef>,
    #[serde(default)]
    child: Vec<TitleRef>,
    #[serde(default)]
    husband: Vec<TitleRef>,
    #[serde(default)]
    wife: Vec<TitleRef>,
}

impl RawFacts {
    fn into_record(self, kind: FactKind, text: String) -> FactRecord {
        match kind {
            FactKind::Person => FactRecord::Person(Person {
                name: self.name,
                gender: self.gender,
                events: self.event_fact,
                citations: self.source_citation,
                child_of_family: self.child_of_family,
                spouse_of_family: self.spouse_of_family,
                text,
            }),
            FactKind::Family => FactRecord::Family(Family {
                child: self.child,
                husband: self.husband,
                wife: self.wife,
                citations: self.source_citation,
                text,
            }),
        }
    }
}

/// Decodes a facts block into the record for `kind`, attaching `text`.
///
/// Returns `Err` with an empty record of the same kind when the block is
/// missing or malformed, so callers can count the failure and carry on.
pub fn parse_facts(kind: FactKind, facts: &str, text: String) -> Result<FactRecord, FactRecord> {
    if facts.trim().is_empty() {
        return Err(FactRecord::empty(kind));
    }
    match quick_xml::de::from_str::<RawFacts>(facts) {
        Ok(raw) => Ok(raw.into_record(kind, text)),
        Err(e) => {
            warn!(error = %e, ?kind, "Failed to parse facts block");
            debug!(facts, "Rejected facts block");
            Err(FactRecord::empty(kind))
        }
    }
}

/// Splits and parses a whole page body in one step.
pub fn page_facts(kind: FactKind, body: &str) -> Result<FactRecord, FactRecord> {
    let split = split_facts(body);
    parse_facts(kind, split.facts, split.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_person_block() {
        let split = split_facts("<person><name given=\"A\"/></person>Some bio text.\n");
        assert_eq!(split.facts, "<person><name given=\"A\"/></person>");
        assert_eq!(split.text, "Some bio text.");
    }

    #[test]
    fn split_is_case_insensitive_and_spans_lines() {
        let body = "<FAMILY>\n<child title=\"A\"/>\n</Family>\n\nNotes";
        let split = split_facts(body);
        assert_eq!(split.facts, "<FAMILY>\n<child title=\"A\"/>\n</Family>");
        assert_eq!(split.text, "Notes");
    }

    #[test]
    fn split_self_closing_block() {
        let split = split_facts("<person/>\nJust text");
        assert_eq!(split.facts, "<person/>");
        assert_eq!(split.text, "Just text");
    }

    #[test]
    fn split_self_closing_with_attributes() {
        let split = split_facts("<family id=\"3\" />rest");
        assert_eq!(split.facts, "<family id=\"3\" />");
        assert_eq!(split.text, "rest");
    }

    #[test]
    fn split_takes_earliest_boundary() {
        let body = "<person></person>text mentioning </person> again";
        let split = split_facts(body);
        assert_eq!(split.facts, "<person></person>");
        assert_eq!(split.text, "text mentioning </person> again");
    }

    #[test]
    fn split_ignores_closing_tag_inside_quotes() {
        let body = "<person><event_fact place=\"a > </person>\"/></person>tail";
        let split = split_facts(body);
        assert_eq!(split.facts, "<person><event_fact place=\"a > </person>\"/></person>");
        assert_eq!(split.text, "tail");
    }

    #[test]
    fn split_without_boundary_is_all_text() {
        let split = split_facts("  plain narrative\t\n");
        assert_eq!(split.facts, "");
        assert_eq!(split.text, "plain narrative");
    }

    #[test]
    fn split_removes_boilerplate_marker() {
        let split = split_facts("<person/>\n<show_sources_images_notes/>\nStory");
        assert_eq!(split.text, "Story");
    }

    #[test]
    fn split_skips_quotes_inside_comments() {
        let body = "<person><!-- don't --><gender>M</gender></person>\nBio";
        assert_eq!(facts_boundary(body), Some(49));
        let split = split_facts(body);
        assert!(split.facts.ends_with("</person>"));
        assert_eq!(split.text, "Bio");
    }

    #[test]
    fn split_skips_closing_tag_inside_comment() {
        let facts = "<family><!-- </family> --><child title=\"A\"/></family>";
        assert_eq!(facts_boundary(&format!("{}\nNotes", facts)), Some(facts.len()));
    }

    #[test]
    fn split_skips_cdata_sections() {
        let facts = "<person><![CDATA[it's \"</person>\"]]><gender>F</gender></person>";
        assert_eq!(facts_boundary(&format!("{} tail", facts)), Some(facts.len()));
    }

    #[test]
    fn unterminated_comment_has_no_boundary() {
        assert_eq!(facts_boundary("<person><!-- open </person>"), None);
    }

    #[test]
    fn split_ignores_other_self_closing_tags() {
        assert_eq!(facts_boundary("<person><name/>"), None);
        assert_eq!(facts_boundary("<personal/>"), None);
    }

    #[test]
    fn parse_person_block() {
        let body = r#"<person>
<name given="John" surname="Jones"/>
<gender>M</gender>
<event_fact type="Birth" date="1 Jan 1900" place="Town, USA" sources="S1"/>
<source_citation id="S1" title="Source:Census">page 4</source_citation>
<event_fact type="Death" date="1970" place="City, Canada"/>
<child_of_family title="Smith-1"/>
<spouse_of_family title="Jones-3"/>
</person>
Lived a long life."#;
        let record = page_facts(FactKind::Person, body).unwrap();
        let FactRecord::Person(p) = record else {
            panic!("expected person");
        };
        assert_eq!(p.name.given, "John");
        assert_eq!(p.name.surname, "Jones");
        assert_eq!(p.gender, "M");
        assert_eq!(p.events.len(), 2);
        assert_eq!(p.events[0].kind, "Birth");
        assert_eq!(p.events[0].place, "Town, USA");
        assert_eq!(p.events[1].place, "City, Canada");
        assert_eq!(p.citations[0].title, "Source:Census");
        assert_eq!(p.child_of_family[0].title, "Smith-1");
        assert_eq!(p.spouse_of_family[0].title, "Jones-3");
        assert_eq!(p.text, "Lived a long life.");
    }

    #[test]
    fn parse_family_block() {
        let body = r#"<family>
<husband title="John Smith (1)"/>
<wife title="Mary Roe (2)"/>
<child title="Ann Smith (3)"/>
<child title="Bob Smith (4)"/>
</family>"#;
        let record = page_facts(FactKind::Family, body).unwrap();
        let refs: Vec<_> = record.references().collect();
        assert_eq!(
            refs,
            vec!["Ann Smith (3)", "Bob Smith (4)", "John Smith (1)", "Mary Roe (2)"]
        );
        assert_eq!(record.text(), "");
    }

    #[test]
    fn malformed_block_yields_empty_record() {
        let err = parse_facts(FactKind::Person, "<person><name></person>", String::new()).unwrap_err();
        assert_eq!(err, FactRecord::Person(Person::default()));
    }

    #[test]
    fn missing_block_yields_empty_record() {
        let err = page_facts(FactKind::Family, "no facts here").unwrap_err();
        assert_eq!(err, FactRecord::Family(Family::default()));
        assert_eq!(err.references().count(), 0);
    }
}
