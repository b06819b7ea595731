use serde::Deserialize;

/// One entry of the dump's namespace declaration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRecord {
    pub id: i64,
    pub name: String,
}

/// A page as stored by the index pass. `start..end` are the exact bytes of
/// the `<page>...</page>` element in the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub id: i64,
    pub namespace: i64,
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub country: Option<String>,
}

/// Directed edge: `from` references `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkRecord {
    pub from: i64,
    pub to: i64,
}

/// A page row joined with its namespace name, as visited by the detail pass.
#[derive(Debug, Clone)]
pub struct PageRef {
    pub id: i64,
    pub namespace: String,
    pub name: String,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Event {
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "@date", default)]
    pub date: String,
    #[serde(rename = "@place", default)]
    pub place: String,
    #[serde(rename = "@sources", default)]
    pub sources: String,
    #[serde(rename = "$text", default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Citation {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "$text", default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Name {
    #[serde(rename = "@given", default)]
    pub given: String,
    #[serde(rename = "@surname", default)]
    pub surname: String,
}

/// Cross-reference to another page by bare title.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TitleRef {
    #[serde(rename = "@title", default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub name: Name,
    pub gender: String,
    pub events: Vec<Event>,
    pub citations: Vec<Citation>,
    pub child_of_family: Vec<TitleRef>,
    pub spouse_of_family: Vec<TitleRef>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Family {
    pub child: Vec<TitleRef>,
    pub husband: Vec<TitleRef>,
    pub wife: Vec<TitleRef>,
    pub citations: Vec<Citation>,
    pub text: String,
}

/// Which record a facts block is decoded into, keyed by the source namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    Person,
    Family,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FactRecord {
    Person(Person),
    Family(Family),
}

impl FactRecord {
    pub fn empty(kind: FactKind) -> Self {
        match kind {
            FactKind::Person => FactRecord::Person(Person::default()),
            FactKind::Family => FactRecord::Family(Family::default()),
        }
    }

    /// Narrative text that followed the facts block.
    pub fn text(&self) -> &str {
        match self {
            FactRecord::Person(p) => &p.text,
            FactRecord::Family(f) => &f.text,
        }
    }

    /// Every cross-reference title, in document field order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        let lists: [&[TitleRef]; 3] = match self {
            FactRecord::Person(p) => [&p.child_of_family, &p.spouse_of_family, &[]],
            FactRecord::Family(f) => [&f.child, &f.husband, &f.wife],
        };
        lists
            .into_iter()
            .flat_map(|refs| refs.iter())
            .map(|r| r.title.as_str())
    }
}
