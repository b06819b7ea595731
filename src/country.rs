use crate::models::{Event, Person};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use tracing::trace;

/// Place name to country code collaborator.
pub trait CountryLookup {
    /// Code for a normalized place, or `None` when it is not a known country.
    fn country_code(&self, place: &str) -> Option<String>;
}

/// (code, display name, accepted spellings)
const COUNTRIES: &[(&str, &str, &[&str])] = &[
    ("US", "United States", &["usa", "united states", "united states of america", "u.s.a.", "us", "america"]),
    ("GB", "United Kingdom", &["united kingdom", "uk", "great britain", "england", "scotland", "wales", "northern ireland"]),
    ("IE", "Ireland", &["ireland", "eire"]),
    ("CA", "Canada", &["canada"]),
    ("AU", "Australia", &["australia"]),
    ("NZ", "New Zealand", &["new zealand"]),
    ("ZA", "South Africa", &["south africa"]),
    ("DE", "Germany", &["germany", "deutschland", "prussia", "bavaria"]),
    ("NL", "Netherlands", &["netherlands", "holland", "nederland"]),
    ("BE", "Belgium", &["belgium", "belgie", "belgique"]),
    ("FR", "France", &["france"]),
    ("CH", "Switzerland", &["switzerland", "schweiz", "suisse"]),
    ("AT", "Austria", &["austria", "osterreich"]),
    ("IT", "Italy", &["italy", "italia"]),
    ("ES", "Spain", &["spain", "espana"]),
    ("PT", "Portugal", &["portugal"]),
    ("SE", "Sweden", &["sweden", "sverige"]),
    ("NO", "Norway", &["norway", "norge"]),
    ("DK", "Denmark", &["denmark", "danmark"]),
    ("FI", "Finland", &["finland", "suomi"]),
    ("IS", "Iceland", &["iceland"]),
    ("PL", "Poland", &["poland", "polska"]),
    ("CZ", "Czech Republic", &["czech republic", "czechia", "bohemia"]),
    ("SK", "Slovakia", &["slovakia"]),
    ("HU", "Hungary", &["hungary"]),
    ("RO", "Romania", &["romania"]),
    ("RU", "Russia", &["russia", "russian federation"]),
    ("UA", "Ukraine", &["ukraine"]),
    ("LT", "Lithuania", &["lithuania"]),
    ("LV", "Latvia", &["latvia"]),
    ("EE", "Estonia", &["estonia"]),
    ("GR", "Greece", &["greece"]),
    ("HR", "Croatia", &["croatia"]),
    ("SI", "Slovenia", &["slovenia"]),
    ("LU", "Luxembourg", &["luxembourg"]),
    ("MX", "Mexico", &["mexico"]),
    ("BR", "Brazil", &["brazil"]),
    ("AR", "Argentina", &["argentina"]),
    ("CL", "Chile", &["chile"]),
    ("CU", "Cuba", &["cuba"]),
    ("JM", "Jamaica", &["jamaica"]),
    ("IN", "India", &["india"]),
    ("CN", "China", &["china"]),
    ("JP", "Japan", &["japan"]),
    ("PH", "Philippines", &["philippines"]),
    ("IL", "Israel", &["israel"]),
    ("TR", "Turkey", &["turkey"]),
];

static BY_NAME: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    COUNTRIES
        .iter()
        .flat_map(|(code, _, names)| names.iter().map(move |n| (*n, *code)))
        .collect()
});

static BY_CODE: Lazy<FxHashMap<&'static str, &'static str>> =
    Lazy::new(|| COUNTRIES.iter().map(|(code, name, _)| (*code, *name)).collect());

/// Built-in table of country names and common aliases to ISO 3166-1 alpha-2.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountryTable;

impl CountryTable {
    pub fn name_for(&self, code: &str) -> Option<&'static str> {
        BY_CODE.get(code).copied()
    }
}

impl CountryLookup for CountryTable {
    fn country_code(&self, place: &str) -> Option<String> {
        let key = place.trim().to_lowercase();
        BY_NAME.get(key.as_str()).map(|c| c.to_string())
    }
}

impl<F> CountryLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn country_code(&self, place: &str) -> Option<String> {
        self(place)
    }
}

/// Reduces a place to its last geographic component.
///
/// `"Boston, Suffolk, Massachusetts, USA|Boston"` becomes `"USA"`.
pub fn normalize_place(place: &str) -> &str {
    let place = match place.find('|') {
        Some(pos) => &place[..pos],
        None => place,
    };
    let place = match place.rfind(',') {
        Some(pos) => place[pos + 1..].trim_start_matches(' '),
        None => place,
    };
    place.trim_end_matches(' ')
}

fn is_birth_like(event: &Event) -> bool {
    event.kind == "Birth" || event.kind == "Christening"
}

/// Picks one country for a person from the places of their events.
///
/// The last birth or christening decides when its place resolves; an
/// unresolvable one hands the decision to frequency, even if an earlier
/// birth resolved. Otherwise the most frequent code wins, ties going to the
/// code seen first.
pub fn infer_country(person: &Person, lookup: &impl CountryLookup) -> Option<String> {
    // (code, count) in first-seen order
    let mut counts: Vec<(String, usize)> = Vec::new();
    // code of the last birth-like event, empty when its place did not resolve
    let mut birth = String::new();

    for (i, event) in person.events.iter().enumerate() {
        let place = normalize_place(&event.place);
        let code = lookup.country_code(place).unwrap_or_default();
        if is_birth_like(event) {
            birth = code.clone();
        }
        if code.is_empty() {
            trace!(event = i, place = %event.place, normalized = place, "No country for place");
            continue;
        }
        trace!(event = i, place = %event.place, normalized = place, code = %code, "Event country");

        match counts.iter_mut().find(|(c, _)| *c == code) {
            Some((_, n)) => *n += 1,
            None => counts.push((code, 1)),
        }
    }

    if !birth.is_empty() {
        return Some(birth);
    }

    let mut best: Option<(String, usize)> = None;
    for (code, n) in counts {
        if best.as_ref().map_or(true, |(_, m)| n > *m) {
            best = Some((code, n));
        }
    }
    best.map(|(code, _)| code)
}
