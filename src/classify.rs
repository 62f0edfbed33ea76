//! Keyword classification of articles by location and topic.
//!
//! Each axis is one ordered table of `tag → keywords`. The first tag with any
//! matching keyword wins; there is no scoring. Keywords are matched
//! case-insensitively as whole words, except those ending in `*`, which match
//! any word starting with the stem (`canad*` matches "Canada" and "Canadian").
//!
//! Detected tags take priority; the source's declared tags are the fallback.

use crate::config::Settings;
use crate::models::Source;
use once_cell::sync::Lazy;
use regex::Regex;

type Table = &'static [(&'static str, &'static [&'static str])];

/// City table. Order is significant.
const CITIES: Table = &[
    (
        "Toronto",
        &["toronto*", "gta", "scarborough", "mississauga", "brampton"],
    ),
    (
        "Vancouver",
        &["vancouver*", "burnaby", "surrey", "richmond", "bc", "b.c."],
    ),
    ("Montreal", &["montreal*", "montréal*", "laval", "quebec city"]),
    ("Calgary", &["calgar*"]),
    ("Ottawa", &["ottawa*"]),
    ("Edmonton", &["edmonton*"]),
    ("Winnipeg", &["winnipeg*"]),
    ("Halifax", &["halifax*"]),
];

/// Checked only when no city matched.
const NATIONAL: Table = &[("Canada", &["canad*"])];

/// Topic table. Order is significant.
const TOPICS: Table = &[
    (
        "politics",
        &[
            "politic*",
            "election*",
            "parliament*",
            "minister*",
            "legislat*",
            "government*",
            "senate",
            "liberals",
            "conservatives",
            "ndp",
            "bloc québécois",
            "house of commons",
            "prime minister",
            "trudeau",
            "poilievre",
            "carney",
            "ballot*",
            "voter*",
            "campaign*",
        ],
    ),
    (
        "business",
        &[
            "business*",
            "econom*",
            "market*",
            "stock*",
            "tsx",
            "bank of canada",
            "inflation",
            "interest rate*",
            "earnings",
            "profit*",
            "revenue*",
            "tariff*",
            "gdp",
            "recession",
            "investor*",
            "unemployment",
            "mortgage*",
            "ceo",
            "layoff*",
        ],
    ),
    (
        "sports",
        &[
            "sport*",
            "nhl",
            "nba",
            "nfl",
            "mlb",
            "mls",
            "cfl",
            "hockey",
            "basketball",
            "baseball",
            "soccer",
            "football",
            "olympic*",
            "playoff*",
            "stanley cup",
            "grey cup",
            "world cup",
            "raptors",
            "maple leafs",
            "leafs",
            "blue jays",
            "canucks",
            "oilers",
            "flames",
            "canadiens",
            "whitecaps",
            "celtics",
            "tennis",
            "golf",
            "curling",
            "athlete*",
            "tournament*",
            "championship*",
        ],
    ),
    (
        "technology",
        &[
            "tech",
            "technolog*",
            "ai",
            "artificial intelligence",
            "software",
            "startup*",
            "cyber*",
            "hacker*",
            "internet",
            "smartphone*",
            "iphone*",
            "android",
            "semiconductor*",
            "chip*",
            "crypto*",
            "bitcoin",
            "robot*",
            "data breach",
            "openai",
            "chatgpt",
            "google",
            "apple",
            "microsoft",
        ],
    ),
    (
        "entertainment",
        &[
            "entertainment",
            "movie*",
            "film*",
            "music*",
            "album*",
            "concert*",
            "celebrit*",
            "hollywood",
            "netflix",
            "tv",
            "television",
            "actor*",
            "actress*",
            "singer*",
            "festival*",
            "oscar*",
            "grammy*",
            "juno award*",
            "box office",
            "theatre",
            "theater",
            "broadway",
            "tiff",
            "premiere*",
        ],
    ),
    (
        "health",
        &[
            "health*",
            "hospital*",
            "doctor*",
            "nurse*",
            "covid*",
            "vaccin*",
            "virus*",
            "disease*",
            "cancer",
            "medical",
            "medicine*",
            "patient*",
            "pandemic",
            "outbreak*",
            "overdose*",
            "flu",
            "measles",
            "surgery",
        ],
    ),
    (
        "science",
        &[
            "scien*",
            "research*",
            "space",
            "nasa",
            "astronaut*",
            "astronom*",
            "planet*",
            "climate",
            "species",
            "fossil*",
            "physic*",
            "biolog*",
            "telescope*",
            "asteroid*",
        ],
    ),
];

static CITY_MATCHER: Lazy<KeywordTable> = Lazy::new(|| KeywordTable::compile(CITIES));
static NATIONAL_MATCHER: Lazy<KeywordTable> = Lazy::new(|| KeywordTable::compile(NATIONAL));
static TOPIC_MATCHER: Lazy<KeywordTable> = Lazy::new(|| KeywordTable::compile(TOPICS));

/// One compiled pattern per tag, in table order.
struct KeywordTable {
    entries: Vec<(&'static str, Regex)>,
}

impl KeywordTable {
    fn compile(table: Table) -> Self {
        let entries = table
            .iter()
            .map(|(tag, keywords)| {
                let alternatives = keywords
                    .iter()
                    .map(|kw| keyword_pattern(kw))
                    .collect::<Vec<_>>()
                    .join("|");
                let re = Regex::new(&format!("(?i)(?:{alternatives})")).unwrap();
                (*tag, re)
            })
            .collect();
        Self { entries }
    }

    fn first_match(&self, text: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(tag, _)| *tag)
    }
}

/// Whole-word pattern for a keyword; a trailing `*` leaves the end open.
/// Word boundaries are only asserted next to word characters, so
/// punctuation-edged keywords like `b.c.` still match.
fn keyword_pattern(keyword: &str) -> String {
    let (stem, open_end) = match keyword.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (keyword, false),
    };
    let starts_word = stem.chars().next().is_some_and(char::is_alphanumeric);
    let ends_word = stem.chars().last().is_some_and(char::is_alphanumeric);

    let mut pattern = String::new();
    if starts_word {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(stem).replace(' ', r"\s+"));
    if ends_word && !open_end {
        pattern.push_str(r"\b");
    }
    pattern
}

/// Location and category assigned to an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub location: String,
    pub category: String,
}

/// First city named in `text`, else the national tag.
pub fn detect_location(text: &str) -> Option<&'static str> {
    CITY_MATCHER
        .first_match(text)
        .or_else(|| NATIONAL_MATCHER.first_match(text))
}

/// First topic named in `text`.
pub fn detect_category(text: &str) -> Option<&'static str> {
    TOPIC_MATCHER.first_match(text)
}

/// Classify an article from its title and description.
///
/// Falls back to the source's declared location/category, then to the
/// configured defaults. Never returns an empty tag.
pub fn classify(title: &str, description: &str, source: &Source, settings: &Settings) -> Classification {
    let text = format!("{title} {description}");

    let location = detect_location(&text)
        .map(str::to_string)
        .or_else(|| source.location.clone().filter(|l| !l.trim().is_empty()))
        .unwrap_or_else(|| settings.default_location.clone());

    let category = detect_category(&text)
        .map(str::to_string)
        .or_else(|| Some(source.category.clone()).filter(|c| !c.trim().is_empty()))
        .unwrap_or_else(|| settings.default_category.clone());

    Classification { location, category }
}
