//! Event records supplied by the three data sources.
//!
//! Records arrive already extracted: scraping free text into short titles,
//! countries and dates happens upstream. A record is immutable for the
//! duration of a run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The data source a record (and its graph node) originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// The bibliographic proceedings source holding workshop volumes.
    CeurWs,
    /// Knowledge base cataloguing conference events.
    Wikidata,
    /// Knowledge base cataloguing conference proceedings.
    Dblp,
}

impl Source {
    /// Graph label used for nodes of this source.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CeurWs => "Ceur-WS",
            Self::Wikidata => "Wikidata",
            Self::Dblp => "Dblp",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a record describes a workshop or a conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A workshop (usually the working side of a match).
    Workshop,
    /// A conference (usually the target side of a match).
    Conference,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workshop => write!(f, "workshop"),
            Self::Conference => write!(f, "conference"),
        }
    }
}

/// Opaque record identifier, unique per source and kind.
///
/// Volume numbers, entity URIs and proceedings keys are all carried as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record identifier, rejecting blank input.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyRecordId);
        }
        Ok(Self(id))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ISO 3166 alpha-3 country code, or unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountryCode {
    /// A known three-letter code, stored upper-case.
    Known(String),
    /// The country could not be determined.
    #[default]
    Unknown,
}

impl CountryCode {
    /// Parses a country code.
    ///
    /// Empty input and the literal markers `None`/`unknown` map to
    /// [`CountryCode::Unknown`]; anything else must be three ASCII letters.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("none")
            || trimmed.eq_ignore_ascii_case("unknown")
        {
            return Ok(Self::Unknown);
        }
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCountryCode {
                value: raw.to_string(),
            });
        }
        Ok(Self::Known(trimmed.to_ascii_uppercase()))
    }

    /// Returns the code when known.
    #[must_use]
    pub fn known(&self) -> Option<&str> {
        match self {
            Self::Known(code) => Some(code),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(code) => f.write_str(code),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A calendar month in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Month(u8);

impl Month {
    /// Creates a month from its number.
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        match u8::try_from(value) {
            Ok(m @ 1..=12) => Ok(Self(m)),
            _ => Err(ValidationError::MonthOutOfRange { value }),
        }
    }

    /// Returns the month number.
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0 as u32
    }
}

impl TryFrom<u32> for Month {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Month> for u32 {
    fn from(month: Month) -> Self {
        month.number()
    }
}

/// A workshop or conference record from one of the sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Identifier, unique per source and kind.
    pub id: RecordId,

    /// Originating source.
    pub source: Source,

    /// Workshop or conference.
    pub kind: RecordKind,

    /// Candidate full titles, best guess first. May be empty.
    #[serde(default)]
    pub titles: Vec<String>,

    /// Short title or acronym, e.g. `VLDB 2003`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,

    /// Country of the event.
    #[serde(default)]
    pub country: CountryCode,

    /// Month of the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<Month>,

    /// Year of the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// Extra attributes copied onto the graph node as properties.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl EventRecord {
    /// Creates a builder for a record.
    #[must_use]
    pub fn builder(source: Source, kind: RecordKind) -> EventRecordBuilder {
        EventRecordBuilder::new(source, kind)
    }

    /// Returns the first candidate title, if any.
    #[must_use]
    pub fn primary_title(&self) -> Option<&str> {
        self.titles.first().map(String::as_str)
    }

    /// Returns the short title normalized for joins, or `None` when blank.
    #[must_use]
    pub fn short_key(&self) -> Option<String> {
        self.short
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
    }

    /// Returns true if at least one non-blank title is present.
    #[must_use]
    pub fn has_titles(&self) -> bool {
        self.titles.iter().any(|t| !t.trim().is_empty())
    }

    /// Properties describing this record on a graph node.
    ///
    /// Only attributes that are actually set are emitted.
    #[must_use]
    pub fn properties(&self) -> BTreeMap<String, serde_json::Value> {
        let mut props = self.attributes.clone();
        if let Some(title) = self.primary_title() {
            props.insert("title".to_string(), title.into());
        }
        if let Some(short) = &self.short {
            props.insert("short".to_string(), short.as_str().into());
        }
        if let Some(code) = self.country.known() {
            props.insert("countryISO3".to_string(), code.into());
        }
        if let Some(month) = self.month {
            props.insert("month".to_string(), month.number().into());
        }
        if let Some(year) = self.year {
            props.insert("year".to_string(), year.into());
        }
        props.retain(|_, v| !v.is_null());
        props
    }
}

/// Builder for [`EventRecord`].
#[derive(Debug)]
pub struct EventRecordBuilder {
    source: Source,
    kind: RecordKind,
    id: Option<String>,
    titles: Vec<String>,
    short: Option<String>,
    country: Option<String>,
    month: Option<u32>,
    year: Option<i32>,
    attributes: BTreeMap<String, serde_json::Value>,
}

impl EventRecordBuilder {
    /// Creates a new record builder.
    #[must_use]
    pub fn new(source: Source, kind: RecordKind) -> Self {
        Self {
            source,
            kind,
            id: None,
            titles: Vec::new(),
            short: None,
            country: None,
            month: None,
            year: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the identifier.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a candidate title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.titles.push(title.into());
        self
    }

    /// Sets the short title.
    #[must_use]
    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    /// Sets the raw country code.
    #[must_use]
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Sets the month number.
    #[must_use]
    pub fn month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    /// Sets the year.
    #[must_use]
    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Sets an extra attribute.
    #[must_use]
    pub fn attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builds the record.
    /// Returns `ValidationError` if the id is missing or an attribute is malformed.
    pub fn build(self) -> Result<EventRecord, ValidationError> {
        let id = self.id.ok_or(ValidationError::MissingField {
            field: "id".to_string(),
        })?;
        let id = RecordId::new(id)?;

        let country = match self.country {
            Some(raw) => CountryCode::parse(&raw)?,
            None => CountryCode::Unknown,
        };
        let month = self.month.map(Month::new).transpose()?;

        Ok(EventRecord {
            id,
            source: self.source,
            kind: self.kind,
            titles: self.titles,
            short: self.short,
            country,
            month,
            year: self.year,
            attributes: self.attributes,
        })
    }
}
