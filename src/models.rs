//! Data models for the newscast pipeline.
//!
//! This module defines the values that flow between pipeline stages:
//! - [`TopicSpec`] / [`TopicList`]: the ordered segments a run produces
//! - [`Headline`]: what the search API found for one topic (possibly nothing)
//! - [`Segment`] / [`SegmentBody`]: one rendered block of the script
//! - [`Script`]: the assembled document handed to every sink
//! - [`CoverImage`]: the PNG rendered for the CMS featured image
//! - [`PublishResult`]: the per-sink outcome printed at the end of a run

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::{br_date, escape_html};

/// Body shown when the search API had nothing dated today for a topic.
pub const NO_NEWS_PLACEHOLDER: &str =
    "[⚠️ Nenhuma notícia atualizada disponível para este bloco hoje.]";

/// One named segment of the newscast and the term used to search for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopicSpec {
    /// Heading printed above the segment, e.g. `"💰 Bloco 4 – Economia"`.
    pub display_title: String,
    /// Query sent to the search API, e.g. `"economia"`.
    pub search_term: String,
}

impl TopicSpec {
    pub fn new(display_title: impl Into<String>, search_term: impl Into<String>) -> Self {
        Self {
            display_title: display_title.into(),
            search_term: search_term.into(),
        }
    }
}

/// Ordered, immutable list of topics for one run.
///
/// The order here is the order of the segments in the final script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TopicList(Vec<TopicSpec>);

impl TopicList {
    #[cfg(test)]
    pub fn new(topics: Vec<TopicSpec>) -> Self {
        Self(topics)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TopicList {
    /// The seven blocks of the daily newscast.
    fn default() -> Self {
        Self(vec![
            TopicSpec::new("🎙️ Abertura do Telejornal", "brasil"),
            TopicSpec::new("🗳️ Bloco 2 – Política", "política"),
            TopicSpec::new("🎓 Bloco 3 – Educação ou Saúde", "educação"),
            TopicSpec::new("💰 Bloco 4 – Economia", "economia"),
            TopicSpec::new("🌎 Bloco 5 – Mundo", "internacional"),
            TopicSpec::new("🏛️ Bloco 6 – Brasília e Goiás", "Brasília DF"),
            TopicSpec::new("☀️ Bloco 7 – Tempo e Encerramento", "previsão do tempo Brasil"),
        ])
    }
}

/// Headline and summary picked for a topic.
///
/// Both fields absent means "no news today" for that topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headline {
    pub title: Option<String>,
    pub summary: Option<String>,
}

impl Headline {
    pub fn new(title: impl Into<String>, summary: Option<String>) -> Self {
        Self {
            title: Some(title.into()),
            summary,
        }
    }

    /// The "nothing found" pair.
    pub fn absent() -> Self {
        Self::default()
    }

    /// A headline only counts when its title has visible text.
    pub fn is_absent(&self) -> bool {
        self.title.as_deref().is_none_or(|t| t.trim().is_empty())
    }
}

/// What a segment says. Never renders to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum SegmentBody {
    /// Prose returned by the text-generation service.
    Generated(String),
    /// No same-day headline was found.
    NoNews,
    /// The text-generation call failed; carries the error detail.
    GenerationFailed(String),
}

impl SegmentBody {
    /// The visible text of the body, before HTML escaping.
    pub fn text(&self) -> String {
        match self {
            SegmentBody::Generated(text) => text.clone(),
            SegmentBody::NoNews => NO_NEWS_PLACEHOLDER.to_string(),
            SegmentBody::GenerationFailed(detail) => format!("[Erro ao gerar com IA: {detail}]"),
        }
    }
}

/// One topical block of the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub heading: String,
    pub body: SegmentBody,
}

impl Segment {
    /// Render as `<h2>` + `<p>` markup.
    pub fn to_html(&self) -> String {
        format!(
            "<h2>{}</h2>\n<p>{}</p>\n",
            escape_html(&self.heading),
            escape_html(&self.body.text())
        )
    }
}

/// The assembled newscast, handed unchanged to every sink.
#[derive(Debug, Clone, Serialize)]
pub struct Script {
    pub date: NaiveDate,
    pub title: String,
    pub segments: Vec<Segment>,
}

impl Script {
    /// Title used for the CMS post.
    pub fn post_title(&self) -> String {
        format!("Roteiro Telejornal – {}", br_date(self.date))
    }

    /// Full HTML document body: `<h1>` title followed by every segment in order.
    pub fn to_html(&self) -> String {
        let body = self.segments.iter().map(Segment::to_html).join("");
        format!("<h1>{}</h1>\n{}", escape_html(&self.title), body)
    }
}

/// A rendered cover, PNG-encoded.
#[derive(Clone)]
pub struct CoverImage {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverImage")
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Email,
    Cms,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Email => f.write_str("email"),
            SinkKind::Cms => f.write_str("cms"),
        }
    }
}

/// Outcome of one sink for this run. Only ever printed, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub sink: SinkKind,
    pub ok: bool,
    pub detail: String,
}

impl fmt::Display for PublishResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.ok { "✅" } else { "❌" };
        write!(f, "{mark} {}: {}", self.sink, self.detail)
    }
}
