//! Headline sources.
//!
//! A source answers one question per topic: "what is today's headline for
//! this search term?". It never fails past its own boundary; anything that
//! goes wrong is logged and reported as [`Headline::absent`].
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | GNews | [`gnews`] | `/api/v4/search` with a same-day `from` filter |

use chrono::NaiveDate;

use crate::models::Headline;

pub mod gnews;

pub use gnews::GNewsSource;

/// Finds the headline of the day for a search term.
pub trait HeadlineSource {
    /// Returns [`Headline::absent`] when nothing dated `as_of` was found or
    /// the lookup failed for any reason.
    async fn fetch(&self, search_term: &str, as_of: NaiveDate) -> Headline;
}
