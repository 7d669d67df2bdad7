//! Script assembly: the ordered topic list becomes the day's newscast.
//!
//! Topics are processed one after the other. Each topic is isolated: whatever
//! happens to topic N (no news, search failure, model failure), topic N+1
//! starts from scratch, and the script always has one segment per topic in
//! the configured order.

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::api::TextGenerator;
use crate::models::{Script, SegmentBody, TopicList};
use crate::segments::SegmentSynthesizer;
use crate::sources::HeadlineSource;
use crate::utils::br_date;

/// Title printed at the top of the script.
pub fn script_title(date: NaiveDate) -> String {
    format!("📆 Telejornal – {}", br_date(date))
}

/// Drives the headline source and the synthesizer over every topic.
#[derive(Debug)]
pub struct ScriptAssembler<S, G> {
    source: S,
    synthesizer: SegmentSynthesizer<G>,
}

impl<S, G> ScriptAssembler<S, G>
where
    S: HeadlineSource,
    G: TextGenerator,
{
    pub fn new(source: S, generator: G) -> Self {
        Self {
            source,
            synthesizer: SegmentSynthesizer::new(generator),
        }
    }

    #[instrument(level = "info", skip_all, fields(topics = topics.len(), %today))]
    pub async fn assemble(&self, topics: &TopicList, today: NaiveDate) -> Script {
        let mut segments = Vec::with_capacity(topics.len());

        for (i, topic) in topics.iter().enumerate() {
            info!(index = i, topic = %topic.display_title, term = %topic.search_term, "Building segment");
            let headline = self.source.fetch(&topic.search_term, today).await;
            let segment = self.synthesizer.synthesize(&topic.display_title, &headline).await;
            segments.push(segment);
        }

        let generated = segments
            .iter()
            .filter(|s| matches!(s.body, SegmentBody::Generated(_)))
            .count();
        let no_news = segments.iter().filter(|s| s.body == SegmentBody::NoNews).count();
        info!(
            total = segments.len(),
            generated,
            no_news,
            failed = segments.len() - generated - no_news,
            "Script assembled"
        );

        Script {
            date: today,
            title: script_title(today),
            segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::models::{Headline, NO_NEWS_PLACEHOLDER, TopicSpec};
    use crate::segments::tests::RecordingGenerator;
    use crate::sources::GNewsSource;
    use mockito::Matcher;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()
    }

    /// Returns a headline only for terms that start with "ok".
    struct PickySource;

    impl HeadlineSource for PickySource {
        async fn fetch(&self, search_term: &str, _as_of: NaiveDate) -> Headline {
            if search_term.starts_with("ok") {
                Headline::new(format!("manchete {search_term}"), Some("resumo".into()))
            } else {
                Headline::absent()
            }
        }
    }

    fn topics(terms: &[&str]) -> TopicList {
        TopicList::new(
            terms
                .iter()
                .enumerate()
                .map(|(i, t)| TopicSpec::new(format!("Bloco {}", i + 1), *t))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_one_segment_per_topic_in_order_despite_failures() {
        let generator = RecordingGenerator {
            fail_when_contains: Some("ok-fail".into()),
            ..RecordingGenerator::replying("texto")
        };
        let assembler = ScriptAssembler::new(PickySource, generator);
        let list = topics(&["ok-1", "missing", "ok-fail", "ok-2", "missing-again"]);

        let script = assembler.assemble(&list, today()).await;

        assert_eq!(script.segments.len(), 5);
        let headings: Vec<&str> = script.segments.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, ["Bloco 1", "Bloco 2", "Bloco 3", "Bloco 4", "Bloco 5"]);
        assert_eq!(script.segments[0].body, SegmentBody::Generated("texto".into()));
        assert_eq!(script.segments[1].body, SegmentBody::NoNews);
        assert!(matches!(script.segments[2].body, SegmentBody::GenerationFailed(_)));
        assert_eq!(script.segments[3].body, SegmentBody::Generated("texto".into()));
        assert_eq!(script.segments[4].body, SegmentBody::NoNews);
        assert_eq!(assembler.synthesizer_calls(), 3);
    }

    #[tokio::test]
    async fn test_all_failures_still_yield_full_script() {
        let assembler = ScriptAssembler::new(PickySource, RecordingGenerator::replying("x"));
        let script = assembler.assemble(&TopicList::default(), today()).await;
        assert_eq!(script.segments.len(), 7);
        assert!(script.segments.iter().all(|s| s.body == SegmentBody::NoNews));
        assert_eq!(script.title, "📆 Telejornal – 06/05/2025");
        assert_eq!(script.date, today());
    }

    #[tokio::test]
    async fn test_economia_headline_dated_today_is_generated() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/search")
            .match_query(Matcher::UrlEncoded("q".into(), "economia".into()))
            .with_status(200)
            .with_body(
                r#"{"articles": [{"title": "Dólar fecha em queda", "description": "Moeda recua 1%", "publishedAt": "2025-05-06T18:30:00Z"}]}"#,
            )
            .create_async()
            .await;

        let source = GNewsSource::new(&SearchConfig {
            endpoint: format!("{}/api/v4/search", server.url()),
            api_key: Some("k".into()),
            ..SearchConfig::default()
        })
        .unwrap();
        let assembler = ScriptAssembler::new(source, RecordingGenerator::replying("O dólar caiu."));
        let list = TopicList::new(vec![TopicSpec::new("💰 Bloco 4 – Economia", "economia")]);

        let script = assembler.assemble(&list, today()).await;

        assert_eq!(script.segments.len(), 1);
        assert_eq!(script.segments[0].heading, "💰 Bloco 4 – Economia");
        assert_eq!(script.segments[0].body.text(), "O dólar caiu.");
        assert_eq!(assembler.synthesizer_calls(), 1);
        let requests = assembler.synthesizer.generator().requests.lock().unwrap();
        assert!(requests[0].user.contains("Dólar fecha em queda"));
    }

    #[tokio::test]
    async fn test_internacional_network_error_gives_placeholder() {
        let source = GNewsSource::new(&SearchConfig {
            endpoint: "http://127.0.0.1:1/api/v4/search".into(),
            api_key: Some("k".into()),
            timeout_secs: 5,
            ..SearchConfig::default()
        })
        .unwrap();
        let assembler = ScriptAssembler::new(source, RecordingGenerator::replying("unused"));
        let list = TopicList::new(vec![TopicSpec::new("🌎 Bloco 5 – Mundo", "internacional")]);

        let script = assembler.assemble(&list, today()).await;

        assert_eq!(script.segments[0].body.text(), NO_NEWS_PLACEHOLDER);
        assert_eq!(assembler.synthesizer_calls(), 0);
    }

    impl<S> ScriptAssembler<S, RecordingGenerator> {
        fn synthesizer_calls(&self) -> usize {
            self.synthesizer.generator().calls()
        }
    }
}
