//! Segment synthesis: one headline in, one script segment out.
//!
//! Three outcomes, all of them valid segments:
//! - no headline: the fixed no-news placeholder, without calling the model
//! - generation succeeded: the generated prose
//! - generation failed: an error marker carrying the failure detail

use tracing::{info, instrument, warn};

use crate::api::{ChatRequest, TextGenerator};
use crate::models::{Headline, Segment, SegmentBody};

const SYSTEM_PROMPT: &str = "Você é um jornalista objetivo e informativo.";

/// Build the user prompt for one headline.
fn segment_prompt(title: &str, summary: &str) -> String {
    format!(
        "Com base na seguinte manchete real: \"{title}\"\n\
         Resumo da matéria: \"{summary}\"\n\
         Escreva um bloco de telejornal com até 1 minuto de leitura, direto ao ponto, no estilo jornalístico.\n\
         Sem saudações. Apenas a notícia, clara, objetiva e informativa."
    )
}

/// Turns headlines into segments with a [`TextGenerator`].
#[derive(Debug)]
pub struct SegmentSynthesizer<G> {
    generator: G,
}

impl<G: TextGenerator> SegmentSynthesizer<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    #[cfg(test)]
    pub(crate) fn generator(&self) -> &G {
        &self.generator
    }

    #[instrument(level = "info", skip_all, fields(topic = %topic_title))]
    pub async fn synthesize(&self, topic_title: &str, headline: &Headline) -> Segment {
        let body = match headline.title.as_deref().filter(|_| !headline.is_absent()) {
            None => {
                info!("No headline; using placeholder");
                SegmentBody::NoNews
            }
            Some(title) => {
                let request = ChatRequest {
                    system: SYSTEM_PROMPT.to_string(),
                    user: segment_prompt(title, headline.summary.as_deref().unwrap_or("")),
                };
                match self.generator.complete(&request).await {
                    Ok(text) => {
                        info!(chars = text.len(), "Segment generated");
                        SegmentBody::Generated(text)
                    }
                    Err(e) => {
                        warn!(error = %e, "Generation failed; writing error marker");
                        SegmentBody::GenerationFailed(e.to_string())
                    }
                }
            }
        };

        Segment {
            heading: topic_title.to_string(),
            body,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::GenerationError;
    use crate::models::NO_NEWS_PLACEHOLDER;
    use std::sync::Mutex;

    /// Generator that records every request and answers from a script.
    #[derive(Default)]
    pub(crate) struct RecordingGenerator {
        pub requests: Mutex<Vec<ChatRequest>>,
        pub fail_when_contains: Option<String>,
        pub reply: String,
    }

    impl RecordingGenerator {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl TextGenerator for RecordingGenerator {
        async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.fail_when_contains {
                Some(needle) if request.user.contains(needle.as_str()) => {
                    Err(GenerationError::Status {
                        status: 429,
                        body: "quota exceeded".into(),
                    })
                }
                _ => Ok(self.reply.clone()),
            }
        }
    }

    #[tokio::test]
    async fn test_absent_headline_gives_placeholder_without_call() {
        let synth = SegmentSynthesizer::new(RecordingGenerator::replying("unused"));
        let segment = synth.synthesize("🌎 Bloco 5 – Mundo", &Headline::absent()).await;
        assert_eq!(segment.heading, "🌎 Bloco 5 – Mundo");
        assert_eq!(segment.body, SegmentBody::NoNews);
        assert_eq!(segment.body.text(), NO_NEWS_PLACEHOLDER);
        assert_eq!(synth.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_title_counts_as_absent() {
        let synth = SegmentSynthesizer::new(RecordingGenerator::replying("unused"));
        let segment = synth.synthesize("x", &Headline::new("  ", Some("resumo".into()))).await;
        assert_eq!(segment.body, SegmentBody::NoNews);
        assert_eq!(synth.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_generated_text_becomes_body() {
        let synth = SegmentSynthesizer::new(RecordingGenerator::replying("A Selic caiu hoje."));
        let headline = Headline::new("Juros caem", Some("Copom corta a Selic".into()));
        let segment = synth.synthesize("💰 Bloco 4 – Economia", &headline).await;

        assert_eq!(segment.heading, "💰 Bloco 4 – Economia");
        assert_eq!(segment.body, SegmentBody::Generated("A Selic caiu hoje.".into()));

        let requests = synth.generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, SYSTEM_PROMPT);
        assert!(requests[0].user.contains("\"Juros caem\""));
        assert!(requests[0].user.contains("\"Copom corta a Selic\""));
        assert!(requests[0].user.contains("1 minuto"));
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_error_marker() {
        let generator = RecordingGenerator {
            fail_when_contains: Some("Juros".into()),
            ..RecordingGenerator::replying("unused")
        };
        let synth = SegmentSynthesizer::new(generator);
        let segment = synth.synthesize("💰 Bloco 4 – Economia", &Headline::new("Juros caem", None)).await;

        match &segment.body {
            SegmentBody::GenerationFailed(detail) => assert!(detail.contains("429")),
            other => panic!("expected error marker, got {other:?}"),
        }
        assert!(segment.body.text().starts_with("[Erro ao gerar com IA: "));
    }

    #[test]
    fn test_prompt_with_missing_summary() {
        let prompt = segment_prompt("Manchete", "");
        assert!(prompt.contains("Resumo da matéria: \"\""));
        assert!(prompt.contains("Sem saudações"));
    }
}
