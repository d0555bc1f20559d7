use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::gemini::{Content, GeminiClient, GenerateContentRequest};
use crate::models::{EnrichedStory, ShowInfo};

/// A generative text model answering a single prompt
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Text of the first candidate, if the model produced any
    async fn generate_text(&self, prompt: &str) -> Result<Option<String>>;
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<Option<String>> {
        let request = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            generation_config: None,
        };

        let response = self.generate_content(&self.text_model, &request).await?;
        Ok(response.first_text().map(str::to_string))
    }
}

/// Build the scriptwriter prompt for this week's stories.
pub fn build_prompt(show: &ShowInfo, stories: &[EnrichedStory]) -> String {
    let [first, second] = &show.speakers;

    let news = stories
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {}\n{}", i + 1, s.story.title, s.body))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Eres guionista de "{show}", un micro-podcast de noticias para devs en LatAm.
Escribe una charla natural entre dos amigos ({p1} y {p2}). Tono: ameno, geeky/friki, claro, sin muletillas artificiales.
{p1} habla como "{s1}" y {p2} habla como "{s2}".

FORMATO DE SALIDA (OBLIGATORIO):
- Solo líneas que comiencen con "{s1}:" o "{s2}:".
- Primera línea exacta:
{opening}
- Después de esa línea, establece el tono únicamente con el diálogo. No uses acotaciones, efectos, notas, encabezados, emojis, guiones de escena ni texto fuera del diálogo.
- Última línea: despedida clara que invite a seguir el podcast (por ejemplo: "gracias por escuchar, hasta la siguiente semana").

Noticias (título + resumen):
{news}
"#,
        show = show.name,
        p1 = first.persona,
        p2 = second.persona,
        s1 = first.speaker,
        s2 = second.speaker,
        opening = show.opening_line(),
        news = news,
    )
}

/// Count non-blank lines that don't start with one of the show's speaker labels.
pub fn nonconforming_lines(show: &ShowInfo, script: &str) -> usize {
    let prefixes: Vec<String> = show
        .speakers
        .iter()
        .map(|s| format!("{}:", s.speaker))
        .collect();

    script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !prefixes.iter().any(|p| line.starts_with(p.as_str())))
        .count()
}

pub struct ScriptGenerator {
    model: Arc<dyn TextModel>,
    show: ShowInfo,
}

impl ScriptGenerator {
    pub fn new(model: Arc<dyn TextModel>, show: ShowInfo) -> Self {
        Self { model, show }
    }

    /// Ask the model for the episode dialogue.
    ///
    /// The format rules live only in the prompt. An empty answer comes back as
    /// an empty script and a mis-formatted one is logged, not rejected.
    pub async fn generate(&self, stories: &[EnrichedStory]) -> Result<String> {
        let prompt = build_prompt(&self.show, stories);
        info!(stories = stories.len(), prompt_chars = prompt.chars().count(), "Requesting script");

        let script = self.model.generate_text(&prompt).await?.unwrap_or_default();
        if script.trim().is_empty() {
            warn!("Text model returned no script");
            return Ok(script);
        }

        let stray = nonconforming_lines(&self.show, &script);
        if stray > 0 {
            warn!(lines = stray, "Script has lines without a speaker prefix");
        }
        if script.lines().next().map(str::trim) != Some(self.show.opening_line().as_str()) {
            warn!("Script does not open with the mandated line");
        }

        info!(lines = script.lines().count(), "Script generated");
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Story;
    use chrono::Utc;
    use std::sync::Mutex;

    struct CannedModel {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextModel for CannedModel {
        async fn generate_text(&self, prompt: &str) -> Result<Option<String>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn enriched(title: &str, body: &str) -> EnrichedStory {
        EnrichedStory {
            story: Story {
                title: title.to_string(),
                link: None,
                summary: None,
                published_at: Utc::now(),
            },
            body: body.to_string(),
        }
    }

    #[test]
    fn prompt_numbers_stories_from_one() {
        let prompt = build_prompt(
            &ShowInfo::default(),
            &[enriched("Deno 3", "Body one"), enriched("Bun 2", "")],
        );

        assert!(prompt.contains("[1] Deno 3\nBody one\n\n[2] Bun 2\n"));
        assert!(prompt.contains("Primera línea exacta:\nSpeaker 1: Hola, bienvenidos al podcast de Super Happy Dev.\n"));
        assert!(prompt.contains("\"Speaker 1:\" o \"Speaker 2:\""));
    }

    #[test]
    fn counts_lines_without_speaker_prefix() {
        let show = ShowInfo::default();
        let script = "Speaker 1: Hola\n\nSpeaker 2: Qué tal\n(risas)\n**Outro**";
        assert_eq!(nonconforming_lines(&show, script), 2);
        assert_eq!(nonconforming_lines(&show, "Speaker 1: a\nSpeaker 2: b"), 0);
    }

    #[tokio::test]
    async fn returns_model_text_verbatim() {
        let reply = "Speaker 1: Hola, bienvenidos al podcast de Super Happy Dev.\nSpeaker 2: ¡Hola!";
        let model = Arc::new(CannedModel {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let generator = ScriptGenerator::new(model.clone(), ShowInfo::default());

        let script = generator.generate(&[enriched("Title", "Body")]).await.unwrap();
        assert_eq!(script, reply);
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_candidate_is_empty_script() {
        let model = Arc::new(CannedModel {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        });
        let generator = ScriptGenerator::new(model, ShowInfo::default());

        let script = generator.generate(&[enriched("Title", "Body")]).await.unwrap();
        assert_eq!(script, "");
    }
}
