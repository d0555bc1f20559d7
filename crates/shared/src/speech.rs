use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::EpisodeError;
use crate::gemini::{
    Content, GeminiClient, GenerateContentRequest, GenerationConfig, MultiSpeakerVoiceConfig,
    PrebuiltVoiceConfig, SpeakerVoiceConfig, SpeechConfig, VoiceConfig,
};
use crate::models::{ShowInfo, SpeakerVoice};
use crate::wav::{write_wav, WavSpec};

/// A generative speech model reading a multi-speaker dialogue
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Base64-encoded raw PCM, or `None` when the response carried no audio
    async fn synthesize(&self, prompt: &str, voices: &[SpeakerVoice]) -> Result<Option<String>>;
}

#[async_trait]
impl SpeechModel for GeminiClient {
    async fn synthesize(&self, prompt: &str, voices: &[SpeakerVoice]) -> Result<Option<String>> {
        let speaker_voice_configs = voices
            .iter()
            .map(|v| SpeakerVoiceConfig {
                speaker: v.speaker.clone(),
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: v.voice.clone(),
                    },
                },
            })
            .collect();

        let request = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(SpeechConfig {
                    multi_speaker_voice_config: MultiSpeakerVoiceConfig {
                        speaker_voice_configs,
                    },
                }),
            }),
        };

        let response = self.generate_content(&self.speech_model, &request).await?;
        Ok(response.first_inline_data().map(|d| d.data.clone()))
    }
}

pub struct SpeechSynthesizer {
    model: Arc<dyn SpeechModel>,
    show: ShowInfo,
}

impl SpeechSynthesizer {
    pub fn new(model: Arc<dyn SpeechModel>, show: ShowInfo) -> Self {
        Self { model, show }
    }

    pub fn tts_prompt(&self, script: &str) -> String {
        let [first, second] = &self.show.speakers;
        format!(
            "TTS esta conversación entre {} y {}:\n{}",
            first.persona, second.persona, script
        )
    }

    /// Read the script aloud and write it to `out_path` as a WAV file.
    ///
    /// Returns only once the file is fully written and closed. A response
    /// without audio is fatal ([`EpisodeError::MissingAudio`]).
    pub async fn synthesize(&self, script: &str, out_path: &Path) -> Result<PathBuf> {
        info!(script_chars = script.chars().count(), "Requesting speech");

        let encoded = self
            .model
            .synthesize(&self.tts_prompt(script), &self.show.speakers)
            .await?
            .ok_or(EpisodeError::MissingAudio)?;

        let pcm = BASE64
            .decode(encoded.trim())
            .map_err(|e| EpisodeError::InvalidAudio(e.to_string()))?;

        write_wav(out_path, &pcm, WavSpec::GEMINI_TTS).await?;

        let spec = WavSpec::GEMINI_TTS;
        info!(
            path = %out_path.display(),
            bytes = pcm.len(),
            seconds = pcm.len() as f64 / spec.byte_rate() as f64,
            "Episode audio written"
        );
        Ok(out_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedVoice {
        payload: Option<String>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl SpeechModel for CannedVoice {
        async fn synthesize(&self, prompt: &str, voices: &[SpeakerVoice]) -> Result<Option<String>> {
            self.calls.lock().unwrap().push((
                prompt.to_string(),
                voices.iter().map(|v| format!("{}={}", v.speaker, v.voice)).collect(),
            ));
            Ok(self.payload.clone())
        }
    }

    fn synthesizer(payload: Option<String>) -> (SpeechSynthesizer, Arc<CannedVoice>) {
        let voice = Arc::new(CannedVoice {
            payload,
            calls: Mutex::new(Vec::new()),
        });
        (SpeechSynthesizer::new(voice.clone(), ShowInfo::default()), voice)
    }

    #[tokio::test]
    async fn writes_decoded_pcm_as_wav() {
        let pcm: Vec<u8> = vec![0x00, 0x01, 0xff, 0x7f, 0x00, 0x80];
        let (synth, voice) = synthesizer(Some(BASE64.encode(&pcm)));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.wav");

        let written = synth.synthesize("Speaker 1: Hola", &path).await.unwrap();

        assert_eq!(written, path);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[44..], pcm.as_slice());

        let calls = voice.calls.lock().unwrap();
        assert_eq!(calls[0].0, "TTS esta conversación entre Happy y Dev:\nSpeaker 1: Hola");
        assert_eq!(calls[0].1, vec!["Speaker 1=Kore", "Speaker 2=Puck"]);
    }

    #[tokio::test]
    async fn missing_audio_is_fatal() {
        let (synth, _) = synthesizer(None);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.wav");

        let err = synth.synthesize("Speaker 1: Hola", &path).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EpisodeError>(),
            Some(EpisodeError::MissingAudio)
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn garbage_payload_is_invalid_audio() {
        let (synth, _) = synthesizer(Some("not base64!!".to_string()));
        let dir = tempfile::tempdir().unwrap();

        let err = synth
            .synthesize("Speaker 1: Hola", &dir.path().join("x.wav"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EpisodeError>(),
            Some(EpisodeError::InvalidAudio(_))
        ));
    }
}
