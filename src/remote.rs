//! Client for the cloud text-to-speech REST endpoint.
//!
//! One call per chunk: `POST {endpoint}?key=...` with the text, voice and audio
//! settings, answered with base64 MP3 in `audioContent`.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use narrator_core::{RemoteSynthesizer, SynthesisRequest};
use serde::{Deserialize, Serialize};
use tracing::debug;

const AUDIO_ENCODING: &str = "MP3";
const ERROR_DETAIL_LIMIT: usize = 200;

pub struct CloudTtsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    voice: Option<String>,
    speaking_rate: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: TextInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: Option<String>,
}

impl CloudTtsClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        voice: Option<String>,
        speaking_rate: f32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Building HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            voice,
            speaking_rate,
        })
    }

    fn body<'a>(&'a self, request: &'a SynthesisRequest) -> SynthesizeBody<'a> {
        SynthesizeBody {
            input: TextInput {
                text: &request.text,
            },
            voice: VoiceSelection {
                language_code: &request.language_code,
                name: self.voice.as_deref(),
            },
            audio_config: AudioConfig {
                audio_encoding: AUDIO_ENCODING,
                speaking_rate: self.speaking_rate,
            },
        }
    }
}

#[async_trait]
impl RemoteSynthesizer for CloudTtsClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        debug!(
            endpoint = %self.endpoint,
            language = %request.language_code,
            chars = request.text.len(),
            "Requesting remote synthesis"
        );
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.body(request))
            .send()
            .await
            .context("Sending synthesis request")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!(
                "synthesis request failed with {status}: {}",
                truncate(&detail, ERROR_DETAIL_LIMIT)
            );
        }

        let payload: SynthesizeResponse = response
            .json()
            .await
            .context("Decoding synthesis response")?;
        decode_audio(payload)
    }
}

/// Missing or empty `audioContent` comes back as an empty payload.
fn decode_audio(payload: SynthesizeResponse) -> Result<Vec<u8>> {
    match payload.audio_content.filter(|content| !content.is_empty()) {
        Some(content) => STANDARD
            .decode(content.as_bytes())
            .context("Decoding base64 audio content"),
        None => Ok(Vec::new()),
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(voice: Option<&str>) -> CloudTtsClient {
        CloudTtsClient::new(
            "https://tts.invalid/v1/text:synthesize",
            "secret",
            voice.map(str::to_string),
            1.25,
        )
        .unwrap()
    }

    #[test]
    fn request_body_matches_the_rest_schema() {
        let client = client(Some("pt-BR-Wavenet-A"));
        let request = SynthesisRequest::new("Bom dia.", "pt-BR");
        let body = serde_json::to_value(client.body(&request)).unwrap();

        assert_eq!(
            body,
            json!({
                "input": { "text": "Bom dia." },
                "voice": { "languageCode": "pt-BR", "name": "pt-BR-Wavenet-A" },
                "audioConfig": { "audioEncoding": "MP3", "speakingRate": 1.25 }
            })
        );
    }

    #[test]
    fn voice_name_is_omitted_when_unset() {
        let client = client(None);
        let request = SynthesisRequest::new("Olá.", "pt-BR");
        let body = serde_json::to_value(client.body(&request)).unwrap();
        assert_eq!(body["voice"], json!({ "languageCode": "pt-BR" }));
    }

    #[test]
    fn audio_content_is_base64_decoded() {
        let payload: SynthesizeResponse =
            serde_json::from_value(json!({ "audioContent": "SUQzBA==" })).unwrap();
        assert_eq!(decode_audio(payload).unwrap(), b"ID3\x04");
    }

    #[test]
    fn missing_or_empty_audio_is_an_empty_payload() {
        let missing: SynthesizeResponse = serde_json::from_value(json!({})).unwrap();
        assert!(decode_audio(missing).unwrap().is_empty());
        let empty: SynthesizeResponse =
            serde_json::from_value(json!({ "audioContent": "" })).unwrap();
        assert!(decode_audio(empty).unwrap().is_empty());
    }

    #[test]
    fn malformed_base64_is_an_error() {
        let payload: SynthesizeResponse =
            serde_json::from_value(json!({ "audioContent": "***" })).unwrap();
        assert!(decode_audio(payload).is_err());
    }

    #[test]
    fn error_detail_is_truncated_on_char_boundaries() {
        assert_eq!(truncate("ação", 2), "aç");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
