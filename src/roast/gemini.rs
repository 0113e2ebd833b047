//! Blocking client for the Gemini `generateContent` endpoint.
//!
//! Without an API key nothing leaves the process: the client answers with a
//! canned roast marked as an offline placeholder.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::data::models::{Intensity, KNOWN_APPS};
use crate::error::{Result, RoastError};
use crate::{log_debug, log_warn};

const ENABLE_LOGS: bool = true;

/// Header carrying the API key, which keeps it out of URLs and error text.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Prefix marking text that did not come from the API.
pub const OFFLINE_PREFIX: &str = "[offline placeholder]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// `None` keeps the client offline.
    pub api_key: Option<String>,
    pub model_name: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model_name: "gemini-1.5-flash".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            temperature: 0.7,
            max_output_tokens: 150,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

pub struct GeminiClient {
    config: GeminiConfig,
    http: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RoastError::ApiUnavailable(format!("failed to build HTTP client: {e}")))?;
        if config.api_key.is_none() {
            log_warn!("[gemini] no API key configured, roasts will be offline placeholders");
        }
        Ok(Self { config, http })
    }

    pub fn is_online(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_name
        )
    }

    /// Generated text for `prompt`, or the offline placeholder when no key
    /// is configured.
    pub fn generate(&self, prompt: &str) -> Result<String> {
        let Some(key) = self.config.api_key.as_deref() else {
            return Ok(offline_placeholder(prompt));
        };

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            }
        });

        let url = self.endpoint();
        log_debug!("[gemini] POST {}", url);
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, key)
            .json(&body)
            .send()
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                RoastError::ApiUnavailable(format!("request {kind}: {}", e.without_url()))
            })?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RoastError::Auth(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(RoastError::ApiUnavailable(format!("HTTP {status}: {text}")));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| RoastError::ApiUnavailable(format!("malformed response: {e}")))?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| RoastError::ApiUnavailable("response carried no text".to_string()))
    }

    /// Never fails: API errors are logged and replaced by the placeholder.
    pub fn generate_or_placeholder(&self, prompt: &str) -> String {
        match self.generate(prompt) {
            Ok(text) => text,
            Err(err) => {
                log_warn!("[gemini] falling back to placeholder: {}", err);
                offline_placeholder(prompt)
            }
        }
    }
}

pub fn offline_placeholder(prompt: &str) -> String {
    format!("{OFFLINE_PREFIX} {}", simulated_response(prompt))
}

/// Canned roast chosen by the app and intensity mentioned in `prompt`.
pub fn simulated_response(prompt: &str) -> &'static str {
    let lower = prompt.to_lowercase();
    let app = KNOWN_APPS
        .iter()
        .copied()
        .find(|app| lower.contains(&app.to_lowercase()));
    let intensity = if lower.contains(Intensity::Brutal.as_str()) {
        Intensity::Brutal
    } else if lower.contains(Intensity::Medium.as_str()) {
        Intensity::Medium
    } else {
        Intensity::Light
    };

    match (app, intensity) {
        (Some("Instagram"), Intensity::Brutal) => "Bhai, itna time Instagram pe? 📱 Dusron ki perfect life dekhte dekhte apni life hi bhool gaye! Paisa kamane ke bajaye paisa waste karne mein expert ho gaye ho! 💸 Ab toh Sharma ji ka beta bhi tumse aage nikal gaya hoga! 😂",
        (Some("Instagram"), Intensity::Medium) => "Instagram pe itna time? 📸 Yaar, real life mein bhi kuch interesting karo, stories mein daalne ke liye! Warna bas dusron ke reels dekhte dekhte apna time reel ho jayega! 😄",
        (Some("Instagram"), Intensity::Light) => "Instagram scrolling champion! 🏆 Bas thoda sa real world mein bhi time spend karo, wahan bhi equally entertaining cheezein hoti hain! 😊",
        (Some("TikTok"), Intensity::Brutal) => "TikTok pe itna time? 🕺 Bhai, actual dance class join kar lete! But nahi, tumhe toh bas 15-second videos dekhne hain! Productivity ka toh funeral ho gaya tumhara! ⚰️ Ab toh TikTok tumhara full-time job ban gaya hai! 😅",
        (Some("TikTok"), Intensity::Medium) => "TikTok pe itna time? 💃 Koi naya dance seekha ya bas time waste kiya? Real skills develop karo yaar, warna resume mein 'TikTok Expert' likhna padega! 😂",
        (Some("TikTok"), Intensity::Light) => "TikTok expert spotted! 🎵 Hope you learned some cool moves! Just remember, real life mein bhi kuch productive karna padega! 😄",
        (Some("YouTube"), Intensity::Brutal) => "YouTube pe itna time? 📺 'How to be productive' videos dekhte dekhte hi unproductive ho gaye! Career goals YouTube shorts mein kho gaye kya? Time to close the app and actually DO something! 💪",
        (Some("YouTube"), Intensity::Medium) => "YouTube university se PhD kar rahe ho kya? 🎓 Itne videos dekhe hain, ab toh expert ban jana chahiye tha! But practical mein kya kiya? 🤔",
        (Some("YouTube"), Intensity::Light) => "YouTube pe research kar rahe the ya entertainment? 📚 Thoda balance maintain karo, knowledge gain karo but time bhi manage karo! 😊",
        (Some("Reddit"), Intensity::Brutal) => "Reddit pe itna time? 🤯 Random strangers ke comments padhte padhte apni life ka comment section hi bhool gaye! Touch some grass, literally! 🌱",
        (Some("Reddit"), Intensity::Medium) => "Reddit rabbit hole mein gir gaye? 🐰 Interesting discussions hote hain, but real world mein bhi kuch discuss karo! Friends ke saath bhi time spend karo! 😄",
        (Some("Reddit"), Intensity::Light) => "Reddit explorer! 🗺️ Interesting communities explore kar rahe ho, bas real life mein bhi explore karna mat bhoolna! 😊",
        (Some("Twitter"), Intensity::Brutal) => "Twitter pe itna time? 🐦 Hot takes padhte padhte apna social life cold ho gaya! Real friends se baat karne ka time hai ya bas online drama dekhna hai? Get a life beyond the timeline! 📱➡️🌍",
        (Some("Twitter"), Intensity::Medium) => "Twitter pe news updates ya drama updates dekh rahe the? 📰 Thoda filter karo content, mental peace bhi important hai! Real conversations bhi try karo! 😊",
        (Some("Twitter"), Intensity::Light) => "Twitter pe kya trending dekh rahe the? 📈 Hope it was something useful! Social media se thoda break leke social life mein bhi invest karo! 😄",
        _ => "Yaar, screen time dekh ke lagta hai phone tumhara best friend ban gaya hai! 📱 Real world mein bhi kuch time spend karo, wahan bhi interesting cheezein hoti hain! Balance is key! 😉",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serves one canned HTTP response on a local port. Returns the base URL
    /// and a receiver for the raw request.
    fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });
        (format!("http://{addr}"), rx)
    }

    /// Accepts connections and never answers them.
    fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });
        format!("http://{addr}")
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + length
    }

    fn client_with_key(base_url: String, key: &str, timeout_secs: u64) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: Some(key.into()),
            base_url,
            timeout_secs,
            ..GeminiConfig::default()
        })
        .unwrap()
    }

    fn online(base_url: String) -> GeminiClient {
        client_with_key(base_url, "test-key", 2)
    }

    #[test]
    fn offline_client_returns_placeholder() {
        let client = GeminiClient::new(GeminiConfig::default()).unwrap();
        let text = client.generate("a brutal roast about TikTok").unwrap();

        assert!(!client.is_online());
        assert!(text.starts_with(OFFLINE_PREFIX));
        assert!(text.contains("dance class"));
    }

    #[test]
    fn simulated_response_tracks_app_and_intensity() {
        assert!(simulated_response("light roast for Instagram").contains("scrolling champion"));
        assert!(simulated_response("medium roast for YouTube").contains("PhD"));
        assert!(simulated_response("brutal roast for LinkedIn").contains("best friend"));
    }

    #[test]
    fn closed_port_is_unavailable() {
        let client = online("http://127.0.0.1:9".into());

        assert!(matches!(
            client.generate("prompt"),
            Err(RoastError::ApiUnavailable(_))
        ));
        assert!(client.generate_or_placeholder("prompt").starts_with(OFFLINE_PREFIX));
    }

    #[test]
    fn connection_errors_never_contain_the_key() {
        let client = client_with_key("http://127.0.0.1:9".into(), "SECRET-KEY-123", 2);

        let err = client.generate("prompt").unwrap_err();
        assert!(matches!(err, RoastError::ApiUnavailable(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");
        assert!(!format!("{err:?}").contains("SECRET-KEY-123"));
    }

    #[test]
    fn key_travels_in_a_header() {
        let (base, requests) = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#,
        );
        client_with_key(base, "SECRET-KEY-123", 2)
            .generate("prompt")
            .unwrap();

        let request = requests.recv().unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("POST /models/gemini-1.5-flash:generateContent "));
        assert!(!request_line.contains("SECRET-KEY-123"));
        assert!(request
            .lines()
            .any(|line| line.eq_ignore_ascii_case("x-goog-api-key: SECRET-KEY-123")));
    }

    #[test]
    fn unanswered_request_times_out() {
        let client = client_with_key(silent_server(), "test-key", 1);

        match client.generate("brutal roast for Reddit") {
            Err(RoastError::ApiUnavailable(message)) => assert!(message.contains("timed out")),
            other => panic!("expected a timeout, got {other:?}"),
        }
        let text = client.generate_or_placeholder("brutal roast for Reddit");
        assert!(text.starts_with(OFFLINE_PREFIX));
        assert!(text.contains("Touch some grass"));
    }

    #[test]
    fn reads_text_from_first_candidate() {
        let (base, _) = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"Arre bhai, phone rakh do!"}]}}]}"#,
        );
        let text = online(base).generate("prompt").unwrap();
        assert_eq!(text, "Arre bhai, phone rakh do!");
    }

    #[test]
    fn rejected_key_is_an_auth_error() {
        let (base, _) = one_shot_server("HTTP/1.1 403 Forbidden", r#"{"error":"denied"}"#);
        assert!(matches!(online(base).generate("prompt"), Err(RoastError::Auth(_))));
    }

    #[test]
    fn malformed_body_is_unavailable() {
        let (base, _) = one_shot_server("HTTP/1.1 200 OK", r#"{"candidates":[]}"#);
        assert!(matches!(
            online(base).generate("prompt"),
            Err(RoastError::ApiUnavailable(_))
        ));
    }
}
