//! HTTP implementation of the collaborators
//!
//! Both services live behind one origin:
//! - `POST /login`    `{email, password}` -> `{success}` | `{error}`
//! - `POST /generate` `{text, voice}`     -> `{success, audio_url}` | `{error}`
//! - `GET  /voices`                       -> `{voices: [...]}`
//!
//! Error replies come back with 4xx/5xx statuses but still carry a JSON
//! body, so the body is decoded the same way regardless of status.

use super::{
    decode_login_reply, decode_synthesis_reply, decode_voices_reply, AuthBackend, AuthReply,
    CallResult, LoginRequest, SynthesisBackend, SynthesisReply, SynthesisRequest, TransportError,
};
use log::{debug, warn};
use serde::Serialize;
use std::time::Duration;

/// Talks to the voice server over HTTP
pub struct HttpBackend {
    agent: ureq::Agent,
    origin: String,
}

impl HttpBackend {
    /// Create a backend for the given origin (e.g. `http://localhost:5000`)
    ///
    /// Only connecting is bounded by a timeout; a slow synthesis is allowed
    /// to take as long as it takes.
    pub fn new(origin: &str, connect_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .user_agent(&format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build();

        Self {
            agent,
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    /// Server origin without trailing slash
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    /// POST a JSON body and return the reply body, whatever the status
    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> CallResult<String> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = match self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .send_json(body)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                debug!("POST {} answered with status {}", url, code);
                resp
            }
            Err(ureq::Error::Transport(transport)) => return Err(from_transport(transport)),
        };

        response
            .into_string()
            .map_err(|e| TransportError::malformed(format!("reading reply body: {}", e)))
    }

    fn get(&self, path: &str) -> CallResult<String> {
        let url = self.url(path);
        debug!("GET {}", url);

        match self.agent.get(&url).call() {
            Ok(resp) => resp
                .into_string()
                .map_err(|e| TransportError::malformed(format!("reading reply body: {}", e))),
            Err(ureq::Error::Status(code, _)) => Err(TransportError::malformed(format!(
                "GET {} answered with status {}",
                path, code
            ))),
            Err(ureq::Error::Transport(transport)) => Err(from_transport(transport)),
        }
    }
}

fn from_transport(transport: ureq::Transport) -> TransportError {
    let combined = format!("{:?} {}", transport.kind(), transport);
    let kind = TransportError::classify(&combined);
    warn!("Transport failure ({:?}): {}", kind, transport);
    TransportError::new(kind, transport.to_string())
}

impl AuthBackend for HttpBackend {
    fn login(&self, request: &LoginRequest) -> CallResult<AuthReply> {
        let body = self.post_json("/login", request)?;
        decode_login_reply(&body)
    }
}

impl SynthesisBackend for HttpBackend {
    fn synthesize(&self, request: &SynthesisRequest) -> CallResult<SynthesisReply> {
        let body = self.post_json("/generate", request)?;
        decode_synthesis_reply(&body)
    }

    fn available_voices(&self) -> CallResult<Vec<String>> {
        let body = self.get("/voices")?;
        decode_voices_reply(&body)
    }
}

/// Turn the server's relative audio path into a playable URL
///
/// Paths that are already absolute URLs pass through untouched.
pub fn resolve_audio_url(origin: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    let origin = origin.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", origin, path)
    } else {
        format!("{}/{}", origin, path)
    }
}
