//! Call-control webhook.
//!
//! The telephony provider requests `POST /voice` when a call arrives. The
//! answer is a TwiML document that optionally speaks a greeting and then
//! connects a bidirectional media stream back to this server's `/media`
//! endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

/// Greeting spoken before the stream connects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Greeting<'a> {
    pub text: &'a str,
    pub language: Option<&'a str>,
    pub voice: Option<&'a str>,
}

pub async fn voice_webhook(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let request_host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty());

    let Some(host) = request_host.or(state.config.public_host.as_deref()) else {
        warn!("Voice webhook without Host header and no PUBLIC_HOST configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Cannot determine media stream host",
        )
            .into_response();
    };

    let greeting = state.config.greeting_text.as_deref().map(|text| Greeting {
        text,
        language: state.config.greeting_language.as_deref(),
        voice: state.config.greeting_voice.as_deref(),
    });

    let stream_url = format!("wss://{host}/media");
    info!(stream_url = %stream_url, "Answering incoming call");

    (
        [(header::CONTENT_TYPE, "text/xml")],
        build_twiml(&stream_url, greeting.as_ref()),
    )
        .into_response()
}

/// TwiML connecting the call to `stream_url`, after an optional greeting.
pub fn build_twiml(stream_url: &str, greeting: Option<&Greeting<'_>>) -> String {
    let mut twiml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);

    if let Some(greeting) = greeting {
        twiml.push_str("<Say");
        if let Some(language) = greeting.language {
            twiml.push_str(&format!(r#" language="{}""#, escape_xml(language)));
        }
        if let Some(voice) = greeting.voice {
            twiml.push_str(&format!(r#" voice="{}""#, escape_xml(voice)));
        }
        twiml.push('>');
        twiml.push_str(&escape_xml(greeting.text));
        twiml.push_str("</Say>");
    }

    twiml.push_str(&format!(
        r#"<Connect><Stream url="{}"/></Connect></Response>"#,
        escape_xml(stream_url)
    ));
    twiml
}

fn escape_xml(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
