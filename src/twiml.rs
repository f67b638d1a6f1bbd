//! Builder for the small TwiML vocabulary the voice webhooks speak.
//!
//! Rendering is deliberately dumb string assembly: the documents are tiny,
//! the verb set is closed and every attribute and text node goes through
//! [`xml_escape`]. A [`VoiceResponse`] is also an axum response, so handlers
//! can return markup on every code path by construction.

use axum::http::header;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, PartialEq)]
enum Verb {
    Say {
        text: String,
        voice: String,
        language: String,
    },
    Play {
        url: String,
    },
    Gather(Gather),
    Redirect {
        url: String,
        method: String,
    },
    Pause {
        length: u32,
    },
    Hangup,
}

/// `<Gather>` collects DTMF digits and posts them to `action`. Nested verbs
/// play while the provider waits for input.
#[derive(Debug, Clone, PartialEq)]
pub struct Gather {
    action: String,
    method: String,
    num_digits: Option<u32>,
    timeout: Option<u32>,
    children: Vec<Verb>,
}

impl Gather {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            method: "POST".to_string(),
            num_digits: None,
            timeout: None,
            children: Vec::new(),
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn num_digits(mut self, digits: u32) -> Self {
        self.num_digits = Some(digits);
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn say(mut self, text: &str, voice: &str, language: &str) -> Self {
        self.children.push(Verb::Say {
            text: text.to_string(),
            voice: voice.to_string(),
            language: language.to_string(),
        });
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.children.push(Verb::Play { url: url.into() });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: &str, voice: &str, language: &str) -> Self {
        self.verbs.push(Verb::Say {
            text: text.to_string(),
            voice: voice.to_string(),
            language: language.to_string(),
        });
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play { url: url.into() });
        self
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn redirect(mut self, url: impl Into<String>, method: &str) -> Self {
        self.verbs.push(Verb::Redirect {
            url: url.into(),
            method: method.to_string(),
        });
        self
    }

    pub fn pause(mut self, length: u32) -> Self {
        self.verbs.push(Verb::Pause { length });
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn render(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n");
        for verb in &self.verbs {
            write_verb(&mut xml, verb, 1);
        }
        xml.push_str("</Response>");
        xml
    }
}

fn write_verb(xml: &mut String, verb: &Verb, depth: usize) {
    let pad = "  ".repeat(depth);
    match verb {
        Verb::Say {
            text,
            voice,
            language,
        } => {
            xml.push_str(&format!(
                "{pad}<Say voice=\"{}\" language=\"{}\">{}</Say>\n",
                xml_escape(voice),
                xml_escape(language),
                xml_escape(text)
            ));
        }
        Verb::Play { url } => {
            xml.push_str(&format!("{pad}<Play>{}</Play>\n", xml_escape(url)));
        }
        Verb::Gather(gather) => {
            let mut attrs = format!(
                " action=\"{}\" method=\"{}\"",
                xml_escape(&gather.action),
                xml_escape(&gather.method)
            );
            if let Some(digits) = gather.num_digits {
                attrs.push_str(&format!(" numDigits=\"{}\"", digits));
            }
            if let Some(timeout) = gather.timeout {
                attrs.push_str(&format!(" timeout=\"{}\"", timeout));
            }
            if gather.children.is_empty() {
                xml.push_str(&format!("{pad}<Gather{attrs}/>\n"));
            } else {
                xml.push_str(&format!("{pad}<Gather{attrs}>\n"));
                for child in &gather.children {
                    write_verb(xml, child, depth + 1);
                }
                xml.push_str(&format!("{pad}</Gather>\n"));
            }
        }
        Verb::Redirect { url, method } => {
            xml.push_str(&format!(
                "{pad}<Redirect method=\"{}\">{}</Redirect>\n",
                xml_escape(method),
                xml_escape(url)
            ));
        }
        Verb::Pause { length } => {
            xml.push_str(&format!("{pad}<Pause length=\"{}\"/>\n", length));
        }
        Verb::Hangup => {
            xml.push_str(&format!("{pad}<Hangup/>\n"));
        }
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

impl IntoResponse for VoiceResponse {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
            self.render(),
        )
            .into_response()
    }
}
