//! OPF side-car parsing.
//!
//! Reads the subset of an e-book package document that matters for the
//! feed: title, primary creator, description, language, publication date,
//! and identifiers keyed by scheme. Parsing is lenient: any failure yields
//! `None` and the scanner falls back to audio tags and folder names.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpfMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    /// Description as present in the document, HTML markup preserved.
    pub description_html: Option<String>,
    /// Plain-text projection of the description.
    pub description: Option<String>,
    pub language: Option<String>,
    pub date: Option<String>,
    /// Identifier scheme (lowercased) -> value.
    pub identifiers: BTreeMap<String, String>,
}

impl OpfMetadata {
    pub fn isbn(&self) -> Option<&str> {
        self.identifiers.get("isbn").map(String::as_str)
    }
}

/// Parse the first OPF document at `path`. Malformed XML is logged and
/// reported as absent.
pub fn parse_opf(path: &Path) -> Option<OpfMetadata> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "failed to read opf");
            return None;
        }
    };
    match parse_opf_str(&content) {
        Ok(meta) => Some(meta),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "failed to parse opf");
            None
        }
    }
}

fn parse_opf_str(content: &str) -> Result<OpfMetadata, quick_xml::Error> {
    let mut reader = Reader::from_str(content);
    let mut meta = OpfMetadata::default();

    let mut buf = Vec::new();
    let mut text_buffer = String::new();
    let mut current_scheme: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                text_buffer.clear();
                if e.local_name().as_ref() == b"identifier" {
                    current_scheme = None;
                    for attr in e.attributes().flatten() {
                        let key = attr.key.as_ref();
                        if key == b"scheme" || key.ends_with(b":scheme") {
                            if let Ok(value) = attr.unescape_value() {
                                current_scheme = Some(value.to_lowercase());
                            }
                        }
                    }
                }
            }
            Event::Text(e) => {
                if let Ok(unescaped) = e.unescape() {
                    text_buffer.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                text_buffer.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(e) => {
                let text = text_buffer.trim();
                match e.local_name().as_ref() {
                    b"title" if meta.title.is_none() && !text.is_empty() => {
                        meta.title = Some(text.to_string());
                    }
                    b"creator" if meta.creator.is_none() && !text.is_empty() => {
                        meta.creator = Some(text.to_string());
                    }
                    b"description" if meta.description.is_none() && !text.is_empty() => {
                        meta.description_html = Some(text.to_string());
                        meta.description = Some(strip_html(text));
                    }
                    b"language" if meta.language.is_none() && !text.is_empty() => {
                        meta.language = Some(text.to_string());
                    }
                    b"date" if meta.date.is_none() && !text.is_empty() => {
                        meta.date = Some(text.to_string());
                    }
                    b"identifier" if !text.is_empty() => {
                        let scheme = current_scheme.take().or_else(|| {
                            // `urn:isbn:...` values carry their own scheme
                            text.strip_prefix("urn:")
                                .and_then(|rest| rest.split_once(':'))
                                .map(|(scheme, _)| scheme.to_lowercase())
                        });
                        if let Some(scheme) = scheme {
                            let value = text
                                .rsplit_once(':')
                                .map(|(_, v)| v)
                                .unwrap_or(text)
                                .to_string();
                            meta.identifiers.entry(scheme).or_insert(value);
                        }
                    }
                    _ => {}
                }
                text_buffer.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(meta)
}

/// Drop markup from an HTML fragment, collapsing the result's whitespace.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
