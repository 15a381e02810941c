//! Minimal element tree read from XML bytes.
//!
//! Only what the envelope parser needs is kept: local names (prefixes are dropped), the
//! non-namespace attributes, child elements and the concatenated text content.
use super::MalformedEnvelopeError;
use crate::registry::MAX_DEPTH;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Elements wrapping a payload or fault detail: Envelope, Body, Fault and detail.
const ENVELOPE_LEVELS: usize = 4;

/// Deepest element nesting accepted from a response.
pub(super) const MAX_ELEMENT_DEPTH: usize = MAX_DEPTH + ENVELOPE_LEVELS;

#[derive(Debug, Default)]
pub(super) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self, MalformedEnvelopeError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| MalformedEnvelopeError::Xml(e.to_string()))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| MalformedEnvelopeError::Xml(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Trimmed text of child `name`, if present.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }
}

/// Parses `bytes` into the single root element.
pub(super) fn parse(bytes: &[u8]) -> Result<Element, MalformedEnvelopeError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if stack.len() >= MAX_ELEMENT_DEPTH {
                    return Err(MalformedEnvelopeError::TooDeep(MAX_ELEMENT_DEPTH));
                }
                stack.push(Element::open(&e)?);
            }
            Ok(Event::Empty(e)) => {
                let element = Element::open(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or_else(|| {
                    MalformedEnvelopeError::Xml("closing tag without opening tag".to_string())
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| MalformedEnvelopeError::Xml(e.to_string()))?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(MalformedEnvelopeError::Xml(
                            "text outside of the root element".to_string(),
                        ));
                    }
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8(e.into_inner().into_owned())
                    .map_err(|e| MalformedEnvelopeError::Xml(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(MalformedEnvelopeError::Xml(e.to_string())),
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(MalformedEnvelopeError::Xml(format!(
            "element '{}' is never closed",
            open.name
        )));
    }

    root.ok_or(MalformedEnvelopeError::Empty)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), MalformedEnvelopeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(MalformedEnvelopeError::Xml(
                "more than one root element".to_string(),
            ));
        }
    }
    Ok(())
}
