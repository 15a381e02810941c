//! # Envelope Codec
//!
//! Serializes a [`WireValue`] tree into a SOAP 1.1 style request envelope and parses response
//! envelopes back into either a payload tree or a [`Fault`].
//!
//! ## Wire format
//!
//! ```xml
//! <SOAP-ENV:Envelope xmlns:SOAP-ENV="..." xmlns:SOAP-ENC="..." xmlns:xsi="..." xmlns:xsd="...">
//!   <SOAP-ENV:Header>              <!-- only when headers are given -->
//!     <Token>abc</Token>
//!   </SOAP-ENV:Header>
//!   <SOAP-ENV:Body>
//!     <ns1:GetUser xmlns:ns1="urn:users">   <!-- the wire tree root -->
//!       <userId>john_doe</userId>
//!     </ns1:GetUser>
//!   </SOAP-ENV:Body>
//! </SOAP-ENV:Envelope>
//! ```
//!
//! The operation element *is* the root of the tree. Field, header and operation names must be
//! unprefixed XML names, otherwise [`BuildError::InvalidName`] is returned:
//!
//! * `Struct`: one child element per field, in order.
//! * `Scalar`: escaped text content. Characters XML 1.0 cannot carry (most C0 controls,
//!   U+FFFE and U+FFFF) fail with [`BuildError::InvalidCharacter`] instead of being written.
//! * `Nil`: an empty element with `xsi:nil="true"`.
//! * `Sequence`: a `SOAP-ENC:arrayType` attribute and one `<item>` child per element.
//!
//! Parsing matches local names only, so any prefix (or a SOAP 1.2 envelope) is accepted.
//! The first element of the Body decides between a payload and a fault.
mod document;

use crate::binding::WireOperation;
use crate::wire::WireValue;
use document::Element;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fmt::{self, Display};

pub const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

const ENVELOPE: &str = "SOAP-ENV:Envelope";
const HEADER: &str = "SOAP-ENV:Header";
const BODY: &str = "SOAP-ENV:Body";
const FAULT: &str = "SOAP-ENV:Fault";
const OPERATION_PREFIX: &str = "ns1";
const SEQUENCE_ITEM: &str = "item";

/// An application-level failure reported by the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: String,
    pub reason: String,
    pub actor: Option<String>,
    pub detail: Option<WireValue>,
}

impl Fault {
    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
            actor: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: WireValue) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.reason)
    }
}

/// A parsed response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Payload(WireValue),
    Fault(Fault),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MalformedEnvelopeError {
    #[error("Response is not well-formed XML: {0}")]
    Xml(String),
    #[error("Response contains no XML element")]
    Empty,
    #[error("Expected an 'Envelope' root element, found '{0}'")]
    NotAnEnvelope(String),
    #[error("Envelope has no Body")]
    MissingBody,
    #[error("Envelope Body is empty")]
    EmptyBody,
    #[error("Fault is missing its '{0}' element")]
    IncompleteFault(&'static str),
    #[error("Response nests elements deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Failed to write envelope: {0}")]
    Write(String),
    #[error("'{0}' is not a valid XML element name")]
    InvalidName(String),
    #[error("Text of '{element}' contains U+{code:04X}, which XML 1.0 cannot carry")]
    InvalidCharacter { element: String, code: u32 },
}

fn write_failed<E: Display>(err: E) -> BuildError {
    BuildError::Write(err.to_string())
}

/// Builds the request envelope for `operation` carrying `tree`.
pub fn build_request(
    operation: &WireOperation,
    headers: &[(String, String)],
    tree: &WireValue,
) -> Result<Vec<u8>, BuildError> {
    let mut writer = open_envelope(headers)?;
    write_operation_element(&mut writer, operation, &operation.name, tree)?;
    close_envelope(writer)
}

/// Builds a successful response envelope, as a server answering `operation` would.
pub fn build_response(operation: &WireOperation, tree: &WireValue) -> Result<Vec<u8>, BuildError> {
    let mut writer = open_envelope(&[])?;
    let name = format!("{}Response", operation.name);
    write_operation_element(&mut writer, operation, &name, tree)?;
    close_envelope(writer)
}

/// Builds a fault response envelope.
pub fn build_fault(fault: &Fault) -> Result<Vec<u8>, BuildError> {
    let mut writer = open_envelope(&[])?;

    start(&mut writer, BytesStart::new(FAULT))?;
    write_text_element(&mut writer, "faultcode", &fault.code)?;
    write_text_element(&mut writer, "faultstring", &fault.reason)?;
    if let Some(actor) = &fault.actor {
        write_text_element(&mut writer, "faultactor", actor)?;
    }
    if let Some(detail) = &fault.detail {
        write_element(&mut writer, BytesStart::new("detail"), detail)?;
    }
    end(&mut writer, FAULT)?;

    close_envelope(writer)
}

/// Parses a response envelope into its payload tree or its fault.
pub fn parse_response(bytes: &[u8]) -> Result<Response, MalformedEnvelopeError> {
    let root = document::parse(bytes)?;

    if root.name != "Envelope" {
        return Err(MalformedEnvelopeError::NotAnEnvelope(root.name));
    }

    let body = root
        .child("Body")
        .ok_or(MalformedEnvelopeError::MissingBody)?;
    let first = body
        .children
        .first()
        .ok_or(MalformedEnvelopeError::EmptyBody)?;

    if first.name == "Fault" {
        return parse_fault(first).map(Response::Fault);
    }

    Ok(Response::Payload(to_wire(first)))
}

fn open_envelope(headers: &[(String, String)]) -> Result<Writer<Vec<u8>>, BuildError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_failed)?;

    start(
        &mut writer,
        BytesStart::new(ENVELOPE).with_attributes([
            ("xmlns:SOAP-ENV", ENVELOPE_NS),
            ("xmlns:SOAP-ENC", ENCODING_NS),
            ("xmlns:xsi", XSI_NS),
            ("xmlns:xsd", XSD_NS),
        ]),
    )?;

    if !headers.is_empty() {
        start(&mut writer, BytesStart::new(HEADER))?;
        for (name, value) in headers {
            write_text_element(&mut writer, name, value)?;
        }
        end(&mut writer, HEADER)?;
    }

    start(&mut writer, BytesStart::new(BODY))?;
    Ok(writer)
}

fn close_envelope(mut writer: Writer<Vec<u8>>) -> Result<Vec<u8>, BuildError> {
    end(&mut writer, BODY)?;
    end(&mut writer, ENVELOPE)?;
    Ok(writer.into_inner())
}

fn write_operation_element(
    writer: &mut Writer<Vec<u8>>,
    operation: &WireOperation,
    local_name: &str,
    tree: &WireValue,
) -> Result<(), BuildError> {
    if operation.namespace.is_empty() {
        return write_element(writer, element(local_name)?, tree);
    }

    check_name(local_name)?;
    check_text("xmlns", &operation.namespace)?;
    let name = format!("{OPERATION_PREFIX}:{local_name}");
    let element = BytesStart::new(name.as_str())
        .with_attributes([(format!("xmlns:{OPERATION_PREFIX}").as_str(), operation.namespace.as_str())]);
    write_element(writer, element, tree)
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    mut element: BytesStart<'_>,
    tree: &WireValue,
) -> Result<(), BuildError> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();

    match tree {
        WireValue::Nil => {
            element.push_attribute(("xsi:nil", "true"));
            writer
                .write_event(Event::Empty(element))
                .map_err(write_failed)?;
        }
        WireValue::Scalar(text) => {
            check_text(&name, text)?;
            start(writer, element)?;
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_failed)?;
            end(writer, &name)?;
        }
        WireValue::Sequence(items) => {
            let array_type = format!("xsd:anyType[{}]", items.len());
            element.push_attribute(("SOAP-ENC:arrayType", array_type.as_str()));
            start(writer, element)?;
            for item in items {
                write_element(writer, BytesStart::new(SEQUENCE_ITEM), item)?;
            }
            end(writer, &name)?;
        }
        WireValue::Struct(fields) => {
            start(writer, element)?;
            for (field, value) in fields {
                write_element(writer, self::element(field)?, value)?;
            }
            end(writer, &name)?;
        }
    }
    Ok(())
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), BuildError> {
    write_element(writer, element(name)?, &WireValue::scalar(text))
}

fn element(name: &str) -> Result<BytesStart<'_>, BuildError> {
    check_name(name)?;
    Ok(BytesStart::new(name))
}

/// Unprefixed XML 1.0 `Name`: the prefix of every written element is chosen by the codec.
fn check_name(name: &str) -> Result<(), BuildError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(is_name_start) && chars.all(is_name_char);
    if valid {
        Ok(())
    } else {
        Err(BuildError::InvalidName(name.to_string()))
    }
}

fn is_name_start(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '_'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

fn check_text(element: &str, text: &str) -> Result<(), BuildError> {
    let forbidden = text.chars().find(|&c| {
        matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
    });

    match forbidden {
        Some(c) => Err(BuildError::InvalidCharacter {
            element: element.to_string(),
            code: c as u32,
        }),
        None => Ok(()),
    }
}

fn start(writer: &mut Writer<Vec<u8>>, element: BytesStart<'_>) -> Result<(), BuildError> {
    writer
        .write_event(Event::Start(element))
        .map_err(write_failed)
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), BuildError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(write_failed)
}

fn to_wire(element: &Element) -> WireValue {
    if matches!(element.attribute("nil"), Some("true" | "1")) {
        return WireValue::Nil;
    }

    let is_array = element.attribute("arrayType").is_some()
        || element
            .attribute("type")
            .is_some_and(|t| t.rsplit(':').next() == Some("Array"));
    if is_array {
        return WireValue::Sequence(element.children.iter().map(to_wire).collect());
    }

    if element.children.is_empty() {
        return WireValue::Scalar(element.text.clone());
    }

    WireValue::Struct(
        element
            .children
            .iter()
            .map(|child| (child.name.clone(), to_wire(child)))
            .collect(),
    )
}

fn parse_fault(element: &Element) -> Result<Fault, MalformedEnvelopeError> {
    // SOAP 1.2 nests the code and reason one level deeper.
    let code = element
        .child_text("faultcode")
        .or_else(|| element.child("Code").and_then(|c| c.child_text("Value")))
        .ok_or(MalformedEnvelopeError::IncompleteFault("faultcode"))?;
    let reason = element
        .child_text("faultstring")
        .or_else(|| element.child("Reason").and_then(|r| r.child_text("Text")))
        .ok_or(MalformedEnvelopeError::IncompleteFault("faultstring"))?;
    let actor = element
        .child_text("faultactor")
        .or_else(|| element.child_text("Role"))
        .map(str::to_string);
    let detail = element
        .child("detail")
        .or_else(|| element.child("Detail"))
        .filter(|d| !d.children.is_empty() || !d.text.trim().is_empty())
        .map(to_wire);

    Ok(Fault {
        code: code.to_string(),
        reason: reason.to_string(),
        actor,
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_user() -> WireOperation {
        WireOperation::new("urn:users", "GetUser")
    }

    #[test]
    fn request_wraps_tree_in_operation_element() {
        let tree = WireValue::Struct(vec![
            ("userId".to_string(), WireValue::scalar("john_doe")),
            ("filter".to_string(), WireValue::Nil),
        ]);

        let bytes = build_request(&get_user(), &[], &tree).unwrap();
        let xml = String::from_utf8(bytes).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(
            r#"<SOAP-ENV:Body><ns1:GetUser xmlns:ns1="urn:users"><userId>john_doe</userId><filter xsi:nil="true"/></ns1:GetUser></SOAP-ENV:Body>"#
        ));
        assert!(!xml.contains(HEADER));
    }

    #[test]
    fn headers_are_written_before_the_body() {
        let headers = vec![("Token".to_string(), "a<b".to_string())];
        let bytes = build_request(&get_user(), &headers, &WireValue::scalar("x")).unwrap();
        let xml = String::from_utf8(bytes).unwrap();

        assert!(xml.contains("<SOAP-ENV:Header><Token>a&lt;b</Token></SOAP-ENV:Header><SOAP-ENV:Body>"));
    }

    #[test]
    fn response_trees_survive_the_codec() {
        let tree = WireValue::Struct(vec![
            ("Name".to_string(), WireValue::scalar("Ann & <Bob> \"quoted\"")),
            ("Padded".to_string(), WireValue::scalar("  spaced  ")),
            ("Empty".to_string(), WireValue::scalar("")),
            ("Missing".to_string(), WireValue::Nil),
            (
                "Tags".to_string(),
                WireValue::Sequence(vec![WireValue::scalar("a"), WireValue::Nil]),
            ),
            ("None".to_string(), WireValue::Sequence(vec![])),
        ]);

        let bytes = build_response(&get_user(), &tree).unwrap();
        assert_eq!(parse_response(&bytes).unwrap(), Response::Payload(tree));
    }

    #[test]
    fn unrepresentable_text_is_rejected() {
        let err = build_request(&get_user(), &[], &WireValue::scalar("a\u{1}b\u{0}c")).unwrap_err();
        assert_eq!(
            err,
            BuildError::InvalidCharacter {
                element: "ns1:GetUser".to_string(),
                code: 0x1
            }
        );

        let fault = Fault::new("Server", "bell \u{7}");
        assert!(matches!(
            build_fault(&fault),
            Err(BuildError::InvalidCharacter { code: 0x7, .. })
        ));

        let text = "tab\tnew\nline\r é \u{10FFFF}";
        assert!(build_request(&get_user(), &[], &WireValue::scalar(text)).is_ok());
    }

    #[test]
    fn element_names_are_validated() {
        let headers = vec![("a b".to_string(), "c".to_string())];
        assert_eq!(
            build_request(&get_user(), &headers, &WireValue::scalar("x")).unwrap_err(),
            BuildError::InvalidName("a b".to_string())
        );

        for name in ["", "1st", "x:y", "a>b", "-lead"] {
            let tree = WireValue::Struct(vec![(name.to_string(), WireValue::scalar("v"))]);
            assert_eq!(
                build_request(&get_user(), &[], &tree).unwrap_err(),
                BuildError::InvalidName(name.to_string())
            );
        }

        let tree = WireValue::Struct(vec![("Straße_2.x-y".to_string(), WireValue::scalar("v"))]);
        assert!(build_request(&get_user(), &[], &tree).is_ok());
        assert!(matches!(
            build_request(&WireOperation::new("urn:users", "Get User"), &[], &tree),
            Err(BuildError::InvalidName(_))
        ));
    }

    #[test]
    fn deeply_nested_responses_are_malformed() {
        let depth = 20_000;
        let xml = format!(
            "<Envelope><Body>{}{}</Body></Envelope>",
            "<a>".repeat(depth),
            "</a>".repeat(depth)
        );

        assert!(matches!(
            parse_response(xml.as_bytes()),
            Err(MalformedEnvelopeError::TooDeep(_))
        ));
    }

    #[test]
    fn scalar_payload_is_text_content() {
        let bytes = build_response(
            &WireOperation::new("", "echo"),
            &WireValue::scalar("Hello from Python!"),
        )
        .unwrap();

        assert!(String::from_utf8_lossy(&bytes).contains("<echoResponse>Hello from Python!</echoResponse>"));
        assert_eq!(
            parse_response(&bytes).unwrap(),
            Response::Payload(WireValue::scalar("Hello from Python!"))
        );
    }

    #[test]
    fn fault_is_discriminated_from_payload() {
        let fault = Fault::new("Server.Error", "bad input").with_detail(WireValue::Struct(vec![(
            "field".to_string(),
            WireValue::scalar("UserId"),
        )]));

        let bytes = build_fault(&fault).unwrap();
        assert_eq!(parse_response(&bytes).unwrap(), Response::Fault(fault));
    }

    #[test]
    fn foreign_prefixes_and_soap12_faults_are_understood() {
        let xml = br#"<?xml version="1.0"?>
            <env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
              <env:Body>
                <env:Fault>
                  <env:Code><env:Value>env:Sender</env:Value></env:Code>
                  <env:Reason><env:Text xml:lang="en">bad input</env:Text></env:Reason>
                </env:Fault>
              </env:Body>
            </env:Envelope>"#;

        assert_eq!(
            parse_response(xml).unwrap(),
            Response::Fault(Fault::new("env:Sender", "bad input"))
        );
    }

    #[test]
    fn unmarked_arrays_parse_as_structs() {
        let xml = br#"<Envelope><Body><r><x>1</x><x>2</x></r></Body></Envelope>"#;
        assert_eq!(
            parse_response(xml).unwrap(),
            Response::Payload(WireValue::Struct(vec![
                ("x".to_string(), WireValue::scalar("1")),
                ("x".to_string(), WireValue::scalar("2")),
            ]))
        );
    }

    #[test]
    fn malformed_envelopes_are_not_faults() {
        assert!(matches!(
            parse_response(b"not xml at all <"),
            Err(MalformedEnvelopeError::Xml(_) | MalformedEnvelopeError::Empty)
        ));
        assert_eq!(
            parse_response(b"<html><body/></html>"),
            Err(MalformedEnvelopeError::NotAnEnvelope("html".to_string()))
        );
        assert_eq!(
            parse_response(b"<Envelope><Header/></Envelope>"),
            Err(MalformedEnvelopeError::MissingBody)
        );
        assert_eq!(
            parse_response(b"<Envelope><Body>   </Body></Envelope>"),
            Err(MalformedEnvelopeError::EmptyBody)
        );
        assert_eq!(
            parse_response(b"<Envelope><Body><Fault><faultstring>x</faultstring></Fault></Body></Envelope>"),
            Err(MalformedEnvelopeError::IncompleteFault("faultcode"))
        );
    }
}
