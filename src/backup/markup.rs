//! Markup (XML) mirror of a JSON payload
//!
//! Objects become nested elements and arrays become repeated sibling
//! elements. Values XML cannot type on its own carry small hints so the
//! markup parses back to exactly the JSON it came from:
//!
//! | JSON value      | Markup                                 |
//! |-----------------|----------------------------------------|
//! | `"text"`        | `<k>text</k>`                          |
//! | `""`            | `<k/>`                                 |
//! | `52.0`          | `<k type="number">52.0</k>`            |
//! | `true`          | `<k type="boolean">true</k>`           |
//! | `null`          | `<k nil="true"/>`                      |
//! | `{}`            | `<k type="object"/>`                   |
//! | `[]`            | `<k type="array"/>`                    |
//! | `[a, b]`        | `<k array="true">a</k><k array="true">b</k>` |
//!
//! Keys that are not XML names, strings holding characters XML 1.0
//! forbids, and arrays nested directly inside arrays cannot be expressed
//! and fail the conversion. A carriage return is written as `&#13;`.

use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use serde_json::{Map, Number, Value};

/// Markup conversion errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    #[error("'{0}' is not a valid element name")]
    InvalidName(String),

    #[error("'{0}' holds an array nested directly in an array")]
    NestedArray(String),

    #[error("could not write markup: {0}")]
    Write(String),

    #[error("malformed markup: {0}")]
    Parse(String),

    #[error("document has no root element")]
    MissingRoot,

    #[error("element '{0}' appears more than once")]
    DuplicateKey(String),

    #[error("element '{key}' has invalid {kind} value '{value}'")]
    InvalidScalar {
        key: String,
        kind: &'static str,
        value: String,
    },

    #[error("root element '{0}' does not hold an object")]
    NotAnObject(String),

    #[error("element '{key}' holds character U+{code:04X}, which XML 1.0 does not allow")]
    InvalidChar { key: String, code: u32 },
}

const TYPE_ATTR: &str = "type";
const NIL_ATTR: &str = "nil";
const ARRAY_ATTR: &str = "array";

/// Whether `name` can be used as an element name.
///
/// Colons are rejected as well, so keys never turn into namespace prefixes.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Render `fields` under a root element.
pub fn to_markup(
    root: &str,
    namespace: Option<&str>,
    fields: &Map<String, Value>,
) -> Result<String, MarkupError> {
    if !is_valid_name(root) {
        return Err(MarkupError::InvalidName(root.to_string()));
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut start = BytesStart::new(root);
    if let Some(ns) = namespace {
        start.push_attribute(("xmlns", ns));
    }
    if fields.is_empty() {
        write(&mut writer, Event::Empty(start))?;
    } else {
        write(&mut writer, Event::Start(start))?;
        for (key, value) in fields {
            write_value(&mut writer, key, value, false)?;
        }
        write(&mut writer, Event::End(BytesEnd::new(root)))?;
    }

    let mut text = String::from_utf8(writer.into_inner())
        .map_err(|e| MarkupError::Write(e.to_string()))?;
    text.push('\n');
    Ok(text)
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), MarkupError> {
    writer
        .write_event(event)
        .map_err(|e| MarkupError::Write(e.to_string()))
}

fn write_value(
    writer: &mut Writer<Vec<u8>>,
    key: &str,
    value: &Value,
    array_item: bool,
) -> Result<(), MarkupError> {
    if !is_valid_name(key) {
        return Err(MarkupError::InvalidName(key.to_string()));
    }

    let mut start = BytesStart::new(key);
    if array_item {
        start.push_attribute((ARRAY_ATTR, "true"));
    }

    match value {
        Value::Null => {
            start.push_attribute((NIL_ATTR, "true"));
            write(writer, Event::Empty(start))
        }
        Value::Bool(b) => {
            start.push_attribute((TYPE_ATTR, "boolean"));
            write_text_element(writer, start, key, &b.to_string())
        }
        Value::Number(n) => {
            start.push_attribute((TYPE_ATTR, "number"));
            write_text_element(writer, start, key, &n.to_string())
        }
        Value::String(s) if s.is_empty() => write(writer, Event::Empty(start)),
        Value::String(s) => write_text_element(writer, start, key, s),
        Value::Object(map) if map.is_empty() => {
            start.push_attribute((TYPE_ATTR, "object"));
            write(writer, Event::Empty(start))
        }
        Value::Object(map) => {
            write(writer, Event::Start(start))?;
            for (child_key, child) in map {
                write_value(writer, child_key, child, false)?;
            }
            write(writer, Event::End(BytesEnd::new(key)))
        }
        Value::Array(items) => {
            if array_item {
                return Err(MarkupError::NestedArray(key.to_string()));
            }
            if items.is_empty() {
                start.push_attribute((TYPE_ATTR, "array"));
                return write(writer, Event::Empty(start));
            }
            for item in items {
                if item.is_array() {
                    return Err(MarkupError::NestedArray(key.to_string()));
                }
                write_value(writer, key, item, true)?;
            }
            Ok(())
        }
    }
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    key: &str,
    text: &str,
) -> Result<(), MarkupError> {
    if let Some(c) = text.chars().find(|&c| !is_xml_char(c)) {
        return Err(MarkupError::InvalidChar {
            key: key.to_string(),
            code: c as u32,
        });
    }

    // Readers normalise a literal CR away, so it goes out as a reference
    let escaped = text
        .split('\r')
        .map(escape)
        .collect::<Vec<_>>()
        .join("&#13;");

    write(writer, Event::Start(start))?;
    write(writer, Event::Text(BytesText::from_escaped(escaped)))?;
    write(writer, Event::End(BytesEnd::new(key)))
}

/// The `Char` production of XML 1.0
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
}

/// Element being parsed
#[derive(Default)]
struct Frame {
    name: String,
    type_hint: Option<String>,
    nil: bool,
    array_item: bool,
    text: String,
    children: Vec<(String, Value, bool)>,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, MarkupError> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| MarkupError::Parse(e.to_string()))?
            .to_string();
        let mut frame = Frame {
            name,
            ..Frame::default()
        };

        for attr in start.attributes() {
            let attr = attr.map_err(|e| MarkupError::Parse(e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| MarkupError::Parse(e.to_string()))?;
            match attr.key.as_ref() {
                b"type" => frame.type_hint = Some(value.into_owned()),
                b"nil" => frame.nil = value == "true",
                b"array" => frame.array_item = value == "true",
                _ => {}
            }
        }
        Ok(frame)
    }

    fn close(self) -> Result<(String, Value, bool), MarkupError> {
        let value = if self.nil {
            Value::Null
        } else if !self.children.is_empty() {
            Value::Object(collect_children(self.children)?)
        } else {
            match self.type_hint.as_deref() {
                Some("object") => Value::Object(Map::new()),
                Some("array") => Value::Array(Vec::new()),
                Some("number") => {
                    let number: Number = self.text.trim().parse().map_err(|_| MarkupError::InvalidScalar {
                        key: self.name.clone(),
                        kind: "number",
                        value: self.text.clone(),
                    })?;
                    Value::Number(number)
                }
                Some("boolean") => match self.text.trim() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    other => {
                        return Err(MarkupError::InvalidScalar {
                            key: self.name.clone(),
                            kind: "boolean",
                            value: other.to_string(),
                        })
                    }
                },
                _ => Value::String(self.text),
            }
        };
        Ok((self.name, value, self.array_item))
    }
}

fn collect_children(children: Vec<(String, Value, bool)>) -> Result<Map<String, Value>, MarkupError> {
    let mut map = Map::new();
    for (name, value, array_item) in children {
        if array_item {
            match map.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(_) => return Err(MarkupError::DuplicateKey(name)),
                None => {
                    map.insert(name, Value::Array(vec![value]));
                }
            }
        } else if map.contains_key(&name) {
            return Err(MarkupError::DuplicateKey(name));
        } else {
            map.insert(name, value);
        }
    }
    Ok(map)
}

/// Parse markup back into `(root element name, fields)`.
pub fn from_markup(xml: &str) -> Result<(String, Map<String, Value>), MarkupError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| MarkupError::Parse(format!("at byte {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(MarkupError::Parse("content after the root element".to_string()));
                }
                stack.push(Frame::open(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(MarkupError::Parse("content after the root element".to_string()));
                }
                let closed = Frame::open(&start)?.close()?;
                attach(&mut stack, &mut root, closed);
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| MarkupError::Parse(e.to_string()))?;
                    frame.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    let text = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|e| MarkupError::Parse(e.to_string()))?;
                    frame.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| MarkupError::Parse("unbalanced end tag".to_string()))?;
                let closed = frame.close()?;
                attach(&mut stack, &mut root, closed);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(MarkupError::Parse("unclosed element at end of document".to_string()));
    }

    match root {
        Some((name, Value::Object(map))) => Ok((name, map)),
        Some((name, Value::String(text))) if text.trim().is_empty() => Ok((name, Map::new())),
        Some((name, _)) => Err(MarkupError::NotAnObject(name)),
        None => Err(MarkupError::MissingRoot),
    }
}

fn attach(stack: &mut [Frame], root: &mut Option<(String, Value)>, closed: (String, Value, bool)) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(closed),
        None => *root = Some((closed.0, closed.1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_carriage_return_is_written_as_reference() {
        let record = fields(json!({ "Description": "line one\r\nline two" }));
        let xml = to_markup("Flow", None, &record).unwrap();

        assert!(xml.contains("<Description>line one&#13;\nline two</Description>"));
        assert!(!xml.contains('\r'));
        let (_, parsed) = from_markup(&xml).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_forbidden_control_character_fails() {
        let err = to_markup("Flow", None, &fields(json!({ "Description": "a\u{1}b" }))).unwrap_err();
        assert_eq!(
            err,
            MarkupError::InvalidChar {
                key: "Description".into(),
                code: 1
            }
        );
        assert!(to_markup("Flow", None, &fields(json!({ "Label": "tab\there" }))).is_ok());
        assert!(to_markup("Flow", None, &fields(json!({ "Label": "\u{FFFE}" }))).is_err());
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("ApiVersion"));
        assert!(is_valid_name("_x-1.y"));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("a b"));
        assert!(!is_valid_name("ns:tag"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_layout_of_scalars() {
        let xml = to_markup(
            "Flow",
            None,
            &fields(json!({ "ApiVersion": 52.0, "Label": "Order & Ship", "Empty": "", "Gone": null })),
        )
        .unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Flow>"));
        assert!(xml.contains("<ApiVersion type=\"number\">52.0</ApiVersion>"));
        assert!(xml.contains("<Label>Order &amp; Ship</Label>"));
        assert!(xml.contains("<Empty/>"));
        assert!(xml.contains("<Gone nil=\"true\"/>"));
    }

    #[test]
    fn test_payload_survives_markup() {
        let payload = fields(json!({
            "ApiVersion": 52.0,
            "Description": "line one\nline two  ",
            "Metadata": {
                "label": "Order Flow",
                "isTemplate": false,
                "runInMode": null,
                "start": { "locationX": 50, "locationY": 0 },
                "processMetadataValues": [
                    { "name": "BuilderType", "value": { "stringValue": "LightningFlowBuilder" } }
                ],
                "variables": [
                    { "name": "recordId", "isInput": true },
                    { "name": "count", "scale": 2 }
                ],
                "tags": ["a", "", "c"],
                "emptyList": [],
                "emptyObject": {}
            },
            "VersionNumber": 3
        }));

        let xml = to_markup("Flow", Some(flowvault_protocol::METADATA_NAMESPACE), &payload).unwrap();
        let (root, parsed) = from_markup(&xml).unwrap();

        assert_eq!(root, "Flow");
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_single_element_array_stays_array() {
        let payload = fields(json!({ "items": [{ "name": "only" }] }));
        let xml = to_markup("Flow", None, &payload).unwrap();
        assert_eq!(from_markup(&xml).unwrap().1, payload);
    }

    #[test]
    fn test_invalid_key_fails() {
        let payload = fields(json!({ "Metadata": { "bad key": 1 } }));
        assert_eq!(
            to_markup("Flow", None, &payload),
            Err(MarkupError::InvalidName("bad key".into()))
        );
    }

    #[test]
    fn test_nested_array_fails() {
        let payload = fields(json!({ "matrix": [[1, 2], [3]] }));
        assert_eq!(
            to_markup("Flow", None, &payload),
            Err(MarkupError::NestedArray("matrix".into()))
        );
    }

    #[test]
    fn test_untyped_markup_reads_as_strings() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<FlowDefinition xmlns="http://soap.sforce.com/2006/04/metadata">
    <activeVersionNumber>2</activeVersionNumber>
</FlowDefinition>"#;
        let (root, parsed) = from_markup(xml).unwrap();
        assert_eq!(root, "FlowDefinition");
        assert_eq!(parsed, fields(json!({ "activeVersionNumber": "2" })));
    }

    #[test]
    fn test_malformed_markup() {
        assert!(matches!(from_markup("<Flow><a>1</b></Flow>"), Err(MarkupError::Parse(_))));
        assert_eq!(from_markup(""), Err(MarkupError::MissingRoot));
        assert!(matches!(
            from_markup("<Flow><a type=\"number\">x</a></Flow>"),
            Err(MarkupError::InvalidScalar { kind: "number", .. })
        ));
        assert_eq!(
            from_markup("<Flow><a>1</a><a>2</a></Flow>"),
            Err(MarkupError::DuplicateKey("a".into()))
        );
    }

    #[test]
    fn test_root_with_text_is_not_an_object() {
        assert_eq!(
            from_markup("<Flow>hello</Flow>"),
            Err(MarkupError::NotAnObject("Flow".into()))
        );
    }
}
