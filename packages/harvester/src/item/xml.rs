//! Structural JSON to XML mapping for metadata files.
//!
//! Objects become elements with one child per key, arrays repeat the
//! element of their key, and scalars become text content. Arrays nested
//! directly inside arrays are wrapped in `<array>` elements; `null` and
//! empty objects become empty elements.

use std::io;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;

use crate::error::Result;

/// Element name used for arrays nested directly inside arrays.
const NESTED_ARRAY_ELEMENT: &str = "array";

/// Render `value` as an indented XML document with root element `root`.
///
/// # Examples
/// ```
/// use literature_harvester::item::json_to_xml;
/// use serde_json::json;
///
/// let xml = json_to_xml("Metadata", &json!({ "itemID": 22314 })).unwrap();
/// assert!(xml.contains("<itemID>22314</itemID>"));
/// ```
pub fn json_to_xml(root: &str, value: &Value) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let root = element_name(root);
    match value {
        // A bare array at the root still needs a single document element
        Value::Array(_) => {
            writer.write_event(Event::Start(BytesStart::new(root.as_str())))?;
            write_value(&mut writer, NESTED_ARRAY_ELEMENT, value)?;
            writer.write_event(Event::End(BytesEnd::new(root.as_str())))?;
        }
        _ => write_value(&mut writer, &root, value)?,
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

fn write_value(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => {
            writer.write_event(Event::Empty(BytesStart::new(name)))?;
        }
        Value::Array(entries) => {
            for entry in entries {
                if entry.is_array() {
                    writer.write_event(Event::Start(BytesStart::new(name)))?;
                    write_value(writer, NESTED_ARRAY_ELEMENT, entry)?;
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                } else {
                    write_value(writer, name, entry)?;
                }
            }
        }
        Value::Object(map) if map.is_empty() => {
            writer.write_event(Event::Empty(BytesStart::new(name)))?;
        }
        Value::Object(map) => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            for (key, child) in map {
                write_value(writer, &element_name(key), child)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Value::String(text) => write_text_element(writer, name, text)?,
        Value::Bool(flag) => write_text_element(writer, name, &flag.to_string())?,
        Value::Number(number) => write_text_element(writer, name, &number.to_string())?,
    }
    Ok(())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    if text.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Turn an arbitrary JSON key into a valid XML element name.
///
/// Characters that may not appear in a name are replaced by `_`, and a
/// name that does not start with a letter or `_` is prefixed with `_`.
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}
