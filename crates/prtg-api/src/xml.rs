// XML → JSON value tree
//
// PRTG serves several endpoints as XML, sometimes labelled `text/html`,
// and its serializer does not always produce well-formed documents.
// Instead of a second set of XML-specific types, the document is folded
// into a `serde_json::Value` that the same serde models can consume:
//
//   - an element with neither attributes nor child elements → string
//   - otherwise → object; attributes and children become keys,
//     mixed-in text lands under `#text`
//   - repeated child names collapse into an array
//   - the root element's name is dropped; its content is returned
//
// Lenient mode is a backend-quirk setting: mismatched end tags close the
// innermost open element, unknown entities are kept verbatim, and elements
// left open at end of input are closed implicitly.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

/// Key under which character data of an element with attributes or
/// children is stored.
pub const TEXT_KEY: &str = "#text";

struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>, lenient: bool) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut fields = Map::new();
        for attr in start.attributes().with_checks(!lenient) {
            let attr = match attr {
                Ok(attr) => attr,
                Err(e) if lenient => {
                    tracing::trace!(element = %name, error = %e, "skipping malformed attribute");
                    continue;
                }
                Err(e) => return Err(e.to_string()),
            };
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) if lenient => String::from_utf8_lossy(&attr.value).into_owned(),
                Err(e) => return Err(e.to_string()),
            };
            insert_child(&mut fields, key, Value::String(value));
        }
        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim();
        let value = if self.fields.is_empty() {
            Value::String(text.to_owned())
        } else {
            let mut fields = self.fields;
            if !text.is_empty() {
                fields.insert(TEXT_KEY.to_owned(), Value::String(text.to_owned()));
            }
            Value::Object(fields)
        };
        (self.name, value)
    }
}

/// Insert `value` under `key`, turning repeated keys into an array.
fn insert_child(fields: &mut Map<String, Value>, key: String, value: Value) {
    match fields.get_mut(&key) {
        None => {
            fields.insert(key, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Fold an XML document into a JSON value tree.
pub fn to_value(body: &[u8], lenient: bool) -> Result<Value, String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(text);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.expand_empty_elements = true;
        config.check_end_names = !lenient;
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.error_position()))?;
        match event {
            Event::Start(start) => stack.push(Frame::open(&start, lenient)?),
            Event::End(_) => {
                let Some(frame) = stack.pop() else {
                    if lenient {
                        continue;
                    }
                    return Err("unexpected closing tag".into());
                };
                let (name, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.fields, name, value),
                    None if root.is_none() => root = Some(value),
                    None if lenient => {}
                    None => return Err("multiple root elements".into()),
                }
            }
            Event::Text(t) => {
                if let Some(frame) = stack.last_mut() {
                    match t.unescape() {
                        Ok(s) => frame.text.push_str(&s),
                        Err(_) if lenient => frame.text.push_str(&String::from_utf8_lossy(&t)),
                        Err(e) => return Err(e.to_string()),
                    }
                }
            }
            Event::CData(c) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if !stack.is_empty() {
        if !lenient {
            let open = stack.last().map(|f| f.name.clone()).unwrap_or_default();
            return Err(format!("unexpected end of input inside <{open}>"));
        }
        while let Some(frame) = stack.pop() {
            let (name, value) = frame.close();
            match stack.last_mut() {
                Some(parent) => insert_child(&mut parent.fields, name, value),
                None => root = root.or(Some(value)),
            }
        }
    }

    root.ok_or_else(|| "document has no root element".to_owned())
}
