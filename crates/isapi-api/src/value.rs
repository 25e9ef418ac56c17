//! Schema-less view of an XML document.
//!
//! Device responses are XML whose shape varies by model and firmware, so
//! rather than typing every endpoint the client converts them into a
//! [`Value`] tree:
//!
//! - an element becomes a key in its parent's [`Value::Map`];
//! - repeated sibling elements collapse into a [`Value::List`];
//! - a leaf element's text becomes a [`Value::Scalar`];
//! - attributes become `@name` keys and text next to attributes or child
//!   elements becomes a `#text` key.
//!
//! ```rust,ignore
//! let value = Value::from_xml("<status>ok</status>")?;
//! assert_eq!(value.pointer("status").and_then(Value::as_str), Some("ok"));
//! ```

use std::borrow::Cow;
use std::fmt::Write as _;
use std::str::FromStr;

use indexmap::IndexMap;
use indexmap::map::Entry;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::{Serialize, Serializer};

use crate::error::Error;

const TEXT_KEY: &str = "#text";
const ATTRIBUTE_PREFIX: char = '@';

/// A generic structured value converted from XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    Map(IndexMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    /// Convert an XML document into a [`Value::Map`] keyed by its root element.
    pub fn from_xml(xml: &str) -> Result<Self, Error> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack = vec![Frame::document()];
        let mut root_closed = false;

        loop {
            let at_top = stack.len() == 1;
            match reader.read_event().map_err(|e| Error::parse(e, xml))? {
                Event::Start(_) | Event::Empty(_) if at_top && root_closed => {
                    return Err(Error::parse("content after the root element", xml));
                }
                Event::Start(start) => stack.push(Frame::open(&start, xml)?),
                Event::Empty(start) => {
                    let (name, value) = Frame::open(&start, xml)?.close();
                    current(&mut stack, xml)?.insert(name, value);
                    root_closed |= at_top;
                }
                Event::End(_) => {
                    if at_top {
                        return Err(Error::parse("unbalanced closing tag", xml));
                    }
                    let (name, value) = stack
                        .pop()
                        .ok_or_else(|| Error::parse("unbalanced closing tag", xml))?
                        .close();
                    current(&mut stack, xml)?.insert(name, value);
                    root_closed |= stack.len() == 1;
                }
                Event::Text(text) if at_top => {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(Error::parse("text outside the root element", xml));
                    }
                }
                Event::CData(_) if at_top => {
                    return Err(Error::parse("text outside the root element", xml));
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| Error::parse(e, xml))?;
                    current(&mut stack, xml)?.text.push_str(&text);
                }
                Event::CData(data) => {
                    let data = data.into_inner();
                    let text = std::str::from_utf8(&data).map_err(|e| Error::parse(e, xml))?;
                    current(&mut stack, xml)?.text.push_str(text);
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype.
                _ => {}
            }
        }

        if stack.len() != 1 {
            return Err(Error::parse("unexpected end of document", xml));
        }
        let document = stack
            .pop()
            .ok_or_else(|| Error::parse("empty document", xml))?;
        if document.children.is_empty() {
            return Err(Error::parse("document has no root element", xml));
        }
        Ok(Self::Map(document.children))
    }

    /// Convert back into XML.
    ///
    /// Element names and leaf text survive a round trip through
    /// [`from_xml`](Self::from_xml); declaration, comments and whitespace
    /// do not.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Map(entries) => {
                for (name, value) in entries {
                    write_element(&mut out, name, value);
                }
            }
            Self::List(items) => {
                for item in items {
                    out.push_str(&item.to_xml());
                }
            }
            Self::Scalar(text) => out.push_str(&escape(text.as_str())),
        }
        out
    }

    /// Look up a direct child of a map.
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Walk a `/`-separated chain of keys, e.g. `"DeviceInfo/model"`.
    ///
    /// Numeric segments index into lists.
    pub fn pointer(&self, path: &str) -> Option<&Self> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |value, segment| match value {
                Self::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => value.get(segment),
            })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(text) => Some(text),
            _ => None,
        }
    }

    /// Items of a list, or the value itself as a one-item slice.
    ///
    /// A single `<channel>` and several `<channel>`s convert to different
    /// shapes; this lets callers iterate both the same way.
    pub fn as_list(&self) -> &[Self] {
        match self {
            Self::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

impl FromStr for Value {
    type Err = Error;

    fn from_str(xml: &str) -> Result<Self, Self::Err> {
        Self::from_xml(xml)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(text) => serializer.serialize_str(text),
            Self::Map(entries) => entries.serialize(serializer),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

// ── Conversion state ─────────────────────────────────────────────────

/// An element that has been opened but not yet closed.
struct Frame {
    name: String,
    children: IndexMap<String, Value>,
    text: String,
}

impl Frame {
    fn document() -> Self {
        Self {
            name: String::new(),
            children: IndexMap::new(),
            text: String::new(),
        }
    }

    fn open(start: &BytesStart<'_>, xml: &str) -> Result<Self, Error> {
        let name = utf8(start.name().as_ref(), xml)?.into_owned();
        let mut children = IndexMap::new();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| Error::parse(e, xml))?;
            let key = utf8(attribute.key.as_ref(), xml)?;
            let value = attribute
                .unescape_value()
                .map_err(|e| Error::parse(e, xml))?;
            children.insert(
                format!("{ATTRIBUTE_PREFIX}{key}"),
                Value::Scalar(value.into_owned()),
            );
        }

        Ok(Self {
            name,
            children,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let Self {
            name,
            mut children,
            text,
        } = self;

        if children.is_empty() {
            return (name, Value::Scalar(text));
        }
        if !text.is_empty() {
            children.insert(TEXT_KEY.to_owned(), Value::Scalar(text));
        }
        (name, Value::Map(children))
    }

    /// Add a closed child, turning repeated names into a list.
    fn insert(&mut self, name: String, value: Value) {
        match self.children.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::List(items) => items.push(value),
                existing => {
                    let first = std::mem::replace(existing, Value::List(Vec::with_capacity(2)));
                    if let Value::List(items) = existing {
                        items.push(first);
                        items.push(value);
                    }
                }
            },
        }
    }
}

fn current<'s>(stack: &'s mut [Frame], xml: &str) -> Result<&'s mut Frame, Error> {
    stack
        .last_mut()
        .ok_or_else(|| Error::parse("content outside the root element", xml))
}

fn utf8<'a>(bytes: &'a [u8], xml: &str) -> Result<Cow<'a, str>, Error> {
    std::str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .map_err(|e| Error::parse(e, xml))
}

fn write_element(out: &mut String, name: &str, value: &Value) {
    match value {
        Value::Scalar(text) => {
            let _ = write!(out, "<{name}>{}</{name}>", escape(text.as_str()));
        }
        Value::List(items) => {
            for item in items {
                write_element(out, name, item);
            }
        }
        Value::Map(entries) => {
            out.push('<');
            out.push_str(name);
            for (key, attr) in entries {
                if let (Some(attr_name), Value::Scalar(attr_value)) =
                    (key.strip_prefix(ATTRIBUTE_PREFIX), attr)
                {
                    let _ = write!(out, " {attr_name}=\"{}\"", escape(attr_value.as_str()));
                }
            }
            out.push('>');
            for (key, child) in entries {
                if key == TEXT_KEY {
                    if let Value::Scalar(text) = child {
                        out.push_str(&escape(text.as_str()));
                    }
                } else if !(key.starts_with(ATTRIBUTE_PREFIX) && matches!(child, Value::Scalar(_)))
                {
                    write_element(out, key, child);
                }
            }
            let _ = write!(out, "</{name}>");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    fn scalar(text: &str) -> Value {
        Value::Scalar(text.to_owned())
    }

    #[test]
    fn leaf_element_becomes_scalar() {
        let value = Value::from_xml("<status>ok</status>").unwrap();
        assert_eq!(
            value,
            Value::Map(IndexMap::from([("status".to_owned(), scalar("ok"))]))
        );
    }

    #[test]
    fn repeated_siblings_become_a_list() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <VideoInputChannelList version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
              <VideoInputChannel><id>1</id><enabled>true</enabled></VideoInputChannel>
              <VideoInputChannel><id>2</id><enabled>false</enabled></VideoInputChannel>
            </VideoInputChannelList>"#;
        let value = Value::from_xml(xml).unwrap();

        let list = value.get("VideoInputChannelList").unwrap();
        assert_eq!(list.get("@version"), Some(&scalar("2.0")));
        assert_eq!(
            list.get("@xmlns"),
            Some(&scalar("http://www.hikvision.com/ver20/XMLSchema"))
        );

        let channels = list.get("VideoInputChannel").unwrap().as_list();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].get("enabled"), Some(&scalar("false")));
        assert_eq!(
            value
                .pointer("VideoInputChannelList/VideoInputChannel/0/id")
                .and_then(Value::as_str),
            Some("1")
        );
    }

    #[test]
    fn single_child_iterates_like_a_list() {
        let value = Value::from_xml("<list><item>a</item></list>").unwrap();
        let items = value.pointer("list/item").unwrap().as_list();
        assert_eq!(items, &[scalar("a")]);
    }

    #[test]
    fn text_beside_attributes_goes_under_text_key() {
        let value = Value::from_xml(r#"<localTime zone="CST">2024-06-15T10:30:00</localTime>"#)
            .unwrap();
        let time = value.get("localTime").unwrap();
        assert_eq!(time.get("@zone"), Some(&scalar("CST")));
        assert_eq!(time.get("#text"), Some(&scalar("2024-06-15T10:30:00")));
    }

    #[test]
    fn empty_and_self_closing_elements_are_empty_scalars() {
        let value = Value::from_xml("<a><b/><c></c></a>").unwrap();
        assert_eq!(value.pointer("a/b"), Some(&scalar("")));
        assert_eq!(value.pointer("a/c"), Some(&scalar("")));
    }

    #[test]
    fn entities_and_cdata_are_decoded() {
        let value =
            Value::from_xml("<a><b>x &amp; y</b><c><![CDATA[<raw>]]></c></a>").unwrap();
        assert_eq!(value.pointer("a/b"), Some(&scalar("x & y")));
        assert_eq!(value.pointer("a/c"), Some(&scalar("<raw>")));
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let result = Value::from_xml("<a><b></a>");
        assert!(matches!(result, Err(Error::Parse { .. })), "got: {result:?}");

        let result = Value::from_xml("<a><b>unterminated");
        assert!(matches!(result, Err(Error::Parse { .. })), "got: {result:?}");

        let result = Value::from_xml("   ");
        assert!(matches!(result, Err(Error::Parse { .. })), "got: {result:?}");
    }

    #[test]
    fn a_document_has_exactly_one_root() {
        for xml in [
            "<a>1</a><b>2</b>",
            "<a>1</a><a>2</a>",
            "<a/><b/>",
            "<a>1</a>trailing junk",
            "leading junk<a>1</a>",
        ] {
            let result = Value::from_xml(xml);
            assert!(matches!(result, Err(Error::Parse { .. })), "{xml}: got {result:?}");
        }

        let value = Value::from_xml("<?xml version=\"1.0\"?>\n<a>1</a>\n<!-- done -->\n").unwrap();
        assert_eq!(value.get("a"), Some(&scalar("1")));
    }

    #[test]
    fn round_trip_preserves_names_and_text() {
        let xml = r#"<EventNotificationAlert version="2.0"><ipAddress>10.0.0.5</ipAddress><eventType>VMD</eventType><channel><id>1</id></channel><channel><id>2</id></channel><note>a &lt; b</note></EventNotificationAlert>"#;
        let value = Value::from_xml(xml).unwrap();
        let again = Value::from_xml(&value.to_xml()).unwrap();
        assert_eq!(value, again);
        assert_eq!(value.to_xml(), xml);
    }

    #[test]
    fn serializes_like_a_plain_json_object() {
        let value = Value::from_xml("<s><a>1</a><a>2</a><b>x</b></s>").unwrap();
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({ "s": { "a": ["1", "2"], "b": "x" } }));
    }
}
