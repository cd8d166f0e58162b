//! Incremental JSON array encoding.
//!
//! The response body is one JSON array written in pieces: `[` up front, then
//! elements as pages arrive, then `]`. Every element, event or error note, goes
//! through the same separator-aware [`JsonArrayWriter::write`], so an embedded
//! error is just another (final) element rather than a separate response path.

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use super::types::HistoryEvent;

/// One element of the output array.
#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
    /// A history event, serialized in its own schema.
    Event(&'a HistoryEvent),
    /// A terminal failure note, serialized as `{"error": "<message>"}`.
    Error(&'a str),
}

#[derive(Serialize)]
struct ErrorNote<'a> {
    error: &'a str,
}

/// Separator-aware writer for a single JSON array.
#[derive(Debug, Default)]
pub struct JsonArrayWriter {
    wrote_element: bool,
}

impl JsonArrayWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, buf: &mut BytesMut) {
        buf.put_u8(b'[');
    }

    /// Append one element, preceded by `,` unless it is the first one.
    ///
    /// On failure nothing is appended to `buf`.
    pub fn write(&mut self, buf: &mut BytesMut, element: Element<'_>) -> serde_json::Result<()> {
        match element {
            Element::Event(event) => self.write_value(buf, event),
            Element::Error(message) => self.write_value(buf, &ErrorNote { error: message }),
        }
    }

    fn write_value<T: Serialize + ?Sized>(
        &mut self,
        buf: &mut BytesMut,
        value: &T,
    ) -> serde_json::Result<()> {
        let mark = buf.len();
        if self.wrote_element {
            buf.put_u8(b',');
        }

        match serde_json::to_writer((&mut *buf).writer(), value) {
            Ok(()) => {
                self.wrote_element = true;
                Ok(())
            }
            Err(e) => {
                buf.truncate(mark);
                Err(e)
            }
        }
    }

    pub fn close(&mut self, buf: &mut BytesMut) {
        buf.put_u8(b']');
    }

    pub fn wrote_element(&self) -> bool {
        self.wrote_element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(elements: &[Element<'_>]) -> String {
        let mut writer = JsonArrayWriter::new();
        let mut buf = BytesMut::new();
        writer.open(&mut buf);
        for element in elements {
            writer.write(&mut buf, *element).unwrap();
        }
        writer.close(&mut buf);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn empty_array() {
        assert_eq!(render(&[]), "[]");
    }

    #[test]
    fn separators_only_between_elements() {
        let a = HistoryEvent::new(1, 1);
        let b = HistoryEvent::new(2, 5);
        assert_eq!(
            render(&[Element::Event(&a), Element::Event(&b)]),
            r#"[{"event_id":1,"event_type":1,"Attributes":null},{"event_id":2,"event_type":5,"Attributes":null}]"#
        );
    }

    #[test]
    fn error_note_shares_the_separator_logic() {
        let a = HistoryEvent::new(1, 1);
        assert_eq!(
            render(&[Element::Event(&a), Element::Error("boom")]),
            r#"[{"event_id":1,"event_type":1,"Attributes":null},{"error":"boom"}]"#
        );
        assert_eq!(render(&[Element::Error("fetch error")]), r#"[{"error":"fetch error"}]"#);
    }

    #[test]
    fn error_messages_are_escaped() {
        let out = render(&[Element::Error("bad \"quote\"\n")]);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["error"], "bad \"quote\"\n");
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    #[test]
    fn failed_element_leaves_no_trace() {
        let a = HistoryEvent::new(1, 1);
        let mut writer = JsonArrayWriter::new();
        let mut buf = BytesMut::new();
        writer.open(&mut buf);
        writer.write(&mut buf, Element::Event(&a)).unwrap();
        let before = buf.clone();

        let err = writer.write_value(&mut buf, &Unserializable).unwrap_err();
        assert!(err.to_string().contains("cannot encode"));
        assert_eq!(buf, before);

        writer.write(&mut buf, Element::Error("failed to encode")).unwrap();
        writer.close(&mut buf);
        assert_eq!(
            String::from_utf8(buf.to_vec()).unwrap(),
            r#"[{"event_id":1,"event_type":1,"Attributes":null},{"error":"failed to encode"}]"#
        );
    }

    #[test]
    fn failed_first_element_keeps_separator_state() {
        let mut writer = JsonArrayWriter::new();
        let mut buf = BytesMut::new();
        writer.open(&mut buf);
        assert!(writer.write_value(&mut buf, &Unserializable).is_err());
        assert!(!writer.wrote_element());

        writer.write(&mut buf, Element::Error("x")).unwrap();
        writer.close(&mut buf);
        assert_eq!(String::from_utf8(buf.to_vec()).unwrap(), r#"[{"error":"x"}]"#);
    }

    #[test]
    fn tracks_first_element() {
        let mut writer = JsonArrayWriter::new();
        let mut buf = BytesMut::new();
        writer.open(&mut buf);
        assert!(!writer.wrote_element());
        writer.write(&mut buf, Element::Error("x")).unwrap();
        assert!(writer.wrote_element());
    }
}
