//! Streaming content handlers the exporter writes into.

use std::borrow::Cow;
use std::io::Write;

use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;

use super::ExportError;

/// Receives the document as a sequence of SAX-style calls.
///
/// Calls arrive properly nested: every `start_element` is matched by an
/// `end_element` with the same name, and the whole sequence is bracketed by
/// `start_document`/`end_document`.
pub trait ContentHandler {
    fn start_document(&mut self) -> Result<(), ExportError>;

    fn start_element(&mut self, name: &str, attributes: &[(&str, &str)])
    -> Result<(), ExportError>;

    fn characters(&mut self, text: &str) -> Result<(), ExportError>;

    fn end_element(&mut self, name: &str) -> Result<(), ExportError>;

    fn end_document(&mut self) -> Result<(), ExportError>;
}

/// A [`ContentHandler`] that writes XML text through `quick_xml`.
///
/// The start tag of the current element is held back until the next event
/// so that elements without content come out self-closing (`<device .../>`).
/// Nothing else is buffered.
pub struct XmlSink<W: Write> {
    writer: Writer<W>,
    pending: Option<BytesStart<'static>>,
}

impl<W: Write> XmlSink<W> {
    /// Creates a sink that writes everything on one line.
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new(inner),
            pending: None,
        }
    }

    /// Creates a sink that indents nested elements by `indent` spaces.
    pub fn with_indent(inner: W, indent: usize) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', indent),
            pending: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn flush_pending(&mut self) -> Result<(), ExportError> {
        if let Some(start) = self.pending.take() {
            self.writer.write_event(Event::Start(start))?;
        }
        Ok(())
    }
}

/// Escapes an attribute value, including the whitespace characters a
/// conforming parser would otherwise normalize to spaces.
fn escape_attribute(value: &str) -> String {
    let escaped = escape(value);
    if !escaped.contains(['\n', '\r', '\t']) {
        return escaped.into_owned();
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        match c {
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    out
}

impl<W: Write> ContentHandler for XmlSink<W> {
    fn start_document(&mut self) -> Result<(), ExportError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(())
    }

    fn start_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<(), ExportError> {
        self.flush_pending()?;
        let mut start = BytesStart::new(name.to_string());
        for (key, value) in attributes {
            start.push_attribute(Attribute {
                key: QName(key.as_bytes()),
                value: Cow::Owned(escape_attribute(value).into_bytes()),
            });
        }
        self.pending = Some(start);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), ExportError> {
        self.flush_pending()?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), ExportError> {
        match self.pending.take() {
            Some(start) if start.name().as_ref() == name.as_bytes() => {
                self.writer.write_event(Event::Empty(start))?;
            }
            pending => {
                self.pending = pending;
                self.flush_pending()?;
                self.writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), ExportError> {
        self.flush_pending()?;
        let inner = self.writer.get_mut();
        inner.write_all(b"\n")?;
        inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(indent: Option<usize>, events: impl FnOnce(&mut XmlSink<Vec<u8>>)) -> String {
        let mut sink = match indent {
            Some(indent) => XmlSink::with_indent(Vec::new(), indent),
            None => XmlSink::new(Vec::new()),
        };
        events(&mut sink);
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_empty_elements_self_close() {
        let xml = render(None, |sink| {
            sink.start_element("a", &[("x", "1")]).unwrap();
            sink.start_element("b", &[]).unwrap();
            sink.end_element("b").unwrap();
            sink.end_element("a").unwrap();
        });
        assert_eq!(xml, r#"<a x="1"><b/></a>"#);
    }

    #[test]
    fn test_text_and_attributes_are_escaped() {
        let xml = render(None, |sink| {
            sink.start_element("output", &[("type", "a\"b<")]).unwrap();
            sink.characters("x < y && z").unwrap();
            sink.end_element("output").unwrap();
        });
        assert_eq!(
            xml,
            r#"<output type="a&quot;b&lt;">x &lt; y &amp;&amp; z</output>"#
        );
    }

    #[test]
    fn test_attribute_line_breaks_are_escaped() {
        let xml = render(None, |sink| {
            sink.start_element("testcase", &[("errorStackTrace", "Error\n\tat a.B(B.java:1)\r\n")])
                .unwrap();
            sink.end_element("testcase").unwrap();
        });
        assert_eq!(
            xml,
            r#"<testcase errorStackTrace="Error&#10;&#9;at a.B(B.java:1)&#13;&#10;"/>"#
        );
    }

    #[test]
    fn test_document_framing() {
        let xml = render(Some(4), |sink| {
            sink.start_document().unwrap();
            sink.start_element("root", &[]).unwrap();
            sink.start_element("child", &[]).unwrap();
            sink.end_element("child").unwrap();
            sink.end_element("root").unwrap();
            sink.end_document().unwrap();
        });
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("\n    <child/>"));
        assert!(xml.ends_with("</root>\n"));
    }
}
