//! The SAX event model shared by every stage on the chain.
//!
//! The real parser framework sits outside this crate; these types are the
//! seam. Events are pumped from a `quick_xml` reader into a
//! [`DocumentHandler`], and serialized back out through [`SaxWriter`].

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::SignatureResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaxEvent {
    StartElement {
        name: String,
        attributes: Vec<Attribute>,
    },
    EndElement {
        name: String,
    },
    Characters(String),
}

impl SaxEvent {
    pub fn start(name: &str, attributes: &[(&str, &str)]) -> Self {
        SaxEvent::StartElement {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, value)| Attribute {
                    name: (*name).to_string(),
                    value: (*value).to_string(),
                })
                .collect(),
        }
    }

    pub fn end(name: &str) -> Self {
        SaxEvent::EndElement {
            name: name.to_string(),
        }
    }

    /// The element name without its namespace prefix; empty for character
    /// events.
    pub fn local_name(&self) -> &str {
        match self {
            SaxEvent::StartElement { name, .. } | SaxEvent::EndElement { name } => {
                name.rsplit(':').next().unwrap_or(name)
            }
            SaxEvent::Characters(_) => "",
        }
    }
}

/// A stage on the SAX chain.
pub trait DocumentHandler {
    fn handle_event(&mut self, event: SaxEvent) -> SignatureResult<()>;
}

/// Terminal stage that serializes events back to XML text.
pub struct SaxWriter {
    writer: Writer<Vec<u8>>,
}

impl SaxWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    /// A writer that starts with the XML declaration, for whole-stream
    /// output.
    pub fn with_declaration() -> SignatureResult<Self> {
        let mut writer = Self::new();
        writer
            .writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(writer)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

impl Default for SaxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentHandler for SaxWriter {
    fn handle_event(&mut self, event: SaxEvent) -> SignatureResult<()> {
        match event {
            SaxEvent::StartElement { name, attributes } => {
                let mut start = BytesStart::new(name.as_str());
                for attr in &attributes {
                    start.push_attribute((attr.name.as_str(), attr.value.as_str()));
                }
                self.writer.write_event(Event::Start(start))?;
            }
            SaxEvent::EndElement { name } => {
                self.writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
            }
            SaxEvent::Characters(text) => {
                self.writer
                    .write_event(Event::Text(BytesText::new(text.as_str())))?;
            }
        }
        Ok(())
    }
}

/// Convert one `quick_xml` start tag into a [`SaxEvent`].
pub(crate) fn start_event(e: &BytesStart<'_>) -> SignatureResult<SaxEvent> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        attributes.push(Attribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value: attr.unescape_value()?.into_owned(),
        });
    }
    Ok(SaxEvent::StartElement { name, attributes })
}

/// Pump an XML byte stream into a handler, event by event.
pub fn parse_into(xml: &[u8], handler: &mut dyn DocumentHandler) -> SignatureResult<()> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => handler.handle_event(start_event(&e)?)?,
            Event::Empty(e) => {
                let event = start_event(&e)?;
                let name = match &event {
                    SaxEvent::StartElement { name, .. } => name.clone(),
                    _ => unreachable!(),
                };
                handler.handle_event(event)?;
                handler.handle_event(SaxEvent::EndElement { name })?;
            }
            Event::End(e) => {
                handler.handle_event(SaxEvent::EndElement {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                })?;
            }
            Event::Text(e) => {
                handler.handle_event(SaxEvent::Characters(e.unescape()?.into_owned()))?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder(Vec<SaxEvent>);

    impl DocumentHandler for Recorder {
        fn handle_event(&mut self, event: SaxEvent) -> SignatureResult<()> {
            self.0.push(event);
            Ok(())
        }
    }

    #[test]
    fn writer_round_trips_events() {
        let mut writer = SaxWriter::new();
        writer
            .handle_event(SaxEvent::start("Signature", &[("Id", "sig")]))
            .unwrap();
        writer
            .handle_event(SaxEvent::Characters("a < b".to_string()))
            .unwrap();
        writer.handle_event(SaxEvent::end("Signature")).unwrap();
        let xml = String::from_utf8(writer.into_bytes()).unwrap();
        assert_eq!(xml, r#"<Signature Id="sig">a &lt; b</Signature>"#);
    }

    #[test]
    fn parser_reports_empty_elements_as_start_end_pairs() {
        let mut recorder = Recorder::default();
        parse_into(br#"<root><leaf a="1"/></root>"#, &mut recorder).unwrap();
        assert_eq!(
            recorder.0,
            vec![
                SaxEvent::start("root", &[]),
                SaxEvent::start("leaf", &[("a", "1")]),
                SaxEvent::end("leaf"),
                SaxEvent::end("root"),
            ]
        );
    }

    #[test]
    fn local_name_strips_the_prefix() {
        assert_eq!(SaxEvent::start("dc:date", &[]).local_name(), "date");
        assert_eq!(SaxEvent::end("Signature").local_name(), "Signature");
    }
}
