//! ABOUTME: Parser for the NGINX-RTMP `stat` XML page
//! ABOUTME: Builds an element tree and extracts server and stream records

use crate::model::{ServerInfo, Snapshot, StreamInfo};
use crate::normalize::StreamNameNormalizer;
use crate::units::{megabytes_per_second, parse_number, seconds_from_millis};
use nr_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Root element holding the server-wide counters
const SERVER_ELEMENT: &str = "rtmp";
const STREAM_ELEMENT: &str = "stream";
const APPLICATION_ELEMENT: &str = "application";

#[derive(Debug)]
struct Node {
    name: String,
    text: String,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Parsed XML document. Nodes are stored in document order.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: Option<usize>,
}

/// Borrowed view of one element in a [`Document`].
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    doc: &'a Document,
    id: usize,
}

impl Document {
    /// Parse raw bytes into a tree; any well-formedness problem is an error.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut doc = Document {
            nodes: Vec::new(),
            root: None,
        };
        let mut open: Vec<usize> = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::Parse(format!("malformed XML: {}", e)))?;

            match event {
                Event::Start(e) => {
                    let id = doc.push(element_name(e.local_name().as_ref())?, &open)?;
                    open.push(id);
                }
                Event::Empty(e) => {
                    doc.push(element_name(e.local_name().as_ref())?, &open)?;
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::Parse(format!("malformed text: {}", e)))?;
                    doc.append_text(&open, &text)?;
                }
                Event::CData(c) => {
                    let raw = c.into_inner();
                    doc.append_text(&open, &String::from_utf8_lossy(&raw))?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&id) = open.last() {
            return Err(Error::Parse(format!(
                "unexpected end of document inside <{}>",
                doc.nodes[id].name
            )));
        }

        Ok(doc)
    }

    fn push(&mut self, name: String, open: &[usize]) -> Result<usize> {
        let parent = open.last().copied();
        if parent.is_none() && self.root.is_some() {
            return Err(Error::Parse(format!(
                "unexpected second root element <{}>",
                name
            )));
        }

        let id = self.nodes.len();
        self.nodes.push(Node {
            name,
            text: String::new(),
            parent,
            children: Vec::new(),
        });

        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.root = Some(id),
        }
        Ok(id)
    }

    fn append_text(&mut self, open: &[usize], text: &str) -> Result<()> {
        match open.last() {
            Some(&id) => {
                self.nodes[id].text.push_str(text);
                Ok(())
            }
            None if text.trim().is_empty() => Ok(()),
            None => Err(Error::Parse("text outside of the root element".to_string())),
        }
    }

    pub fn root(&self) -> Option<Element<'_>> {
        self.root.map(|id| Element { doc: self, id })
    }

    /// Every element called `name`, at any depth, in document order.
    pub fn descendants<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Element<'a>> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.name == name)
            .map(move |(id, _)| Element { doc: self, id })
    }
}

impl<'a> Element<'a> {
    fn node(&self) -> &'a Node {
        &self.doc.nodes[self.id]
    }

    pub fn name(&self) -> &'a str {
        &self.node().name
    }

    /// Text content, trimmed
    pub fn text(&self) -> &'a str {
        self.node().text.trim()
    }

    pub fn parent(&self) -> Option<Element<'a>> {
        self.node().parent.map(|id| Element { doc: self.doc, id })
    }

    /// First direct child called `name`
    pub fn child(&self, name: &str) -> Option<Element<'a>> {
        let doc = self.doc;
        self.node()
            .children
            .iter()
            .map(|&id| Element { doc, id })
            .find(|child| child.name() == name)
    }

    /// Text of the first direct child called `name`, or `""` when absent
    pub fn child_text(&self, name: &str) -> &'a str {
        self.child(name).map(|c| c.text()).unwrap_or("")
    }
}

fn element_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| Error::Parse(format!("element name is not UTF-8: {}", e)))
}

/// Name of the application owning `stream`: stream -> live -> application.
fn application_name<'a>(stream: &Element<'a>) -> Option<&'a str> {
    let application = stream.parent()?.parent()?;
    if application.name() != APPLICATION_ELEMENT {
        return None;
    }
    let name = application.child_text("name");
    (!name.is_empty()).then_some(name)
}

fn server_info(rtmp: &Element<'_>) -> ServerInfo {
    ServerInfo {
        bytes_in: parse_number(rtmp.child_text("bytes_in")),
        bytes_out: parse_number(rtmp.child_text("bytes_out")),
        receive_bytes: megabytes_per_second(rtmp.child_text("bw_in")),
        transmit_bytes: megabytes_per_second(rtmp.child_text("bw_out")),
        uptime_seconds: parse_number(rtmp.child_text("uptime")),
        current_streams: 0,
    }
}

fn stream_info(stream: &Element<'_>, normalizer: &StreamNameNormalizer) -> StreamInfo {
    StreamInfo {
        name: normalizer.label(application_name(stream), stream.child_text("name")),
        bytes_in: parse_number(stream.child_text("bytes_in")),
        bytes_out: parse_number(stream.child_text("bytes_out")),
        receive_bytes: megabytes_per_second(stream.child_text("bw_in")),
        transmit_bytes: megabytes_per_second(stream.child_text("bw_out")),
        uptime_seconds: seconds_from_millis(stream.child_text("time")),
    }
}

/// Parse a status page into a [`Snapshot`].
///
/// Fails when the XML is malformed or the root `rtmp` element is missing.
/// Individual numeric fields never fail; they fall back to zero.
pub fn parse_status(xml: &[u8], normalizer: &StreamNameNormalizer) -> Result<Snapshot> {
    let doc = Document::parse(xml)?;

    let rtmp = doc
        .root()
        .filter(|root| root.name() == SERVER_ELEMENT)
        .ok_or_else(|| Error::Parse(format!("missing <{}> server element", SERVER_ELEMENT)))?;

    let server = server_info(&rtmp);
    let streams = doc
        .descendants(STREAM_ELEMENT)
        .map(|stream| stream_info(&stream, normalizer))
        .collect();

    Ok(Snapshot::new(server, streams))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::{
        IDLE_STATUS_XML, MALFORMED_FIELDS_XML, NOT_XML, ORPHAN_STREAM_XML, STATUS_XML,
    };

    fn parse(xml: &str) -> Result<Snapshot> {
        parse_status(xml.as_bytes(), &StreamNameNormalizer::default())
    }

    #[test]
    fn test_parse_server_record() {
        let snapshot = parse(STATUS_XML).expect("fixture parses");
        let server = &snapshot.server;

        assert_eq!(server.bytes_in, 734003200.0);
        assert_eq!(server.bytes_out, 367001600.0);
        assert_eq!(server.receive_bytes, 2.0);
        assert_eq!(server.transmit_bytes, 1.0);
        // Server uptime is already in seconds
        assert_eq!(server.uptime_seconds, 1500.0);
        assert_eq!(server.current_streams, 2);
    }

    #[test]
    fn test_parse_streams_in_document_order() {
        let snapshot = parse(STATUS_XML).unwrap();
        let names: Vec<_> = snapshot.streams.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["live-cam_1a2b3c", "backup-cam_1a2b3c"]);
    }

    #[test]
    fn test_parse_stream_units() {
        let snapshot = parse(STATUS_XML).unwrap();
        let live = &snapshot.streams[0];

        assert_eq!(live.bytes_in, 1024.0);
        assert_eq!(live.bytes_out, 2048.0);
        assert_eq!(live.receive_bytes, 1.0);
        assert_eq!(live.transmit_bytes, 0.5);
        // The nested <client><time> must not shadow the stream's own time
        assert_eq!(live.uptime_seconds, 1.5);

        let backup = &snapshot.streams[1];
        assert_eq!(backup.uptime_seconds, 3.0);
        assert_eq!(backup.transmit_bytes, 2.0);
    }

    #[test]
    fn test_stream_without_application_has_no_prefix() {
        let snapshot = parse(ORPHAN_STREAM_XML).unwrap();
        assert_eq!(snapshot.streams.len(), 1);
        assert_eq!(snapshot.streams[0].name, "orphan");
        assert_eq!(snapshot.streams[0].uptime_seconds, 2.0);
    }

    #[test]
    fn test_idle_server_has_no_streams() {
        let snapshot = parse(IDLE_STATUS_XML).unwrap();
        assert!(snapshot.streams.is_empty());
        assert_eq!(snapshot.server.current_streams, 0);
        assert_eq!(snapshot.server.uptime_seconds, 42.0);
    }

    #[test]
    fn test_bad_fields_become_zero() {
        let snapshot = parse(MALFORMED_FIELDS_XML).unwrap();
        let server = &snapshot.server;
        assert_eq!(server.uptime_seconds, 0.0);
        assert_eq!(server.bytes_in, 0.0);
        assert_eq!(server.bytes_out, 100.0);
        assert_eq!(server.receive_bytes, 1.0);
        // Missing entirely
        assert_eq!(server.transmit_bytes, 0.0);

        let stream = &snapshot.streams[0];
        assert_eq!(stream.name, "live-broken");
        assert_eq!(stream.uptime_seconds, 0.0);
        assert_eq!(stream.bytes_in, 0.0);
        assert_eq!(stream.bytes_out, 77.0);
        assert_eq!(stream.receive_bytes, 1.0);
    }

    #[test]
    fn test_normalizer_applies_before_prefix() {
        let normalizer = StreamNameNormalizer::new("^[a-z]+").unwrap();
        let snapshot = parse_status(STATUS_XML.as_bytes(), &normalizer).unwrap();
        let names: Vec<_> = snapshot.streams.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["live-cam", "backup-cam"]);
    }

    #[test]
    fn test_empty_application_name_is_ignored() {
        let xml = "<rtmp><server><application><name></name><live>\
                   <stream><name>s1</name></stream></live></application></server></rtmp>";
        let snapshot = parse(xml).unwrap();
        assert_eq!(snapshot.streams[0].name, "s1");
    }

    #[test]
    fn test_grandparent_must_be_application() {
        let xml = "<rtmp><server><other><name>x</name><live>\
                   <stream><name>s1</name></stream></live></other></server></rtmp>";
        let snapshot = parse(xml).unwrap();
        assert_eq!(snapshot.streams[0].name, "s1");
    }

    #[test]
    fn test_missing_server_element_fails() {
        let err = parse("<stats><stream><name>a</name></stream></stats>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.to_string().contains("<rtmp>"));
    }

    #[test]
    fn test_empty_body_fails() {
        assert!(matches!(parse(""), Err(Error::Parse(_))));
    }

    #[test]
    fn test_unclosed_document_fails() {
        assert!(matches!(parse(NOT_XML), Err(Error::Parse(_))));
        assert!(matches!(parse("<rtmp><uptime>1</uptime>"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_plain_text_fails() {
        assert!(matches!(
            parse("upstream connect error"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        assert!(matches!(
            parse("<rtmp><uptime>1</bytes_in></rtmp>"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_second_root_fails() {
        assert!(matches!(
            parse("<rtmp></rtmp><rtmp></rtmp>"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_document_navigation() {
        let doc = Document::parse(b"<a><b><c>hi &amp; bye</c></b><c>top</c></a>").unwrap();
        let root = doc.root().unwrap();
        assert_eq!(root.name(), "a");
        assert_eq!(root.child_text("c"), "top");
        assert_eq!(root.child_text("missing"), "");

        let texts: Vec<_> = doc.descendants("c").map(|c| c.text()).collect();
        assert_eq!(texts, vec!["hi & bye", "top"]);

        let inner = doc.descendants("c").next().unwrap();
        assert_eq!(inner.parent().unwrap().name(), "b");
        assert!(root.parent().is_none());
    }
}
