use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// The RSS body could not be decoded into a channel
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid RSS document: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid RSS document: expected <rss><channel>")]
    NotRss,

    #[error("Invalid RSS document: ended inside <{0}>")]
    Truncated(&'static str),
}

/// A fetched syndication document, held only for one ingest cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedDocument {
    pub title: String,
    pub description: String,
    pub items: Vec<RawItem>,
}

/// One `<item>` exactly as the feed published it (after entity unescaping)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

/// Elements of the minimal RSS 2.0 schema.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Rss,
    Channel,
    Item,
    Field(Field),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

impl Node {
    fn tag(self) -> &'static str {
        match self {
            Node::Rss => "rss",
            Node::Channel => "channel",
            Node::Item => "item",
            Node::Field(Field::Title) => "title",
            Node::Field(Field::Link) => "link",
            Node::Field(Field::Description) => "description",
            Node::Field(Field::PubDate) => "pubDate",
        }
    }
}

/// Resolve a child element against its parent. Names are compared with their
/// prefix, so `<atom:link>` never stands in for `<link>`.
fn child(parent: Option<Node>, name: &[u8]) -> Option<Node> {
    match (parent, name) {
        (None, b"rss") => Some(Node::Rss),
        (Some(Node::Rss), b"channel") => Some(Node::Channel),
        (Some(Node::Channel), b"item") => Some(Node::Item),
        (Some(Node::Channel | Node::Item), b"title") => Some(Node::Field(Field::Title)),
        (Some(Node::Channel | Node::Item), b"description") => {
            Some(Node::Field(Field::Description))
        }
        (Some(Node::Item), b"link") => Some(Node::Field(Field::Link)),
        (Some(Node::Item), b"pubDate") => Some(Node::Field(Field::PubDate)),
        _ => None,
    }
}

fn field_mut(doc: &mut RawFeedDocument, parent: Node, field: Field) -> Option<&mut String> {
    match (parent, field) {
        (Node::Channel, Field::Title) => Some(&mut doc.title),
        (Node::Channel, Field::Description) => Some(&mut doc.description),
        (Node::Item, _) => doc.items.last_mut().map(|item| match field {
            Field::Title => &mut item.title,
            Field::Link => &mut item.link,
            Field::Description => &mut item.description,
            Field::PubDate => &mut item.pub_date,
        }),
        _ => None,
    }
}

/// Tracks where the reader is inside `<rss><channel>`.
#[derive(Default)]
struct Decoder {
    doc: RawFeedDocument,
    stack: Vec<Node>,
    saw_channel: bool,
}

impl Decoder {
    /// Enter a known element. A repeated field replaces the earlier value.
    fn open(&mut self, node: Node) {
        match node {
            Node::Channel => self.saw_channel = true,
            Node::Item => self.doc.items.push(RawItem::default()),
            Node::Field(field) => {
                if let Some(parent) = self.stack.last().copied() {
                    if let Some(value) = field_mut(&mut self.doc, parent, field) {
                        value.clear();
                    }
                }
            }
            Node::Rss => {}
        }
    }

    fn append(&mut self, text: &str) {
        let mut path = self.stack.iter().rev();
        if let (Some(Node::Field(field)), Some(parent)) = (path.next(), path.next()) {
            if let Some(value) = field_mut(&mut self.doc, *parent, *field) {
                value.push_str(text);
            }
        }
    }
}

/// Decode an RSS document.
///
/// Only the direct character data of `title`, `link`, `description` and
/// `pubDate` is kept; any other element, and markup nested inside those
/// fields, is skipped. Titles and descriptions (channel and items) are
/// HTML-unescaped after XML decoding, since many feeds double-encode
/// entities such as `&amp;#8217;`.
pub fn parse_feed(bytes: &[u8]) -> Result<RawFeedDocument, DecodeError> {
    let mut reader = Reader::from_reader(bytes);
    let mut decoder = Decoder::default();
    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match child(decoder.stack.last().copied(), e.name().as_ref()) {
                Some(node) => {
                    decoder.open(node);
                    decoder.stack.push(node);
                }
                None if decoder.stack.is_empty() => return Err(DecodeError::NotRss),
                None => {
                    skip_buf.clear();
                    reader.read_to_end_into(e.name(), &mut skip_buf)?;
                }
            },
            Event::Empty(e) => match child(decoder.stack.last().copied(), e.name().as_ref()) {
                Some(node) => decoder.open(node),
                None if decoder.stack.is_empty() => return Err(DecodeError::NotRss),
                None => {}
            },
            Event::End(_) => {
                decoder.stack.pop();
            }
            Event::Text(t) => {
                if matches!(decoder.stack.last(), Some(Node::Field(_))) {
                    decoder.append(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if matches!(decoder.stack.last(), Some(Node::Field(_))) {
                    let text = c.decode().map_err(quick_xml::Error::from)?;
                    decoder.append(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = decoder.stack.last() {
        return Err(DecodeError::Truncated(open.tag()));
    }
    if !decoder.saw_channel {
        return Err(DecodeError::NotRss);
    }

    let doc = decoder.doc;
    Ok(RawFeedDocument {
        title: unescape(doc.title),
        description: unescape(doc.description),
        items: doc
            .items
            .into_iter()
            .map(|item| RawItem {
                title: unescape(item.title),
                link: item.link.trim().to_string(),
                description: unescape(item.description),
                pub_date: item.pub_date.trim().to_string(),
            })
            .collect(),
    })
}

fn unescape(text: String) -> String {
    html_escape::decode_html_entities(text.trim()).into_owned()
}
