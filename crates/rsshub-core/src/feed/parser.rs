use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::models::FeedEntry;
use crate::{Error, Result};

/// Entry child elements we keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    Content,
    Published,
    Updated,
    Guid,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" | b"summary" => Some(Field::Description),
            b"content" | b"encoded" => Some(Field::Content),
            b"pubDate" | b"published" | b"date" | b"issued" => Some(Field::Published),
            b"updated" | b"modified" => Some(Field::Updated),
            b"guid" | b"id" => Some(Field::Guid),
            _ => None,
        }
    }
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    link: Option<String>,
    description: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    guid: Option<String>,
}

impl EntryBuilder {
    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Title => {
                self.title.push_str(text);
                return;
            }
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::Guid => &mut self.guid,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    /// Atom `<link href>`; the first alternate link wins
    fn offer_link(&mut self, href: String) {
        if self.link.is_none() {
            self.link = Some(href);
        }
    }

    fn build(self) -> FeedEntry {
        FeedEntry {
            title: self.title.trim().to_string(),
            link: self.link.or(self.guid).unwrap_or_default().trim().to_string(),
            description: self.description.or(self.content),
            raw_published: self.published.or(self.updated).unwrap_or_default(),
        }
    }
}

/// Returns the href of an alternate link (or one without `rel`)
fn link_href(e: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut rel = None;

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"href" => href = Some(String::from_utf8_lossy(&attr.value).to_string()),
            b"rel" => rel = Some(String::from_utf8_lossy(&attr.value).to_string()),
            _ => {}
        }
    }

    match rel.as_deref() {
        None | Some("alternate") => href,
        Some(_) => None,
    }
}

/// Parse RSS 2.0, RSS 1.0 or Atom content into raw entries.
///
/// Dates are left untouched; see [`super::date::parse_pub_date`].
pub fn parse_entries(content: &[u8]) -> Result<Vec<FeedEntry>> {
    let text = String::from_utf8_lossy(content);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut saw_root = false;
    let mut current: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"rss" | b"feed" | b"RDF" => saw_root = true,
                    b"item" | b"entry" => {
                        current = Some(EntryBuilder::default());
                        field = None;
                    }
                    b"link" if current.is_some() && field.is_none() => match link_href(&e) {
                        Some(href) => {
                            if let Some(builder) = current.as_mut() {
                                builder.offer_link(href);
                            }
                        }
                        None => field = Some(Field::Link),
                    },
                    tag if current.is_some() && field.is_none() => field = Field::from_tag(tag),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"link" && field.is_none() {
                    if let (Some(builder), Some(href)) = (current.as_mut(), link_href(&e)) {
                        builder.offer_link(href);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(builder), Some(f)) = (current.as_mut(), field) {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        // Undeclared HTML entities (&nbsp; etc.) are common
                        Err(_) => String::from_utf8_lossy(&e).to_string(),
                    };
                    builder.push(f, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(builder), Some(f)) = (current.as_mut(), field) {
                    builder.push(f, &String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"item" | b"entry" => {
                        if let Some(builder) = current.take() {
                            entries.push(builder.build());
                        }
                        field = None;
                    }
                    tag if field.is_some() && Field::from_tag(tag) == field => field = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::FeedParse(format!(
                    "Failed to parse feed at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::FeedParse(
            "document is neither an RSS nor an Atom feed".to_string(),
        ));
    }

    Ok(entries)
}
