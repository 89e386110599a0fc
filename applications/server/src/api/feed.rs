/// Podcast feed rendering
///
/// One RSS 2.0 document with iTunes and Podcast Namespace extensions.
/// Enclosure lengths are computed with the chapter-tag length predictor so
/// they match the stream endpoint byte-for-byte. Pending single-container
/// books appear as enclosure-less items so operators can see them coming.
use crate::api::stream::estimated_tag_len;
use crate::config::ChannelConfig;
use crate::error::{Result, ServerError};
use crate::state::{AppState, FeedBook};
use axum::{
    extract::{Host, State},
    http::{header, StatusCode},
    response::Response,
};
use quick_xml::events::{BytesCData, BytesDecl, BytesText, Event};
use quick_xml::Writer;

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const PODCAST_NS: &str = "https://podcastindex.org/namespace/1.0";

/// GET /feed
pub async fn feed(Host(host): Host, State(state): State<AppState>) -> Result<Response> {
    if state.roots.is_empty() {
        return Err(ServerError::Config(
            "no library roots configured; pass library root directories as command-line arguments"
                .to_string(),
        ));
    }

    let entries = state.feed_books_sorted().await;
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let enclosure_len = match &entry {
            FeedBook::Ready(book) => estimated_tag_len(book).await + book.total_size,
            FeedBook::Pending(_) => 0,
        };
        items.push((entry, enclosure_len));
    }

    let base = format!("http://{host}");
    let xml = render_feed(&state.config.channel, &base, &state.api_key, &items)
        .map_err(|e| ServerError::Internal(format!("failed to render feed: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")
        .body(xml.into())
        .map_err(|e| ServerError::Internal(format!("failed to build response: {e}")))
}

fn render_feed(
    channel: &ChannelConfig,
    base: &str,
    key: &str,
    items: &[(FeedBook, u64)],
) -> std::result::Result<String, quick_xml::Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    writer
        .create_element("rss")
        .with_attributes([
            ("version", "2.0"),
            ("xmlns:itunes", ITUNES_NS),
            ("xmlns:podcast", PODCAST_NS),
        ])
        .write_inner_content(|writer| {
            writer
                .create_element("channel")
                .write_inner_content(|writer| write_channel(writer, channel, base, key, items))?;
            Ok::<(), quick_xml::Error>(())
        })?;

    let bytes = writer.into_inner();
    String::from_utf8(bytes).map_err(|e| quick_xml::Error::Io(std::sync::Arc::new(
        std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    )))
}

fn write_channel(
    writer: &mut Writer<Vec<u8>>,
    channel: &ChannelConfig,
    base: &str,
    key: &str,
    items: &[(FeedBook, u64)],
) -> std::result::Result<(), quick_xml::Error> {
    text(writer, "title", &channel.title)?;
    text(writer, "link", base)?;
    text(writer, "description", &channel.description)?;
    text(writer, "language", &channel.language)?;
    if let Some(copyright) = &channel.copyright {
        text(writer, "copyright", copyright)?;
    }
    if let Some(author) = &channel.author {
        text(writer, "itunes:author", author)?;
    }
    if channel.owner_name.is_some() || channel.owner_email.is_some() {
        writer
            .create_element("itunes:owner")
            .write_inner_content(|writer| {
                if let Some(name) = &channel.owner_name {
                    text(writer, "itunes:name", name)?;
                }
                if let Some(email) = &channel.owner_email {
                    text(writer, "itunes:email", email)?;
                }
                Ok::<(), quick_xml::Error>(())
            })?;
    }
    text(writer, "itunes:explicit", channel.explicit.as_str())?;
    if let Some(category) = &channel.category {
        writer
            .create_element("itunes:category")
            .with_attribute(("text", category.as_str()))
            .write_empty()?;
    }
    text(writer, "itunes:type", &channel.feed_type)?;
    if let Some(image_url) = &channel.image_url {
        writer
            .create_element("itunes:image")
            .with_attribute(("href", image_url.as_str()))
            .write_empty()?;
    }

    for (entry, enclosure_len) in items {
        match entry {
            FeedBook::Ready(book) => write_ready_item(writer, book, *enclosure_len, base, key)?,
            FeedBook::Pending(meta) => write_pending_item(writer, meta)?,
        }
    }
    Ok(())
}

fn write_ready_item(
    writer: &mut Writer<Vec<u8>>,
    book: &shelfcast_core::Book,
    enclosure_len: u64,
    base: &str,
    key: &str,
) -> std::result::Result<(), quick_xml::Error> {
    writer
        .create_element("item")
        .write_inner_content(|writer| {
            text(writer, "title", &book.title)?;
            writer
                .create_element("guid")
                .with_attribute(("isPermaLink", "false"))
                .write_text_content(BytesText::new(&book.id))?;
            text(writer, "itunes:author", &book.author)?;
            if let Some(published) = book.published_at {
                text(writer, "pubDate", &published.to_rfc2822())?;
            }
            match (&book.description_html, &book.description) {
                (Some(html), _) => {
                    writer
                        .create_element("description")
                        .write_cdata_content(BytesCData::new(html.as_str()))?;
                }
                (None, Some(plain)) => text(writer, "description", plain)?,
                (None, None) => {}
            }
            writer
                .create_element("enclosure")
                .with_attributes([
                    (
                        "url",
                        format!("{base}/books/{}/stream?key={key}", book.id).as_str(),
                    ),
                    ("type", book.mime.as_str()),
                    ("length", enclosure_len.to_string().as_str()),
                ])
                .write_empty()?;
            if let Some(duration) = book.duration_seconds {
                text(writer, "itunes:duration", &format!("{}", duration.round() as u64))?;
            }
            if book.cover_path.is_some() {
                writer
                    .create_element("itunes:image")
                    .with_attribute((
                        "href",
                        format!("{base}/books/{}/cover?key={key}", book.id).as_str(),
                    ))
                    .write_empty()?;
            }
            if book.chapters().map(|c| !c.is_empty()).unwrap_or(false) {
                writer
                    .create_element("podcast:chapters")
                    .with_attributes([
                        (
                            "url",
                            format!("{base}/books/{}/chapters?key={key}", book.id).as_str(),
                        ),
                        ("type", "application/json+chapters"),
                    ])
                    .write_empty()?;
            }
            Ok::<(), quick_xml::Error>(())
        })?;
    Ok(())
}

fn write_pending_item(
    writer: &mut Writer<Vec<u8>>,
    meta: &shelfcast_core::BookMeta,
) -> std::result::Result<(), quick_xml::Error> {
    writer
        .create_element("item")
        .write_inner_content(|writer| {
            text(writer, "title", &meta.title)?;
            writer
                .create_element("guid")
                .with_attribute(("isPermaLink", "false"))
                .write_text_content(BytesText::new(&meta.id))?;
            text(writer, "itunes:author", &meta.author)?;
            text(
                writer,
                "description",
                "Transcoding in progress; not yet streamable.",
            )?;
            Ok::<(), quick_xml::Error>(())
        })?;
    Ok(())
}

fn text(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: &str,
) -> std::result::Result<(), quick_xml::Error> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(value))?;
    Ok(())
}
