//! ID3v2.4 chapter-tag encoder.
//!
//! Builds the binary metadata prefix for multi-part streams: an optional
//! APIC cover frame, one CTOC table of contents, and one CHAP frame per
//! chapter, each carrying a nested UTF-8 TIT2 title frame. Byte offsets in
//! CHAP frames are unknown (0xFFFFFFFF) since players seek by time.
//!
//! The feed advertises enclosure lengths before any stream is assembled, so
//! [`encoded_len`] must match [`encode`] byte-for-byte. Frame sizes depend
//! only on string lengths, never on the numeric time values, which is what
//! makes the length computable up front.

use shelfcast_core::ChapterTiming;

const OUTER_HEADER_LEN: u64 = 10;
const FRAME_HEADER_LEN: u64 = 10;
/// Encoding byte for UTF-8 text frames.
const ENCODING_UTF8: u8 = 0x03;
/// CTOC flags: top-level + ordered.
const CTOC_FLAGS: u8 = 0x03;
/// APIC picture type: front cover.
const PICTURE_FRONT_COVER: u8 = 0x03;
const TOC_ELEMENT_ID: &[u8] = b"toc";
const TOC_TITLE: &str = "Chapters";

/// Cover art to embed in the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Four 7-bit big-endian digits.
fn synchsafe(n: u32) -> [u8; 4] {
    debug_assert!(n < 1 << 28, "synchsafe overflow: {n}");
    [
        ((n >> 21) & 0x7F) as u8,
        ((n >> 14) & 0x7F) as u8,
        ((n >> 7) & 0x7F) as u8,
        (n & 0x7F) as u8,
    ]
}

/// Inverse of [`synchsafe`], used by tests and by anyone validating output.
pub fn synchsafe_decode(bytes: [u8; 4]) -> u32 {
    ((bytes[0] as u32) << 21)
        | ((bytes[1] as u32) << 14)
        | ((bytes[2] as u32) << 7)
        | bytes[3] as u32
}

fn text_frame_len(text: &str) -> u64 {
    FRAME_HEADER_LEN + 1 + text.len() as u64
}

fn chap_body_len(chapter: &ChapterTiming) -> u64 {
    // element id + NUL + start/end ms + two unknown byte offsets + TIT2
    chapter.id.len() as u64 + 1 + 4 + 4 + 4 + 4 + text_frame_len(&chapter.title)
}

fn ctoc_body_len(chapters: &[ChapterTiming]) -> u64 {
    let children: u64 = chapters.iter().map(|c| c.id.len() as u64 + 1).sum();
    TOC_ELEMENT_ID.len() as u64 + 1 + 1 + 1 + children + text_frame_len(TOC_TITLE)
}

fn apic_body_len(mime_len: u64, data_len: u64) -> u64 {
    // encoding + mime + NUL + picture type + empty description NUL + image
    1 + mime_len + 1 + 1 + 1 + data_len
}

fn payload_len(chapters: &[ChapterTiming], cover: Option<(u64, u64)>) -> u64 {
    let mut len = 0;
    if let Some((mime_len, data_len)) = cover {
        len += FRAME_HEADER_LEN + apic_body_len(mime_len, data_len);
    }
    len += FRAME_HEADER_LEN + ctoc_body_len(chapters);
    for chapter in chapters {
        len += FRAME_HEADER_LEN + chap_body_len(chapter);
    }
    len
}

/// Exact byte length [`encode`] would produce, without materializing it.
///
/// `cover` is `(mime string length, image byte length)`.
pub fn encoded_len(chapters: &[ChapterTiming], cover: Option<(u64, u64)>) -> u64 {
    if chapters.is_empty() && cover.is_none() {
        return 0;
    }
    OUTER_HEADER_LEN + payload_len(chapters, cover)
}

/// Encode the chapter tag.
///
/// Zero chapters and no cover yields an empty buffer.
pub fn encode(chapters: &[ChapterTiming], cover: Option<&CoverArt>) -> Vec<u8> {
    if chapters.is_empty() && cover.is_none() {
        return Vec::new();
    }

    let payload = payload_len(
        chapters,
        cover.map(|c| (c.mime.len() as u64, c.data.len() as u64)),
    );
    let mut out = Vec::with_capacity((OUTER_HEADER_LEN + payload) as usize);

    // Outer header: "ID3", version 2.4.0, no flags, synchsafe payload size.
    out.extend_from_slice(b"ID3");
    out.extend_from_slice(&[0x04, 0x00, 0x00]);
    out.extend_from_slice(&synchsafe(payload as u32));

    if let Some(cover) = cover {
        write_frame_header(
            &mut out,
            b"APIC",
            apic_body_len(cover.mime.len() as u64, cover.data.len() as u64),
        );
        out.push(ENCODING_UTF8);
        out.extend_from_slice(cover.mime.as_bytes());
        out.push(0x00);
        out.push(PICTURE_FRONT_COVER);
        out.push(0x00);
        out.extend_from_slice(&cover.data);
    }

    write_frame_header(&mut out, b"CTOC", ctoc_body_len(chapters));
    out.extend_from_slice(TOC_ELEMENT_ID);
    out.push(0x00);
    out.push(CTOC_FLAGS);
    out.push(chapters.len() as u8);
    for chapter in chapters {
        out.extend_from_slice(chapter.id.as_bytes());
        out.push(0x00);
    }
    write_text_frame(&mut out, TOC_TITLE);

    for chapter in chapters {
        write_frame_header(&mut out, b"CHAP", chap_body_len(chapter));
        out.extend_from_slice(chapter.id.as_bytes());
        out.push(0x00);
        out.extend_from_slice(&clamp_u32(chapter.start_ms).to_be_bytes());
        out.extend_from_slice(&clamp_u32(chapter.end_ms).to_be_bytes());
        out.extend_from_slice(&[0xFF; 4]);
        out.extend_from_slice(&[0xFF; 4]);
        write_text_frame(&mut out, &chapter.title);
    }

    debug_assert_eq!(out.len() as u64, OUTER_HEADER_LEN + payload);
    out
}

fn write_frame_header(out: &mut Vec<u8>, id: &[u8; 4], body_len: u64) {
    out.extend_from_slice(id);
    out.extend_from_slice(&synchsafe(body_len as u32));
    out.extend_from_slice(&[0x00, 0x00]);
}

fn write_text_frame(out: &mut Vec<u8>, text: &str) {
    write_frame_header(out, b"TIT2", 1 + text.len() as u64);
    out.push(ENCODING_UTF8);
    out.extend_from_slice(text.as_bytes());
}

fn clamp_u32(ms: u64) -> u32 {
    ms.min(u32::MAX as u64) as u32
}
