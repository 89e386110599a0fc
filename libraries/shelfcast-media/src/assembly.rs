//! Virtual stream assembly.
//!
//! A book's streamable object is `tag ‖ audio`: the synthesized chapter tag
//! (empty for singles) followed by the concatenation of part files in
//! order. This module maps an absolute byte range onto that logical object
//! and emits the body as a bounded-buffer stream, so memory use is
//! independent of book size.

use crate::range::{self, RangeRequest};
use bytes::Bytes;
use futures::Stream;
use shelfcast_core::Book;
use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Read buffer for part slices.
const CHUNK_SIZE: usize = 64 * 1024;

/// One part's contribution to a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSlice {
    pub path: PathBuf,
    /// Offset within the file.
    pub offset: u64,
    pub len: u64,
}

/// The bytes a response body is drawn from, in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyPlan {
    /// Slice of the tag prefix, already cut to the requested range.
    pub tag: Bytes,
    pub files: Vec<FileSlice>,
}

impl BodyPlan {
    pub fn len(&self) -> u64 {
        self.tag.len() as u64 + self.files.iter().map(|f| f.len).sum::<u64>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How to answer one request against a book's virtual object.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPlan {
    /// 200 with the whole object.
    Whole { total_size: u64, body: BodyPlan },
    /// 206 with `Content-Range: bytes start-end/total_size`.
    Partial {
        start: u64,
        end: u64,
        total_size: u64,
        body: BodyPlan,
    },
    /// 416 with `Content-Range: */total_size`.
    Unsatisfiable { total_size: u64 },
}

/// Size of the virtual object `tag ‖ audio`.
pub fn virtual_size(book: &Book, tag_len: u64) -> u64 {
    tag_len + book.total_size
}

/// Resolve a request's optional Range header into a response plan.
pub fn plan(book: &Book, tag: &[u8], range_header: Option<&str>) -> StreamPlan {
    let total_size = virtual_size(book, tag.len() as u64);
    match range::parse(range_header, total_size) {
        RangeRequest::Full => {
            let body = if total_size == 0 {
                BodyPlan::default()
            } else {
                body_for(book, tag, 0, total_size - 1)
            };
            StreamPlan::Whole { total_size, body }
        }
        RangeRequest::Bounded { start, end } => StreamPlan::Partial {
            start,
            end,
            total_size,
            body: body_for(book, tag, start, end),
        },
        RangeRequest::Unsatisfiable => StreamPlan::Unsatisfiable { total_size },
    }
}

/// Map the absolute range `[r0, r1]` onto a tag slice and per-file slices.
fn body_for(book: &Book, tag: &[u8], r0: u64, r1: u64) -> BodyPlan {
    let tag_len = tag.len() as u64;

    let tag_slice = if r0 < tag_len {
        let upper = r1.min(tag_len - 1);
        Bytes::copy_from_slice(&tag[r0 as usize..=upper as usize])
    } else {
        Bytes::new()
    };

    let mut files = Vec::new();
    if r1 >= tag_len {
        let a0 = r0.saturating_sub(tag_len);
        let a1 = r1 - tag_len;
        for file in book.files() {
            if file.end < a0 || file.start > a1 {
                continue;
            }
            let offset = a0.max(file.start) - file.start;
            let last = a1.min(file.end) - file.start;
            files.push(FileSlice {
                path: file.path.clone(),
                offset,
                len: last - offset + 1,
            });
        }
    }

    BodyPlan {
        tag: tag_slice,
        files,
    }
}

/// Emit a planned body as a chunked byte stream.
///
/// Each part is opened lazily, read through a bounded buffer, and closed
/// when its slice is exhausted (or the stream is dropped mid-flight on
/// request cancellation).
pub fn stream_body(body: BodyPlan) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
    struct State {
        tag: Option<Bytes>,
        slices: VecDeque<FileSlice>,
        open: Option<(File, u64)>,
    }

    let state = State {
        tag: (!body.tag.is_empty()).then_some(body.tag),
        slices: body.files.into(),
        open: None,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        if let Some(tag) = state.tag.take() {
            return Ok(Some((tag, state)));
        }
        loop {
            if let Some((file, remaining)) = state.open.as_mut() {
                if *remaining == 0 {
                    state.open = None;
                    continue;
                }
                let want = CHUNK_SIZE.min(*remaining as usize);
                let mut buf = vec![0u8; want];
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "part file truncated during streaming",
                    ));
                }
                buf.truncate(n);
                *remaining -= n as u64;
                return Ok(Some((Bytes::from(buf), state)));
            }

            let Some(slice) = state.slices.pop_front() else {
                return Ok(None);
            };
            let mut file = File::open(&slice.path).await?;
            if slice.offset > 0 {
                file.seek(SeekFrom::Start(slice.offset)).await?;
            }
            state.open = Some((file, slice.len));
        }
    })
}
