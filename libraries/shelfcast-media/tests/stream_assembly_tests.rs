//! End-to-end checks that streamed bodies match the virtual object
//! `tag ‖ audio` byte-for-byte.

use futures::TryStreamExt;
use proptest::prelude::*;
use shelfcast_media::assembly::{plan, stream_body, StreamPlan};
use shelfcast_core::{Book, PartInput};
use std::path::Path;
use tempfile::TempDir;

/// Write part files with recognizable contents and build the matching book.
fn build_fixture(dir: &Path, sizes: &[u64]) -> (Book, Vec<u8>) {
    let mut audio = Vec::new();
    let mut parts = Vec::new();
    for (i, &size) in sizes.iter().enumerate() {
        let bytes: Vec<u8> = (0..size).map(|j| (i as u8).wrapping_mul(31).wrapping_add(j as u8)).collect();
        let path = dir.join(format!("{:02}.mp3", i + 1));
        std::fs::write(&path, &bytes).unwrap();
        audio.extend_from_slice(&bytes);
        parts.push(PartInput {
            path,
            name: format!("{:02}", i + 1),
            size,
            duration_ms: 10_000,
            title: None,
        });
    }
    (Book::multi("a-b", "B", "A", parts).unwrap(), audio)
}

fn make_tag(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(3)).collect()
}

async fn collect(result: StreamPlan) -> Vec<u8> {
    let body = match result {
        StreamPlan::Whole { body, .. } => body,
        StreamPlan::Partial { body, .. } => body,
        StreamPlan::Unsatisfiable { .. } => panic!("unsatisfiable plan has no body"),
    };
    let chunks: Vec<bytes::Bytes> = stream_body(body).try_collect().await.unwrap();
    chunks.concat()
}

#[tokio::test]
async fn whole_object_round_trips() {
    let dir = TempDir::new().unwrap();
    let (book, audio) = build_fixture(dir.path(), &[100, 200]);
    let tag = make_tag(50);

    let mut expected = tag.clone();
    expected.extend_from_slice(&audio);

    let body = collect(plan(&book, &tag, None)).await;
    assert_eq!(body, expected);
}

#[tokio::test]
async fn boundary_crossing_range_matches_slice() {
    let dir = TempDir::new().unwrap();
    let (book, audio) = build_fixture(dir.path(), &[100, 200]);
    let tag = make_tag(50);
    let t = tag.len() as u64;

    // bytes=(T-5)-(T+4): last 5 tag bytes then first 5 audio bytes.
    let header = format!("bytes={}-{}", t - 5, t + 4);
    let result = plan(&book, &tag, Some(&header));
    let StreamPlan::Partial { start, end, total_size, .. } = &result else {
        panic!("expected partial");
    };
    assert_eq!((*start, *end), (t - 5, t + 4));
    assert_eq!(*total_size, t + 300);

    let body = collect(result).await;
    assert_eq!(body.len(), 10);
    assert_eq!(&body[..5], &tag[45..]);
    assert_eq!(&body[5..], &audio[..5]);
}

#[tokio::test]
async fn suffix_range_on_single_container() {
    let dir = TempDir::new().unwrap();
    let contents: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    let path = dir.path().join("book.mp3");
    std::fs::write(&path, &contents).unwrap();
    let book = Book::single(
        "a-b",
        "B",
        "A",
        PartInput {
            path,
            name: "book".into(),
            size: 1_000_000,
            duration_ms: 0,
            title: None,
        },
        None,
    );

    let result = plan(&book, &[], Some("bytes=-1000"));
    let StreamPlan::Partial { start, end, total_size, .. } = &result else {
        panic!("expected partial");
    };
    assert_eq!((*start, *end, *total_size), (999_000, 999_999, 1_000_000));

    let body = collect(result).await;
    assert_eq!(body, &contents[999_000..]);
}

#[tokio::test]
async fn one_part_book_tag_not_empty() {
    let dir = TempDir::new().unwrap();
    let (book, _) = build_fixture(dir.path(), &[100]);
    let chapters = book.chapters().unwrap();
    assert_eq!(chapters.len(), 1);
    let tag = shelfcast_media::chapter_tag::encode(chapters, None);
    assert!(!tag.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any valid range over any small book equals the same slice of the
    /// materialized virtual object.
    #[test]
    fn arbitrary_ranges_match_virtual_object(
        sizes in prop::collection::vec(1u64..600, 1..5),
        tag_len in 0usize..200,
        a in 0u64..2000,
        len in 1u64..2000,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let dir = TempDir::new().unwrap();
            let (book, audio) = build_fixture(dir.path(), &sizes);
            let tag = make_tag(tag_len);

            let mut object = tag.clone();
            object.extend_from_slice(&audio);
            let total = object.len() as u64;

            let start = a % total;
            let end = (start + len - 1).min(total - 1);
            let header = format!("bytes={start}-{end}");

            let result = plan(&book, &tag, Some(&header));
            let body = collect(result).await;
            assert_eq!(body, &object[start as usize..=end as usize]);
        });
    }
}
