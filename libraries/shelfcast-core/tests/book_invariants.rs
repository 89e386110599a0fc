//! Property tests for the segment and chapter table invariants.

use proptest::prelude::*;
use shelfcast_core::{slugify, Book, PartInput};
use std::path::PathBuf;

fn parts_strategy() -> impl Strategy<Value = Vec<PartInput>> {
    prop::collection::vec((1u64..100_000, 0u64..7_200_000), 1..20).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (size, duration_ms))| PartInput {
                path: PathBuf::from(format!("/lib/a/b/{i:03}.mp3")),
                name: format!("{i:03}"),
                size,
                duration_ms,
                title: None,
            })
            .collect()
    })
}

proptest! {
    /// Segments tile the byte space exactly: each part starts where the
    /// previous one ended and the final byte is `total_size - 1`.
    #[test]
    fn segments_are_contiguous_and_cover_total(parts in parts_strategy()) {
        let sizes: Vec<u64> = parts.iter().map(|p| p.size).collect();
        let book = Book::multi("a-b", "B", "A", parts).unwrap();

        let mut expected_start = 0u64;
        for (segment, size) in book.files().iter().zip(&sizes) {
            prop_assert_eq!(segment.start, expected_start);
            prop_assert_eq!(segment.end, expected_start + size - 1);
            expected_start += size;
        }
        prop_assert_eq!(book.total_size, sizes.iter().sum::<u64>());
        prop_assert_eq!(book.files().last().unwrap().end, book.total_size - 1);
    }

    /// Chapters mirror the parts: one per part, at cumulative millisecond
    /// offsets, each spanning exactly its part's duration.
    #[test]
    fn chapters_accumulate_durations(parts in parts_strategy()) {
        let durations: Vec<u64> = parts.iter().map(|p| p.duration_ms).collect();
        let book = Book::multi("a-b", "B", "A", parts).unwrap();

        let chapters = book.chapters().unwrap();
        prop_assert_eq!(chapters.len(), durations.len());

        let mut expected_start = 0u64;
        for (chapter, duration) in chapters.iter().zip(&durations) {
            prop_assert_eq!(chapter.start_ms, expected_start);
            prop_assert_eq!(chapter.end_ms - chapter.start_ms, *duration);
            expected_start += duration;
        }
    }

    #[test]
    fn slugify_is_idempotent(input in ".{0,60}") {
        let once = slugify(&input);
        prop_assert_eq!(slugify(&once), once.clone());
        prop_assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!once.starts_with('-') && !once.ends_with('-'));
    }
}
