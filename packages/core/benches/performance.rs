//! Performance benchmarks for NotesAI core operations
//!
//! Run with: `cargo bench -p notesai-core`
//!
//! These benchmarks cover the paths that run on every keystroke-sized
//! update or page save:
//! - Correction annotation (called once per streamed delta)
//! - Searchable text extraction (every page write)
//! - Markdown conversion of model replies
//! - Page creation and search on a libsql database

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use notesai_core::diff::{annotate, redline};
use notesai_core::markdown::{blocks_to_markdown, markdown_to_blocks};
use notesai_core::text::extract_searchable_text;
use notesai_core::{Block, CreatePage, DiffMode, Document, PageService};
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// A paragraph of roughly `words` words with a few misspellings
fn paragraph(words: usize, typo: bool) -> String {
    (0..words)
        .map(|i| match (typo, i % 7) {
            (true, 3) => "teh",
            (_, 3) => "the",
            (_, 0) => "notes",
            (_, 1) => "about",
            (_, 2) => "cells",
            (_, 4) => "membrane",
            (_, 5) => "and",
            _ => "energy",
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Document with `sections` heading + two paragraphs groups
fn large_document(sections: usize) -> Document {
    let mut blocks = Vec::new();
    for i in 0..sections {
        blocks.push(Block::heading((i % 3 + 1) as u8, format!("Section {}", i + 1)));
        blocks.push(Block::paragraph(paragraph(40, false)));
        blocks.push(Block::paragraph(paragraph(25, false)));
    }
    Document::new(blocks)
}

async fn setup_service() -> (PageService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let service = PageService::open(temp_dir.path().join("bench.db"))
        .await
        .unwrap();
    (service, temp_dir)
}

/// Benchmark correction annotation in every mode
///
/// One call per streamed delta, so this bounds how smooth the live redline
/// can be on long paragraphs.
fn bench_annotation(c: &mut Criterion) {
    let original = paragraph(200, true);
    let corrected = paragraph(200, false);

    let mut group = c.benchmark_group("annotate");
    for (name, mode) in [
        ("word_by_word", DiffMode::WordByWord),
        ("word_diff", DiffMode::WordDiff),
        ("char_diff", DiffMode::CharDiff),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| annotate(black_box(&original), black_box(&corrected), mode))
        });
    }
    group.bench_function("redline_word_diff", |b| {
        b.iter(|| redline(black_box(&original), black_box(&corrected), DiffMode::WordDiff))
    });
    group.finish();
}

/// Benchmark plain-text extraction of a 300-block page
fn bench_searchable_text(c: &mut Criterion) {
    let content = large_document(100).to_json();

    c.bench_function("extract_searchable_text_300_blocks", |b| {
        b.iter(|| extract_searchable_text(black_box(&content)))
    });
}

/// Benchmark markdown round trips of model-sized replies
fn bench_markdown(c: &mut Criterion) {
    let markdown = blocks_to_markdown(&large_document(30).blocks);

    let mut group = c.benchmark_group("markdown");
    group.bench_function("to_blocks_90_blocks", |b| {
        b.iter(|| markdown_to_blocks(black_box(&markdown)))
    });
    let blocks = large_document(30).blocks;
    group.bench_function("from_blocks_90_blocks", |b| {
        b.iter(|| blocks_to_markdown(black_box(&blocks)))
    });
    group.finish();
}

/// Benchmark page writes and FTS queries on a real database
fn bench_page_store(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let content = large_document(10).to_json();

    let mut group = c.benchmark_group("page_store");
    group.sample_size(20);

    group.bench_function("create_page", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_service().await;
                let start = std::time::Instant::now();
                for i in 0..iters {
                    service
                        .create_page(CreatePage {
                            content: Some(content.clone()),
                            ..CreatePage::titled(format!("Page {}", i))
                        })
                        .await
                        .unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("search_200_pages", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_service().await;
                for i in 0..200 {
                    service
                        .create_page(CreatePage {
                            content: Some(content.clone()),
                            ..CreatePage::titled(format!("Page {}", i))
                        })
                        .await
                        .unwrap();
                }

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    black_box(service.search("membrane").await.unwrap());
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_annotation,
    bench_searchable_text,
    bench_markdown,
    bench_page_store
);
criterion_main!(benches);
