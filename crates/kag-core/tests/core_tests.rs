use std::fs;
use std::io::Write;
use tempfile::TempDir;

use kag_core::corpus::{ChunkingConfig, CorpusLoader};

#[test]
fn load_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let loader = CorpusLoader::new();
    let chunks = loader.load_directory(dir).expect("load");

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].content.trim(), "Short text");
    assert_eq!(chunks[0].doc_id, 1);
}

#[test]
fn doc_ids_are_sequential_across_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo\n\ncharlie delta").unwrap();
    fs::write(dir.join("b.txt"), "echo foxtrot").unwrap();
    fs::write(dir.join("ignored.md"), "not loaded").unwrap();

    let chunks = CorpusLoader::new().load_directory(dir).expect("load");
    let ids: Vec<i64> = chunks.iter().map(|c| c.doc_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(chunks[0].total_chunks, 2);
    assert_eq!(chunks[2].content, "echo foxtrot");
}

#[test]
fn load_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();

    let chunks = CorpusLoader::new()
        .load_directory_limited(dir, 1)
        .expect("load limited");

    let mut sources = std::collections::HashSet::new();
    for c in &chunks { sources.insert(c.source_path.clone()); }
    assert_eq!(sources.len(), 1, "limited to one source document");
}

#[test]
fn long_paragraph_is_windowed_with_overlap() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let words: Vec<String> = (0..25).map(|i| format!("w{i}")).collect();
    fs::write(dir.join("long.txt"), words.join(" ")).unwrap();

    let loader = CorpusLoader::with_config(ChunkingConfig { max_words: 5, words_per_window: 10, overlap_percent: 0.2 });
    let chunks = loader.load_directory(dir).expect("load");

    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].content.ends_with("w9"));
    assert!(chunks[1].content.starts_with("w8"), "two words of overlap");
    assert!(chunks[2].content.ends_with("w24"));
}

#[test]
fn default_config_splits_paragraphs_over_three_hundred_words() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let long: Vec<String> = (0..320).map(|i| format!("w{i}")).collect();
    let exact: Vec<String> = (0..300).map(|i| format!("x{i}")).collect();
    fs::write(dir.join("a_long.txt"), long.join(" ")).unwrap();
    fs::write(dir.join("b_exact.txt"), exact.join(" ")).unwrap();

    let chunks = CorpusLoader::new().load_directory(dir).expect("load");

    assert_eq!(chunks.len(), 3, "320 words become two windows, 300 words stay whole");
    assert_eq!(chunks[0].content.split_whitespace().count(), 300);
    assert!(chunks[1].content.starts_with("w240 "), "20% overlap keeps 60 words");
    assert!(chunks[1].content.ends_with("w319"));
    assert_eq!(chunks[1].total_chunks, 2);
    assert_eq!(chunks[2].content.split_whitespace().count(), 300);
}
