//! Text Diff Annotator
//!
//! Aligns an original text with its AI-corrected version and turns the
//! alignment into styled runs the editor can render:
//!
//! - unchanged segments carry no style
//! - inserted segments get a green background
//! - removed segments get a red background, red text and strike-through
//!
//! Two families of modes exist. [`DiffMode::WordByWord`] compares
//! whitespace-separated tokens positionally and only ever marks mismatching
//! pairs red. Tokens past the end of the shorter side have no partner; they
//! are kept as plain runs rather than dropped, so a longer correction still
//! shows its tail. [`DiffMode::WordDiff`] and [`DiffMode::CharDiff`] run a Myers
//! sequence diff over word or character tokens.

use crate::models::{StyledText, Styles};
use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};

pub const INSERTED_COLOR: &str = "green";
pub const REMOVED_COLOR: &str = "red";

/// How the two texts are aligned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffMode {
    /// Positional token comparison (design 1)
    WordByWord,
    /// Myers diff over words (design 2)
    #[default]
    WordDiff,
    /// Myers diff over characters (design 3)
    CharDiff,
}

impl DiffMode {
    /// Map the numeric design id used by the editor toolbar
    pub fn from_design(design: u8) -> Option<Self> {
        match design {
            1 => Some(DiffMode::WordByWord),
            2 => Some(DiffMode::WordDiff),
            3 => Some(DiffMode::CharDiff),
            _ => None,
        }
    }

    pub fn design(&self) -> u8 {
        match self {
            DiffMode::WordByWord => 1,
            DiffMode::WordDiff => 2,
            DiffMode::CharDiff => 3,
        }
    }
}

/// Runs for both sides of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotated {
    pub original: Vec<StyledText>,
    pub corrected: Vec<StyledText>,
}

/// One segment emitted by the sequence diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Unchanged,
    Inserted,
    Removed,
}

impl SegmentKind {
    fn styles(self) -> Styles {
        match self {
            SegmentKind::Unchanged => Styles::default(),
            SegmentKind::Inserted => Styles::default().with_background(INSERTED_COLOR),
            SegmentKind::Removed => Styles::default()
                .with_background(REMOVED_COLOR)
                .with_text_color(REMOVED_COLOR)
                .with_strike(),
        }
    }
}

impl From<ChangeTag> for SegmentKind {
    fn from(tag: ChangeTag) -> Self {
        match tag {
            ChangeTag::Equal => SegmentKind::Unchanged,
            ChangeTag::Insert => SegmentKind::Inserted,
            ChangeTag::Delete => SegmentKind::Removed,
        }
    }
}

/// Diff segments in algorithm order, adjacent same-kind changes merged
fn segments(original: &str, corrected: &str, mode: DiffMode) -> Vec<(SegmentKind, String)> {
    let mut config = TextDiff::configure();
    config.algorithm(Algorithm::Myers);
    let diff = match mode {
        DiffMode::CharDiff => config.diff_chars(original, corrected),
        _ => config.diff_words(original, corrected),
    };

    let mut out: Vec<(SegmentKind, String)> = Vec::new();
    for change in diff.iter_all_changes() {
        let kind = SegmentKind::from(change.tag());
        match out.last_mut() {
            Some((last, text)) if *last == kind => text.push_str(change.value()),
            _ => out.push((kind, change.value().to_string())),
        }
    }
    out
}

fn or_empty_run(mut runs: Vec<StyledText>) -> Vec<StyledText> {
    if runs.is_empty() {
        runs.push(StyledText::plain(""));
    }
    runs
}

fn word_by_word(original: &str, corrected: &str) -> Annotated {
    let source: Vec<&str> = original.split(char::is_whitespace).collect();
    let target: Vec<&str> = corrected.split(char::is_whitespace).collect();
    let shared = source.len().min(target.len());

    let side = |tokens: &[&str], other: &[&str]| -> Vec<StyledText> {
        tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let text = format!("{} ", token);
                if i < shared && other[i] != *token {
                    StyledText::styled(text, Styles::default().with_background(REMOVED_COLOR))
                } else {
                    StyledText::plain(text)
                }
            })
            .collect()
    };

    Annotated {
        original: side(&source[..], &target[..]),
        corrected: side(&target[..], &source[..]),
    }
}

/// Annotate both texts
///
/// In the sequence-diff modes the original side holds unchanged and removed
/// segments and the corrected side holds unchanged and inserted segments,
/// so each side concatenates back to its input exactly.
pub fn annotate(original: &str, corrected: &str, mode: DiffMode) -> Annotated {
    if mode == DiffMode::WordByWord {
        return word_by_word(original, corrected);
    }

    let mut source = Vec::new();
    let mut target = Vec::new();
    for (kind, text) in segments(original, corrected, mode) {
        let run = StyledText::styled(text, kind.styles());
        match kind {
            SegmentKind::Unchanged => {
                source.push(run.clone());
                target.push(run);
            }
            SegmentKind::Removed => source.push(run),
            SegmentKind::Inserted => target.push(run),
        }
    }

    Annotated {
        original: or_empty_run(source),
        corrected: or_empty_run(target),
    }
}

/// Single-sequence view of a correction (removed and inserted inline)
pub fn redline(original: &str, corrected: &str, mode: DiffMode) -> Vec<StyledText> {
    if mode == DiffMode::WordByWord {
        return word_by_word(original, corrected).corrected;
    }

    let runs = segments(original, corrected, mode)
        .into_iter()
        .map(|(kind, text)| StyledText::styled(text, kind.styles()))
        .collect();
    or_empty_run(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat(runs: &[StyledText]) -> String {
        runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn red() -> Styles {
        Styles::default().with_background("red")
    }

    #[test]
    fn test_word_by_word_marks_mismatched_pairs() {
        let result = annotate("Hello world", "Hello there", DiffMode::WordByWord);

        assert_eq!(
            result.original,
            vec![StyledText::plain("Hello "), StyledText::styled("world ", red())]
        );
        assert_eq!(
            result.corrected,
            vec![StyledText::plain("Hello "), StyledText::styled("there ", red())]
        );
    }

    #[test]
    fn test_word_by_word_identical_text() {
        let result = annotate("Hello world", "Hello world", DiffMode::WordByWord);
        assert_eq!(result.original, result.corrected);
        assert_eq!(concat(&result.original).trim_end(), "Hello world");
    }

    #[test]
    fn test_word_by_word_extra_tokens_unstyled() {
        let longer_original = annotate("Hello world test", "Hello world", DiffMode::WordByWord);
        assert_eq!(longer_original.original.len(), 3);
        assert_eq!(longer_original.original[2], StyledText::plain("test "));
        assert_eq!(longer_original.corrected.len(), 2);

        let longer_corrected = annotate("Hello", "Hi there", DiffMode::WordByWord);
        assert_eq!(longer_corrected.corrected[0], StyledText::styled("Hi ", red()));
        assert_eq!(longer_corrected.corrected[1], StyledText::plain("there "));

        let appended = annotate("Hello world", "Hello world again today", DiffMode::WordByWord);
        let tail: String = appended.corrected[2..].iter().map(|run| run.text.as_str()).collect();
        assert_eq!(appended.corrected.len(), 4);
        assert_eq!(tail, "again today ");
        assert!(appended.corrected.iter().all(|run| run.styles == Styles::default()));
    }

    #[test]
    fn test_word_by_word_empty_inputs() {
        let result = annotate("", "", DiffMode::WordByWord);
        assert_eq!(result.original, vec![StyledText::plain(" ")]);
        assert_eq!(result.corrected, vec![StyledText::plain(" ")]);
    }

    #[test]
    fn test_word_diff_identical_is_one_run() {
        let result = annotate("Hello world", "Hello world", DiffMode::WordDiff);
        assert_eq!(result.original, vec![StyledText::plain("Hello world")]);
        assert_eq!(result.original, result.corrected);
    }

    #[test]
    fn test_word_diff_insertion() {
        let result = annotate("Hello", "Hello world", DiffMode::WordDiff);
        assert_eq!(result.original, vec![StyledText::plain("Hello")]);
        assert_eq!(
            result.corrected,
            vec![
                StyledText::plain("Hello"),
                StyledText::styled(" world", Styles::default().with_background("green")),
            ]
        );
    }

    #[test]
    fn test_word_diff_removal_style() {
        let result = annotate("Hello world", "Hello", DiffMode::WordDiff);
        let removed = &result.original[1];
        assert_eq!(removed.text, " world");
        assert_eq!(removed.styles.background_color.as_deref(), Some("red"));
        assert_eq!(removed.styles.text_color.as_deref(), Some("red"));
        assert!(removed.styles.is_strike());
        assert_eq!(result.corrected, vec![StyledText::plain("Hello")]);
    }

    #[test]
    fn test_diff_modes_reconstruct_inputs() {
        let pairs = [
            ("The quick brown fox", "The fast red fox"),
            ("", "Bonjour"),
            ("Je suis allé au marché", "Je suis allée au marché."),
            ("a  b\tc", "a b c"),
        ];
        for mode in [DiffMode::WordDiff, DiffMode::CharDiff] {
            for (original, corrected) in pairs {
                let result = annotate(original, corrected, mode);
                assert_eq!(concat(&result.original), original, "{:?}", mode);
                assert_eq!(concat(&result.corrected), corrected, "{:?}", mode);
            }
        }
    }

    #[test]
    fn test_empty_side_gets_single_empty_run() {
        let result = annotate("", "", DiffMode::CharDiff);
        assert_eq!(result.original, vec![StyledText::plain("")]);
        assert_eq!(result.corrected, vec![StyledText::plain("")]);
    }

    #[test]
    fn test_redline_keeps_both_sides_inline() {
        let runs = redline("Hello world", "Hello there", DiffMode::WordDiff);
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello ", "world", "there"]);
        assert!(runs[1].styles.is_strike());
        assert_eq!(runs[2].styles.background_color.as_deref(), Some("green"));
    }

    #[test]
    fn test_design_ids() {
        assert_eq!(DiffMode::from_design(1), Some(DiffMode::WordByWord));
        assert_eq!(DiffMode::from_design(3).map(|m| m.design()), Some(3));
        assert_eq!(DiffMode::from_design(9), None);
        assert_eq!(DiffMode::default(), DiffMode::WordDiff);
    }
}
