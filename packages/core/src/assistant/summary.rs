//! Bottom-up heading fold used by the summary task
//!
//! Blocks are visited in reverse document order. Body text collects under
//! the nearest level-3 section; crossing a heading asks for one summary of
//! the text gathered below it, which then moves up one level. Whatever is
//! left at the top is summarized once more by the caller.

use super::prompts::summary_prompt;

/// A summary to request, and the heading level it folds into
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FoldPrompt {
    pub level: u8,
    pub prompt: String,
}

#[derive(Debug, Default)]
pub(crate) struct SummaryFold {
    /// Summaries of whole level-1 sections
    rollup: String,
    level1: String,
    level2: String,
    level3: String,
}

/// Prepend keeps document order while walking backwards
fn prepend(buffer: &mut String, piece: &str) {
    if piece.is_empty() {
        return;
    }
    if buffer.is_empty() {
        buffer.push_str(piece);
    } else {
        *buffer = format!("{}\n{}", piece, buffer);
    }
}

fn joined(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

impl SummaryFold {
    /// Visit one block; headings deeper than 3 count as body text
    pub fn visit(&mut self, heading_level: Option<u8>, text: &str) -> Option<FoldPrompt> {
        let pending = match heading_level {
            Some(3) => self.level3.clone(),
            Some(2) => joined(&[&self.level2, &self.level3]),
            Some(1) => joined(&[&self.level1, &self.level2, &self.level3]),
            _ => {
                prepend(&mut self.level3, text);
                return None;
            }
        };

        let level = heading_level?;
        if pending.is_empty() {
            return None;
        }
        Some(FoldPrompt {
            level,
            prompt: summary_prompt(&pending, Some(text)),
        })
    }

    /// Store the summary produced for a [`FoldPrompt`] of `level`
    pub fn absorb(&mut self, level: u8, summary: &str) {
        match level {
            3 => {
                prepend(&mut self.level2, summary);
                self.level3.clear();
            }
            2 => {
                prepend(&mut self.level1, summary);
                self.level2.clear();
                self.level3.clear();
            }
            _ => {
                prepend(&mut self.rollup, summary);
                self.level1.clear();
                self.level2.clear();
                self.level3.clear();
            }
        }
    }

    /// Text still unsummarized, in document order
    pub fn remaining(&self) -> String {
        joined(&[&self.level3, &self.level2, &self.level1, &self.rollup])
    }
}
