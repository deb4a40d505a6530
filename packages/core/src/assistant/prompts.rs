//! Prompt text for the four assistant tasks
//!
//! The wording matters: the models are small and follow these prompts
//! closely. The French fragment in [`summary_prompt`] is kept as is because
//! notes are expected to be written in French.

use notesai_llm_engine::ChatMessage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Character budget for system + user prompt (about 3500 tokens)
pub const MAX_INPUT_CHARS: usize = 14_000;

pub const INPUT_TOO_LONG_MESSAGE: &str =
    "This block text is too long. Please shorten the text or split it into multiple blocks.";
pub const GENERATION_ERROR_MESSAGE: &str = "Error. Please try again.";

pub const TRANSLATION_PLACEHOLDER: &str = "Translation in progress…";
pub const CORRECTION_PLACEHOLDER: &str = "Correction in progress…";
pub const SUMMARY_PLACEHOLDER: &str = "Summary in progress…";
pub const INTERMEDIATE_SUMMARY_PREFIX: &str = "Intermediate summary: ";

/// Text color of in-progress translation placeholders
pub const PLACEHOLDER_COLOR: &str = "red";
/// Text color of blocks written by the assistant
pub const ASSISTANT_COLOR: &str = "blue";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Translation,
    Correction,
    Summary,
    Develop,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Translation => "translation",
            TaskKind::Correction => "correction",
            TaskKind::Summary => "summary",
            TaskKind::Develop => "develop",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            TaskKind::Translation => {
                "You are a professional translator. Translate markdown text from French to English without introduction, explanation or context, just write the translation. Keep the markdown formatting. Don't say \"here is the translation\" or \"the translation is\", just write the translation."
            }
            TaskKind::Correction => {
                "You are a high-level grammar expert. You must transcribe each text word for word while correcting spelling errors."
            }
            TaskKind::Summary => {
                "You are a writer. Summarize texts if needed. As a writer, you should not add information or introductory phrases to your work. For example, don't write 'Here is the summary of the text'"
            }
            TaskKind::Develop => {
                "You are a great writer. Write text from the few ideas given to you."
            }
        }
    }

    /// Status line shown while the task runs
    pub fn loading_message(&self) -> &'static str {
        match self {
            TaskKind::Translation => "Document translation in progress. Generating response...",
            TaskKind::Correction => "Document correction in progress. Generating response...",
            TaskKind::Summary => "Document summary in progress. Generating response...",
            TaskKind::Develop => "Document development in progress. Generating response...",
        }
    }

    /// System + user message pair sent for one prompt
    pub fn messages(&self, prompt: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(prompt),
        ]
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-document translation of one block
pub fn translation_prompt(markdown: &str) -> String {
    format!(
        "Translate this text to English and keep the markdown formatting : {}",
        markdown
    )
}

/// Translation of a selected block into a new block below it
pub fn selection_translation_prompt(markdown: &str) -> String {
    format!(
        "Translate this text to English, preserving the markdown style : {}",
        markdown
    )
}

pub fn correction_prompt(text: &str) -> String {
    format!(
        "I want you to copy this text word for word while correcting spelling errors in French without introduction, explanation or context, just write the correction: {}",
        text
    )
}

/// Summary request, optionally naming the section the text belongs to
pub fn summary_prompt(text: &str, section: Option<&str>) -> String {
    match section {
        Some(section) => format!(
            " Summarize this text if needed: {}\nSachant que c'est une sous-partie de : {}",
            text, section
        ),
        None => format!(" Summarize this text if needed: {}", text),
    }
}

pub fn develop_prompt(text: &str) -> String {
    format!("Develop text from these elements: {}", text)
}

/// True when the messages exceed [`MAX_INPUT_CHARS`]
pub fn check_input_length(messages: &[ChatMessage]) -> bool {
    let total: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    total > MAX_INPUT_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompts_describe_roles() {
        assert!(TaskKind::Translation.system_prompt().contains("professional translator"));
        assert!(TaskKind::Translation.system_prompt().contains("French to English"));
        assert!(TaskKind::Correction.system_prompt().contains("grammar expert"));
        assert!(TaskKind::Summary.system_prompt().contains("Summarize"));
        assert!(TaskKind::Develop.system_prompt().contains("ideas"));
    }

    #[test]
    fn test_summary_prompt_sections() {
        assert_eq!(
            summary_prompt("body", Some("Intro")),
            " Summarize this text if needed: body\nSachant que c'est une sous-partie de : Intro"
        );
        assert_eq!(summary_prompt("body", None), " Summarize this text if needed: body");
    }

    #[test]
    fn test_input_length_threshold() {
        let system_len = TaskKind::Develop.system_prompt().chars().count();
        let fits = "a".repeat(MAX_INPUT_CHARS - system_len);
        assert!(!check_input_length(&TaskKind::Develop.messages(&fits)));

        let too_long = "é".repeat(MAX_INPUT_CHARS - system_len + 1);
        assert!(check_input_length(&TaskKind::Develop.messages(&too_long)));
    }

    #[test]
    fn test_task_kind_wire_names() {
        let kind: TaskKind = serde_json::from_str("\"develop\"").unwrap();
        assert_eq!(kind, TaskKind::Develop);
        assert_eq!(TaskKind::Summary.to_string(), "summary");
    }
}
