//! Prompt vocabulary: the token ids the batcher needs to build prompts.
//!
//! The tokenizer itself lives outside this crate; the collator only needs a
//! handful of special ids plus the start-of-transcript control sequence for
//! a task/language pair. [`StaticVocabulary`] provides the standard
//! multilingual Whisper ids; anything else can implement the trait.

use crate::error::{BatchscribeError, Result};
use serde::{Deserialize, Serialize};

/// Token identifier in the decoder's vocabulary.
pub type TokenId = u32;

/// Decoding task requested for one transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Transcribe in the source language.
    #[default]
    Transcribe,
    /// Translate into English.
    Translate,
}

/// Special tokens and control sequences used for prompt collation.
pub trait PromptVocabulary: Send + Sync {
    /// Token marking the start of previous-context tokens.
    fn previous_context_token(&self) -> TokenId;

    /// Filler token used to left-pad short contexts.
    fn silent_token(&self) -> TokenId;

    /// Token suppressing timestamp prediction.
    fn no_timestamps_token(&self) -> TokenId;

    /// First timestamp token, enabling timestamp prediction.
    fn timestamp_begin_token(&self) -> TokenId;

    /// Start-of-transcript control sequence for a task and language.
    fn control_tokens(&self, task: Task, language: &str) -> Result<Vec<TokenId>>;
}

/// Language codes in multilingual Whisper vocabulary order.
///
/// The language token for `LANGUAGES[i]` is `50259 + i`.
const LANGUAGES: &[&str] = &[
    "en", "zh", "de", "es", "ru", "ko", "fr", "ja", "pt", "tr", "pl", "ca", "nl", "ar", "sv", "it",
    "id", "hi", "fi", "vi", "he", "uk", "el", "ms", "cs", "ro", "da", "hu", "ta", "no", "th", "ur",
    "hr", "bg", "lt", "la", "mi", "ml", "cy", "sk", "te", "fa", "lv", "bn", "sr", "az", "sl", "kn",
    "et", "mk", "br", "eu", "is", "hy", "ne", "mn", "bs", "kk", "sq", "sw", "gl", "mr", "pa", "si",
    "km", "sn", "yo", "so", "af", "oc", "ka", "be", "tg", "sd", "gu", "am", "yi", "lo", "uz", "fo",
    "ht", "ps", "tk", "nn", "mt", "sa", "lb", "my", "bo", "tl", "mg", "as", "tt", "haw", "ln",
    "ha", "ba", "jw", "su",
];

const SOT: TokenId = 50258;
const LANGUAGE_BASE: TokenId = 50259;
const TASK_TRANSLATE: TokenId = 50358;
const TASK_TRANSCRIBE: TokenId = 50359;
const SOT_PREV: TokenId = 50361;
const NO_TIMESTAMPS: TokenId = 50363;
const TIMESTAMP_BEGIN: TokenId = 50364;
/// BPE id of a bare space, used as prompt filler.
const SILENT: TokenId = 220;

/// Multilingual Whisper special-token table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticVocabulary;

impl StaticVocabulary {
    /// Returns the language token for a code, if the code is known.
    pub fn language_token(code: &str) -> Option<TokenId> {
        LANGUAGES
            .iter()
            .position(|&lang| lang == code)
            .map(|idx| LANGUAGE_BASE + idx as TokenId)
    }
}

impl PromptVocabulary for StaticVocabulary {
    fn previous_context_token(&self) -> TokenId {
        SOT_PREV
    }

    fn silent_token(&self) -> TokenId {
        SILENT
    }

    fn no_timestamps_token(&self) -> TokenId {
        NO_TIMESTAMPS
    }

    fn timestamp_begin_token(&self) -> TokenId {
        TIMESTAMP_BEGIN
    }

    fn control_tokens(&self, task: Task, language: &str) -> Result<Vec<TokenId>> {
        let lang_token =
            Self::language_token(language).ok_or_else(|| BatchscribeError::UnknownLanguage {
                code: language.to_string(),
            })?;
        let task_token = match task {
            Task::Transcribe => TASK_TRANSCRIBE,
            Task::Translate => TASK_TRANSLATE,
        };
        Ok(vec![SOT, lang_token, task_token])
    }
}
