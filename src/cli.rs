//! Command-line interface for batchscribe
//!
//! Provides argument parsing using clap derive macros.

use crate::vocab::Task;
use clap::Parser;
use std::path::PathBuf;

/// Batched speech segmentation and transcription pipeline
#[derive(Parser, Debug)]
#[command(
    name = "batchscribe",
    version,
    about = "Transcribe a WAV file through the batched pipeline"
)]
pub struct Cli {
    /// Mono 16kHz 16-bit WAV file to transcribe
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Language code for transcription. Examples: en, de, es, fr
    #[arg(long, value_name = "LANG", default_value = "en")]
    pub language: String,

    /// Decoding task
    #[arg(long, value_enum, default_value = "transcribe")]
    pub task: TaskArg,

    /// Items per inference batch (default from config)
    #[arg(long, short = 'b', value_name = "N")]
    pub batch_size: Option<usize>,

    /// Whisper model path (overrides config; requires the whisper feature)
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Task flag mirrored for clap's value parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TaskArg {
    /// Transcribe in the source language
    Transcribe,
    /// Translate into English
    Translate,
}

impl From<TaskArg> for Task {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::Transcribe => Task::Transcribe,
            TaskArg::Translate => Task::Translate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_minimal_invocation() {
        let cli = Cli::parse_from(["batchscribe", "audio.wav"]);
        assert_eq!(cli.input, PathBuf::from("audio.wav"));
        assert_eq!(cli.language, "en");
        assert_eq!(cli.task, TaskArg::Transcribe);
        assert!(cli.batch_size.is_none());
        assert!(!cli.pretty);
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "batchscribe",
            "a.wav",
            "--language",
            "de",
            "--task",
            "translate",
            "-b",
            "4",
            "--pretty",
        ]);
        assert_eq!(cli.language, "de");
        assert_eq!(cli.task, TaskArg::Translate);
        assert_eq!(cli.batch_size, Some(4));
        assert!(cli.pretty);
    }

    #[test]
    fn test_task_arg_converts() {
        assert_eq!(Task::from(TaskArg::Transcribe), Task::Transcribe);
        assert_eq!(Task::from(TaskArg::Translate), Task::Translate);
    }
}
