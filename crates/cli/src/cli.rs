use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use richmark_markdown::MarkdownOptions;

#[derive(Debug, Parser)]
#[command(name = "richmark", version, about = "Convert between markdown, documents and email inline nodes")]
pub struct Cli {
    #[command(flatten)]
    pub markdown: MarkdownArgs,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct MarkdownArgs {
    /// Disable the GFM extensions (strikethrough, tables, task lists).
    #[arg(long, global = true, env = "RICHMARK_NO_GFM")]
    pub no_gfm: bool,

    /// Deepest container nesting the parser accepts.
    #[arg(long, global = true, env = "RICHMARK_MAX_DEPTH", default_value_t = 128)]
    pub max_depth: usize,
}

impl MarkdownArgs {
    pub fn options(&self) -> MarkdownOptions {
        MarkdownOptions {
            gfm: !self.no_gfm,
            max_depth: self.max_depth,
        }
    }
}

/// Input is read from FILE, or from stdin when FILE is `-` or missing.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Markdown to document JSON.
    Parse { file: Option<PathBuf> },
    /// Document JSON to markdown.
    Render { file: Option<PathBuf> },
    /// Markdown through the document model and back.
    Roundtrip { file: Option<PathBuf> },
    /// HTML node-list JSON to email inline-node JSON.
    Inline { file: Option<PathBuf> },
    /// List the editor commands and queries of the rich-text registry.
    Commands,
}

impl Command {
    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            Command::Parse { file }
            | Command::Render { file }
            | Command::Roundtrip { file }
            | Command::Inline { file } => file.as_ref(),
            Command::Commands => None,
        }
    }
}
