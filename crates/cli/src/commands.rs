use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use richmark_core::{
    Document, DocumentValue, DocumentValueError, Editor, PluginRegistry, Selection,
    validate_document,
};
use richmark_email::{HtmlNode, TextFragmentParser, html_to_inline_nodes};
use richmark_markdown::{Converter, MarkdownOptions};
use serde::Serialize;

use crate::cli::{Cli, Command};

/// Runs one subcommand and returns what should be written to stdout.
pub fn run(cli: &Cli) -> Result<String> {
    let input = || read_input(cli.command.file().map(|p| p.as_path()));
    let options = cli.markdown.options();
    match &cli.command {
        Command::Parse { .. } => parse_markdown(&input()?, options, cli.pretty),
        Command::Render { .. } => render_document(&input()?, options),
        Command::Roundtrip { .. } => roundtrip(&input()?, options),
        Command::Inline { .. } => inline_nodes(&input()?, cli.pretty),
        Command::Commands => list_commands(cli.pretty),
    }
}

pub fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            Ok(input)
        }
    }
}

pub fn parse_markdown(input: &str, options: MarkdownOptions, pretty: bool) -> Result<String> {
    let doc = Converter::new(options)
        .parse(input)
        .context("failed to parse markdown")?;
    to_json(&DocumentValue::from_document(doc), pretty)
}

/// Accepts a versioned envelope or a bare document. The document is
/// normalized before it is written.
pub fn render_document(input: &str, options: MarkdownOptions) -> Result<String> {
    let doc = match DocumentValue::from_json_str(input) {
        Ok(value) => value.into_document(),
        Err(DocumentValueError::Json(_)) => {
            serde_json::from_str::<Document>(input).context("input is not a document")?
        }
        Err(err) => return Err(err).context("unsupported document envelope"),
    };

    let editor = Editor::new(doc, None::<Selection>, PluginRegistry::core());
    validate_document(editor.doc()).context("document is malformed")?;

    tracing::debug!(blocks = editor.doc().children.len(), "rendering document");
    Ok(Converter::new(options).serialize(editor.doc()))
}

pub fn roundtrip(input: &str, options: MarkdownOptions) -> Result<String> {
    let converter = Converter::new(options);
    let doc = converter.parse(input).context("failed to parse markdown")?;
    Ok(converter.serialize(&doc))
}

pub fn inline_nodes(input: &str, pretty: bool) -> Result<String> {
    let nodes: Vec<HtmlNode> =
        serde_json::from_str(input).context("input is not an HTML node list")?;
    to_json(&html_to_inline_nodes(&nodes, &TextFragmentParser), pretty)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandListing {
    id: String,
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args_example: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct RegistryListing {
    commands: Vec<CommandListing>,
    queries: Vec<String>,
}

/// Commands and queries of the rich-text registry, sorted by id.
pub fn list_commands(pretty: bool) -> Result<String> {
    let registry = PluginRegistry::richtext();
    let mut commands: Vec<CommandListing> = registry
        .commands()
        .values()
        .map(|spec| CommandListing {
            id: spec.id.clone(),
            label: spec.label.clone(),
            description: spec.description.clone(),
            keywords: spec.keywords.clone(),
            args_example: spec.args_example.clone(),
        })
        .collect();
    commands.sort_by(|a, b| a.id.cmp(&b.id));
    let mut queries: Vec<String> = registry.queries().keys().cloned().collect();
    queries.sort();
    to_json(&RegistryListing { commands, queries }, pretty)
}

fn to_json(value: &impl Serialize, pretty: bool) -> Result<String> {
    let mut out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    out.push('\n');
    Ok(out)
}
