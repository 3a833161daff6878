use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::block_id::IdScheme;
use crate::config::AssemblerConfig;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "answer-stream")]
#[command(version)]
#[command(about = "Stream, replay and inspect agent answers with collapsible code blocks")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fenced-code language rendered as a collapsible block
    #[arg(long, global = true)]
    pub special_language: Option<String>,

    /// How code block ids are numbered
    #[arg(long, value_enum, global = true)]
    pub id_scheme: Option<IdScheme>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Ask the agent a question and render the streamed answer
    Ask {
        question: String,

        /// Agent streaming endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Bearer token for the endpoint (falls back to ANSWER_STREAM_TOKEN)
        #[arg(long)]
        token: Option<String>,

        /// Print text deltas as they arrive instead of only the final render
        #[arg(long)]
        live: bool,

        /// Expand these block ids in the final render
        #[arg(long = "expand", value_name = "BLOCK_ID")]
        expand: Vec<String>,
    },

    /// Rebuild and render a stored transcript (JSON string, JSON array or raw text)
    Replay {
        file: PathBuf,

        /// Message id used for block ids
        #[arg(long, default_value = "history")]
        message_id: String,

        #[arg(long = "expand", value_name = "BLOCK_ID")]
        expand: Vec<String>,
    },

    /// Dump the parsed segments of a stored transcript as JSON
    Segments {
        file: PathBuf,

        /// Parse as an answer that is still streaming
        #[arg(long)]
        streaming: bool,

        #[arg(long, default_value = "history")]
        message_id: String,
    },
}

/// Config file (if any) with command-line overrides applied on top.
pub fn resolve_config(args: &Args) -> Result<AssemblerConfig> {
    let mut config = match &args.config {
        Some(path) => AssemblerConfig::load(path)?,
        None => AssemblerConfig::default(),
    };
    if let Some(lang) = &args.special_language {
        config.special_language = lang.clone();
    }
    if let Some(scheme) = args.id_scheme {
        config.id_scheme = scheme;
    }
    if let Command::Ask { endpoint: Some(endpoint), .. } = &args.command {
        config.endpoint = endpoint.clone();
    }
    config.validate()?;
    Ok(config)
}
