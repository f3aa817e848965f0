//! CLI interface for Lectern
//!
//! This module provides the command-line interface using clap's derive API.
//! The CLI is the local stand-in for the excluded HTTP layer: every command
//! goes through the gateway dispatcher exactly as a remote caller would.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lectern study-assistant engine
///
/// Upload lecture material, chat about it, and request AI-generated
/// summaries and concept extractions.
#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a lecture text file; prints the new lecture key
    Ingest {
        /// Path to the extracted lecture text
        file: PathBuf,
    },

    /// Ask a question about a lecture
    Chat {
        /// Lecture key returned by ingest
        lecture_key: String,

        /// The question to ask
        message: String,
    },

    /// Produce a Markdown summary of a lecture
    Summarize {
        /// Lecture key returned by ingest
        lecture_key: String,
    },

    /// Extract key concepts from a lecture
    Extract {
        /// Lecture key returned by ingest
        lecture_key: String,
    },

    /// Print the stored raw text of a lecture
    Raw {
        /// Lecture key returned by ingest
        lecture_key: String,
    },

    /// Show the chat history of a lecture
    History {
        /// Lecture key returned by ingest
        lecture_key: String,
    },

    /// Inspect or reset rate-limit windows
    Limits {
        #[command(subcommand)]
        action: LimitsAction,
    },
}

/// Rate-limit administration
#[derive(Subcommand, Debug)]
pub enum LimitsAction {
    /// Show the current window for an identifier and endpoint
    Show {
        /// Namespaced identifier, e.g. user:local or ip:10.0.0.1
        identifier: String,

        /// Endpoint name (upload, chat, summarize, extract)
        endpoint: String,
    },

    /// Delete stored windows for an identifier
    Reset {
        /// Namespaced identifier, e.g. user:local or ip:10.0.0.1
        identifier: String,

        /// Endpoint to reset; omit to reset all endpoints
        endpoint: Option<String>,
    },
}
