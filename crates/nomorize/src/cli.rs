use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nmz_core::{AssistantTone, MemoryKind, OutputFormat};

#[derive(Parser)]
#[command(name = "nmz")]
#[command(about = "Nomorize: capture memories, let the assistant curate and recall them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a new memory (analyzed by the assistant unless disabled)
    Add {
        /// Memory text; may be empty when --image is given
        #[arg(default_value = "")]
        content: String,

        /// Kind of capture (defaults to image when --image is given, else text)
        #[arg(long, value_enum)]
        kind: Option<MemoryKind>,

        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Image to attach and analyze
        #[arg(long)]
        image: Option<PathBuf>,

        /// Reminder time (RFC 3339, YYYY-MM-DDTHH:MM in local time, or YYYY-MM-DD)
        #[arg(long)]
        remind: Option<String>,

        /// Skip assistant analysis
        #[arg(long)]
        no_analyze: bool,

        /// Link every suggested related memory without asking
        #[arg(long)]
        accept_links: bool,
    },

    /// Capture every image in a directory, analyzing them concurrently
    Import {
        dir: PathBuf,

        /// Maximum analyses in flight
        #[arg(long, default_value_t = 4)]
        jobs: usize,

        /// Tag added to every imported memory (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// List memories, newest first
    List {
        #[arg(long, value_enum)]
        kind: Option<MemoryKind>,

        #[arg(long)]
        tag: Option<String>,

        /// Only pinned memories
        #[arg(long)]
        pinned: bool,

        /// Case-insensitive text search over content and tags
        #[arg(short, long)]
        query: Option<String>,

        /// Print JSON (same as --format json)
        #[arg(long)]
        json: bool,
    },

    /// Show one memory (ULID or prefix match)
    Show { id: String },

    /// Toggle the pinned flag
    Pin { id: String },

    /// Set or clear a reminder
    Remind {
        id: String,

        /// Reminder time (RFC 3339, YYYY-MM-DDTHH:MM in local time, or YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear", required_unless_present = "clear")]
        at: Option<String>,

        #[arg(long)]
        clear: bool,
    },

    /// Link a memory to other memories
    Link {
        id: String,

        #[arg(required = true)]
        others: Vec<String>,
    },

    /// Delete a memory
    Delete { id: String },

    /// Ask the assistant a question about your memories (or anything else)
    Ask {
        #[arg(required = true)]
        question: Vec<String>,

        /// Focus the question on these memories (repeatable)
        #[arg(long = "about")]
        about: Vec<String>,

        /// Override the configured chat model
        #[arg(long)]
        model: Option<String>,

        /// Override the configured tone
        #[arg(long, value_enum)]
        tone: Option<AssistantTone>,
    },

    /// Show the conversation history
    History {
        /// Only the most recent N messages
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Delete the history instead
        #[arg(long)]
        clear: bool,
    },

    /// Summarize a selection of memories into one narrative
    Summarize {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Briefing for a memory, recalling related past experience
    Brief { id: String },

    /// Briefings for every reminder that has fired
    Due {
        /// Clear the reminders after briefing
        #[arg(long)]
        clear: bool,
    },

    /// Show/manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (API key masked)
    Show,
    /// Write a commented default config file
    Init,
    /// Print the config file path
    Path,
}
