use anyhow::Result;
use clap::Parser;

mod chat_cmd;
mod cli;
mod config_cmd;
mod context;
mod memory_cmd;

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let format = cli.format;

    match cli.command {
        Commands::Add {
            content,
            kind,
            tags,
            image,
            remind,
            no_analyze,
            accept_links,
        } => {
            memory_cmd::handle_add(
                memory_cmd::AddArgs {
                    content,
                    kind,
                    tags,
                    image,
                    remind,
                    no_analyze,
                    accept_links,
                },
                format,
            )
            .await?;
        }
        Commands::Import { dir, jobs, tags } => {
            memory_cmd::handle_import(&dir, jobs, tags, format).await?;
        }
        Commands::List {
            kind,
            tag,
            pinned,
            query,
            json,
        } => {
            memory_cmd::handle_list(
                memory_cmd::ListArgs {
                    kind,
                    tag,
                    pinned,
                    query,
                    json,
                },
                format,
            )?;
        }
        Commands::Show { id } => memory_cmd::handle_show(&id, format)?,
        Commands::Pin { id } => memory_cmd::handle_pin(&id)?,
        Commands::Remind { id, at, clear } => memory_cmd::handle_remind(&id, at, clear)?,
        Commands::Link { id, others } => memory_cmd::handle_link(&id, &others)?,
        Commands::Delete { id } => memory_cmd::handle_delete(&id)?,
        Commands::Ask {
            question,
            about,
            model,
            tone,
        } => {
            chat_cmd::handle_ask(
                chat_cmd::AskArgs {
                    question,
                    about,
                    model,
                    tone,
                },
                format,
            )
            .await?;
        }
        Commands::History { limit, clear } => chat_cmd::handle_history(limit, clear, format)?,
        Commands::Summarize { ids } => memory_cmd::handle_summarize(&ids, format).await?,
        Commands::Brief { id } => memory_cmd::handle_brief(&id, format).await?,
        Commands::Due { clear } => memory_cmd::handle_due(clear, format).await?,
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => config_cmd::handle_config_show(format)?,
            ConfigCommands::Init => config_cmd::handle_config_init()?,
            ConfigCommands::Path => config_cmd::handle_config_path()?,
        },
    }

    Ok(())
}
