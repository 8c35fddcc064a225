use anyhow::Result;
use nmz_core::{AssistantTone, ChatMessage, OutputFormat, Sender};
use nmz_cortex::{ChatRequest, generate_response};

use crate::context::{AppContext, format_timestamp, resolve_by_prefix, short_id};

pub(crate) struct AskArgs {
    pub question: Vec<String>,
    pub about: Vec<String>,
    pub model: Option<String>,
    pub tone: Option<AssistantTone>,
}

pub(crate) async fn handle_ask(args: AskArgs, format: OutputFormat) -> Result<()> {
    let ctx = AppContext::load()?;
    let memories = ctx.store.load_all()?;
    let scope_ids = args
        .about
        .iter()
        .map(|prefix| resolve_by_prefix(&memories, prefix).map(|m| m.id().to_string()))
        .collect::<Result<Vec<_>>>()?;

    let utterance = args.question.join(" ");
    let request = ChatRequest {
        scope_ids,
        user_name: ctx.user_name().map(str::to_string),
        tone: args.tone.unwrap_or_else(|| ctx.config.assistant.tone()),
        model: ctx.model_choice(args.model),
        ..ChatRequest::new(utterance.clone(), memories)
    };

    let reply = generate_response(ctx.provider(), &request).await;
    ctx.chat.append_message(&ChatMessage::user(utterance))?;
    ctx.chat.append_message(&reply)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }
    println!("{}", reply.text);
    if !reply.related_memory_ids.is_empty() {
        let related = reply
            .related_memory_ids
            .iter()
            .map(|id| short_id(id, 10))
            .collect::<Vec<_>>()
            .join(", ");
        println!();
        println!("Related memories: {related}");
    }
    Ok(())
}

pub(crate) fn handle_history(
    limit: Option<usize>,
    clear: bool,
    format: OutputFormat,
) -> Result<()> {
    let ctx = AppContext::load()?;
    if clear {
        ctx.chat.clear()?;
        println!("Conversation history cleared.");
        return Ok(());
    }

    let messages = ctx.chat.list_messages(limit)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }
    if messages.is_empty() {
        println!("No conversation yet.");
        return Ok(());
    }
    for message in &messages {
        println!("{}", render_message(message));
    }
    Ok(())
}

fn render_message(message: &ChatMessage) -> String {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
    };
    format!(
        "[{}] {who}: {}",
        format_timestamp(message.created_at),
        message.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_message_names_sender() {
        let rendered = render_message(&ChatMessage::user("where did I park?"));
        assert!(rendered.ends_with("] you: where did I park?"));
        let rendered = render_message(&ChatMessage::assistant("Level 3.", Vec::new()));
        assert!(rendered.ends_with("] assistant: Level 3."));
    }
}
