use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use nmz_core::{Memory, MemoryFilter, MemoryKind, OutputFormat, due_reminders};
use nmz_cortex::{
    Briefing, CurationReport, InlinePayload, MemoryDraft, curate, generate_briefing,
    is_image_path, load_attachment, summarize_selection,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::context::{
    AppContext, format_timestamp, headline, parse_when, resolve_by_prefix, short_id,
    truncate_chars,
};

pub(crate) struct AddArgs {
    pub content: String,
    pub kind: Option<MemoryKind>,
    pub tags: Vec<String>,
    pub image: Option<PathBuf>,
    pub remind: Option<String>,
    pub no_analyze: bool,
    pub accept_links: bool,
}

pub(crate) async fn handle_add(args: AddArgs, format: OutputFormat) -> Result<()> {
    let ctx = AppContext::load()?;
    let explicit_reminder = args.remind.as_deref().map(parse_when).transpose()?;
    if args.content.trim().is_empty() && args.image.is_none() {
        bail!("Nothing to capture: give some text or --image.");
    }

    // An unreadable image downgrades the capture to text-only.
    let mut payload = None;
    if let Some(image) = &args.image {
        match load_attachment(image).await {
            Ok(loaded) => payload = Some(loaded),
            Err(error) => {
                if args.content.trim().is_empty() {
                    bail!("Nothing to capture: {error}");
                }
                eprintln!("Warning: {error}; saving without the image.");
            }
        }
    }

    let kind = args.kind.unwrap_or(if payload.is_some() {
        MemoryKind::Image
    } else {
        MemoryKind::Text
    });
    let mut memory = Memory::new(kind, args.content).with_tags(&args.tags);
    memory.reminder_at = explicit_reminder;
    if let (Some(image), Some(loaded)) = (&args.image, &payload) {
        let attachment = ctx
            .store
            .import_attachment(memory.id(), image, &loaded.media_type)?;
        memory.attachment = Some(attachment);
    }

    let mut draft = MemoryDraft::new(memory);
    let mut report = None;
    if !args.no_analyze && ctx.config.assistant.enable_background_analysis {
        let existing = ctx.store.load_all()?;
        let options = ctx.curation_options();
        report = Some(curate(ctx.provider(), &mut draft, payload, &existing, &options).await);
        if explicit_reminder.is_some() {
            draft.memory.reminder_at = explicit_reminder;
        }
    }

    let mut linked = Vec::new();
    if args.accept_links && !draft.suggested_links().is_empty() {
        let suggested = draft.suggested_links().to_vec();
        linked = draft.confirm_links(&suggested)?;
    }
    let pending = draft.suggested_links().to_vec();
    let memory = draft.into_memory();
    ctx.store.create(&memory)?;

    if format == OutputFormat::Json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Added<'a> {
            memory: &'a Memory,
            suggested_links: &'a [String],
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&Added {
                memory: &memory,
                suggested_links: &pending,
            })?
        );
        return Ok(());
    }

    println!(
        "Added memory {} ({}).",
        short_id(memory.id(), 10),
        memory.kind()
    );
    if !memory.tags().is_empty() {
        println!("Tags: {}", memory.tags().join(", "));
    }
    if let Some(at) = memory.reminder_at {
        println!("Reminder: {}", format_timestamp(at));
    }
    if let Some(report) = &report
        && report.reminder_detected
    {
        println!("The assistant detected an upcoming event.");
    }
    if !linked.is_empty() {
        println!("Linked to: {}", linked.join(", "));
    }
    if !pending.is_empty() {
        let all = ctx.store.load_all()?;
        println!("Possibly related:");
        for id in &pending {
            if let Some(other) = all.iter().find(|m| m.id() == id) {
                println!("  {}  {}", short_id(id, 10), headline(&other.content, 60));
            }
        }
        let others = pending
            .iter()
            .map(|id| short_id(id, 10))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "Link them with: nmz link {} {others}",
            short_id(memory.id(), 10)
        );
    }
    Ok(())
}

/// Images are analyzed concurrently (bounded by `jobs`) and saved one at a
/// time in directory order.
pub(crate) async fn handle_import(
    dir: &Path,
    jobs: usize,
    tags: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let ctx = AppContext::load()?;
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && is_image_path(path))
        .collect();
    files.sort();
    if files.is_empty() && format == OutputFormat::Text {
        println!("No images found in {}.", dir.display());
        return Ok(());
    }

    let analyze = ctx.config.assistant.enable_background_analysis;
    let existing = Arc::new(ctx.store.load_all()?);
    let options = Arc::new(ctx.curation_options());
    let limiter = Arc::new(Semaphore::new(jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, path) in files.into_iter().enumerate() {
        let provider = Arc::clone(&ctx.provider);
        let existing = Arc::clone(&existing);
        let options = Arc::clone(&options);
        let limiter = Arc::clone(&limiter);
        let tags = tags.clone();
        tasks.spawn(async move {
            let _permit = limiter.acquire_owned().await.ok();
            let payload: InlinePayload = match load_attachment(&path).await {
                Ok(payload) => payload,
                Err(error) => return (index, path, Err(error)),
            };
            let mut draft = MemoryDraft::new(Memory::new(MemoryKind::Image, "").with_tags(&tags));
            let report = if analyze {
                let report = curate(
                    provider.as_ref(),
                    &mut draft,
                    Some(payload.clone()),
                    &existing,
                    &options,
                )
                .await;
                Some(report)
            } else {
                None
            };
            (index, path, Ok((draft, payload.media_type, report)))
        });
    }

    let mut finished = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        finished.push(joined.context("import task panicked")?);
    }
    finished.sort_by_key(|(index, _, _)| *index);

    let mut imported = Vec::new();
    let mut skipped = Vec::new();
    for (_, path, outcome) in finished {
        let (draft, media_type, report): (MemoryDraft, String, Option<CurationReport>) =
            match outcome {
                Ok(done) => done,
                Err(error) => {
                    if format == OutputFormat::Text {
                        eprintln!("Skipping {}: {error}", path.display());
                    }
                    skipped.push(SkippedImport {
                        path: path.display().to_string(),
                        error: error.to_string(),
                    });
                    continue;
                }
            };
        let mut memory = draft.into_memory();
        memory.attachment = Some(ctx.store.import_attachment(memory.id(), &path, &media_type)?);
        ctx.store.create(&memory)?;
        let suggested_links = report.map(|r| r.suggested_links).unwrap_or_default();

        if format == OutputFormat::Text {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!(
                "{}  {}  {}",
                short_id(memory.id(), 10),
                truncate_chars(&file_name, 30),
                headline(&memory.content, 60)
            );
            if !suggested_links.is_empty() {
                println!("    possibly related: {}", suggested_links.join(", "));
            }
        }
        imported.push(ImportedMemory {
            memory,
            suggested_links,
        });
    }

    if format == OutputFormat::Json {
        let report = ImportReport { imported, skipped };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Imported {} image(s).", imported.len());
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportedMemory {
    memory: Memory,
    suggested_links: Vec<String>,
}

#[derive(Serialize)]
struct SkippedImport {
    path: String,
    error: String,
}

#[derive(Serialize)]
struct ImportReport {
    imported: Vec<ImportedMemory>,
    skipped: Vec<SkippedImport>,
}

pub(crate) struct ListArgs {
    pub kind: Option<MemoryKind>,
    pub tag: Option<String>,
    pub pinned: bool,
    pub query: Option<String>,
    pub json: bool,
}

pub(crate) fn handle_list(args: ListArgs, format: OutputFormat) -> Result<()> {
    let filter = MemoryFilter {
        kind: args.kind,
        pinned_only: args.pinned,
        tag: args.tag,
        query: args.query,
    };
    let store = nmz_store::MemoryStore::default();
    let memories = store.list(&filter)?;

    if args.json || format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&memories)?);
        return Ok(());
    }
    if memories.is_empty() {
        println!("No memories found.");
        return Ok(());
    }

    println!(
        "{:<10}  {:<16}  {:<10}  {:<3}  {:<20}  CONTENT",
        "ID", "CREATED", "KIND", "", "TAGS"
    );
    for memory in memories {
        let tags = if memory.tags().is_empty() {
            "-".to_string()
        } else {
            truncate_chars(&memory.tags().join(","), 20)
        };
        let pin = if memory.is_pinned { "*" } else { "" };
        let bell = if memory.reminder_at.is_some() { "!" } else { "" };
        let flags = format!("{pin}{bell}");
        println!(
            "{:<10}  {:<16}  {:<10}  {:<3}  {:<20}  {}",
            short_id(memory.id(), 10),
            format_timestamp(memory.created_at()),
            memory.kind().as_str(),
            flags,
            tags,
            headline(&memory.content, 60)
        );
    }
    Ok(())
}

pub(crate) fn handle_show(id_prefix: &str, format: OutputFormat) -> Result<()> {
    let memories = nmz_store::MemoryStore::default().load_all()?;
    let memory = resolve_by_prefix(&memories, id_prefix)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(memory)?);
        return Ok(());
    }

    println!("ID: {}", memory.id());
    println!("Kind: {}", memory.kind());
    println!("Created: {}", format_timestamp(memory.created_at()));
    println!("Pinned: {}", if memory.is_pinned { "yes" } else { "no" });
    println!(
        "Reminder: {}",
        memory
            .reminder_at
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string())
    );
    if memory.tags().is_empty() {
        println!("Tags: -");
    } else {
        println!("Tags: {}", memory.tags().join(", "));
    }
    if let Some(attachment) = &memory.attachment {
        println!(
            "Attachment: {} ({})",
            attachment.path.display(),
            attachment.media_type
        );
    }
    if memory.linked_memory_ids().is_empty() {
        println!("Linked: -");
    } else {
        println!("Linked:");
        for id in memory.linked_memory_ids() {
            let preview = memories
                .iter()
                .find(|other| other.id() == id)
                .map(|other| headline(&other.content, 60))
                .unwrap_or_else(|| "(deleted)".to_string());
            println!("  - {}  {preview}", short_id(id, 10));
        }
    }
    println!("Content:");
    println!("{}", memory.content);
    Ok(())
}

pub(crate) fn handle_pin(id_prefix: &str) -> Result<()> {
    let store = nmz_store::MemoryStore::default();
    let id = resolve_id(&store, id_prefix)?;
    let mut pinned = false;
    store.update(&id, |memory| {
        pinned = memory.toggle_pin();
        Ok(())
    })?;
    println!(
        "{} memory {}.",
        if pinned { "Pinned" } else { "Unpinned" },
        short_id(&id, 10)
    );
    Ok(())
}

pub(crate) fn handle_remind(id_prefix: &str, at: Option<String>, clear: bool) -> Result<()> {
    let store = nmz_store::MemoryStore::default();
    let id = resolve_id(&store, id_prefix)?;
    let when = if clear {
        None
    } else {
        match at.as_deref() {
            Some(raw) => Some(parse_when(raw)?),
            None => bail!("Give --at <time> or --clear."),
        }
    };

    store.update(&id, |memory| {
        memory.reminder_at = when;
        Ok(())
    })?;
    match when {
        Some(at) => println!(
            "Reminder for {} set to {}.",
            short_id(&id, 10),
            format_timestamp(at)
        ),
        None => println!("Reminder for {} cleared.", short_id(&id, 10)),
    }
    Ok(())
}

pub(crate) fn handle_link(id_prefix: &str, others: &[String]) -> Result<()> {
    let store = nmz_store::MemoryStore::default();
    let memories = store.load_all()?;
    let id = resolve_by_prefix(&memories, id_prefix)?.id().to_string();
    let targets = others
        .iter()
        .map(|prefix| resolve_by_prefix(&memories, prefix).map(|m| m.id().to_string()))
        .collect::<Result<Vec<_>>>()?;

    let updated = store.update(&id, |memory| {
        memory.link_to(&targets)?;
        Ok(())
    })?;
    if let Some(memory) = updated {
        let count = memory.linked_memory_ids().len();
        println!(
            "Memory {} now links to {count} memor{}.",
            short_id(&id, 10),
            if count == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

pub(crate) fn handle_delete(id_prefix: &str) -> Result<()> {
    let store = nmz_store::MemoryStore::default();
    let id = resolve_id(&store, id_prefix)?;
    if store.delete(&id)? {
        println!("Deleted memory {}.", short_id(&id, 10));
    }
    Ok(())
}

pub(crate) async fn handle_summarize(ids: &[String], format: OutputFormat) -> Result<()> {
    let ctx = AppContext::load()?;
    let memories = ctx.store.load_all()?;
    let selection = ids
        .iter()
        .map(|prefix| resolve_by_prefix(&memories, prefix))
        .collect::<Result<Vec<_>>>()?;

    let summary = summarize_selection(ctx.provider(), &selection, None, ctx.user_name()).await;
    if format == OutputFormat::Json {
        let memory_ids: Vec<&str> = selection.iter().map(|memory| memory.id()).collect();
        let rendered = serde_json::json!({ "memoryIds": memory_ids, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }
    println!("{summary}");
    Ok(())
}

pub(crate) async fn handle_brief(id_prefix: &str, format: OutputFormat) -> Result<()> {
    let ctx = AppContext::load()?;
    let memories = ctx.store.load_all()?;
    let target = resolve_by_prefix(&memories, id_prefix)?;

    let briefing =
        generate_briefing(ctx.provider(), target, &memories, None, ctx.user_name()).await;
    print_briefing(target, &briefing, format)
}

pub(crate) async fn handle_due(clear: bool, format: OutputFormat) -> Result<()> {
    let ctx = AppContext::load()?;
    if !ctx.config.assistant.enable_reminders {
        println!("Reminders are disabled in the configuration.");
        return Ok(());
    }
    let memories = ctx.store.load_all()?;
    let due = due_reminders(&memories, Utc::now());
    if due.is_empty() {
        if format == OutputFormat::Text {
            println!("No reminders due.");
        } else {
            println!("[]");
        }
        return Ok(());
    }

    let mut fired = Vec::new();
    for target in due {
        debug!(id = target.id(), "briefing due reminder");
        let briefing =
            generate_briefing(ctx.provider(), target, &memories, None, ctx.user_name()).await;
        if format == OutputFormat::Text {
            print_briefing(target, &briefing, format)?;
            println!();
        }
        fired.push((target.id().to_string(), briefing));
    }

    if format == OutputFormat::Json {
        let rendered: Vec<BriefingJson<'_>> = fired
            .iter()
            .map(|(id, briefing)| BriefingJson::new(id, briefing))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    }

    if clear {
        for (id, _) in &fired {
            if let Err(error) = ctx.store.update(id, |memory| {
                memory.reminder_at = None;
                Ok(())
            }) {
                warn!(%error, id, "failed to clear reminder");
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BriefingJson<'a> {
    memory_id: &'a str,
    recall_found: bool,
    text: &'a str,
}

impl<'a> BriefingJson<'a> {
    fn new(memory_id: &'a str, briefing: &'a Briefing) -> Self {
        Self {
            memory_id,
            recall_found: briefing.recall_found(),
            text: briefing.body(),
        }
    }
}

fn print_briefing(target: &Memory, briefing: &Briefing, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&BriefingJson::new(target.id(), briefing))?
        );
        return Ok(());
    }

    let when = target
        .reminder_at
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string());
    println!("== {} ({when}) ==", headline(&target.content, 60));
    if briefing.recall_found() {
        println!("[Past experience found]");
    }
    println!("{}", briefing.body());
    Ok(())
}

fn resolve_id(store: &nmz_store::MemoryStore, id_prefix: &str) -> Result<String> {
    let memories = store.load_all()?;
    Ok(resolve_by_prefix(&memories, id_prefix)?.id().to_string())
}
