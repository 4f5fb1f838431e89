//! `taskchat` -- command-line client for a task's chat.
//!
//! Prints the conversation, optionally sends one message (with
//! attachments), and with `--watch` keeps printing it as it changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use taskchat_client::{
    init_tracing, ChatConfig, ChatEvent, ChatSession, Collaborators, HttpBackend, SendOutcome,
    SharedDraft,
};
use taskchat_shared::{ConversationId, LocalFile, Participant, SenderKind};
use taskchat_store::TimelineEntry;

#[derive(Debug, Parser)]
#[command(name = "taskchat", version, about = "Chat on a task from the terminal")]
struct Args {
    /// Task whose conversation to open.
    #[arg(long, env = "TASKCHAT_TASK_ID")]
    task: String,

    /// Message text to send.
    #[arg(long)]
    message: Option<String>,

    /// File to attach; repeat for several.
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,

    /// Your participant id on the task.
    #[arg(long, env = "TASKCHAT_USER_ID", default_value = "me")]
    user_id: String,

    /// Name shown on pending messages.
    #[arg(long, env = "TASKCHAT_DISPLAY_NAME", default_value = "Me")]
    display_name: String,

    /// Keep running and print the conversation whenever it changes.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = ChatConfig::from_env();
    info!(?config, "Loaded configuration");

    let conversation = ConversationId::parse(&args.task).context("invalid --task")?;
    let me = Participant {
        participant_id: args.user_id.clone(),
        display_name: args.display_name.clone(),
        kind: config.self_kind,
    };

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let draft = Arc::new(SharedDraft::new());
    let session = ChatSession::new(
        me,
        Collaborators::from_backend(backend),
        draft.clone(),
        config.session_settings(),
    );

    session.open_conversation(conversation);
    session.refresh().await.context("loading messages")?;

    if args.message.is_some() || !args.attachments.is_empty() {
        draft.set_text(args.message.clone().unwrap_or_default());
        for path in &args.attachments {
            draft.add_file(load_file(path).await?);
        }

        if let Some(handle) = session.send_draft() {
            print_timeline(&session.timeline(), config.self_kind);
            match handle.settled().await {
                SendOutcome::Submitted(id) => {
                    info!(message_id = %id, "Message sent");
                    session.refresh().await.context("refreshing after send")?;
                }
                SendOutcome::RolledBack(e) => {
                    eprintln!("send failed: {e}");
                    eprintln!("draft kept: {:?}", draft.text());
                }
                SendOutcome::Abandoned => {}
            }
        }
    }

    print_timeline(&session.timeline(), config.self_kind);

    if args.watch {
        let mut events = session.subscribe();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(ChatEvent::Refreshed { superseded, .. }) => {
                        if superseded > 0 {
                            info!(superseded, "Pending messages confirmed");
                        }
                        print_timeline(&session.timeline(), config.self_kind);
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        info!(skipped, "Event stream lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }
    }

    session.close_conversation();
    Ok(())
}

async fn load_file(path: &Path) -> anyhow::Result<LocalFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    Ok(LocalFile::new(name, content_type_for(path), data))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn print_timeline(timeline: &[TimelineEntry], self_kind: SenderKind) {
    println!("----");
    for entry in timeline {
        let (who, attachments) = match entry {
            TimelineEntry::Confirmed(m) => (m.sender.display_name.as_str(), m.attachment_urls.len()),
            TimelineEntry::Pending(s) => (s.sender.display_name.as_str(), s.attachment_previews.len()),
        };
        let marker = if entry.is_pending() { " (sending)" } else { "" };
        let align = if entry.is_own(self_kind) { ">" } else { "<" };
        let clip = if attachments > 0 {
            format!(" [{attachments} attachment(s)]")
        } else {
            String::new()
        };
        println!(
            "{align} {} {who}: {}{clip}{marker}",
            entry.sort_key().format("%H:%M:%S"),
            entry.text()
        );
    }
}
