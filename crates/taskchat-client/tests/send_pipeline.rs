mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;

use taskchat_client::{
    ChatError, ChatEvent, ChatSendPipeline, Collaborators, DraftHandle, Liveness, SendOutcome,
    SendStage, SharedDraft,
};
use taskchat_shared::MessageId;
use taskchat_store::{ReconcileMode, RemovalReason, SpeculativeMessageStore, StoreEvent};

use support::{conversation, me, pdf, png, quiet_settings, session, session_with, FakeBackend};

#[tokio::test]
async fn blank_send_changes_nothing() {
    let backend = FakeBackend::new();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-1"));
    let mut store_events = session.subscribe_store().unwrap();

    assert!(session.send("", vec![]).is_none());
    assert!(session.send("   \n", vec![]).is_none());

    draft.set_text("  ");
    assert!(session.send_draft().is_none());
    assert_eq!(draft.text(), "  ");

    assert!(session.speculative_messages().is_empty());
    assert!(matches!(store_events.try_recv(), Err(TryRecvError::Empty)));
    assert!(backend.submits().is_empty());
    assert!(backend.uploads().is_empty());
}

#[tokio::test]
async fn send_without_open_conversation_is_ignored() {
    let backend = FakeBackend::new();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);

    draft.set_text("hello?");
    assert!(session.send_draft().is_none());
    assert_eq!(draft.text(), "hello?");
    assert!(session.timeline().is_empty());
}

#[tokio::test]
async fn draft_survives_send_on_closed_conversation() {
    let backend = FakeBackend::new();
    let draft = Arc::new(SharedDraft::new());
    let store = SpeculativeMessageStore::new(
        conversation("task-1"),
        ReconcileMode::default().build(me().kind, Duration::from_secs(60)),
    );
    let liveness = Liveness::new();
    let pipeline = ChatSendPipeline::new(
        me(),
        store.clone(),
        Collaborators::from_backend(backend.clone()),
        draft.clone(),
        liveness.clone(),
    );

    draft.set_text("quote attached");
    draft.add_file(pdf("quote.pdf"));
    let original = draft.get_draft();

    // Closed after the pipeline was handed out, before the send starts.
    liveness.deactivate();
    assert!(pipeline.send_draft().is_none());

    assert_eq!(draft.get_draft(), original);
    assert!(store.is_empty());
    assert!(backend.uploads().is_empty());
}

#[tokio::test]
async fn pending_entry_is_visible_before_anything_resolves() {
    let backend = FakeBackend::holding_uploads();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-1"));

    let handle = session
        .send("  Here is the floor plan  ", vec![png("plan.png"), pdf("quote.pdf")])
        .unwrap();

    let pending = session.speculative_messages();
    assert_eq!(pending.len(), 1);
    let entry = &pending[0];
    assert_eq!(entry.local_id, handle.local_id());
    assert!(entry.pending);
    assert_eq!(entry.text, "Here is the floor plan");
    assert_eq!(entry.attachment_previews.len(), 2);
    assert_eq!(entry.attachment_previews[0].file_name, "plan.png");
    assert!(entry.attachment_previews[0]
        .preview_url
        .as_deref()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert!(entry.attachment_previews[1].preview_url.is_none());

    let timeline = session.timeline();
    assert_eq!(timeline.len(), 1);
    assert!(timeline[0].is_pending());

    backend.release_uploads(1);
    assert!(handle.settled().await.is_submitted());

    let submits = backend.submits();
    assert_eq!(submits[0].text, "Here is the floor plan");
    assert_eq!(
        submits[0].attachment_urls,
        vec!["https://files.test/plan.png", "https://files.test/quote.pdf"]
    );
}

#[tokio::test]
async fn upload_failure_rolls_back_and_restores_draft() {
    let backend = FakeBackend::new();
    backend.fail_uploads();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-1"));
    let mut events = session.subscribe();
    let mut store_events = session.subscribe_store().unwrap();

    draft.set_text("see attached");
    draft.add_file(png("photo.png"));
    let original = draft.get_draft();

    let handle = session.send_draft().unwrap();
    let local_id = handle.local_id();
    assert!(draft.get_draft().is_empty());
    assert_eq!(session.speculative_messages().len(), 1);

    match handle.settled().await {
        SendOutcome::RolledBack(ChatError::UploadFailed(_)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert!(session.speculative_messages().is_empty());
    assert_eq!(draft.get_draft(), original);
    assert!(backend.submits().is_empty());

    assert_eq!(store_events.recv().await.unwrap(), StoreEvent::Inserted { local_id });
    assert_eq!(
        store_events.recv().await.unwrap(),
        StoreEvent::Removed {
            local_id,
            reason: RemovalReason::Failed
        }
    );
    match events.recv().await.unwrap() {
        ChatEvent::SendFailed { local_id: failed, .. } => assert_eq!(failed, local_id),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_rolls_back_after_successful_upload() {
    let backend = FakeBackend::new();
    backend.fail_all_submits();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-1"));

    draft.set_text("invoice attached");
    draft.add_file(pdf("invoice.pdf"));
    let original = draft.get_draft();

    let handle = session.send_draft().unwrap();
    match handle.settled().await {
        SendOutcome::RolledBack(ChatError::TransportFailed(_)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(backend.uploads().len(), 1);
    assert_eq!(backend.submits().len(), 1);
    assert!(session.speculative_messages().is_empty());
    assert_eq!(draft.get_draft(), original);
}

#[tokio::test]
async fn restored_draft_keeps_text_typed_meanwhile() {
    let backend = FakeBackend::holding_submits();
    backend.fail_all_submits();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-1"));

    draft.set_text("first thought");
    let handle = session.send_draft().unwrap();
    draft.set_text("second thought");

    backend.release_submits(1);
    assert!(matches!(handle.settled().await, SendOutcome::RolledBack(_)));

    let text = draft.text();
    assert!(text.starts_with("first thought"));
    assert!(text.ends_with("second thought"));
}

#[tokio::test]
async fn short_upload_batch_is_a_failure() {
    let backend = FakeBackend::new();
    backend.drop_one_url();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-1"));

    let handle = session
        .send("two pictures", vec![png("a.png"), png("b.png")])
        .unwrap();
    match handle.settled().await {
        SendOutcome::RolledBack(ChatError::UploadCountMismatch { expected: 2, got: 1 }) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(backend.submits().is_empty());
    assert_eq!(draft.files().len(), 2);
}

#[tokio::test]
async fn response_without_server_id_is_a_failure() {
    let backend = FakeBackend::new();
    backend.answer_with_blank_ids();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-1"));

    let handle = session.send("hello", vec![]).unwrap();
    assert!(matches!(
        handle.settled().await,
        SendOutcome::RolledBack(ChatError::MissingServerId)
    ));
    assert!(session.speculative_messages().is_empty());
    assert_eq!(draft.text(), "hello");
}

#[tokio::test(start_paused = true)]
async fn stalled_submit_times_out_and_rolls_back() {
    let backend = FakeBackend::holding_submits();
    let draft = Arc::new(SharedDraft::new());
    let mut settings = quiet_settings();
    settings.timeouts.submit = Duration::from_secs(2);
    let session = session_with(&backend, &draft, settings);
    session.open_conversation(conversation("task-1"));

    let handle = session.send("anyone there?", vec![]).unwrap();
    match handle.settled().await {
        SendOutcome::RolledBack(ChatError::Timeout { stage, after }) => {
            assert_eq!(stage, SendStage::Submit);
            assert_eq!(after, Duration::from_secs(2));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(session.speculative_messages().is_empty());
    assert_eq!(draft.text(), "anyone there?");
}

#[tokio::test]
async fn concurrent_sends_settle_independently() {
    let backend = FakeBackend::holding_submits();
    backend.fail_submit_of("second");
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-1"));

    let first = session.send("first", vec![]).unwrap();
    let second = session.send("second", vec![]).unwrap();
    assert_ne!(first.local_id(), second.local_id());
    assert_eq!(session.speculative_messages().len(), 2);

    backend.release_submits(2);
    let (first_outcome, second_outcome) = futures::join!(first.settled(), second.settled());

    assert!(first_outcome.is_submitted());
    assert!(matches!(second_outcome, SendOutcome::RolledBack(_)));
    assert_eq!(draft.text(), "second");

    session.refresh().await.unwrap();
    let snapshot = session.snapshot().unwrap();
    assert!(snapshot.speculative.is_empty());
    assert_eq!(snapshot.authoritative.len(), 1);
    assert_eq!(snapshot.authoritative[0].text, "first");
}

#[tokio::test]
async fn switching_conversation_abandons_in_flight_send() {
    let backend = FakeBackend::holding_submits();
    backend.fail_all_submits();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-a"));

    let handle = session.send("for task a", vec![]).unwrap();
    session.open_conversation(conversation("task-b"));

    assert_eq!(session.active_conversation(), Some(conversation("task-b")));
    assert!(session.speculative_messages().is_empty());

    backend.release_submits(1);
    assert!(matches!(handle.settled().await, SendOutcome::Abandoned));

    assert!(draft.get_draft().is_empty());
    assert!(session.speculative_messages().is_empty());
    assert!(session.timeline().is_empty());
}

#[tokio::test]
async fn closing_before_upload_finishes_skips_submit() {
    let backend = FakeBackend::holding_uploads();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-a"));

    let handle = session.send("photo", vec![png("p.png")]).unwrap();
    session.close_conversation();
    backend.release_uploads(1);

    assert!(matches!(handle.settled().await, SendOutcome::Abandoned));
    assert!(backend.submits().is_empty());
    assert!(session.active_conversation().is_none());
}

#[tokio::test]
async fn reopening_same_conversation_keeps_pending_entries() {
    let backend = FakeBackend::holding_submits();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    session.open_conversation(conversation("task-a"));

    let handle = session.send("still here", vec![]).unwrap();
    session.open_conversation(conversation("task-a"));
    assert_eq!(session.speculative_messages().len(), 1);

    backend.release_submits(1);
    assert!(handle.settled().await.is_submitted());
}

#[tokio::test]
async fn delete_passes_through_and_refreshes() {
    let backend = FakeBackend::new();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);
    let task = conversation("task-1");
    let keep = backend.push_remote(&task, support::tasker(), "on my way");
    let gone = backend.push_remote(&task, support::tasker(), "typo");
    session.open_conversation(task.clone());
    session.refresh().await.unwrap();
    let mut events = session.subscribe();

    assert!(session.delete_message(&gone).await.unwrap());
    match events.recv().await.unwrap() {
        ChatEvent::MessageDeleted { message_id, conversation_id } => {
            assert_eq!(message_id, gone);
            assert_eq!(conversation_id, task);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let snapshot = session.snapshot().unwrap();
    assert_eq!(snapshot.authoritative.len(), 1);
    assert_eq!(snapshot.authoritative[0].id, keep);

    assert!(!session.delete_message(&MessageId::new("m404")).await.unwrap());
}

#[tokio::test]
async fn delete_without_open_conversation_fails() {
    let backend = FakeBackend::new();
    let draft = Arc::new(SharedDraft::new());
    let session = session(&backend, &draft);

    assert!(matches!(
        session.delete_message(&MessageId::new("m1")).await,
        Err(ChatError::NoActiveConversation)
    ));
}
