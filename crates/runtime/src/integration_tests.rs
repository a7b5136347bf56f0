//! Integration tests for the full event-sourced pipeline.
//!
//! Command → MessageDispatcher → EventStore → SubscriptionRegistry → read models.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use wordtrail_core::{AggregateId, CommandId};
use wordtrail_domain::project::{
    CreateProject, Project, ProjectCommand, ProjectId, UpdateWordCount, WordCountUpdateId,
};
use wordtrail_domain::writer::{
    RegisterWriter, UpdateWriter, Writer, WriterCommand, WriterId,
};
use wordtrail_events::{EventEnvelope, EventSubscriber, SubscriberError};
use wordtrail_readmodels::{ProjectProgress, WriterDirectory};

use crate::dispatcher::{DispatchError, MessageDispatcher, RegistrationError};
use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};

fn dispatcher() -> MessageDispatcher<InMemoryEventStore> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut dispatcher = MessageDispatcher::new(InMemoryEventStore::new());
    dispatcher.register_aggregate::<Writer>().unwrap();
    dispatcher.register_aggregate::<Project>().unwrap();
    dispatcher
}

/// Collects every delivered envelope, in delivery order.
struct RecordingSubscriber {
    types: &'static [&'static str],
    seen: Mutex<Vec<(AggregateId, u64, String)>>,
}

impl RecordingSubscriber {
    fn new(types: &'static [&'static str]) -> Arc<Self> {
        Arc::new(Self {
            types,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(AggregateId, u64, String)> {
        self.seen.lock().unwrap().clone()
    }
}

impl EventSubscriber for RecordingSubscriber {
    fn name(&self) -> &str {
        "test.recording"
    }

    fn subscribed_to(&self) -> &'static [&'static str] {
        self.types
    }

    fn on_event(&self, event: &EventEnvelope<JsonValue>) -> Result<(), SubscriberError> {
        self.seen.lock().unwrap().push((
            event.aggregate_id(),
            event.sequence_number(),
            event.event_type().to_string(),
        ));
        Ok(())
    }
}

/// Always fails; used to prove failure isolation.
struct FailingSubscriber;

impl EventSubscriber for FailingSubscriber {
    fn name(&self) -> &str {
        "test.failing"
    }

    fn subscribed_to(&self) -> &'static [&'static str] {
        &["project.created"]
    }

    fn on_event(&self, _event: &EventEnvelope<JsonValue>) -> Result<(), SubscriberError> {
        Err(SubscriberError::new("deliberate failure"))
    }
}

fn register_writer_cmd(writer_id: WriterId) -> WriterCommand {
    WriterCommand::RegisterWriter(RegisterWriter {
        command_id: CommandId::new(),
        writer_id,
        user_name: "ink_slinger".to_string(),
        name: "Ada".to_string(),
    })
}

fn update_writer_cmd(writer_id: WriterId, bio: &str) -> WriterCommand {
    WriterCommand::UpdateWriter(UpdateWriter {
        command_id: CommandId::new(),
        writer_id,
        name: "Ada".to_string(),
        bio: bio.to_string(),
    })
}

fn create_project_cmd(project_id: ProjectId) -> ProjectCommand {
    ProjectCommand::CreateProject(CreateProject {
        command_id: CommandId::new(),
        project_id,
        name: "Novel".to_string(),
        start_date: Utc::now(),
        target_completion_date: Utc::now(),
        target_word_count: 120_000,
    })
}

fn update_word_count_cmd(project_id: ProjectId, total: u32) -> ProjectCommand {
    ProjectCommand::UpdateWordCount(UpdateWordCount {
        command_id: CommandId::new(),
        project_id,
        word_count_update_id: WordCountUpdateId::new(),
        new_total_word_count: total,
    })
}

#[test]
fn creation_for_a_fresh_identity_commits_sequence_zero() {
    let dispatcher = dispatcher();
    let project_id = ProjectId::new(AggregateId::new());

    let committed = dispatcher.send(create_project_cmd(project_id)).unwrap();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].sequence_number, 0);
    assert_eq!(committed[0].event_type, "project.created");

    let history = dispatcher.store().load("project", project_id.0).unwrap();
    assert_eq!(history, committed);
}

#[test]
fn rejected_command_persists_nothing() {
    // Create, advance the word count, then attempt a regressing update:
    // the failure must leave exactly the two prior events in the store.
    let dispatcher = dispatcher();
    let project_id = ProjectId::new(AggregateId::new());

    dispatcher.send(create_project_cmd(project_id)).unwrap();
    dispatcher
        .send(update_word_count_cmd(project_id, 50_000))
        .unwrap();

    let err = dispatcher
        .send(update_word_count_cmd(project_id, 40_000))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));

    let history = dispatcher.store().load("project", project_id.0).unwrap();
    let sequence_numbers: Vec<_> = history.iter().map(|e| e.sequence_number).collect();
    assert_eq!(sequence_numbers, vec![0, 1]);

    // Same history, same command, same failure.
    let err = dispatcher
        .send(update_word_count_cmd(project_id, 40_000))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
}

#[test]
fn subscribers_see_one_stream_in_order_without_gaps_or_repeats() {
    let mut dispatcher = dispatcher();
    let recording = RecordingSubscriber::new(&[
        "project.created",
        "project.word_count_updated",
        "project.word_count_update_deleted",
    ]);
    dispatcher.subscribe(recording.clone());

    let project_id = ProjectId::new(AggregateId::new());
    dispatcher.send(create_project_cmd(project_id)).unwrap();
    for total in [10_000, 20_000, 30_000] {
        dispatcher
            .send(update_word_count_cmd(project_id, total))
            .unwrap();
    }

    let seen = recording.seen();
    assert_eq!(seen.len(), 4);
    for (idx, (aggregate_id, sequence_number, _)) in seen.iter().enumerate() {
        assert_eq!(*aggregate_id, project_id.0);
        assert_eq!(*sequence_number, idx as u64);
    }
}

#[test]
fn stale_writer_conflicts_and_reload_retry_converges() {
    let dispatcher = dispatcher();
    let writer_id = WriterId::new(AggregateId::new());

    dispatcher.send(register_writer_cmd(writer_id)).unwrap();

    // Two writers load the same history (1 event); the dispatcher commits
    // for one of them first.
    dispatcher
        .send(update_writer_cmd(writer_id, "first bio"))
        .unwrap();

    // The other still believes the count is 1; its append must lose whole.
    let stale = UncommittedEvent {
        event_type: "writer.updated".to_string(),
        payload: json!({ "stale": true }),
    };
    let err = dispatcher
        .store()
        .append("writer", writer_id.0, 1, vec![stale])
        .unwrap_err();
    assert!(matches!(err, EventStoreError::Conflict(_)));

    // Conflict resolution is reload-and-rerun, which `send` does implicitly.
    let committed = dispatcher
        .send(update_writer_cmd(writer_id, "second bio"))
        .unwrap();
    assert_eq!(committed[0].sequence_number, 2);

    let history = dispatcher.store().load("writer", writer_id.0).unwrap();
    let sequence_numbers: Vec<_> = history.iter().map(|e| e.sequence_number).collect();
    assert_eq!(sequence_numbers, vec![0, 1, 2]);
}

#[test]
fn registering_two_aggregates_for_one_command_type_fails() {
    let mut dispatcher = dispatcher();

    let err = dispatcher.register_aggregate::<Writer>().unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateRoute { .. }));
}

#[test]
fn unrouted_command_is_a_configuration_error() {
    let mut dispatcher = MessageDispatcher::new(InMemoryEventStore::new());
    dispatcher.register_aggregate::<Writer>().unwrap();

    let err = dispatcher
        .send(create_project_cmd(ProjectId::new(AggregateId::new())))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Unrouted(_)));
}

#[test]
fn failing_subscriber_neither_blocks_others_nor_the_write() {
    let mut dispatcher = dispatcher();
    let recording = RecordingSubscriber::new(&["project.created"]);
    dispatcher.subscribe(Arc::new(FailingSubscriber));
    dispatcher.subscribe(recording.clone());

    let project_id = ProjectId::new(AggregateId::new());
    let committed = dispatcher.send(create_project_cmd(project_id)).unwrap();
    assert_eq!(committed.len(), 1);

    assert_eq!(recording.seen().len(), 1);
    assert_eq!(
        dispatcher.store().load("project", project_id.0).unwrap().len(),
        1
    );
}

/// A store whose transport is down.
struct UnavailableStore;

impl EventStore for UnavailableStore {
    fn load(
        &self,
        _aggregate_type: &str,
        _aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(EventStoreError::Unavailable("connection refused".to_string()))
    }

    fn append(
        &self,
        _aggregate_type: &str,
        _aggregate_id: AggregateId,
        _expected_count: u64,
        _new_events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(EventStoreError::Unavailable("connection refused".to_string()))
    }
}

#[test]
fn store_unavailability_is_surfaced_as_retryable() {
    let mut dispatcher = MessageDispatcher::new(UnavailableStore);
    dispatcher.register_aggregate::<Writer>().unwrap();

    let err = dispatcher
        .send(register_writer_cmd(WriterId::new(AggregateId::new())))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Unavailable(_)));
}

/// A store that hands back corrupt streams, for integrity checks.
struct CannedStore {
    events: Vec<StoredEvent>,
}

impl EventStore for CannedStore {
    fn load(
        &self,
        _aggregate_type: &str,
        _aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Ok(self.events.clone())
    }

    fn append(
        &self,
        _aggregate_type: &str,
        _aggregate_id: AggregateId,
        _expected_count: u64,
        _new_events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        unreachable!("integrity failures must abort before any append")
    }
}

fn canned(aggregate_id: AggregateId, sequence_number: u64, payload: JsonValue) -> StoredEvent {
    StoredEvent {
        aggregate_id,
        aggregate_type: "writer".to_string(),
        sequence_number,
        event_type: "writer.registered".to_string(),
        payload,
        recorded_at: Utc::now(),
    }
}

#[test]
fn sequence_gap_in_loaded_stream_is_fatal() {
    let writer_id = WriterId::new(AggregateId::new());
    let registered = json!({
        "WriterRegistered": {
            "command_id": CommandId::new(),
            "writer_id": writer_id,
            "user_name": "ink_slinger",
            "name": "Ada"
        }
    });

    let store = CannedStore {
        // Sequence 1 is missing.
        events: vec![
            canned(writer_id.0, 0, registered.clone()),
            canned(writer_id.0, 2, registered),
        ],
    };
    let mut dispatcher = MessageDispatcher::new(store);
    dispatcher.register_aggregate::<Writer>().unwrap();

    let err = dispatcher
        .send(update_writer_cmd(writer_id, "bio"))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Integrity(_)));
}

#[test]
fn unknown_event_type_during_replay_is_fatal() {
    let writer_id = WriterId::new(AggregateId::new());
    let store = CannedStore {
        events: vec![canned(writer_id.0, 0, json!({ "NotAWriterEvent": {} }))],
    };
    let mut dispatcher = MessageDispatcher::new(store);
    dispatcher.register_aggregate::<Writer>().unwrap();

    let err = dispatcher
        .send(update_writer_cmd(writer_id, "bio"))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Integrity(_)));
}

#[test]
fn writer_directory_tracks_current_details_by_user_name() {
    let mut dispatcher = dispatcher();
    let directory = Arc::new(WriterDirectory::new());
    dispatcher.subscribe(directory.clone());

    let writer_id = WriterId::new(AggregateId::new());
    dispatcher.send(register_writer_cmd(writer_id)).unwrap();
    dispatcher
        .send(update_writer_cmd(writer_id, "Writes at night."))
        .unwrap();

    let details = directory.writer_details("ink_slinger").unwrap();
    assert_eq!(details.writer_id, writer_id);
    assert_eq!(details.bio, "Writes at night.");
}

#[test]
fn independent_aggregates_keep_independent_streams() {
    let mut dispatcher = dispatcher();
    let progress = Arc::new(ProjectProgress::new());
    dispatcher.subscribe(progress.clone());

    let writer_id = WriterId::new(AggregateId::new());
    let project_id = ProjectId::new(AggregateId::new());

    dispatcher.send(register_writer_cmd(writer_id)).unwrap();
    dispatcher.send(create_project_cmd(project_id)).unwrap();
    dispatcher
        .send(update_word_count_cmd(project_id, 25_000))
        .unwrap();

    // Each stream numbers from zero on its own.
    let writer_history = dispatcher.store().load("writer", writer_id.0).unwrap();
    let project_history = dispatcher.store().load("project", project_id.0).unwrap();
    assert_eq!(writer_history.len(), 1);
    assert_eq!(project_history.len(), 2);
    assert_eq!(writer_history[0].sequence_number, 0);
    assert_eq!(project_history[0].sequence_number, 0);
    assert_eq!(project_history[1].sequence_number, 1);

    let status = progress.status(project_id).unwrap();
    assert_eq!(status.current_word_count, 25_000);
}

#[test]
fn concurrent_sends_to_one_identity_admit_exactly_one_winner() {
    let dispatcher = Arc::new(dispatcher());
    let writer_id = WriterId::new(AggregateId::new());

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            std::thread::spawn(move || dispatcher.send(register_writer_cmd(writer_id)))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Both raced to create the same identity: one commits sequence 0, the
    // other loses, either at the store (concurrency) or, if it reloaded
    // after the winner committed, in the domain (already registered).
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(DispatchError::Concurrency(_)) | Err(DispatchError::Conflict(_))
    )));
    assert_eq!(
        dispatcher.store().load("writer", writer_id.0).unwrap().len(),
        1
    );
}
