use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use wordtrail_core::AggregateId;
use wordtrail_domain::project::{ProjectEvent, ProjectId, WordCountEntry};
use wordtrail_events::{EventEnvelope, EventSubscriber, SubscriberError};

/// Progress snapshot for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStatus {
    pub project_id: ProjectId,
    pub name: String,
    pub target_word_count: u32,
    pub current_word_count: u32,
    pub updates: Vec<WordCountEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    projects: HashMap<ProjectId, ProjectStatus>,
    cursors: HashMap<AggregateId, u64>,
}

/// Project progress read model.
///
/// Tracks name, target and current word count per project from the
/// project lifecycle and word-count events.
#[derive(Debug, Default)]
pub struct ProjectProgress {
    inner: RwLock<Inner>,
}

impl ProjectProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, project_id: ProjectId) -> Option<ProjectStatus> {
        let inner = self.inner.read().ok()?;
        inner.projects.get(&project_id).cloned()
    }
}

impl EventSubscriber for ProjectProgress {
    fn name(&self) -> &str {
        "readmodels.project_progress"
    }

    fn subscribed_to(&self) -> &'static [&'static str] {
        &[
            "project.created",
            "project.updated",
            "project.word_count_updated",
            "project.word_count_update_deleted",
        ]
    }

    fn on_event(&self, event: &EventEnvelope<JsonValue>) -> Result<(), SubscriberError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| SubscriberError::new("project progress lock poisoned"))?;

        if let Some(&last) = inner.cursors.get(&event.aggregate_id()) {
            if event.sequence_number() <= last {
                return Ok(());
            }
        }

        let payload: ProjectEvent = serde_json::from_value(event.payload().clone())
            .map_err(|e| SubscriberError::new(format!("malformed project event: {e}")))?;

        match payload {
            ProjectEvent::ProjectCreated(e) => {
                inner.projects.insert(
                    e.project_id,
                    ProjectStatus {
                        project_id: e.project_id,
                        name: e.name,
                        target_word_count: e.target_word_count,
                        current_word_count: 0,
                        updates: Vec::new(),
                    },
                );
            }
            ProjectEvent::ProjectUpdated(e) => {
                if let Some(status) = inner.projects.get_mut(&e.project_id) {
                    status.name = e.name;
                    status.target_word_count = e.target_word_count;
                }
            }
            ProjectEvent::WordCountUpdated(e) => {
                if let Some(status) = inner.projects.get_mut(&e.project_id) {
                    status.updates.push(WordCountEntry {
                        id: e.word_count_update_id,
                        total_word_count: e.new_total_word_count,
                    });
                    status.current_word_count = e.new_total_word_count;
                }
            }
            ProjectEvent::WordCountUpdateDeleted(e) => {
                if let Some(status) = inner.projects.get_mut(&e.project_id) {
                    status.updates.retain(|u| u.id != e.word_count_update_id);
                    status.current_word_count =
                        status.updates.last().map_or(0, |u| u.total_word_count);
                }
            }
        }

        inner
            .cursors
            .insert(event.aggregate_id(), event.sequence_number());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wordtrail_core::CommandId;
    use wordtrail_domain::project::{ProjectCreated, WordCountUpdateId, WordCountUpdated};
    use wordtrail_events::Event;

    fn envelope(event: &ProjectEvent, project_id: ProjectId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            project_id.0,
            "project",
            seq,
            event.event_type(),
            Utc::now(),
            serde_json::to_value(event).unwrap(),
        )
    }

    fn created(project_id: ProjectId) -> ProjectEvent {
        ProjectEvent::ProjectCreated(ProjectCreated {
            command_id: CommandId::new(),
            project_id,
            name: "Novel".to_string(),
            start_date: Utc::now(),
            target_completion_date: Utc::now(),
            target_word_count: 120_000,
        })
    }

    fn word_count(project_id: ProjectId, id: WordCountUpdateId, total: u32) -> ProjectEvent {
        ProjectEvent::WordCountUpdated(WordCountUpdated {
            command_id: CommandId::new(),
            project_id,
            word_count_update_id: id,
            new_total_word_count: total,
            words_added: total,
        })
    }

    #[test]
    fn tracks_progress_through_word_count_updates() {
        let progress = ProjectProgress::new();
        let project_id = ProjectId::new(wordtrail_core::AggregateId::new());

        progress
            .on_event(&envelope(&created(project_id), project_id, 0))
            .unwrap();
        progress
            .on_event(&envelope(
                &word_count(project_id, WordCountUpdateId::new(), 30_000),
                project_id,
                1,
            ))
            .unwrap();

        let status = progress.status(project_id).unwrap();
        assert_eq!(status.name, "Novel");
        assert_eq!(status.target_word_count, 120_000);
        assert_eq!(status.current_word_count, 30_000);
        assert_eq!(status.updates.len(), 1);
    }

    #[test]
    fn deleting_an_update_restores_the_previous_total() {
        let progress = ProjectProgress::new();
        let project_id = ProjectId::new(wordtrail_core::AggregateId::new());
        let second = WordCountUpdateId::new();

        progress
            .on_event(&envelope(&created(project_id), project_id, 0))
            .unwrap();
        progress
            .on_event(&envelope(
                &word_count(project_id, WordCountUpdateId::new(), 30_000),
                project_id,
                1,
            ))
            .unwrap();
        progress
            .on_event(&envelope(&word_count(project_id, second, 45_000), project_id, 2))
            .unwrap();

        let deleted = ProjectEvent::WordCountUpdateDeleted(
            wordtrail_domain::project::WordCountUpdateDeleted {
                command_id: CommandId::new(),
                project_id,
                word_count_update_id: second,
            },
        );
        progress
            .on_event(&envelope(&deleted, project_id, 3))
            .unwrap();

        let status = progress.status(project_id).unwrap();
        assert_eq!(status.current_word_count, 30_000);
        assert_eq!(status.updates.len(), 1);
    }

    #[test]
    fn stale_redelivery_is_skipped() {
        let progress = ProjectProgress::new();
        let project_id = ProjectId::new(wordtrail_core::AggregateId::new());

        let create_env = envelope(&created(project_id), project_id, 0);
        progress.on_event(&create_env).unwrap();
        progress
            .on_event(&envelope(
                &word_count(project_id, WordCountUpdateId::new(), 30_000),
                project_id,
                1,
            ))
            .unwrap();

        progress.on_event(&create_env).unwrap();

        let status = progress.status(project_id).unwrap();
        assert_eq!(status.current_word_count, 30_000);
    }
}
