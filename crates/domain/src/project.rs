use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wordtrail_core::{Aggregate, AggregateId, AggregateRoot, CommandId, DomainError};
use wordtrail_events::{Command, Event};

/// Project identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub AggregateId);

impl ProjectId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of one recorded word-count update within a project.
///
/// Author-assigned, so an update can be referred to later (e.g. to delete
/// a mistaken entry).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordCountUpdateId(Uuid);

impl WordCountUpdateId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for WordCountUpdateId {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded progress entry: the total word count at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountEntry {
    pub id: WordCountUpdateId,
    pub total_word_count: u32,
}

/// Aggregate root: one writing project and its word-count history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    id: ProjectId,
    created: bool,
    name: String,
    start_date: DateTime<Utc>,
    target_completion_date: DateTime<Utc>,
    target_word_count: u32,
    current_word_count: u32,
    word_count_updates: Vec<WordCountEntry>,
    version: u64,
}

impl Project {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProjectId) -> Self {
        Self {
            id,
            created: false,
            name: String::new(),
            start_date: DateTime::<Utc>::UNIX_EPOCH,
            target_completion_date: DateTime::<Utc>::UNIX_EPOCH,
            target_word_count: 0,
            current_word_count: 0,
            word_count_updates: Vec::new(),
            version: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_word_count(&self) -> u32 {
        self.target_word_count
    }

    pub fn current_word_count(&self) -> u32 {
        self.current_word_count
    }

    pub fn word_count_updates(&self) -> &[WordCountEntry] {
        &self.word_count_updates
    }

    fn update_exists(&self, id: WordCountUpdateId) -> bool {
        self.word_count_updates.iter().any(|u| u.id == id)
    }
}

impl AggregateRoot for Project {
    type Id = ProjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProject {
    pub command_id: CommandId,
    pub project_id: ProjectId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub target_completion_date: DateTime<Utc>,
    pub target_word_count: u32,
}

/// Command: UpdateProject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProject {
    pub command_id: CommandId,
    pub project_id: ProjectId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub target_completion_date: DateTime<Utc>,
    pub target_word_count: u32,
}

/// Command: UpdateWordCount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWordCount {
    pub command_id: CommandId,
    pub project_id: ProjectId,
    pub word_count_update_id: WordCountUpdateId,
    pub new_total_word_count: u32,
}

/// Command: DeleteWordCountUpdate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteWordCountUpdate {
    pub command_id: CommandId,
    pub project_id: ProjectId,
    pub word_count_update_id: WordCountUpdateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectCommand {
    CreateProject(CreateProject),
    UpdateProject(UpdateProject),
    UpdateWordCount(UpdateWordCount),
    DeleteWordCountUpdate(DeleteWordCountUpdate),
}

impl Command for ProjectCommand {
    fn command_id(&self) -> CommandId {
        match self {
            ProjectCommand::CreateProject(c) => c.command_id,
            ProjectCommand::UpdateProject(c) => c.command_id,
            ProjectCommand::UpdateWordCount(c) => c.command_id,
            ProjectCommand::DeleteWordCountUpdate(c) => c.command_id,
        }
    }

    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            ProjectCommand::CreateProject(c) => c.project_id.0,
            ProjectCommand::UpdateProject(c) => c.project_id.0,
            ProjectCommand::UpdateWordCount(c) => c.project_id.0,
            ProjectCommand::DeleteWordCountUpdate(c) => c.project_id.0,
        }
    }
}

/// Event: ProjectCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreated {
    pub command_id: CommandId,
    pub project_id: ProjectId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub target_completion_date: DateTime<Utc>,
    pub target_word_count: u32,
}

/// Event: ProjectUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdated {
    pub command_id: CommandId,
    pub project_id: ProjectId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub target_completion_date: DateTime<Utc>,
    pub target_word_count: u32,
}

/// Event: WordCountUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountUpdated {
    pub command_id: CommandId,
    pub project_id: ProjectId,
    pub word_count_update_id: WordCountUpdateId,
    pub new_total_word_count: u32,
    /// Words written since the previous total (derived at decision time).
    pub words_added: u32,
}

/// Event: WordCountUpdateDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountUpdateDeleted {
    pub command_id: CommandId,
    pub project_id: ProjectId,
    pub word_count_update_id: WordCountUpdateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectEvent {
    ProjectCreated(ProjectCreated),
    ProjectUpdated(ProjectUpdated),
    WordCountUpdated(WordCountUpdated),
    WordCountUpdateDeleted(WordCountUpdateDeleted),
}

impl Event for ProjectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProjectEvent::ProjectCreated(_) => "project.created",
            ProjectEvent::ProjectUpdated(_) => "project.updated",
            ProjectEvent::WordCountUpdated(_) => "project.word_count_updated",
            ProjectEvent::WordCountUpdateDeleted(_) => "project.word_count_update_deleted",
        }
    }

    fn command_id(&self) -> CommandId {
        match self {
            ProjectEvent::ProjectCreated(e) => e.command_id,
            ProjectEvent::ProjectUpdated(e) => e.command_id,
            ProjectEvent::WordCountUpdated(e) => e.command_id,
            ProjectEvent::WordCountUpdateDeleted(e) => e.command_id,
        }
    }
}

impl Aggregate for Project {
    type Command = ProjectCommand;
    type Event = ProjectEvent;
    type Error = DomainError;

    const KIND: &'static str = "project";

    fn hydrate(id: AggregateId) -> Self {
        Self::empty(ProjectId::new(id))
    }

    fn identity_assigned(&self) -> bool {
        self.created
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProjectEvent::ProjectCreated(e) => {
                self.id = e.project_id;
                self.created = true;
                self.name = e.name.clone();
                self.start_date = e.start_date;
                self.target_completion_date = e.target_completion_date;
                self.target_word_count = e.target_word_count;
                self.current_word_count = 0;
            }
            ProjectEvent::ProjectUpdated(e) => {
                self.name = e.name.clone();
                self.start_date = e.start_date;
                self.target_completion_date = e.target_completion_date;
                self.target_word_count = e.target_word_count;
            }
            ProjectEvent::WordCountUpdated(e) => {
                self.word_count_updates.push(WordCountEntry {
                    id: e.word_count_update_id,
                    total_word_count: e.new_total_word_count,
                });
                self.current_word_count = e.new_total_word_count;
            }
            ProjectEvent::WordCountUpdateDeleted(e) => {
                self.word_count_updates
                    .retain(|u| u.id != e.word_count_update_id);
                // The current total falls back to the latest surviving update.
                self.current_word_count = self
                    .word_count_updates
                    .last()
                    .map_or(0, |u| u.total_word_count);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProjectCommand::CreateProject(cmd) => self.handle_create(cmd),
            ProjectCommand::UpdateProject(cmd) => self.handle_update(cmd),
            ProjectCommand::UpdateWordCount(cmd) => self.handle_update_word_count(cmd),
            ProjectCommand::DeleteWordCountUpdate(cmd) => self.handle_delete_word_count(cmd),
        }
    }
}

impl Project {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.identity_assigned() {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProject) -> Result<Vec<ProjectEvent>, DomainError> {
        if self.identity_assigned() {
            return Err(DomainError::conflict("project already created"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("project name cannot be empty"));
        }

        Ok(vec![ProjectEvent::ProjectCreated(ProjectCreated {
            command_id: cmd.command_id,
            project_id: cmd.project_id,
            name: cmd.name.clone(),
            start_date: cmd.start_date,
            target_completion_date: cmd.target_completion_date,
            target_word_count: cmd.target_word_count,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProject) -> Result<Vec<ProjectEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("project name cannot be empty"));
        }

        Ok(vec![ProjectEvent::ProjectUpdated(ProjectUpdated {
            command_id: cmd.command_id,
            project_id: cmd.project_id,
            name: cmd.name.clone(),
            start_date: cmd.start_date,
            target_completion_date: cmd.target_completion_date,
            target_word_count: cmd.target_word_count,
        })])
    }

    fn handle_update_word_count(
        &self,
        cmd: &UpdateWordCount,
    ) -> Result<Vec<ProjectEvent>, DomainError> {
        self.ensure_created()?;

        if self.update_exists(cmd.word_count_update_id) {
            return Err(DomainError::conflict(
                "this word count update has already been recorded",
            ));
        }

        if cmd.new_total_word_count < self.current_word_count {
            return Err(DomainError::validation(format!(
                "new word count {} is less than the current word count {}",
                cmd.new_total_word_count, self.current_word_count
            )));
        }

        Ok(vec![ProjectEvent::WordCountUpdated(WordCountUpdated {
            command_id: cmd.command_id,
            project_id: cmd.project_id,
            word_count_update_id: cmd.word_count_update_id,
            new_total_word_count: cmd.new_total_word_count,
            words_added: cmd.new_total_word_count - self.current_word_count,
        })])
    }

    fn handle_delete_word_count(
        &self,
        cmd: &DeleteWordCountUpdate,
    ) -> Result<Vec<ProjectEvent>, DomainError> {
        self.ensure_created()?;

        if !self.update_exists(cmd.word_count_update_id) {
            return Err(DomainError::validation(
                "no word count update with this id for this project",
            ));
        }

        Ok(vec![ProjectEvent::WordCountUpdateDeleted(
            WordCountUpdateDeleted {
                command_id: cmd.command_id,
                project_id: cmd.project_id,
                word_count_update_id: cmd.word_count_update_id,
            },
        )])
    }
}
