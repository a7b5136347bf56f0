use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wordtrail_core::{Aggregate, AggregateId, AggregateRoot, CommandId, DomainError};
use wordtrail_events::{Command, Event};

use crate::project::ProjectId;

/// Longest bio a writer may set, in characters.
pub const MAX_BIO_LENGTH: usize = 160;

/// Writer identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriterId(pub AggregateId);

impl WriterId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for WriterId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One project in a writer's catalogue, as the writer tracks it.
///
/// The writer only needs id + name here: enough to enforce that project
/// names stay unique among this writer's projects. The project's own state
/// lives in the [`crate::project::Project`] aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub id: ProjectId,
    pub name: String,
}

/// Aggregate root: a registered author and their project catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Writer {
    id: WriterId,
    registered: bool,
    user_name: String,
    name: String,
    bio: String,
    projects: Vec<ProjectEntry>,
    version: u64,
}

impl Writer {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: WriterId) -> Self {
        Self {
            id,
            registered: false,
            user_name: String::new(),
            name: String::new(),
            bio: String::new(),
            projects: Vec::new(),
            version: 0,
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bio(&self) -> &str {
        &self.bio
    }

    pub fn projects(&self) -> &[ProjectEntry] {
        &self.projects
    }

    fn project_exists(&self, project_id: ProjectId) -> bool {
        self.projects.iter().any(|p| p.id == project_id)
    }

    /// Name check scoped to *other* projects, so a project may keep its own
    /// name through an update.
    fn name_taken_by_other(&self, project_id: ProjectId, name: &str) -> bool {
        self.projects
            .iter()
            .any(|p| p.id != project_id && p.name == name)
    }
}

impl AggregateRoot for Writer {
    type Id = WriterId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterWriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWriter {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub user_name: String,
    pub name: String,
}

/// Command: UpdateWriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWriter {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub name: String,
    pub bio: String,
}

/// Command: CreateProjectForWriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectForWriter {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub project_id: ProjectId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub target_completion_date: DateTime<Utc>,
    pub target_word_count: u32,
}

/// Command: UpdateProjectForWriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProjectForWriter {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub project_id: ProjectId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub target_completion_date: DateTime<Utc>,
    pub target_word_count: u32,
}

/// Command: DeleteProjectForWriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProjectForWriter {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub project_id: ProjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriterCommand {
    RegisterWriter(RegisterWriter),
    UpdateWriter(UpdateWriter),
    CreateProjectForWriter(CreateProjectForWriter),
    UpdateProjectForWriter(UpdateProjectForWriter),
    DeleteProjectForWriter(DeleteProjectForWriter),
}

impl Command for WriterCommand {
    fn command_id(&self) -> CommandId {
        match self {
            WriterCommand::RegisterWriter(c) => c.command_id,
            WriterCommand::UpdateWriter(c) => c.command_id,
            WriterCommand::CreateProjectForWriter(c) => c.command_id,
            WriterCommand::UpdateProjectForWriter(c) => c.command_id,
            WriterCommand::DeleteProjectForWriter(c) => c.command_id,
        }
    }

    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            WriterCommand::RegisterWriter(c) => c.writer_id.0,
            WriterCommand::UpdateWriter(c) => c.writer_id.0,
            WriterCommand::CreateProjectForWriter(c) => c.writer_id.0,
            WriterCommand::UpdateProjectForWriter(c) => c.writer_id.0,
            WriterCommand::DeleteProjectForWriter(c) => c.writer_id.0,
        }
    }
}

/// Event: WriterRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterRegistered {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub user_name: String,
    pub name: String,
}

/// Event: WriterUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterUpdated {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub name: String,
    pub bio: String,
}

/// Event: ProjectCreatedForWriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreatedForWriter {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub project_id: ProjectId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub target_completion_date: DateTime<Utc>,
    pub target_word_count: u32,
}

/// Event: ProjectUpdatedForWriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdatedForWriter {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub project_id: ProjectId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub target_completion_date: DateTime<Utc>,
    pub target_word_count: u32,
}

/// Event: ProjectDeletedForWriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDeletedForWriter {
    pub command_id: CommandId,
    pub writer_id: WriterId,
    pub project_id: ProjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriterEvent {
    WriterRegistered(WriterRegistered),
    WriterUpdated(WriterUpdated),
    ProjectCreatedForWriter(ProjectCreatedForWriter),
    ProjectUpdatedForWriter(ProjectUpdatedForWriter),
    ProjectDeletedForWriter(ProjectDeletedForWriter),
}

impl Event for WriterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WriterEvent::WriterRegistered(_) => "writer.registered",
            WriterEvent::WriterUpdated(_) => "writer.updated",
            WriterEvent::ProjectCreatedForWriter(_) => "writer.project_created",
            WriterEvent::ProjectUpdatedForWriter(_) => "writer.project_updated",
            WriterEvent::ProjectDeletedForWriter(_) => "writer.project_deleted",
        }
    }

    fn command_id(&self) -> CommandId {
        match self {
            WriterEvent::WriterRegistered(e) => e.command_id,
            WriterEvent::WriterUpdated(e) => e.command_id,
            WriterEvent::ProjectCreatedForWriter(e) => e.command_id,
            WriterEvent::ProjectUpdatedForWriter(e) => e.command_id,
            WriterEvent::ProjectDeletedForWriter(e) => e.command_id,
        }
    }
}

impl Aggregate for Writer {
    type Command = WriterCommand;
    type Event = WriterEvent;
    type Error = DomainError;

    const KIND: &'static str = "writer";

    fn hydrate(id: AggregateId) -> Self {
        Self::empty(WriterId::new(id))
    }

    fn identity_assigned(&self) -> bool {
        self.registered
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WriterEvent::WriterRegistered(e) => {
                self.id = e.writer_id;
                self.registered = true;
                self.user_name = e.user_name.clone();
                self.name = e.name.clone();
            }
            WriterEvent::WriterUpdated(e) => {
                self.name = e.name.clone();
                self.bio = e.bio.clone();
            }
            WriterEvent::ProjectCreatedForWriter(e) => {
                self.projects.push(ProjectEntry {
                    id: e.project_id,
                    name: e.name.clone(),
                });
            }
            WriterEvent::ProjectUpdatedForWriter(e) => {
                if let Some(entry) = self.projects.iter_mut().find(|p| p.id == e.project_id) {
                    entry.name = e.name.clone();
                }
            }
            WriterEvent::ProjectDeletedForWriter(e) => {
                self.projects.retain(|p| p.id != e.project_id);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WriterCommand::RegisterWriter(cmd) => self.handle_register(cmd),
            WriterCommand::UpdateWriter(cmd) => self.handle_update(cmd),
            WriterCommand::CreateProjectForWriter(cmd) => self.handle_create_project(cmd),
            WriterCommand::UpdateProjectForWriter(cmd) => self.handle_update_project(cmd),
            WriterCommand::DeleteProjectForWriter(cmd) => self.handle_delete_project(cmd),
        }
    }
}

impl Writer {
    fn ensure_registered(&self) -> Result<(), DomainError> {
        if !self.identity_assigned() {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_bio_fits(bio: &str) -> Result<(), DomainError> {
        if bio.chars().count() > MAX_BIO_LENGTH {
            return Err(DomainError::validation(format!(
                "bio must be at most {MAX_BIO_LENGTH} characters"
            )));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterWriter) -> Result<Vec<WriterEvent>, DomainError> {
        if self.identity_assigned() {
            return Err(DomainError::conflict("writer already registered"));
        }

        if cmd.user_name.trim().is_empty() {
            return Err(DomainError::validation("user name cannot be empty"));
        }

        Ok(vec![WriterEvent::WriterRegistered(WriterRegistered {
            command_id: cmd.command_id,
            writer_id: cmd.writer_id,
            user_name: cmd.user_name.clone(),
            name: cmd.name.clone(),
        })])
    }

    fn handle_update(&self, cmd: &UpdateWriter) -> Result<Vec<WriterEvent>, DomainError> {
        self.ensure_registered()?;
        Self::ensure_bio_fits(&cmd.bio)?;

        Ok(vec![WriterEvent::WriterUpdated(WriterUpdated {
            command_id: cmd.command_id,
            writer_id: cmd.writer_id,
            name: cmd.name.clone(),
            bio: cmd.bio.clone(),
        })])
    }

    fn handle_create_project(
        &self,
        cmd: &CreateProjectForWriter,
    ) -> Result<Vec<WriterEvent>, DomainError> {
        self.ensure_registered()?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("project name cannot be empty"));
        }

        if self.projects.iter().any(|p| p.name == cmd.name) {
            return Err(DomainError::conflict(
                "project name already in use by this writer",
            ));
        }

        Ok(vec![WriterEvent::ProjectCreatedForWriter(
            ProjectCreatedForWriter {
                command_id: cmd.command_id,
                writer_id: cmd.writer_id,
                project_id: cmd.project_id,
                name: cmd.name.clone(),
                start_date: cmd.start_date,
                target_completion_date: cmd.target_completion_date,
                target_word_count: cmd.target_word_count,
            },
        )])
    }

    fn handle_update_project(
        &self,
        cmd: &UpdateProjectForWriter,
    ) -> Result<Vec<WriterEvent>, DomainError> {
        self.ensure_registered()?;

        if !self.project_exists(cmd.project_id) {
            return Err(DomainError::validation(
                "no project with this id belongs to this writer",
            ));
        }

        if self.name_taken_by_other(cmd.project_id, &cmd.name) {
            return Err(DomainError::conflict(
                "project name already in use by this writer",
            ));
        }

        Ok(vec![WriterEvent::ProjectUpdatedForWriter(
            ProjectUpdatedForWriter {
                command_id: cmd.command_id,
                writer_id: cmd.writer_id,
                project_id: cmd.project_id,
                name: cmd.name.clone(),
                start_date: cmd.start_date,
                target_completion_date: cmd.target_completion_date,
                target_word_count: cmd.target_word_count,
            },
        )])
    }

    fn handle_delete_project(
        &self,
        cmd: &DeleteProjectForWriter,
    ) -> Result<Vec<WriterEvent>, DomainError> {
        self.ensure_registered()?;

        if !self.project_exists(cmd.project_id) {
            return Err(DomainError::validation(
                "no project with this id belongs to this writer",
            ));
        }

        Ok(vec![WriterEvent::ProjectDeletedForWriter(
            ProjectDeletedForWriter {
                command_id: cmd.command_id,
                writer_id: cmd.writer_id,
                project_id: cmd.project_id,
            },
        )])
    }
}
