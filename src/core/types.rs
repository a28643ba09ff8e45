//! Core types used across the application
//!
//! Memories, their lifecycle state, relations between them, and the
//! request/response shapes exposed to callers of the engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum cosine distance (exclusive) for a prior memory to be considered
/// during consolidation
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

/// Maximum cosine distance (exclusive) for a memory to appear in search results
pub const SEARCH_THRESHOLD: f64 = 0.5;

/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Upper bound on the number of search results a caller may request
pub const MAX_SEARCH_LIMIT: usize = 10;

/// Upper bound on submitted memory content, in characters
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Lifecycle state of a memory
///
/// `Active` is only entered on creation. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryState {
    /// Current statement of its chain
    Active,
    /// Replaced by a newer version of its chain
    Superseded,
    /// Soft-deleted by the owner
    Deleted,
}

impl MemoryState {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryState::Active => "active",
            MemoryState::Superseded => "superseded",
            MemoryState::Deleted => "deleted",
        }
    }

    /// Whether a memory in this state may move to `next`
    pub fn can_transition_to(&self, next: MemoryState) -> bool {
        matches!(
            (self, next),
            (MemoryState::Active, MemoryState::Superseded)
                | (MemoryState::Active, MemoryState::Deleted)
                | (MemoryState::Superseded, MemoryState::Deleted)
        )
    }

    /// States from which `next` is reachable
    pub fn predecessors(next: MemoryState) -> &'static [MemoryState] {
        match next {
            MemoryState::Active => &[],
            MemoryState::Superseded => &[MemoryState::Active],
            MemoryState::Deleted => &[MemoryState::Active, MemoryState::Superseded],
        }
    }
}

impl std::str::FromStr for MemoryState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(MemoryState::Active),
            "superseded" => Ok(MemoryState::Superseded),
            "deleted" => Ok(MemoryState::Deleted),
            other => Err(Error::Internal(format!("Unknown memory state: {}", other))),
        }
    }
}

impl std::fmt::Display for MemoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single stored statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Unique memory ID
    pub id: Uuid,
    /// Owner; every query is scoped to it
    pub user_id: String,
    /// Text as submitted
    pub content: String,
    /// Text the embedding was computed from, when expansion changed it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded_content: Option<String>,
    /// Embedding of the expanded text
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Optional category tag
    pub category: Option<String>,
    /// Optional project tag (normalized)
    pub project: Option<String>,
    /// Provenance tag
    pub source: String,
    /// Lifecycle state
    pub state: MemoryState,
    /// Memory this one replaces
    pub supersedes_id: Option<Uuid>,
    /// First memory of the chain
    pub root_id: Uuid,
    /// Position in the chain, starting at 1
    pub version: i32,
    /// When the memory was created
    pub created_at: DateTime<Utc>,
    /// When the state last changed
    pub state_changed_at: Option<DateTime<Utc>>,
}

impl Memory {
    /// Create a chain originator
    pub fn new(user_id: impl Into<String>, content: impl Into<String>, embedding: Vec<f32>) -> Self {
        let id = Uuid::new_v4();
        Memory {
            id,
            user_id: user_id.into(),
            content: content.into(),
            expanded_content: None,
            embedding,
            category: None,
            project: None,
            source: String::new(),
            state: MemoryState::Active,
            supersedes_id: None,
            root_id: id,
            version: 1,
            created_at: Utc::now(),
            state_changed_at: None,
        }
    }

    /// Create the next version of `previous`'s chain
    ///
    /// Category and project are inherited; callers override them with
    /// explicitly supplied values.
    pub fn successor_of(
        previous: &Memory,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let mut memory = Memory::new(previous.user_id.clone(), content, embedding);
        memory.supersedes_id = Some(previous.id);
        memory.root_id = previous.root_id;
        memory.version = previous.version + 1;
        memory.category = previous.category.clone();
        memory.project = previous.project.clone();
        memory
    }

    /// Set the category, keeping the current one when `None`
    pub fn with_category(mut self, category: Option<String>) -> Self {
        if category.is_some() {
            self.category = category;
        }
        self
    }

    /// Set the project, keeping the current one when `None`
    pub fn with_project(mut self, project: Option<String>) -> Self {
        if project.is_some() {
            self.project = project;
        }
        self
    }

    /// Set the provenance tag
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Record the expanded text, if it differs from the content
    pub fn with_expanded_content(mut self, expanded: impl Into<String>) -> Self {
        let expanded = expanded.into();
        if expanded != self.content {
            self.expanded_content = Some(expanded);
        }
        self
    }

    /// Whether this memory started its chain
    pub fn is_originator(&self) -> bool {
        self.supersedes_id.is_none() && self.root_id == self.id
    }
}

/// Classifier verdict on how a new statement relates to the closest prior one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// The new statement corrects or replaces the prior one
    Update,
    /// The new statement adds detail to the prior one
    Extend,
    /// Related but distinct
    Similar,
}

impl Relationship {
    /// Relation recorded for this verdict; `None` for updates
    pub fn relation_type(&self) -> Option<RelationType> {
        match self {
            Relationship::Update => None,
            Relationship::Extend => Some(RelationType::Extends),
            Relationship::Similar => Some(RelationType::Similar),
        }
    }
}

impl std::str::FromStr for Relationship {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "update" => Ok(Relationship::Update),
            "extend" => Ok(Relationship::Extend),
            "similar" => Ok(Relationship::Similar),
            other => Err(Error::Provider(format!("Unknown relationship: {}", other))),
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relationship::Update => write!(f, "update"),
            Relationship::Extend => write!(f, "extend"),
            Relationship::Similar => write!(f, "similar"),
        }
    }
}

/// Kind of link between two independently current memories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Extends,
    Similar,
}

impl RelationType {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Extends => "extends",
            RelationType::Similar => "similar",
        }
    }
}

impl std::str::FromStr for RelationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "extends" => Ok(RelationType::Extends),
            "similar" => Ok(RelationType::Similar),
            other => Err(Error::Internal(format!("Unknown relation type: {}", other))),
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-destructive link from a new memory to the prior memory it resembles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRelation {
    pub id: Uuid,
    /// The newer memory
    pub source_id: Uuid,
    /// The prior similar memory
    pub target_id: Uuid,
    pub relation_type: RelationType,
    /// `1 - distance` at creation time, two decimals
    pub strength: f64,
    pub created_at: DateTime<Utc>,
}

impl MemoryRelation {
    /// Link `source_id` to `target_id` found at `distance`
    pub fn new(source_id: Uuid, target_id: Uuid, relation_type: RelationType, distance: f64) -> Self {
        MemoryRelation {
            id: Uuid::new_v4(),
            source_id,
            target_id,
            relation_type,
            strength: relevance_from_distance(distance),
            created_at: Utc::now(),
        }
    }
}

/// A memory paired with its cosine distance to a query vector
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub distance: f64,
}

impl ScoredMemory {
    /// `1 - distance`, rounded to two decimals
    pub fn relevance(&self) -> f64 {
        relevance_from_distance(self.distance)
    }
}

/// Convert a cosine distance into a two-decimal relevance in [0, 1]
pub fn relevance_from_distance(distance: f64) -> f64 {
    (((1.0 - distance) * 100.0).round() / 100.0).clamp(0.0, 1.0)
}

/// Canonical form of a project name: trimmed, lowercased, internal runs of
/// whitespace/underscores/dashes collapsed to a single `-`
pub fn normalize_project(project: &str) -> Option<String> {
    let normalized = project
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-");

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn normalize_category(category: &str) -> Option<String> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Exact-match filters applied to nearest-neighbor queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub category: Option<String>,
    pub project: Option<String>,
}

impl SearchFilter {
    /// Build a filter, normalizing the project the same way saves do
    pub fn new(category: Option<&str>, project: Option<&str>) -> Self {
        SearchFilter {
            category: category.and_then(normalize_category),
            project: project.and_then(normalize_project),
        }
    }

    /// Whether `memory` passes the filter
    pub fn matches(&self, memory: &Memory) -> bool {
        self.category
            .as_ref()
            .map_or(true, |c| memory.category.as_ref() == Some(c))
            && self
                .project
                .as_ref()
                .map_or(true, |p| memory.project.as_ref() == Some(p))
    }
}

/// Request to save a memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMemoryRequest {
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "api".to_string()
}

impl SaveMemoryRequest {
    /// Create a request with the default source
    pub fn new(content: impl Into<String>) -> Self {
        SaveMemoryRequest {
            content: content.into(),
            category: None,
            project: None,
            source: default_source(),
        }
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the project
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Reject malformed input
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(Error::InvalidInput("content must not be empty".into()));
        }
        let chars = self.content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(Error::InvalidInput(format!(
                "content is {} characters, maximum is {}",
                chars, MAX_CONTENT_CHARS
            )));
        }
        Ok(())
    }

    /// Category and project in canonical form
    pub fn normalized_tags(&self) -> (Option<String>, Option<String>) {
        (
            self.category.as_deref().and_then(normalize_category),
            self.project.as_deref().and_then(normalize_project),
        )
    }
}

/// Outcome of a save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// Stored as a new chain (no close match, or a similar one)
    Saved,
    /// Replaced the closest prior memory
    Updated,
    /// Stored as a new chain extending the closest prior memory
    Extended,
}

/// Response to a save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMemoryResponse {
    pub id: Uuid,
    pub status: SaveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded: Option<Uuid>,
}

/// Request to search memories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMemoryRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
}

impl SearchMemoryRequest {
    /// Create a request with the default limit and no filters
    pub fn new(query: impl Into<String>) -> Self {
        SearchMemoryRequest {
            query: query.into(),
            limit: None,
            category: None,
            project: None,
        }
    }

    /// Set the limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filter by category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Filter by project
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Requested limit, or the default
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }

    /// Reject malformed input
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".into()));
        }
        let limit = self.effective_limit();
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}, got {}",
                MAX_SEARCH_LIMIT, limit
            )));
        }
        Ok(())
    }

    /// Filters in canonical form
    pub fn filter(&self) -> SearchFilter {
        SearchFilter::new(self.category.as_deref(), self.project.as_deref())
    }
}

/// A single search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: Uuid,
    pub content: String,
    pub category: Option<String>,
    pub project: Option<String>,
    pub relevance: f64,
    pub created_at: DateTime<Utc>,
}

impl From<ScoredMemory> for SearchHit {
    fn from(scored: ScoredMemory) -> Self {
        let relevance = scored.relevance();
        SearchHit {
            id: scored.memory.id,
            content: scored.memory.content,
            category: scored.memory.category,
            project: scored.memory.project,
            relevance,
            created_at: scored.memory.created_at,
        }
    }
}

/// Response to a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMemoryResponse {
    pub found: usize,
    pub memories: Vec<SearchHit>,
}
