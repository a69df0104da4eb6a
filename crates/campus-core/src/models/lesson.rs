//! Lesson domain model.
//!
//! One content shape, three physical collections: a draft (at most one per
//! creator), the published lesson, and the archived lesson. A published
//! lesson that is mid-edit additionally carries a shadow copy of its
//! editable fields in [`EditData`], owned by the current editor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    Video,
    Image,
    Browser,
}

impl ScreenKind {
    /// Video and image screens reference files in the blob store;
    /// browser screens hold an external link.
    pub fn is_media(&self) -> bool {
        matches!(self, ScreenKind::Video | ScreenKind::Image)
    }
}

/// One of a normal part's three display slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    /// Blob path for media screens, external URL for browser screens.
    pub url: Option<String>,
    pub kind: Option<ScreenKind>,
    /// Set only when `url` is a resolved blob asset.
    pub mime_type: Option<String>,
    pub comment: Option<String>,
}

impl Screen {
    pub fn is_media(&self) -> bool {
        self.kind.map(|k| k.is_media()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Normal,
    Panoramic,
}

pub const SCREENS_PER_PART: usize = 3;

/// A lesson's structural unit. Normal parts own exactly three screens;
/// panoramic parts own a single image asset (`blob_path`) or an external
/// `panoramic_url`, mutually exclusive, and never screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Stable across the lesson's whole life, including duplication of
    /// the surrounding lesson.
    pub id: String,
    pub order: i64,
    pub title: Option<String>,
    pub kind: PartKind,
    #[serde(default)]
    pub screens: Vec<Screen>,
    /// Panoramic image asset in the blob store.
    pub blob_path: Option<String>,
    /// External panoramic asset.
    pub panoramic_url: Option<String>,
}

impl Part {
    pub fn normal(order: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order,
            title: None,
            kind: PartKind::Normal,
            screens: vec![Screen::default(); SCREENS_PER_PART],
            blob_path: None,
            panoramic_url: None,
        }
    }

    pub fn panoramic(order: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order,
            title: None,
            kind: PartKind::Panoramic,
            screens: Vec::new(),
            blob_path: None,
            panoramic_url: None,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.kind == PartKind::Normal
    }

    pub fn is_panoramic(&self) -> bool {
        self.kind == PartKind::Panoramic
    }
}

/// The shadow copy held while a published lesson is mid-edit. Taken as a
/// full copy of the live editable fields when the edit session starts, so
/// submission can diff shadow against live field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditData {
    /// The user who opened the edit session. Unchanged by seizure.
    pub initial_editor: Uuid,
    /// The user currently holding the session.
    pub current_editor: Uuid,
    pub started_at: DateTime<Utc>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub description_file: Option<String>,
    pub categories: Vec<Uuid>,
    pub thumbnail: Option<String>,
    pub credit: Option<String>,
    pub parts: Vec<Part>,
}

impl EditData {
    /// Open a session: shadow-copy the live editable fields.
    pub fn shadow_of(content: &LessonContent, editor: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            initial_editor: editor,
            current_editor: editor,
            started_at,
            title: content.title.clone(),
            description: content.description.clone(),
            description_file: content.description_file.clone(),
            categories: content.categories.clone(),
            thumbnail: content.thumbnail.clone(),
            credit: content.credit.clone(),
            parts: content.parts.clone(),
        }
    }

    pub fn part(&self, part_id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == part_id)
    }
}

/// The shared content shape of draft, published and archived lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator: Uuid,
    pub description_file: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
    pub viewed: i64,
    #[serde(default)]
    pub categories: Vec<Uuid>,
    pub thumbnail: Option<String>,
    pub public: bool,
    pub credit: Option<String>,
    pub mid_edit: bool,
    pub edit_data: Option<EditData>,
}

impl LessonContent {
    pub fn empty(creator: Uuid) -> Self {
        Self {
            title: None,
            description: None,
            creator,
            description_file: None,
            parts: Vec::new(),
            viewed: 0,
            categories: Vec::new(),
            thumbnail: None,
            public: false,
            credit: None,
            mid_edit: false,
            edit_data: None,
        }
    }

    pub fn part(&self, part_id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == part_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftLesson {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: LessonContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedLesson {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: LessonContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishedLesson {
    /// Build the published document for a draft being published. The id is
    /// carried over so asset paths under the lesson id stay valid.
    pub fn from_draft(draft: DraftLesson, now: DateTime<Utc>) -> Self {
        Self {
            id: draft.id,
            content: draft.content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Restore: same identity, archive metadata dropped.
    pub fn from_archived(archived: ArchivedLesson, now: DateTime<Utc>) -> Self {
        Self {
            id: archived.id,
            content: archived.content,
            created_at: archived.created_at,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedLesson {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: LessonContent,
    pub archive_at: DateTime<Utc>,
    pub archive_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArchivedLesson {
    pub fn from_published(lesson: PublishedLesson, by: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            id: lesson.id,
            content: lesson.content,
            archive_at: at,
            archive_by: by,
            created_at: lesson.created_at,
            updated_at: lesson.updated_at,
        }
    }
}

/// Set-only patch for the top-level editable lesson fields. `None` leaves
/// a field untouched; there is no way to clear one here, matching the
/// edit endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonBasicsPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub description_file: Option<String>,
    pub categories: Option<Vec<Uuid>>,
    pub thumbnail: Option<String>,
    pub credit: Option<String>,
}
