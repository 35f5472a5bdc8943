//! Raw records of the source collections and their type tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source a feed item originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Direct messages between staff and parents.
    Message,
    /// Scheduled assignments and tests.
    Scheduled,
    /// Shared teaching materials.
    Material,
    /// Notices generated locally; never stored on the backend.
    System,
}

/// Display category of a feed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Communication,
    Academic,
    Resources,
    System,
}

impl SourceKind {
    /// Kinds backed by a backend collection.
    pub const BACKEND: [SourceKind; 3] = [Self::Message, Self::Scheduled, Self::Material];

    /// Tag used as the prefix of notification ids.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Scheduled => "scheduled",
            Self::Material => "material",
            Self::System => "system",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "message" => Some(Self::Message),
            "scheduled" => Some(Self::Scheduled),
            "material" => Some(Self::Material),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Whether deletes for this kind have to go through the backend.
    pub fn is_backend(&self) -> bool {
        !matches!(self, Self::System)
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Message => Category::Communication,
            Self::Scheduled => Category::Academic,
            Self::Material => Category::Resources,
            Self::System => Category::System,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Message => "blue",
            Self::Scheduled => "orange",
            Self::Material => "green",
            Self::System => "gray",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Message => "mail",
            Self::Scheduled => "calendar",
            Self::Material => "book",
            Self::System => "bell",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Build a notification id from its source kind and record id.
pub fn notification_id(kind: SourceKind, record_id: &str) -> String {
    format!("{}-{}", kind.tag(), record_id)
}

/// Split a notification id into its kind and record id.
///
/// Record ids may themselves contain dashes, tags never do.
pub fn split_notification_id(id: &str) -> Option<(SourceKind, &str)> {
    let (tag, record_id) = id.split_once('-')?;
    if record_id.is_empty() {
        return None;
    }
    SourceKind::parse(tag).map(|kind| (kind, record_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledKind {
    Assignment,
    Test,
}

impl ScheduledKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Assignment => "Assignment",
            Self::Test => "Test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRecord {
    pub id: String,
    pub kind: ScheduledKind,
    #[serde(default)]
    pub title: Option<String>,
    /// Subject label, e.g. "Mathematics".
    #[serde(default)]
    pub subject_name: Option<String>,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNotice {
    pub id: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Copy of the record a feed item was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRecord {
    Message(MessageRecord),
    Scheduled(ScheduledRecord),
    Material(MaterialRecord),
    System(SystemNotice),
}

impl SourceRecord {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Message(_) => SourceKind::Message,
            Self::Scheduled(_) => SourceKind::Scheduled,
            Self::Material(_) => SourceKind::Material,
            Self::System(_) => SourceKind::System,
        }
    }

    /// Identifier of the record inside its own collection.
    pub fn record_id(&self) -> &str {
        match self {
            Self::Message(r) => &r.id,
            Self::Scheduled(r) => &r.id,
            Self::Material(r) => &r.id,
            Self::System(r) => &r.id,
        }
    }
}
