//! Content change events and the producer boundary.
//!
//! Every successful create, update, or delete on a portfolio collection
//! produces exactly one [`ChangeEvent`]. REST handlers hand it to a
//! [`ContentNotifier`] after the write is durable; the notifier fans it out to
//! live channels. There is no event log and no replay: a listener that is not
//! connected at notify time never sees the event.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Well-known content collection tags.
///
/// The tag is a free string on the wire; these are the collections the
/// portfolio site renders.
pub mod content_types {
    pub const HERO: &str = "hero";
    pub const ABOUT: &str = "about";
    pub const SKILL: &str = "skill";
    pub const EXPERIENCE: &str = "experience";
    pub const EDUCATION: &str = "education";
    pub const CERTIFICATE: &str = "certificate";
    pub const PROJECT: &str = "project";
    pub const SERVICE: &str = "service";
    pub const TESTIMONIAL: &str = "testimonial";
    pub const BLOG_POST: &str = "blogPost";
    pub const MESSAGE: &str = "message";
    pub const SETTINGS: &str = "settings";

    /// All known collection tags, in site section order.
    pub const ALL: [&str; 12] = [
        HERO,
        ABOUT,
        SKILL,
        EXPERIENCE,
        EDUCATION,
        CERTIFICATE,
        PROJECT,
        SERVICE,
        TESTIMONIAL,
        BLOG_POST,
        MESSAGE,
        SETTINGS,
    ];

    /// Whether `tag` names one of the portfolio's collections.
    pub fn is_known(tag: &str) -> bool {
        ALL.contains(&tag)
    }
}

/// The mutation that produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentAction {
    Create,
    Update,
    Delete,
}

impl ContentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentAction::Create => "create",
            ContentAction::Update => "update",
            ContentAction::Delete => "delete",
        }
    }

    /// Past-tense verb used in dashboard notifications ("created").
    pub fn past_tense(self) -> &'static str {
        match self {
            ContentAction::Create => "created",
            ContentAction::Update => "updated",
            ContentAction::Delete => "deleted",
        }
    }
}

impl fmt::Display for ContentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ContentAction::Create),
            "update" => Ok(ContentAction::Update),
            "delete" => Ok(ContentAction::Delete),
            other => Err(Error::InvalidInput(format!(
                "unknown content action '{}'",
                other
            ))),
        }
    }
}

/// One content mutation, as carried by a `content_update` frame.
///
/// Constructed once per mutation and never modified afterwards. The `data`
/// field is opaque: usually the affected record, sometimes only its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Collection that changed (e.g. `"project"`, `"blogPost"`).
    pub content_type: String,
    pub action: ContentAction,
    pub data: Value,
    /// Generation time, ISO-8601 with millisecond precision.
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Stamp a new event with the current time.
    pub fn new(content_type: impl Into<String>, action: ContentAction, data: Value) -> Self {
        Self {
            content_type: content_type.into(),
            action,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Short human summary, e.g. `"project updated"`.
    pub fn summary(&self) -> String {
        format!("{} {}", self.content_type, self.action.past_tense())
    }
}

/// Producer boundary for content mutations.
///
/// Call only after the underlying write has succeeded, so a listener that
/// refreshes on the notification always reads the new state.
pub trait ContentNotifier: Send + Sync {
    fn notify_content_change(&self, content_type: &str, action: ContentAction, data: Value);
}

impl<T: ContentNotifier + ?Sized> ContentNotifier for Arc<T> {
    fn notify_content_change(&self, content_type: &str, action: ContentAction, data: Value) {
        (**self).notify_content_change(content_type, action, data)
    }
}

mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
