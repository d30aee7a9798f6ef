//! Counter model

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Owner id carried by counters created without a server session.
pub const GUEST_OWNER_ID: &str = "guest";

/// Colour used when the caller does not pick one.
pub const DEFAULT_COUNTER_COLOR: &str = "#000000";

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("Invalid regex"));

/// Identifier of a counter.
///
/// Locally created counters get a UUID v7; counters that arrive from the
/// server (joined or fetched) keep whatever id the server assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterId(String);

impl CounterId {
    /// Create a new client-side counter ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CounterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CounterId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Counter ID cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for CounterId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Whether a counter belongs to one user or is shared through an invite code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterKind {
    #[default]
    Personal,
    Shared,
}

/// A counter as held in the local view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub id: CounterId,
    pub title: String,
    /// `#RRGGBB`
    pub color: String,
    pub count: i64,
    pub owner_id: String,
    #[serde(rename = "type", default)]
    pub kind: CounterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
}

impl Counter {
    /// Create a personal counter at zero, owned by `owner_id`
    pub fn new(title: &str, color: Option<&str>, owner_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: CounterId::new(),
            title: normalize_title(title)?,
            color: normalize_color(color)?,
            count: 0,
            owner_id: owner_id.into(),
            kind: CounterKind::Personal,
            invite_code: None,
        })
    }

    /// True when the counter was created without a server session
    #[must_use]
    pub fn is_guest_owned(&self) -> bool {
        self.owner_id == GUEST_OWNER_ID
    }

    /// Overwrite fields from a snapshot of the same counter (last writer wins)
    pub fn merge_from(&mut self, snapshot: &Self) {
        self.title.clone_from(&snapshot.title);
        self.color.clone_from(&snapshot.color);
        self.count = snapshot.count;
        self.owner_id.clone_from(&snapshot.owner_id);
        self.kind = snapshot.kind;
        if snapshot.invite_code.is_some() {
            self.invite_code.clone_from(&snapshot.invite_code);
        }
    }
}

/// Partial update of a counter's user-editable fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CounterPatch {
    /// Validate and normalize the patch; rejects a patch that changes nothing
    pub fn normalized(self) -> Result<Self> {
        let title = self.title.as_deref().map(normalize_title).transpose()?;
        let color = self
            .color
            .as_deref()
            .map(|color| normalize_color(Some(color)))
            .transpose()?;
        if title.is_none() && color.is_none() {
            return Err(Error::InvalidInput(
                "Update must change the title or the color".into(),
            ));
        }
        Ok(Self { title, color })
    }

    pub fn apply(&self, counter: &mut Counter) {
        if let Some(title) = &self.title {
            counter.title.clone_from(title);
        }
        if let Some(color) = &self.color {
            counter.color.clone_from(color);
        }
    }
}

/// Validate a `#RRGGBB` colour, falling back to the default when absent
pub fn normalize_color(color: Option<&str>) -> Result<String> {
    let Some(color) = color.map(str::trim).filter(|color| !color.is_empty()) else {
        return Ok(DEFAULT_COUNTER_COLOR.to_string());
    };
    if HEX_COLOR.is_match(color) {
        Ok(color.to_ascii_uppercase())
    } else {
        Err(Error::InvalidInput(format!(
            "Color must look like #RRGGBB, got '{color}'"
        )))
    }
}

fn normalize_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        Err(Error::InvalidInput("Counter title cannot be empty".into()))
    } else {
        Ok(title.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_id_unique() {
        assert_ne!(CounterId::new(), CounterId::new());
    }

    #[test]
    fn test_counter_new_starts_at_zero() {
        let counter = Counter::new("  Push-ups ", None, GUEST_OWNER_ID).unwrap();
        assert_eq!(counter.title, "Push-ups");
        assert_eq!(counter.color, DEFAULT_COUNTER_COLOR);
        assert_eq!(counter.count, 0);
        assert_eq!(counter.kind, CounterKind::Personal);
        assert!(counter.is_guest_owned());
    }

    #[test]
    fn test_counter_rejects_blank_title() {
        assert!(Counter::new("   ", None, "user-1").is_err());
    }

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color(Some("#a1b2c3")).unwrap(), "#A1B2C3");
        assert_eq!(normalize_color(Some(" ")).unwrap(), DEFAULT_COUNTER_COLOR);
        assert!(normalize_color(Some("red")).is_err());
        assert!(normalize_color(Some("#12345")).is_err());
    }

    #[test]
    fn test_patch_requires_a_change() {
        assert!(CounterPatch::default().normalized().is_err());

        let patch = CounterPatch {
            title: Some(" Laps ".to_string()),
            color: None,
        }
        .normalized()
        .unwrap();
        let mut counter = Counter::new("Push-ups", None, "user-1").unwrap();
        patch.apply(&mut counter);
        assert_eq!(counter.title, "Laps");
        assert_eq!(counter.color, DEFAULT_COUNTER_COLOR);
    }

    #[test]
    fn test_counter_wire_format_is_camel_case() {
        let json = r##"{
            "id": "c-1",
            "title": "Water",
            "color": "#00FF00",
            "count": 3,
            "ownerId": "user-1",
            "type": "SHARED",
            "inviteCode": "ABC123"
        }"##;
        let counter: Counter = serde_json::from_str(json).unwrap();
        assert_eq!(counter.id.as_str(), "c-1");
        assert_eq!(counter.kind, CounterKind::Shared);
        assert_eq!(counter.invite_code.as_deref(), Some("ABC123"));

        let value = serde_json::to_value(&counter).unwrap();
        assert_eq!(value["ownerId"], "user-1");
        assert_eq!(value["type"], "SHARED");
    }

    #[test]
    fn test_merge_keeps_local_invite_code_when_snapshot_lacks_it() {
        let mut local = Counter::new("Water", None, "user-1").unwrap();
        local.invite_code = Some("ABC123".to_string());
        let mut snapshot = local.clone();
        snapshot.count = 9;
        snapshot.invite_code = None;

        local.merge_from(&snapshot);
        assert_eq!(local.count, 9);
        assert_eq!(local.invite_code.as_deref(), Some("ABC123"));
    }
}
