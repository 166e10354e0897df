//! The pre-race roster.
//!
//! A [`Lobby`] is one instance of the waiting room: the names that have
//! joined, the visitors that own them, and the instant the lobby becomes a
//! race. Lobbies are never reused across cycles; the controller replaces
//! the whole value when a race finishes.
//!
//! Names are unique under case-insensitive comparison and are kept in join
//! order, which becomes the frozen race order.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use derby_types::{JoinReceipt, LobbySnapshot, VisitorId};

/// Reasons a join (or force start) is refused. None of these change state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// The name is empty after trimming, too long, or not displayable.
    #[error("invalid name: {reason}")]
    InvalidName {
        /// What is wrong with the name.
        reason: String,
    },

    /// Another member already uses this name, ignoring case.
    #[error("name {name:?} is already taken")]
    DuplicateName {
        /// The rejected name as submitted (trimmed).
        name: String,
    },

    /// This visitor already has a name in the current lobby.
    #[error("visitor already joined as {name:?}")]
    AlreadyJoined {
        /// The name the visitor joined with.
        name: String,
    },

    /// A race is running; the lobby is closed.
    #[error("a race is in progress")]
    RaceInProgress,
}

/// One lobby instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lobby {
    /// Accepted names, in join order.
    members: Vec<String>,
    /// Lowercased names for collision checks.
    folded: BTreeSet<String>,
    /// Which name each visitor joined with.
    visitors: BTreeMap<VisitorId, String>,
    /// When this lobby turns into a race.
    start_time: DateTime<Utc>,
    /// Longest accepted name, in characters.
    max_name_length: usize,
}

impl Lobby {
    /// Create an empty lobby scheduled for `start_time`.
    pub const fn new(start_time: DateTime<Utc>, max_name_length: usize) -> Self {
        Self {
            members: Vec::new(),
            folded: BTreeSet::new(),
            visitors: BTreeMap::new(),
            start_time,
            max_name_length,
        }
    }

    /// Add `name` for `visitor`.
    ///
    /// Checks run in a fixed order: the visitor first, then the name's
    /// shape, then collisions. On success the trimmed name is stored.
    ///
    /// # Errors
    ///
    /// [`LobbyError::AlreadyJoined`], [`LobbyError::InvalidName`] or
    /// [`LobbyError::DuplicateName`]. The lobby is untouched on error.
    pub fn try_join(&mut self, name: &str, visitor: &VisitorId) -> Result<JoinReceipt, LobbyError> {
        if let Some(existing) = self.visitors.get(visitor) {
            return Err(LobbyError::AlreadyJoined {
                name: existing.clone(),
            });
        }

        let name = validate_name(name, self.max_name_length)?;
        let key = fold(&name);
        if self.folded.contains(&key) {
            return Err(LobbyError::DuplicateName { name });
        }

        self.folded.insert(key);
        self.visitors.insert(visitor.clone(), name.clone());
        self.members.push(name.clone());

        Ok(JoinReceipt {
            name,
            start_time: self.start_time,
        })
    }

    /// Members in join order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Members sorted for display (case-insensitive, ties by raw value).
    pub fn sorted_members(&self) -> Vec<String> {
        let mut sorted = self.members.clone();
        sorted.sort_by(|a, b| fold(a).cmp(&fold(b)).then_with(|| a.cmp(b)));
        sorted
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody has joined.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Scheduled start instant.
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Whether the start time has been reached.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    /// Whether `visitor` has a name in this lobby.
    pub fn has_joined(&self, visitor: &VisitorId) -> bool {
        self.visitors.contains_key(visitor)
    }

    /// Snapshot as seen by `visitor` (or by nobody in particular).
    pub fn snapshot_for(&self, visitor: Option<&VisitorId>, now: DateTime<Utc>) -> LobbySnapshot {
        LobbySnapshot {
            members: self.sorted_members(),
            start_time: self.start_time,
            now,
            you_joined: visitor.is_some_and(|v| self.has_joined(v)),
        }
    }
}

/// Trim and check a display name.
///
/// # Errors
///
/// Returns [`LobbyError::InvalidName`] if the trimmed name is empty, longer
/// than `max_len` characters, or contains control characters.
pub fn validate_name(raw: &str, max_len: usize) -> Result<String, LobbyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LobbyError::InvalidName {
            reason: "name is empty".to_owned(),
        });
    }
    let chars = trimmed.chars().count();
    if chars > max_len {
        return Err(LobbyError::InvalidName {
            reason: format!("name is {chars} characters, limit is {max_len}"),
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(LobbyError::InvalidName {
            reason: "name contains control characters".to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lobby() -> Lobby {
        Lobby::new(DateTime::<Utc>::UNIX_EPOCH, 20)
    }

    fn visitor(raw: &str) -> VisitorId {
        VisitorId::from(raw)
    }

    #[test]
    fn join_stores_trimmed_name() {
        let mut lobby = lobby();
        let receipt = lobby.try_join("  Alice  ", &visitor("v1")).unwrap();
        assert_eq!(receipt.name, "Alice");
        assert_eq!(lobby.members(), ["Alice"]);
        assert!(lobby.has_joined(&visitor("v1")));
    }

    #[test]
    fn case_insensitive_duplicate_is_rejected() {
        let mut lobby = lobby();
        lobby.try_join("Alice", &visitor("v1")).unwrap();

        let err = lobby.try_join("alice", &visitor("v2")).unwrap_err();
        assert!(matches!(err, LobbyError::DuplicateName { .. }));
        assert_eq!(lobby.len(), 1);
        assert!(!lobby.has_joined(&visitor("v2")));
    }

    #[test]
    fn same_visitor_cannot_join_twice() {
        let mut lobby = lobby();
        lobby.try_join("Alice", &visitor("v1")).unwrap();

        let err = lobby.try_join("Bob", &visitor("v1")).unwrap_err();
        assert_eq!(
            err,
            LobbyError::AlreadyJoined {
                name: "Alice".to_owned()
            }
        );
        assert_eq!(lobby.len(), 1);
    }

    #[test]
    fn already_joined_takes_precedence_over_invalid_name() {
        let mut lobby = lobby();
        lobby.try_join("Alice", &visitor("v1")).unwrap();
        let err = lobby.try_join("   ", &visitor("v1")).unwrap_err();
        assert!(matches!(err, LobbyError::AlreadyJoined { .. }));
    }

    #[test]
    fn empty_and_overlong_names_are_invalid() {
        let mut lobby = lobby();
        assert!(matches!(
            lobby.try_join("   ", &visitor("v1")),
            Err(LobbyError::InvalidName { .. })
        ));
        assert!(matches!(
            lobby.try_join(&"x".repeat(21), &visitor("v1")),
            Err(LobbyError::InvalidName { .. })
        ));
        assert!(matches!(
            lobby.try_join("bad\nname", &visitor("v1")),
            Err(LobbyError::InvalidName { .. })
        ));
        assert!(lobby.is_empty());
        assert!(!lobby.has_joined(&visitor("v1")));
    }

    #[test]
    fn length_limit_counts_characters_not_bytes() {
        let name = "é".repeat(20);
        assert!(validate_name(&name, 20).is_ok());
        assert!(validate_name(&format!("{name}é"), 20).is_err());
    }

    #[test]
    fn members_stay_unique_under_case_folding() {
        let mut lobby = lobby();
        let attempts = ["Bob", "BOB", "alice", "Alice", "bOb", "Carol", "carol ", "dave"];
        for (i, name) in attempts.iter().enumerate() {
            let _ = lobby.try_join(name, &visitor(&format!("v{i}")));
        }

        let folded: BTreeSet<String> = lobby.members().iter().map(|m| m.to_lowercase()).collect();
        assert_eq!(folded.len(), lobby.len());
        assert_eq!(lobby.members(), ["Bob", "alice", "Carol", "dave"]);
    }

    #[test]
    fn snapshot_sorts_and_reports_you_joined() {
        let mut lobby = lobby();
        lobby.try_join("zed", &visitor("v1")).unwrap();
        lobby.try_join("Amy", &visitor("v2")).unwrap();
        lobby.try_join("bob", &visitor("v3")).unwrap();

        let now = DateTime::<Utc>::UNIX_EPOCH;
        let snap = lobby.snapshot_for(Some(&visitor("v2")), now);
        assert_eq!(snap.members, ["Amy", "bob", "zed"]);
        assert!(snap.you_joined);

        assert!(!lobby.snapshot_for(Some(&visitor("v9")), now).you_joined);
        assert!(!lobby.snapshot_for(None, now).you_joined);
    }

    #[test]
    fn due_at_and_after_start_time() {
        let lobby = lobby();
        let start = lobby.start_time();
        assert!(lobby.is_due(start));
        assert!(!lobby.is_due(start - chrono::TimeDelta::milliseconds(1)));
    }
}
