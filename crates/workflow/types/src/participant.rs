//! Participants and rosters
//!
//! A task keeps two rosters per instance: the *assigned* roster (who may
//! eventually work it) and the *active* roster (who is expected to act
//! now). Both are ordered lists of [`RosterEntry`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runtime parameters passed with a step, consulted by flow conditions
pub type Parameters = HashMap<String, String>;

/// Execution order of entries on non-sequential tasks
pub const UNORDERED: u32 = 0;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user or a group working a task
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Participant {
    User(UserId),
    Group(GroupId),
}

impl Participant {
    pub fn is_user(&self) -> bool {
        matches!(self, Participant::User(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Participant::Group(_))
    }

    pub fn as_user(&self) -> Option<&UserId> {
        match self {
            Participant::User(u) => Some(u),
            Participant::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupId> {
        match self {
            Participant::Group(g) => Some(g),
            Participant::User(_) => None,
        }
    }
}

impl From<UserId> for Participant {
    fn from(user: UserId) -> Self {
        Participant::User(user)
    }
}

impl From<GroupId> for Participant {
    fn from(group: GroupId) -> Self {
        Participant::Group(group)
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Participant::User(u) => write!(f, "user:{}", u),
            Participant::Group(g) => write!(f, "group:{}", g),
        }
    }
}

/// One participant in a roster with its execution order.
///
/// Order `0` means unordered; sequential rosters start at `1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterEntry {
    pub participant: Participant,
    pub execution_order: u32,
}

impl RosterEntry {
    pub fn new(participant: impl Into<Participant>, execution_order: u32) -> Self {
        Self {
            participant: participant.into(),
            execution_order,
        }
    }

    pub fn unordered(participant: impl Into<Participant>) -> Self {
        Self::new(participant, UNORDERED)
    }
}

/// Build a roster from participants: ordered from 1 when `sequential`,
/// otherwise every entry is unordered
pub fn roster_of<P, I>(participants: I, sequential: bool) -> Vec<RosterEntry>
where
    P: Into<Participant>,
    I: IntoIterator<Item = P>,
{
    participants
        .into_iter()
        .enumerate()
        .map(|(idx, p)| {
            let order = if sequential { idx as u32 + 1 } else { UNORDERED };
            RosterEntry::new(p, order)
        })
        .collect()
}

/// Users in a roster, in execution order
pub fn users_of(roster: &[RosterEntry]) -> Vec<UserId> {
    sorted(roster)
        .filter_map(|e| e.participant.as_user().cloned())
        .collect()
}

/// Groups in a roster, in execution order
pub fn groups_of(roster: &[RosterEntry]) -> Vec<GroupId> {
    sorted(roster)
        .filter_map(|e| e.participant.as_group().cloned())
        .collect()
}

fn sorted(roster: &[RosterEntry]) -> impl Iterator<Item = &RosterEntry> {
    let mut entries: Vec<_> = roster.iter().collect();
    // stable: unordered entries keep their insertion order
    entries.sort_by_key(|e| e.execution_order);
    entries.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_of_sequential_orders_from_one() {
        let roster = roster_of(
            [UserId::new("a"), UserId::new("b"), UserId::new("c")],
            true,
        );
        let orders: Vec<_> = roster.iter().map(|e| e.execution_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn test_roster_of_parallel_is_unordered() {
        let roster = roster_of([GroupId::new("g1"), GroupId::new("g2")], false);
        assert!(roster.iter().all(|e| e.execution_order == UNORDERED));
        assert!(roster.iter().all(|e| e.participant.is_group()));
    }

    #[test]
    fn test_users_of_sorts_by_order() {
        let roster = vec![
            RosterEntry::new(UserId::new("c"), 3),
            RosterEntry::new(UserId::new("a"), 1),
            RosterEntry::new(GroupId::new("g"), 2),
            RosterEntry::new(UserId::new("b"), 2),
        ];
        assert_eq!(
            users_of(&roster),
            vec![UserId::new("a"), UserId::new("b"), UserId::new("c")]
        );
        assert_eq!(groups_of(&roster), vec![GroupId::new("g")]);
    }

    #[test]
    fn test_participant_display_and_serde() {
        let p = Participant::from(UserId::new("u1"));
        assert_eq!(p.to_string(), "user:u1");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"kind":"user","id":"u1"}"#);
        let back: Participant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
