//! Newtype wrappers for identifiers from both systems.
//!
//! GitHub node ids, project item ids and ZenHub ids are all opaque strings;
//! wrapping them keeps a board id from being passed where an entity id is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

opaque_id!(
    /// Stable GitHub node id of an issue or pull request.
    ///
    /// This is the identity used for gap-cache and lock keys, since both
    /// systems' webhooks can be resolved to it.
    EntityId
);

opaque_id!(
    /// GitHub Projects V2 board node id.
    BoardId
);

opaque_id!(
    /// Per-board project item id linking an entity to a board.
    ItemId
);

opaque_id!(
    /// Project field node id (status or estimate field).
    FieldId
);

opaque_id!(
    /// ZenHub issue id.
    ZenHubIssueId
);

opaque_id!(
    /// ZenHub pipeline id.
    PipelineId
);

/// Issue or pull request number within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueNumber(pub u64);

impl fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for IssueNumber {
    fn from(n: u64) -> Self {
        IssueNumber(n)
    }
}

/// A repository inside the configured organization.
///
/// `database_id` is GitHub's numeric repository id, which ZenHub uses to
/// address issues.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub name: String,
    pub database_id: u64,
}

impl RepoRef {
    pub fn new(name: impl Into<String>, database_id: u64) -> Self {
        RepoRef {
            name: name.into(),
            database_id,
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
