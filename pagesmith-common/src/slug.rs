//! Repository identity resolution.
//!
//! A (requester, task) pair maps to exactly one repository name, stable
//! across rounds: round 2 must resolve to the identity round 1 created.
//! No randomness is involved anywhere in the derivation.

use serde::{Deserialize, Serialize};

/// Maximum length of the normalized task segment. Keeps the full name
/// inside provider repository-name limits.
const MAX_TASK_SEGMENT_LEN: usize = 40;

/// Deterministic, URL- and filesystem-safe repository identity.
///
/// Shape is `{user}-{task}` where `user` is the lowercased local part of
/// the requester email (`.` replaced by `-`) and `task` is the task name
/// normalized to `[a-z0-9-_]` and truncated. If the task normalizes to
/// nothing, the identity degrades to just the user segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSlug(String);

impl RepoSlug {
    /// Resolve the repository identity for a (email, task) pair.
    ///
    /// Pure and deterministic: the same inputs always yield the same
    /// identity.
    pub fn resolve(email: &str, task: &str) -> Self {
        let local_part = email.split('@').next().unwrap_or(email);
        let user: String = local_part
            .to_lowercase()
            .chars()
            .map(|c| if c == '.' { '-' } else { c })
            .collect();

        let mut task_segment: String = task
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        task_segment.truncate(MAX_TASK_SEGMENT_LEN);

        // All-separator task names carry no identity; fold them to empty
        // so the slug degrades to the user segment alone.
        if task_segment.chars().all(|c| c == '-') {
            task_segment.clear();
        }

        if task_segment.is_empty() {
            Self(user)
        } else {
            Self(format!("{user}-{task_segment}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
