// ABOUTME: The 3-slot alias permutation state machine for blue-green swaps.
// ABOUTME: Exactly three states are valid; everything else is a partial swap.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three release directories under `<root>/releases/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    A,
    B,
    C,
}

impl Slot {
    /// Directory path of this slot relative to the environment root.
    pub fn dir(&self) -> &'static str {
        match self {
            Slot::A => "releases/slot-a",
            Slot::B => "releases/slot-b",
            Slot::C => "releases/slot-c",
        }
    }

    /// Parse a symlink target as written by terrace.
    pub fn from_link_target(target: &str) -> Option<Slot> {
        match target.trim().trim_end_matches('/') {
            "releases/slot-a" => Some(Slot::A),
            "releases/slot-b" => Some(Slot::B),
            "releases/slot-c" => Some(Slot::C),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}

/// Raw alias readings taken from disk, kept for error reports when they do
/// not form a valid mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedAliases {
    pub current: String,
    pub staged: String,
    pub previous: String,
}

impl fmt::Display for ObservedAliases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current -> {}, staged -> {}, previous -> {}",
            self.current, self.staged, self.previous
        )
    }
}

/// A valid assignment of the three aliases to the three slots.
///
/// The constructor only admits the three cyclic permutations of (A, B, C);
/// the rotation maps each of them to the next, so a mapping read from disk
/// that is not one of the three can only be the residue of an interrupted
/// swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMap {
    pub current: Slot,
    pub staged: Slot,
    pub previous: Slot,
}

impl SlotMap {
    /// The layout created by slot initialization.
    pub const INITIAL: SlotMap = SlotMap {
        current: Slot::A,
        staged: Slot::B,
        previous: Slot::C,
    };

    const VALID: [SlotMap; 3] = [
        SlotMap {
            current: Slot::A,
            staged: Slot::B,
            previous: Slot::C,
        },
        SlotMap {
            current: Slot::B,
            staged: Slot::C,
            previous: Slot::A,
        },
        SlotMap {
            current: Slot::C,
            staged: Slot::A,
            previous: Slot::B,
        },
    ];

    /// Build a mapping from alias readings, rejecting anything that is not
    /// one of the three valid cyclic permutations.
    pub fn from_observed(observed: &ObservedAliases) -> Result<SlotMap, ObservedAliases> {
        let current = Slot::from_link_target(&observed.current);
        let staged = Slot::from_link_target(&observed.staged);
        let previous = Slot::from_link_target(&observed.previous);

        if let (Some(current), Some(staged), Some(previous)) = (current, staged, previous) {
            let candidate = SlotMap {
                current,
                staged,
                previous,
            };
            if Self::VALID.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(observed.clone())
    }

    /// The forward rotation: current -> previous, staged -> current,
    /// previous -> staged.
    pub fn rotated(&self) -> SlotMap {
        SlotMap {
            current: self.staged,
            staged: self.previous,
            previous: self.current,
        }
    }

    /// The exact inverse of `rotated`.
    pub fn rotated_back(&self) -> SlotMap {
        SlotMap {
            current: self.previous,
            staged: self.current,
            previous: self.staged,
        }
    }

    /// (alias name, slot) pairs in the order aliases are repointed.
    pub fn assignments(&self) -> [(&'static str, Slot); 3] {
        [
            ("current", self.current),
            ("staged", self.staged),
            ("previous", self.previous),
        ]
    }
}

impl fmt::Display for SlotMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current -> {}, staged -> {}, previous -> {}",
            self.current, self.staged, self.previous
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(current: &str, staged: &str, previous: &str) -> ObservedAliases {
        ObservedAliases {
            current: current.to_string(),
            staged: staged.to_string(),
            previous: previous.to_string(),
        }
    }

    #[test]
    fn initial_mapping_is_valid() {
        let obs = observed("releases/slot-a", "releases/slot-b", "releases/slot-c");
        assert_eq!(SlotMap::from_observed(&obs).unwrap(), SlotMap::INITIAL);
    }

    #[test]
    fn rotation_cycles_through_all_three_valid_states() {
        let first = SlotMap::INITIAL.rotated();
        let second = first.rotated();
        let third = second.rotated();

        assert_ne!(first, SlotMap::INITIAL);
        assert_ne!(second, first);
        assert_eq!(third, SlotMap::INITIAL);
    }

    #[test]
    fn rotate_back_is_exact_inverse() {
        let rotated = SlotMap::INITIAL.rotated();
        assert_eq!(rotated.rotated_back(), SlotMap::INITIAL);
    }

    #[test]
    fn duplicate_aliases_are_rejected() {
        // The halfway state of an interrupted rotation: current already
        // repointed, staged not yet.
        let obs = observed("releases/slot-b", "releases/slot-b", "releases/slot-c");
        assert!(SlotMap::from_observed(&obs).is_err());
    }

    #[test]
    fn odd_permutations_are_rejected() {
        // All three slots distinct but a transposition, not a rotation:
        // unreachable by any sequence of swaps.
        let obs = observed("releases/slot-b", "releases/slot-a", "releases/slot-c");
        assert!(SlotMap::from_observed(&obs).is_err());
    }

    #[test]
    fn missing_or_foreign_targets_are_rejected() {
        let obs = observed("MISSING", "releases/slot-b", "releases/slot-c");
        assert!(SlotMap::from_observed(&obs).is_err());

        let obs = observed("/etc/passwd", "releases/slot-b", "releases/slot-c");
        assert!(SlotMap::from_observed(&obs).is_err());
    }

    #[test]
    fn trailing_slash_in_readlink_output_is_tolerated() {
        let obs = observed("releases/slot-a/", "releases/slot-b", "releases/slot-c");
        assert_eq!(SlotMap::from_observed(&obs).unwrap(), SlotMap::INITIAL);
    }
}
