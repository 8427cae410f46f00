// Formations: named positional quotas for an eleven-player lineup.
//
// The goalkeeper count is always 1. Defender/midfielder/forward quotas are
// static configuration data; the enumeration order of a formation list is
// the tie-break order used by the sweep.

use crate::player::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of players in a full lineup.
pub const LINEUP_SIZE: usize = 11;

/// Goalkeepers per lineup. Never configurable.
pub const GOALKEEPERS: usize = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormationError {
    #[error("formation tag `{0}` must look like D-M-F (e.g. 4-4-2)")]
    MalformedTag(String),

    #[error("formation `{tag}` has {total} players, expected {expected}")]
    WrongTotal {
        tag: String,
        total: usize,
        expected: usize,
    },
}

// ---------------------------------------------------------------------------
// Formation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Formation {
    pub tag: String,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl Formation {
    /// Build a full formation, rejecting quotas that do not add up to
    /// [`LINEUP_SIZE`] with the goalkeeper.
    pub fn new(
        tag: impl Into<String>,
        defenders: usize,
        midfielders: usize,
        forwards: usize,
    ) -> Result<Self, FormationError> {
        let formation = Formation::partial(tag, defenders, midfielders, forwards);
        let total = formation.squad_size();
        if total != LINEUP_SIZE {
            return Err(FormationError::WrongTotal {
                tag: formation.tag,
                total,
                expected: LINEUP_SIZE,
            });
        }
        Ok(formation)
    }

    /// Build a formation without the eleven-player check.
    ///
    /// Used for sub-squad problems (e.g. picking a goalkeeper and a back
    /// four); every solver honors whatever total the quotas imply.
    pub fn partial(
        tag: impl Into<String>,
        defenders: usize,
        midfielders: usize,
        forwards: usize,
    ) -> Self {
        Formation {
            tag: tag.into(),
            defenders,
            midfielders,
            forwards,
        }
    }

    /// Parse a tag such as "4-4-2" into a full formation.
    pub fn parse(tag: &str) -> Result<Self, FormationError> {
        let trimmed = tag.trim();
        let parts: Vec<&str> = trimmed.split('-').collect();
        if parts.len() != 3 {
            return Err(FormationError::MalformedTag(tag.to_string()));
        }
        let mut counts = [0usize; 3];
        for (slot, part) in counts.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse::<usize>()
                .map_err(|_| FormationError::MalformedTag(tag.to_string()))?;
        }
        Formation::new(trimmed, counts[0], counts[1], counts[2])
    }

    /// Required number of players at `position`.
    pub fn quota(&self, position: Position) -> usize {
        match position {
            Position::Goalkeeper => GOALKEEPERS,
            Position::Defender => self.defenders,
            Position::Midfielder => self.midfielders,
            Position::Forward => self.forwards,
        }
    }

    /// Total players this formation selects (11 for every full formation).
    pub fn squad_size(&self) -> usize {
        GOALKEEPERS + self.defenders + self.midfielders + self.forwards
    }
}

impl fmt::Display for Formation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}

/// The closed set of formations, in enumeration order.
pub fn standard_formations() -> Vec<Formation> {
    [
        ("4-4-2", 4, 4, 2),
        ("4-3-3", 4, 3, 3),
        ("3-5-2", 3, 5, 2),
        ("3-4-3", 3, 4, 3),
        ("5-3-2", 5, 3, 2),
        ("5-4-1", 5, 4, 1),
        ("4-5-1", 4, 5, 1),
    ]
    .into_iter()
    .map(|(tag, d, m, f)| Formation::partial(tag, d, m, f))
    .collect()
}

/// Look up a formation by tag in an ordered list.
pub fn find<'a>(formations: &'a [Formation], tag: &str) -> Option<&'a Formation> {
    let tag = tag.trim();
    formations.iter().find(|f| f.tag == tag)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
