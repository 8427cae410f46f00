// Player candidates: positions, costs, predicted scores, and the eligible
// pool preparation that every solver starts from.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Football positions used for formation quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    /// All positions in lineup order (goalkeeper first).
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Parse a position string into a Position enum.
    ///
    /// Accepts the usual fantasy abbreviations case-insensitively:
    /// - "GK", "GKP", "GOALKEEPER"
    /// - "D", "DEF", "DEFENDER"
    /// - "M", "MID", "MIDFIELDER"
    /// - "F", "FW", "FWD", "FORWARD"
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GK" | "GKP" | "GOALKEEPER" => Some(Position::Goalkeeper),
            "D" | "DEF" | "DEFENDER" => Some(Position::Defender),
            "M" | "MID" | "MIDFIELDER" => Some(Position::Midfielder),
            "F" | "FW" | "FWD" | "FORWARD" => Some(Position::Forward),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }

    /// Deterministic ordering index for lineup display.
    pub fn sort_order(&self) -> u8 {
        match self {
            Position::Goalkeeper => 0,
            Position::Defender => 1,
            Position::Midfielder => 2,
            Position::Forward => 3,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

// ---------------------------------------------------------------------------
// PlayerCandidate
// ---------------------------------------------------------------------------

/// A scored player that the optimizer may select.
///
/// `display` carries opaque passthrough fields (name, team, ...) that the
/// optimizer never reads but copies into the returned lineup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCandidate {
    pub id: String,
    pub position: Position,
    /// Cost in currency minor units.
    pub cost: u32,
    /// Forecast fantasy contribution. May be negative.
    pub predicted_score: f64,
    #[serde(default)]
    pub display: BTreeMap<String, String>,
}

impl PlayerCandidate {
    pub fn new(id: impl Into<String>, position: Position, cost: u32, predicted_score: f64) -> Self {
        PlayerCandidate {
            id: id.into(),
            position,
            cost,
            predicted_score,
            display: BTreeMap::new(),
        }
    }

    /// Attach a passthrough display field.
    pub fn with_display(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.display.insert(key.into(), value.into());
        self
    }

    /// Predicted score per unit of cost.
    ///
    /// A zero-cost player has no meaningful ratio; the raw predicted score is
    /// used instead so free picks still rank by what they contribute.
    pub fn value_ratio(&self) -> f64 {
        if self.cost == 0 {
            self.predicted_score
        } else {
            self.predicted_score / self.cost as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Pool preparation
// ---------------------------------------------------------------------------

/// Reduce a raw candidate list to the pool the solvers actually see.
///
/// Drops, in order:
/// 1. players whose id is in `exclusions`
/// 2. players with a non-finite predicted score
/// 3. players whose own cost already exceeds the budget
/// 4. later rows repeating an id already kept
///
/// Input order is preserved; it is the tie-break order for the fallback.
pub fn prepare_pool(
    players: &[PlayerCandidate],
    budget: u32,
    exclusions: &HashSet<String>,
) -> Vec<PlayerCandidate> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(players.len());
    players
        .iter()
        .filter(|p| !exclusions.contains(&p.id))
        .filter(|p| p.predicted_score.is_finite())
        .filter(|p| p.cost <= budget)
        .filter(|&p| seen.insert(p.id.as_str()))
        .cloned()
        .collect()
}

/// Count how many candidates the pool holds at each position.
pub fn position_counts(players: &[PlayerCandidate]) -> [usize; 4] {
    let mut counts = [0usize; 4];
    for p in players {
        counts[p.position.sort_order() as usize] += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
