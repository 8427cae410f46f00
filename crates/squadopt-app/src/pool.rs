// Player pool loading.
//
// Reads a scored-player CSV with columns
// `id,name,team,position,cost,predicted_score,status`. `name`, `team` and
// `status` may be absent; extra columns are ignored.

use crate::config::Config;
use serde::{Deserialize, Serialize};
use squadopt_core::{PlayerCandidate, Position};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Fitness status reported by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Doubtful,
    Injured,
    Suspended,
    Unavailable,
    /// Any other non-empty status, kept lower-cased.
    Other(String),
}

impl Availability {
    /// Parse a status cell. Blank means available.
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "" | "a" | "available" | "fit" => Availability::Available,
            "d" | "doubtful" => Availability::Doubtful,
            "i" | "injured" => Availability::Injured,
            "s" | "suspended" => Availability::Suspended,
            "u" | "unavailable" => Availability::Unavailable,
            _ => Availability::Other(s),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Availability::Available => "available",
            Availability::Doubtful => "doubtful",
            Availability::Injured => "injured",
            Availability::Suspended => "suspended",
            Availability::Unavailable => "unavailable",
            Availability::Other(s) => s,
        }
    }

    /// Fit unless the status is listed in `unavailable` (lower-cased values).
    pub fn is_fit(&self, unavailable: &[String]) -> bool {
        !unavailable.iter().any(|status| status == self.as_str())
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loaded player: the optimizer candidate plus its availability.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolPlayer {
    pub candidate: PlayerCandidate,
    pub availability: Availability,
}

/// Every player read from the data source, in file order.
#[derive(Debug, Clone, Default)]
pub struct PlayerPool {
    pub players: Vec<PoolPlayer>,
}

impl PlayerPool {
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// All candidates regardless of availability.
    pub fn candidates(&self) -> Vec<PlayerCandidate> {
        self.players.iter().map(|p| p.candidate.clone()).collect()
    }

    /// Candidates whose status is not in `unavailable`.
    pub fn fit_candidates(&self, unavailable: &[String]) -> Vec<PlayerCandidate> {
        self.players
            .iter()
            .filter(|p| p.availability.is_fit(unavailable))
            .map(|p| p.candidate.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV row (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    team: String,
    #[serde(alias = "pos")]
    position: String,
    #[serde(alias = "price")]
    cost: u32,
    #[serde(alias = "score", alias = "points")]
    predicted_score: f64,
    #[serde(default)]
    status: String,
}

// ---------------------------------------------------------------------------
// Reader-based loader (enables testing without temp files)
// ---------------------------------------------------------------------------

/// Parse players from CSV, skipping rows that cannot be used.
pub fn load_players_from_reader<R: Read>(rdr: R) -> Result<Vec<PoolPlayer>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);
    // Surface an unreadable header as an error rather than a skipped row.
    reader.headers()?;

    let mut players: Vec<PoolPlayer> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for result in reader.deserialize::<RawPlayerRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
                continue;
            }
        };

        if raw.id.is_empty() {
            warn!("skipping player row with empty id ('{}')", raw.name);
            continue;
        }
        let Some(position) = Position::from_str_pos(&raw.position) else {
            warn!("skipping player '{}': unknown position '{}'", raw.id, raw.position);
            continue;
        };
        if !raw.predicted_score.is_finite() {
            warn!("skipping player '{}': non-finite predicted score", raw.id);
            continue;
        }
        if !seen.insert(raw.id.clone()) {
            warn!("duplicate player id '{}', keeping the first row", raw.id);
            continue;
        }

        let mut candidate = PlayerCandidate::new(raw.id, position, raw.cost, raw.predicted_score);
        if !raw.name.is_empty() {
            candidate = candidate.with_display("name", raw.name);
        }
        if !raw.team.is_empty() {
            candidate = candidate.with_display("team", raw.team);
        }
        players.push(PoolPlayer {
            candidate,
            availability: Availability::parse(&raw.status),
        });
    }
    Ok(players)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Load the player pool from a CSV file. Zero usable rows is an error.
pub fn load_players(path: &Path) -> Result<PlayerPool, PoolError> {
    let file = std::fs::File::open(path).map_err(|e| PoolError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let players = load_players_from_reader(file).map_err(|e| PoolError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;

    if players.is_empty() {
        return Err(PoolError::Validation(format!(
            "player CSV {} produced zero valid rows",
            path.display()
        )));
    }

    Ok(PlayerPool { players })
}

/// Load the pool named by `[data_paths].players`.
pub fn load_pool(config: &Config) -> Result<PlayerPool, PoolError> {
    load_players(Path::new(&config.data_paths.players))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
