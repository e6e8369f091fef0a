//! Canonical status values and the security/integrity combiner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalized health status produced by the security and integrity probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Clean,
    Warning,
    Infected,
    #[default]
    Unknown,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Clean, Status::Warning, Status::Infected, Status::Unknown];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Clean => "clean",
            Status::Warning => "warning",
            Status::Infected => "infected",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clean" => Ok(Status::Clean),
            "warning" => Ok(Status::Warning),
            "infected" => Ok(Status::Infected),
            "unknown" | "" => Ok(Status::Unknown),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Merge the security and integrity statuses into the displayed status.
///
/// Infected outranks Warning, Warning outranks Clean, and a single Unknown
/// side does not hide a Clean result from the other side.
pub fn combine(security: Status, integrity: Status) -> Status {
    use Status::*;
    match (security, integrity) {
        (Infected, _) | (_, Infected) => Infected,
        (Warning, _) | (_, Warning) => Warning,
        (Clean, Clean) | (Clean, Unknown) | (Unknown, Clean) => Clean,
        (Unknown, Unknown) => Unknown,
    }
}

/// Raw uptime monitor state as reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Paused,
    Unknown,
    Up,
    SeemsDown,
    Down,
}

impl AvailabilityStatus {
    /// Map an upstream monitor code. Unrecognized codes are `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => AvailabilityStatus::Paused,
            2 => AvailabilityStatus::Up,
            8 => AvailabilityStatus::SeemsDown,
            9 => AvailabilityStatus::Down,
            _ => AvailabilityStatus::Unknown,
        }
    }

    /// Collapse to a comparable state; `None` means indeterminate.
    pub fn normalize(self) -> Option<Reachability> {
        match self {
            AvailabilityStatus::Up => Some(Reachability::Up),
            AvailabilityStatus::SeemsDown | AvailabilityStatus::Down => Some(Reachability::Down),
            AvailabilityStatus::Paused | AvailabilityStatus::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AvailabilityStatus::Paused => "paused",
            AvailabilityStatus::Unknown => "unknown",
            AvailabilityStatus::Up => "up",
            AvailabilityStatus::SeemsDown => "seems_down",
            AvailabilityStatus::Down => "down",
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AvailabilityStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paused" => Ok(AvailabilityStatus::Paused),
            "unknown" => Ok(AvailabilityStatus::Unknown),
            "up" => Ok(AvailabilityStatus::Up),
            "seems_down" => Ok(AvailabilityStatus::SeemsDown),
            "down" => Ok(AvailabilityStatus::Down),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Determinate availability used as the transition baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Up,
    Down,
}

impl Reachability {
    pub fn as_str(self) -> &'static str {
        match self {
            Reachability::Up => "up",
            Reachability::Down => "down",
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Reachability {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Reachability::Up),
            "down" => Ok(Reachability::Down),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized status value: {0:?}")]
pub struct UnknownVariant(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infected_dominates() {
        for other in Status::ALL {
            assert_eq!(combine(Status::Infected, other), Status::Infected);
            assert_eq!(combine(other, Status::Infected), Status::Infected);
        }
    }

    #[test]
    fn warning_outranks_clean() {
        assert_eq!(combine(Status::Warning, Status::Clean), Status::Warning);
        assert_eq!(combine(Status::Clean, Status::Warning), Status::Warning);
        assert_eq!(combine(Status::Warning, Status::Unknown), Status::Warning);
    }

    #[test]
    fn clean_with_unknown_is_clean() {
        assert_eq!(combine(Status::Clean, Status::Clean), Status::Clean);
        assert_eq!(combine(Status::Clean, Status::Unknown), Status::Clean);
        assert_eq!(combine(Status::Unknown, Status::Clean), Status::Clean);
        assert_eq!(combine(Status::Unknown, Status::Unknown), Status::Unknown);
    }

    #[test]
    fn availability_codes_and_normalization() {
        assert_eq!(AvailabilityStatus::from_code(0), AvailabilityStatus::Paused);
        assert_eq!(AvailabilityStatus::from_code(1), AvailabilityStatus::Unknown);
        assert_eq!(AvailabilityStatus::from_code(2), AvailabilityStatus::Up);
        assert_eq!(AvailabilityStatus::from_code(8), AvailabilityStatus::SeemsDown);
        assert_eq!(AvailabilityStatus::from_code(9), AvailabilityStatus::Down);
        assert_eq!(AvailabilityStatus::from_code(42), AvailabilityStatus::Unknown);

        assert_eq!(AvailabilityStatus::SeemsDown.normalize(), Some(Reachability::Down));
        assert_eq!(AvailabilityStatus::Up.normalize(), Some(Reachability::Up));
        assert_eq!(AvailabilityStatus::Paused.normalize(), None);
        assert_eq!(AvailabilityStatus::Unknown.normalize(), None);
    }

    #[test]
    fn parse_stored_values() {
        assert_eq!("Infected".parse::<Status>().unwrap(), Status::Infected);
        assert_eq!("".parse::<Status>().unwrap(), Status::Unknown);
        assert!("compromised".parse::<Status>().is_err());
        assert_eq!("seems_down".parse::<AvailabilityStatus>().unwrap(), AvailabilityStatus::SeemsDown);
    }
}
