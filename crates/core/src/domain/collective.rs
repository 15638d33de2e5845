use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectiveId(pub i64);

impl fmt::Display for CollectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collective {
    pub id: CollectiveId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Membership record as exposed by the membership directory. Industry and
/// state are carried for matching; risk scoring only reads age and conditions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: MemberId,
    pub collective_id: CollectiveId,
    pub age_range: Option<String>,
    pub chronic_conditions: Option<String>,
    pub industry: Option<String>,
    pub state: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBracket {
    From18To24,
    From25To34,
    From35To44,
    From45To54,
    From55To64,
    SixtyFivePlus,
    Unknown,
}

impl AgeBracket {
    /// Accepts `25-34`, `25–34` and `25—34` spellings. Anything else is `Unknown`.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return Self::Unknown;
        };
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| if matches!(ch, '\u{2013}' | '\u{2014}') { '-' } else { ch })
            .collect();

        match normalized.as_str() {
            "18-24" => Self::From18To24,
            "25-34" => Self::From25To34,
            "35-44" => Self::From35To44,
            "45-54" => Self::From45To54,
            "55-64" => Self::From55To64,
            "65+" => Self::SixtyFivePlus,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::From18To24 => "18-24",
            Self::From25To34 => "25-34",
            Self::From35To44 => "35-44",
            Self::From45To54 => "45-54",
            Self::From55To64 => "55-64",
            Self::SixtyFivePlus => "65+",
            Self::Unknown => "unknown",
        }
    }
}

/// Number of non-blank entries in a comma-delimited condition list.
pub fn chronic_condition_count(conditions: Option<&str>) -> u32 {
    conditions
        .map(|list| list.split(',').filter(|part| !part.trim().is_empty()).count() as u32)
        .unwrap_or(0)
}
