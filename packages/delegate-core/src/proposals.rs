//! Governance proposal filters.
//!
//! A deployment picks one canonical [`ProposalFilter`]; counts for the two
//! filters are never combined.

use core::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// A proposal as listed by the governance indexer (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(deserialize_with = "timestamp")]
    pub start_timestamp: u64,
    #[serde(deserialize_with = "timestamp")]
    pub end_timestamp: u64,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub executed_at_timestamp: Option<u64>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub canceled_at_timestamp: Option<u64>,
}

impl Proposal {
    fn is_finalized(&self) -> bool {
        self.executed_at_timestamp.is_some() || self.canceled_at_timestamp.is_some()
    }

    /// Voting window is open at `now`.
    pub fn is_active(&self, now: u64) -> bool {
        !self.is_finalized() && self.start_timestamp <= now && now < self.end_timestamp
    }

    /// Voting closed but the proposal was neither executed nor canceled.
    pub fn is_queued(&self, now: u64) -> bool {
        !self.is_finalized() && self.end_timestamp < now
    }

    pub fn matches(&self, filter: ProposalFilter, now: u64) -> bool {
        match filter {
            ProposalFilter::Active => self.is_active(now),
            ProposalFilter::Queued => self.is_queued(now),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalFilter {
    #[default]
    Active,
    Queued,
}

impl fmt::Display for ProposalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Queued => f.write_str("queued"),
        }
    }
}

impl FromStr for ProposalFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "queued" => Ok(Self::Queued),
            other => Err(format!("unknown proposal filter: {other}")),
        }
    }
}

pub fn count_proposals(proposals: &[Proposal], filter: ProposalFilter, now: u64) -> u64 {
    proposals.iter().filter(|p| p.matches(filter, now)).count() as u64
}

/// Indexers serialize bigint timestamps as strings; accept both forms.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Number(u64),
    Text(String),
}

impl RawTimestamp {
    fn into_secs<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid timestamp: {s}"))),
        }
    }
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    RawTimestamp::deserialize(deserializer)?.into_secs()
}

fn optional_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<RawTimestamp>::deserialize(deserializer)?
        .map(RawTimestamp::into_secs)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(start: u64, end: u64) -> Proposal {
        Proposal {
            start_timestamp: start,
            end_timestamp: end,
            executed_at_timestamp: None,
            canceled_at_timestamp: None,
        }
    }

    #[test]
    fn active_then_queued() {
        let proposals = vec![open(100, 200)];
        assert_eq!(count_proposals(&proposals, ProposalFilter::Active, 150), 1);
        assert_eq!(count_proposals(&proposals, ProposalFilter::Queued, 150), 0);

        assert_eq!(count_proposals(&proposals, ProposalFilter::Active, 250), 0);
        assert_eq!(count_proposals(&proposals, ProposalFilter::Queued, 250), 1);
    }

    #[test]
    fn window_boundaries() {
        let p = open(100, 200);
        assert!(p.is_active(100));
        assert!(!p.is_active(99));
        assert!(!p.is_active(200));
        // At exactly `end` the proposal is neither active nor queued.
        assert!(!p.is_queued(200));
        assert!(p.is_queued(201));
    }

    #[test]
    fn finalized_proposals_never_count() {
        let executed = Proposal {
            executed_at_timestamp: Some(300),
            ..open(100, 200)
        };
        let canceled = Proposal {
            canceled_at_timestamp: Some(150),
            ..open(100, 200)
        };
        let proposals = vec![executed, canceled];
        for now in [150, 250, 400] {
            assert_eq!(count_proposals(&proposals, ProposalFilter::Active, now), 0);
            assert_eq!(count_proposals(&proposals, ProposalFilter::Queued, now), 0);
        }
    }

    #[test]
    fn parses_indexer_json() {
        let json = r#"[
            {"id": "1", "startTimestamp": "1700000000", "endTimestamp": "1700600000",
             "executedAtTimestamp": null, "canceledAtTimestamp": null},
            {"id": "2", "startTimestamp": 1700000000, "endTimestamp": 1700600000,
             "executedAtTimestamp": "1700700000"},
            {"id": "3", "startTimestamp": 1600000000, "endTimestamp": 1600600000}
        ]"#;
        let proposals: Vec<Proposal> = serde_json::from_str(json).unwrap();
        assert_eq!(proposals.len(), 3);
        assert_eq!(proposals[0].start_timestamp, 1_700_000_000);
        assert_eq!(proposals[1].executed_at_timestamp, Some(1_700_700_000));
        assert_eq!(proposals[2].canceled_at_timestamp, None);

        let now = 1_700_300_000;
        assert_eq!(count_proposals(&proposals, ProposalFilter::Active, now), 1);
        assert_eq!(count_proposals(&proposals, ProposalFilter::Queued, now), 1);
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let json = r#"{"startTimestamp": "soon", "endTimestamp": 1}"#;
        assert!(serde_json::from_str::<Proposal>(json).is_err());
    }

    #[test]
    fn filter_from_str() {
        assert_eq!("Active".parse::<ProposalFilter>(), Ok(ProposalFilter::Active));
        assert_eq!("queued".parse::<ProposalFilter>(), Ok(ProposalFilter::Queued));
        assert!("open".parse::<ProposalFilter>().is_err());
    }
}
