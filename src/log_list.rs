// src/log_list.rs
//
// Log Directory Loader (component B): fetches and filters the master CT
// log list into the set of logs we should monitor.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::fetcher::Fetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDescriptor {
    pub description: String,
    pub url: String,
    pub temporal_interval: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl LogDescriptor {
    /// Base URL with a trailing `/`, so endpoint paths can be appended
    /// without a separate join step.
    pub fn base_url(&self) -> String {
        if self.url.ends_with('/') {
            self.url.clone()
        } else {
            format!("{}/", self.url)
        }
    }

    pub fn is_temporally_current(&self, now: DateTime<Utc>) -> bool {
        match &self.temporal_interval {
            None => true,
            Some((start, end)) => *start <= now && now < *end,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLogList {
    #[serde(default)]
    logs: Vec<RawLogDescriptor>,
    #[serde(default)]
    operators: Vec<RawOperator>,
}

#[derive(Debug, Deserialize)]
struct RawOperator {
    #[serde(default)]
    logs: Vec<RawLogDescriptor>,
}

#[derive(Debug, Deserialize)]
struct RawLogDescriptor {
    description: String,
    url: String,
    #[serde(default)]
    state: serde_json::Value,
    #[serde(default)]
    temporal_interval: Option<RawTemporalInterval>,
}

#[derive(Debug, Deserialize)]
struct RawTemporalInterval {
    start_inclusive: String,
    end_exclusive: String,
}

pub struct LogListLoader {
    fetcher: Fetcher,
}

impl LogListLoader {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub async fn load(&self, url: &str, include_readonly: bool) -> Vec<LogDescriptor> {
        let body = match self.fetcher.fetch(url).await {
            Some(resp) => match resp.text().await {
                Ok(text) => text,
                Err(err) => {
                    warn!(url, %err, "failed to read log list response body");
                    return Vec::new();
                }
            },
            None => {
                warn!(url, "failed to fetch log list");
                return Vec::new();
            }
        };

        let raw: RawLogList = match serde_json::from_str(&body) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(url, %err, "malformed log list JSON");
                return Vec::new();
            }
        };

        let mut all_raw = raw.logs;
        for operator in raw.operators {
            all_raw.extend(operator.logs);
        }

        all_raw
            .into_iter()
            .filter(|raw| is_usable(raw, include_readonly))
            .map(to_descriptor)
            .collect()
    }
}

/// A log is always included when its state is `usable`. When
/// `include_readonly` is set, a `readonly` state is accepted too — the
/// teacher's own log-state model carries this distinction, spec.md
/// doesn't forbid it, and it defaults to `false` to match spec.md's
/// literal "usable only" filter.
fn is_usable(raw: &RawLogDescriptor, include_readonly: bool) -> bool {
    match &raw.state {
        serde_json::Value::Object(map) => {
            map.contains_key("usable") || (include_readonly && map.contains_key("readonly"))
        }
        _ => false,
    }
}

fn to_descriptor(raw: RawLogDescriptor) -> LogDescriptor {
    let temporal_interval = raw.temporal_interval.and_then(|interval| {
        let start = interval.start_inclusive.parse::<DateTime<Utc>>();
        let end = interval.end_exclusive.parse::<DateTime<Utc>>();
        match (start, end) {
            (Ok(start), Ok(end)) => Some((start, end)),
            _ => {
                warn!(
                    log = raw.description.as_str(),
                    "unparseable temporal_interval, keeping descriptor without it"
                );
                None
            }
        }
    });

    LogDescriptor {
        description: raw.description,
        url: raw.url,
        temporal_interval,
    }
}

/// Filters an already-loaded descriptor set down to those that are
/// temporally current right now. Kept separate from `load` so tests can
/// exercise filtering without a clock dependency baked into parsing.
pub fn filter_current(descriptors: Vec<LogDescriptor>, now: DateTime<Utc>) -> Vec<LogDescriptor> {
    descriptors
        .into_iter()
        .filter(|d| d.is_temporally_current(now))
        .collect()
}
