//! The closed set of supported analytics providers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifies which analytics service a configuration block or snapshot
/// belongs to.
///
/// The set is closed and known at build time, so collector construction
/// dispatches by matching on this enum rather than through runtime trait
/// objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Error-tracking service (Sentry).
    Sentry,
    /// Session-replay / behavioral insights service (Microsoft Clarity).
    Clarity,
    /// Mobile crash / ANR monitoring service (Embrace).
    Embrace,
    /// Mobile app-analytics service.
    AppMetric,
}

impl ProviderKind {
    /// All supported providers, in a stable order.
    pub const ALL: [Self; 4] = [Self::Sentry, Self::Clarity, Self::Embrace, Self::AppMetric];

    /// The wire-format tag for this provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sentry => "sentry",
            Self::Clarity => "clarity",
            Self::Embrace => "embrace",
            Self::AppMetric => "appmetric",
        }
    }

    /// The column holding this provider's latest snapshot on the project
    /// record.
    #[must_use]
    pub const fn stats_column(self) -> &'static str {
        match self {
            Self::Sentry => "sentry_stats",
            Self::Clarity => "clarity_stats",
            Self::Embrace => "embrace_stats",
            Self::AppMetric => "app_metric_stats",
        }
    }

}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentry" => Ok(Self::Sentry),
            "clarity" => Ok(Self::Clarity),
            "embrace" => Ok(Self::Embrace),
            "appmetric" => Ok(Self::AppMetric),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Error returned when a provider tag string is not in the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider tag: {0}")]
pub struct UnknownProvider(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_from_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = "newrelic".parse::<ProviderKind>();
        assert_eq!(err, Err(UnknownProvider("newrelic".to_string())));
    }

    #[test]
    fn serde_uses_lowercase_tags() {
        let json = serde_json::to_string(&ProviderKind::AppMetric).ok();
        assert_eq!(json.as_deref(), Some("\"appmetric\""));

        let parsed: Result<ProviderKind, _> = serde_json::from_str("\"clarity\"");
        assert_eq!(parsed.ok(), Some(ProviderKind::Clarity));
    }

    #[test]
    fn stats_columns_are_distinct() {
        let mut columns: Vec<&str> = ProviderKind::ALL
            .iter()
            .map(|k| k.stats_column())
            .collect();
        columns.sort_unstable();
        columns.dedup();
        assert_eq!(columns.len(), 4);
    }
}
