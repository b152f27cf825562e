//! Structured event recording for policy operations.
//!
//! Every resolution and store mutation is recorded as an
//! operation/activity pair through the `log` facade, with severities chosen
//! per activity. Hosts route these like any other structured log records.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub(crate) enum PolicyOperation {
    Get,
    Set,
    Drop,
}

impl PolicyOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "policy.get",
            Self::Set => "policy.set",
            Self::Drop => "policy.drop",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PolicyActivity {
    Hit,
    Miss,
    StaleServed,
    Generated,
    Timeout,
    Inserted,
    Dropped,
    Error,
}

impl PolicyActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "policy.hit",
            Self::Miss => "policy.miss",
            Self::StaleServed => "policy.stale_served",
            Self::Generated => "policy.generated",
            Self::Timeout => "policy.timeout",
            Self::Inserted => "policy.inserted",
            Self::Dropped => "policy.dropped",
            Self::Error => "policy.error",
        }
    }

    pub(crate) fn level(self) -> log::Level {
        match self {
            Self::Hit | Self::Miss => log::Level::Debug,
            Self::StaleServed | Self::Generated | Self::Timeout | Self::Inserted | Self::Dropped => log::Level::Info,
            Self::Error => log::Level::Error,
        }
    }
}

pub(crate) fn record(segment: &str, operation: PolicyOperation, activity: PolicyActivity, elapsed: Duration) {
    log::log!(
        activity.level(),
        "{operation} {activity} segment={segment} elapsed_ms={elapsed}",
        operation = operation.as_str(),
        activity = activity.as_str(),
        elapsed = elapsed.as_millis(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_are_dotted() {
        assert_eq!(PolicyOperation::Get.as_str(), "policy.get");
        assert_eq!(PolicyOperation::Set.as_str(), "policy.set");
        assert_eq!(PolicyOperation::Drop.as_str(), "policy.drop");
    }

    #[test]
    fn activity_names_are_dotted() {
        assert_eq!(PolicyActivity::Hit.as_str(), "policy.hit");
        assert_eq!(PolicyActivity::Miss.as_str(), "policy.miss");
        assert_eq!(PolicyActivity::StaleServed.as_str(), "policy.stale_served");
        assert_eq!(PolicyActivity::Generated.as_str(), "policy.generated");
        assert_eq!(PolicyActivity::Timeout.as_str(), "policy.timeout");
        assert_eq!(PolicyActivity::Inserted.as_str(), "policy.inserted");
        assert_eq!(PolicyActivity::Dropped.as_str(), "policy.dropped");
        assert_eq!(PolicyActivity::Error.as_str(), "policy.error");
    }

    #[test]
    fn severities_escalate_with_impact() {
        assert_eq!(PolicyActivity::Hit.level(), log::Level::Debug);
        assert_eq!(PolicyActivity::Miss.level(), log::Level::Debug);
        assert_eq!(PolicyActivity::StaleServed.level(), log::Level::Info);
        assert_eq!(PolicyActivity::Timeout.level(), log::Level::Info);
        assert_eq!(PolicyActivity::Error.level(), log::Level::Error);
    }
}
