//! Immutable knobs for one [`KnowledgeRouter`](crate::KnowledgeRouter).

use knoroute_config::{AppConfig, MAX_RETRIES_LIMIT};
use knoroute_core::evidence::FingerprintPolicy;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    /// Documents fetched per source per round
    pub top_k: usize,
    /// Default retry budget when a request does not give one
    pub max_retries: u32,
    pub fingerprint: FingerprintPolicy,
    /// Treat a failing store as empty for the round instead of aborting
    pub degrade_on_store_error: bool,
    /// Overall time limit for one query
    pub deadline: Option<Duration>,
    pub feedback_enabled: bool,
    /// Answers below this confidence do not write insights
    pub feedback_min_confidence: f32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_retries: 3,
            fingerprint: FingerprintPolicy::default(),
            degrade_on_store_error: false,
            deadline: None,
            feedback_enabled: true,
            feedback_min_confidence: 0.0,
        }
    }
}

impl WorkflowSettings {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.min(MAX_RETRIES_LIMIT);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_degraded_stores(mut self, enabled: bool) -> Self {
        self.degrade_on_store_error = enabled;
        self
    }

    pub fn with_feedback(mut self, enabled: bool) -> Self {
        self.feedback_enabled = enabled;
        self
    }

    pub fn with_fingerprint(mut self, policy: FingerprintPolicy) -> Self {
        self.fingerprint = policy;
        self
    }
}

impl From<&AppConfig> for WorkflowSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k.max(1),
            max_retries: config.retrieval.max_retries.min(MAX_RETRIES_LIMIT),
            fingerprint: FingerprintPolicy::from_prefix(config.retrieval.fingerprint_prefix_chars),
            degrade_on_store_error: config.retrieval.degrade_on_store_error,
            deadline: config.retrieval.request_timeout_secs.map(Duration::from_secs),
            feedback_enabled: config.feedback.enabled,
            feedback_min_confidence: config.feedback.min_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config_defaults() {
        let from_config = WorkflowSettings::from(&AppConfig::default());
        assert_eq!(from_config, WorkflowSettings::default());
    }

    #[test]
    fn config_values_flow_through() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 8;
        config.retrieval.max_retries = 9;
        config.retrieval.fingerprint_prefix_chars = Some(100);
        config.retrieval.request_timeout_secs = Some(30);
        config.feedback.enabled = false;

        let settings = WorkflowSettings::from(&config);
        assert_eq!(settings.top_k, 8);
        assert_eq!(settings.max_retries, MAX_RETRIES_LIMIT);
        assert_eq!(settings.fingerprint, FingerprintPolicy::Prefix(100));
        assert_eq!(settings.deadline, Some(Duration::from_secs(30)));
        assert!(!settings.feedback_enabled);
    }

    #[test]
    fn builder_clamps_retries() {
        assert_eq!(WorkflowSettings::default().with_max_retries(50).max_retries, MAX_RETRIES_LIMIT);
        assert_eq!(WorkflowSettings::default().with_top_k(0).top_k, 1);
    }
}
