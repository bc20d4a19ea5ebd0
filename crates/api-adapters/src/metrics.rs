//! Prometheus counters for moderation and engagement.

use domains::{AppError, PostStatus};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct DecisionLabels {
    status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EngagementLabels {
    action: String,
    outcome: String,
}

pub struct Metrics {
    registry: Registry,
    moderation_decisions: Family<DecisionLabels, Counter>,
    engagement_actions: Family<EngagementLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("inspire_feed");

        let moderation_decisions = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "moderation_decisions",
            "Moderation decisions applied, by resulting status",
            moderation_decisions.clone(),
        );

        let engagement_actions = Family::<EngagementLabels, Counter>::default();
        registry.register(
            "engagement_actions",
            "Like and unlike requests, by outcome",
            engagement_actions.clone(),
        );

        Self {
            registry,
            moderation_decisions,
            engagement_actions,
        }
    }

    pub fn record_decision(&self, status: PostStatus) {
        self.moderation_decisions
            .get_or_create(&DecisionLabels {
                status: status.as_str().to_ascii_lowercase(),
            })
            .inc();
    }

    pub fn record_engagement<T>(&self, action: &str, result: &Result<T, AppError>) {
        self.engagement_actions
            .get_or_create(&EngagementLabels {
                action: action.to_string(),
                outcome: outcome(result).to_string(),
            })
            .inc();
    }

    /// Renders the registry in OpenMetrics text format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

fn outcome<T>(result: &Result<T, AppError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(AppError::Conflict(_)) => "conflict",
        Err(AppError::NotFound(..)) => "not_found",
        Err(AppError::InvalidOperation(_)) => "rejected",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_with_labels() {
        let metrics = Metrics::new();
        metrics.record_decision(PostStatus::Approved);
        metrics.record_decision(PostStatus::Approved);
        metrics.record_engagement::<()>("like", &Err(AppError::Conflict("dup".into())));

        let text = metrics.render().unwrap();
        assert!(text.contains("inspire_feed_moderation_decisions_total{status=\"approved\"} 2"));
        assert!(text.contains("action=\"like\""));
        assert!(text.contains("outcome=\"conflict\""));
        assert!(text.ends_with("# EOF\n"));
    }

    #[test]
    fn outcome_classifies_errors() {
        assert_eq!(outcome::<()>(&Ok(())), "ok");
        assert_eq!(outcome::<()>(&Err(AppError::not_found("post", 1))), "not_found");
        assert_eq!(outcome::<()>(&Err(AppError::InvalidOperation("x".into()))), "rejected");
        assert_eq!(outcome::<()>(&Err(AppError::Unauthenticated)), "error");
    }
}
