//! Ordered application of generated rules to enforcement points, with
//! progress reporting, per-point timeout and bounded retry, cancellation at
//! point boundaries, and best-effort reverse-order rollback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use changegate_core::config::ExecutorConfig;
use changegate_core::domain::enforcement::EnforcementPointId;
use changegate_core::domain::rule::RuleRecommendation;
use changegate_core::domain::ticket::{ImplementationProgress, PointFailure};

use crate::client::EnforcementClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub point_timeout: Duration,
    pub max_point_retries: u32,
    pub retry_delay: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            point_timeout: Duration::from_millis(config.point_timeout_ms),
            max_point_retries: config.max_point_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from_config(&changegate_core::config::AppConfig::default().executor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImplementOutcome {
    Completed,
    Failed { point: EnforcementPointId, message: String },
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImplementationReport {
    pub applied: Vec<EnforcementPointId>,
    pub outcome: ImplementOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollbackReport {
    pub reverted: Vec<EnforcementPointId>,
    pub failures: Vec<PointFailure>,
    pub cancelled: bool,
}

pub struct ImplementationExecutor {
    client: Arc<dyn EnforcementClient>,
    settings: ExecutorSettings,
}

impl ImplementationExecutor {
    pub fn new(client: Arc<dyn EnforcementClient>, settings: ExecutorSettings) -> Self {
        Self { client, settings }
    }

    /// Apply each recommendation strictly in order. Stops at the first point
    /// whose retries are exhausted, leaving earlier points in place.
    /// Cancellation is honoured only between points, never mid-application.
    pub async fn implement(
        &self,
        recommendations: &[RuleRecommendation],
        progress: &mpsc::Sender<ImplementationProgress>,
        cancel: &watch::Receiver<bool>,
    ) -> ImplementationReport {
        let total = recommendations.len();
        let mut applied = Vec::new();

        for (index, recommendation) in recommendations.iter().enumerate() {
            if *cancel.borrow() {
                let _ = progress
                    .send(ImplementationProgress {
                        step: recommendation.point.name.clone(),
                        percent: percent(index, total),
                        message: "cancellation requested; stopping at point boundary".to_string(),
                    })
                    .await;
                return ImplementationReport { applied, outcome: ImplementOutcome::Cancelled };
            }

            match self.call_with_retry(recommendation, Operation::Apply).await {
                Ok(()) => {
                    applied.push(recommendation.point.id.clone());
                    let _ = progress
                        .send(ImplementationProgress {
                            step: recommendation.point.name.clone(),
                            percent: percent(index + 1, total),
                            message: format!(
                                "applied rule to {} ({}/{} points)",
                                recommendation.point.name,
                                index + 1,
                                total
                            ),
                        })
                        .await;
                }
                Err(message) => {
                    let _ = progress
                        .send(ImplementationProgress {
                            step: recommendation.point.name.clone(),
                            percent: percent(index, total),
                            message: format!(
                                "failed to apply rule to {}: {}",
                                recommendation.point.name, message
                            ),
                        })
                        .await;
                    return ImplementationReport {
                        applied,
                        outcome: ImplementOutcome::Failed {
                            point: recommendation.point.id.clone(),
                            message,
                        },
                    };
                }
            }
        }

        ImplementationReport { applied, outcome: ImplementOutcome::Completed }
    }

    /// Remove applied rules in exactly the reverse of application order.
    /// Never-applied points are skipped (a no-op, not an error) and a point
    /// that cannot be reverted is reported without aborting the remainder.
    pub async fn rollback(
        &self,
        recommendations: &[RuleRecommendation],
        applied: &[EnforcementPointId],
        progress: &mpsc::Sender<ImplementationProgress>,
        cancel: &watch::Receiver<bool>,
    ) -> RollbackReport {
        let to_revert: Vec<&RuleRecommendation> = recommendations
            .iter()
            .rev()
            .filter(|recommendation| applied.contains(&recommendation.point.id))
            .collect();
        let total = to_revert.len();

        let mut reverted = Vec::new();
        let mut failures = Vec::new();

        for (index, recommendation) in to_revert.into_iter().enumerate() {
            if *cancel.borrow() {
                return RollbackReport { reverted, failures, cancelled: true };
            }

            match self.call_with_retry(recommendation, Operation::Remove).await {
                Ok(()) => {
                    reverted.push(recommendation.point.id.clone());
                    let _ = progress
                        .send(ImplementationProgress {
                            step: recommendation.point.name.clone(),
                            percent: percent(index + 1, total),
                            message: format!(
                                "removed rule from {} ({}/{} points)",
                                recommendation.point.name,
                                index + 1,
                                total
                            ),
                        })
                        .await;
                }
                Err(message) => {
                    failures.push(PointFailure {
                        point_id: recommendation.point.id.clone(),
                        message: message.clone(),
                    });
                    let _ = progress
                        .send(ImplementationProgress {
                            step: recommendation.point.name.clone(),
                            percent: percent(index + 1, total),
                            message: format!(
                                "failed to remove rule from {}: {}",
                                recommendation.point.name, message
                            ),
                        })
                        .await;
                }
            }
        }

        RollbackReport { reverted, failures, cancelled: false }
    }

    async fn call_with_retry(
        &self,
        recommendation: &RuleRecommendation,
        operation: Operation,
    ) -> Result<(), String> {
        let mut attempt = 0u32;
        loop {
            let call = async {
                match operation {
                    Operation::Apply => self.client.apply_rule(recommendation).await,
                    Operation::Remove => self.client.remove_rule(recommendation).await,
                }
            };
            let result = match tokio::time::timeout(self.settings.point_timeout, call).await {
                Ok(result) => result.map_err(|error| error.to_string()),
                Err(_) => {
                    Err(format!("timed out after {}ms", self.settings.point_timeout.as_millis()))
                }
            };

            match result {
                Ok(()) => return Ok(()),
                Err(_) if attempt < self.settings.max_point_retries => {
                    attempt += 1;
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(message) => return Err(message),
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Operation {
    Apply,
    Remove,
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ipnet::IpNet;
    use tokio::sync::{mpsc, watch};

    use changegate_core::domain::enforcement::EnforcementPointId;
    use changegate_core::domain::request::{Environment, Protocol, RuleRequest};
    use changegate_core::domain::rule::RuleRecommendation;
    use changegate_core::pathing::{EnforcementPathResolver, StaticPathResolver};
    use changegate_core::syntax::RuleSyntaxGenerator;

    use crate::client::{ClientCall, ScriptedEnforcementClient};

    use super::{ExecutorSettings, ImplementOutcome, ImplementationExecutor};

    fn request() -> RuleRequest {
        RuleRequest {
            source: "10.100.5.0/24".parse::<IpNet>().expect("source"),
            destination: "172.16.20.50/32".parse::<IpNet>().expect("destination"),
            port: 443,
            protocol: Protocol::Tcp,
            environment: Environment::Production,
            description: String::new(),
            justification: String::new(),
        }
    }

    async fn production_recommendations() -> Vec<RuleRecommendation> {
        let request = request();
        let path = StaticPathResolver
            .resolve(&request.source, &request.destination, request.environment)
            .await
            .expect("production path");
        path.iter()
            .map(|point| RuleSyntaxGenerator.generate(&request, point).expect("syntax"))
            .collect()
    }

    fn settings() -> ExecutorSettings {
        ExecutorSettings {
            point_timeout: Duration::from_millis(500),
            max_point_retries: 0,
            retry_delay: Duration::from_millis(1),
        }
    }

    fn channels() -> (
        mpsc::Sender<changegate_core::domain::ticket::ImplementationProgress>,
        mpsc::Receiver<changegate_core::domain::ticket::ImplementationProgress>,
        watch::Sender<bool>,
        watch::Receiver<bool>,
    ) {
        let (progress_tx, progress_rx) = mpsc::channel(32);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        (progress_tx, progress_rx, cancel_tx, cancel_rx)
    }

    #[tokio::test]
    async fn applies_points_in_order_and_finishes_at_one_hundred_percent() {
        let recommendations = production_recommendations().await;
        let client = Arc::new(ScriptedEnforcementClient::default());
        let executor = ImplementationExecutor::new(client.clone(), settings());
        let (progress_tx, mut progress_rx, _cancel_tx, cancel_rx) = channels();

        let report = executor.implement(&recommendations, &progress_tx, &cancel_rx).await;
        drop(progress_tx);

        assert_eq!(report.outcome, ImplementOutcome::Completed);
        assert_eq!(
            report.applied,
            vec![
                EnforcementPointId("fw-edge-dc1".to_string()),
                EnforcementPointId("sg-app-prod".to_string()),
                EnforcementPointId("nsg-app-prod".to_string()),
            ]
        );

        let mut updates = Vec::new();
        while let Some(update) = progress_rx.recv().await {
            updates.push(update);
        }
        assert_eq!(updates.len(), 3);
        assert_eq!(updates.last().map(|u| u.percent), Some(100));
    }

    #[tokio::test]
    async fn failure_halts_the_sequence_and_preserves_earlier_points() {
        let recommendations = production_recommendations().await;
        let client = Arc::new(ScriptedEnforcementClient::default().fail_apply_at("sg-app-prod"));
        let executor = ImplementationExecutor::new(client.clone(), settings());
        let (progress_tx, _progress_rx, _cancel_tx, cancel_rx) = channels();

        let report = executor.implement(&recommendations, &progress_tx, &cancel_rx).await;

        assert_eq!(report.applied, vec![EnforcementPointId("fw-edge-dc1".to_string())]);
        assert!(matches!(
            report.outcome,
            ImplementOutcome::Failed { ref point, .. } if point.0 == "sg-app-prod"
        ));
        // The third point is never attempted.
        assert_eq!(
            client.calls(),
            vec![
                ClientCall::Apply("fw-edge-dc1".to_string()),
                ClientCall::Apply("sg-app-prod".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn rollback_reverses_application_order_and_skips_unapplied_points() {
        let recommendations = production_recommendations().await;
        let client = Arc::new(ScriptedEnforcementClient::default());
        let executor = ImplementationExecutor::new(client.clone(), settings());
        let (progress_tx, _progress_rx, _cancel_tx, cancel_rx) = channels();

        // Only the first two points were ever applied.
        let applied = vec![
            EnforcementPointId("fw-edge-dc1".to_string()),
            EnforcementPointId("sg-app-prod".to_string()),
        ];
        let report = executor.rollback(&recommendations, &applied, &progress_tx, &cancel_rx).await;

        assert_eq!(
            report.reverted,
            vec![
                EnforcementPointId("sg-app-prod".to_string()),
                EnforcementPointId("fw-edge-dc1".to_string()),
            ]
        );
        assert!(report.failures.is_empty());
        assert_eq!(
            client.calls(),
            vec![
                ClientCall::Remove("sg-app-prod".to_string()),
                ClientCall::Remove("fw-edge-dc1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn rollback_of_nothing_applied_is_a_no_op() {
        let recommendations = production_recommendations().await;
        let client = Arc::new(ScriptedEnforcementClient::default());
        let executor = ImplementationExecutor::new(client.clone(), settings());
        let (progress_tx, _progress_rx, _cancel_tx, cancel_rx) = channels();

        let report = executor.rollback(&recommendations, &[], &progress_tx, &cancel_rx).await;

        assert!(report.reverted.is_empty());
        assert!(report.failures.is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn rollback_continues_past_points_that_fail_to_revert() {
        let recommendations = production_recommendations().await;
        let client = Arc::new(ScriptedEnforcementClient::default().fail_remove_at("sg-app-prod"));
        let executor = ImplementationExecutor::new(client.clone(), settings());
        let (progress_tx, _progress_rx, _cancel_tx, cancel_rx) = channels();

        let applied = vec![
            EnforcementPointId("fw-edge-dc1".to_string()),
            EnforcementPointId("sg-app-prod".to_string()),
            EnforcementPointId("nsg-app-prod".to_string()),
        ];
        let report = executor.rollback(&recommendations, &applied, &progress_tx, &cancel_rx).await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].point_id.0, "sg-app-prod");
        // The remaining point is still reverted after the failure.
        assert_eq!(
            report.reverted,
            vec![
                EnforcementPointId("nsg-app-prod".to_string()),
                EnforcementPointId("fw-edge-dc1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn per_point_timeout_counts_as_a_point_failure() {
        let recommendations = production_recommendations().await;
        let client =
            Arc::new(ScriptedEnforcementClient::default().with_delay(Duration::from_millis(100)));
        let executor = ImplementationExecutor::new(
            client,
            ExecutorSettings {
                point_timeout: Duration::from_millis(10),
                max_point_retries: 0,
                retry_delay: Duration::from_millis(1),
            },
        );
        let (progress_tx, _progress_rx, _cancel_tx, cancel_rx) = channels();

        let report = executor.implement(&recommendations, &progress_tx, &cancel_rx).await;

        assert!(report.applied.is_empty());
        assert!(matches!(
            report.outcome,
            ImplementOutcome::Failed { ref message, .. } if message.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn retries_are_bounded_per_point() {
        let recommendations = production_recommendations().await;
        let client = Arc::new(ScriptedEnforcementClient::default().fail_apply_at("fw-edge-dc1"));
        let executor = ImplementationExecutor::new(
            client.clone(),
            ExecutorSettings {
                point_timeout: Duration::from_millis(500),
                max_point_retries: 2,
                retry_delay: Duration::from_millis(1),
            },
        );
        let (progress_tx, _progress_rx, _cancel_tx, cancel_rx) = channels();

        let report = executor.implement(&recommendations, &progress_tx, &cancel_rx).await;

        assert!(matches!(report.outcome, ImplementOutcome::Failed { .. }));
        // Initial attempt plus two retries, then the sequence stops.
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn cancellation_takes_effect_only_at_point_boundaries() {
        let recommendations = production_recommendations().await;
        let client =
            Arc::new(ScriptedEnforcementClient::default().with_delay(Duration::from_millis(30)));
        let executor = ImplementationExecutor::new(client.clone(), settings());
        let (progress_tx, mut progress_rx, cancel_tx, cancel_rx) = channels();

        let canceller = tokio::spawn(async move {
            // Cancel as soon as the first point reports progress.
            let _ = progress_rx.recv().await;
            let _ = cancel_tx.send(true);
            progress_rx
        });

        let report = executor.implement(&recommendations, &progress_tx, &cancel_rx).await;
        let _ = canceller.await;

        assert_eq!(report.outcome, ImplementOutcome::Cancelled);
        // At least the first point completed; the cancellation never
        // interrupted a point mid-application.
        assert!(!report.applied.is_empty());
        assert!(report.applied.len() < recommendations.len());
        assert_eq!(client.calls().len(), report.applied.len());
    }
}
