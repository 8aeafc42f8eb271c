//! The asynchronous I/O boundary between the executor and real enforcement
//! points. Tests inject zero-delay, delayed, or failing implementations.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use changegate_core::domain::rule::RuleRecommendation;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EnforcementError {
    #[error("device rejected change: {0}")]
    Device(String),
    #[error("device unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait EnforcementClient: Send + Sync {
    async fn apply_rule(&self, recommendation: &RuleRecommendation)
        -> Result<(), EnforcementError>;

    async fn remove_rule(
        &self,
        recommendation: &RuleRecommendation,
    ) -> Result<(), EnforcementError>;
}

/// Zero-delay client that accepts every change. Stands in for real device
/// transports in demos and the CLI.
#[derive(Clone, Debug, Default)]
pub struct InstantEnforcementClient;

#[async_trait]
impl EnforcementClient for InstantEnforcementClient {
    async fn apply_rule(&self, _recommendation: &RuleRecommendation) -> Result<(), EnforcementError> {
        Ok(())
    }

    async fn remove_rule(
        &self,
        _recommendation: &RuleRecommendation,
    ) -> Result<(), EnforcementError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCall {
    Apply(String),
    Remove(String),
}

/// Test client with scripted per-point failures, an optional per-call delay,
/// and a recorded call log.
#[derive(Debug, Default)]
pub struct ScriptedEnforcementClient {
    fail_apply: HashSet<String>,
    fail_remove: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ClientCall>>,
}

impl ScriptedEnforcementClient {
    pub fn fail_apply_at(mut self, point_id: &str) -> Self {
        self.fail_apply.insert(point_id.to_string());
        self
    }

    pub fn fail_remove_at(mut self, point_id: &str) -> Self {
        self.fail_remove.insert(point_id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, call: ClientCall) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

#[async_trait]
impl EnforcementClient for ScriptedEnforcementClient {
    async fn apply_rule(
        &self,
        recommendation: &RuleRecommendation,
    ) -> Result<(), EnforcementError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let point_id = recommendation.point.id.0.clone();
        self.record(ClientCall::Apply(point_id.clone()));
        if self.fail_apply.contains(&point_id) {
            return Err(EnforcementError::Device(format!("scripted apply failure at {point_id}")));
        }
        Ok(())
    }

    async fn remove_rule(
        &self,
        recommendation: &RuleRecommendation,
    ) -> Result<(), EnforcementError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let point_id = recommendation.point.id.0.clone();
        self.record(ClientCall::Remove(point_id.clone()));
        if self.fail_remove.contains(&point_id) {
            return Err(EnforcementError::Device(format!("scripted remove failure at {point_id}")));
        }
        Ok(())
    }
}
