//! Enforcement path resolution: which ordered set of enforcement points the
//! requested traffic must traverse.

use async_trait::async_trait;
use ipnet::IpNet;

use crate::domain::enforcement::{EnforcementKind, EnforcementPoint, EnforcementPointId, Platform};
use crate::domain::request::Environment;
use crate::errors::PathError;

/// Resolves the ordered enforcement path for a request. Implementations must
/// return at least one point for every recognized environment; an empty path
/// is an error, not a valid answer.
#[async_trait]
pub trait EnforcementPathResolver: Send + Sync {
    async fn resolve(
        &self,
        source: &IpNet,
        destination: &IpNet,
        environment: Environment,
    ) -> Result<Vec<EnforcementPoint>, PathError>;
}

/// Built-in resolver: the device set is fully determined by the environment.
/// Production traverses the on-prem edge plus both cloud estates, uat stops
/// at AWS, development stays on-prem.
#[derive(Clone, Debug, Default)]
pub struct StaticPathResolver;

impl StaticPathResolver {
    fn path_for(environment: Environment) -> Vec<EnforcementPoint> {
        match environment {
            Environment::Production => vec![
                edge_firewall("fw-edge-dc1", "DC1 edge firewall", "dc1-dmz"),
                aws_security_group("sg-app-prod", "AWS production app security group", "us-east-1"),
                azure_nsg("nsg-app-prod", "Azure production app NSG", "eastus"),
            ],
            Environment::Uat => vec![
                edge_firewall("fw-edge-dc1", "DC1 edge firewall", "dc1-dmz"),
                aws_security_group("sg-app-uat", "AWS uat app security group", "us-east-1"),
            ],
            Environment::Development => {
                vec![edge_firewall("fw-lab-dc1", "DC1 lab segment firewall", "dc1-lab")]
            }
        }
    }
}

#[async_trait]
impl EnforcementPathResolver for StaticPathResolver {
    async fn resolve(
        &self,
        _source: &IpNet,
        _destination: &IpNet,
        environment: Environment,
    ) -> Result<Vec<EnforcementPoint>, PathError> {
        let path = Self::path_for(environment);
        if path.is_empty() {
            return Err(PathError::EmptyPath { environment });
        }
        Ok(path)
    }
}

fn edge_firewall(id: &str, name: &str, zone: &str) -> EnforcementPoint {
    EnforcementPoint {
        id: EnforcementPointId(id.to_string()),
        name: name.to_string(),
        kind: EnforcementKind::Firewall,
        platform: Platform::Onprem,
        zone: zone.to_string(),
    }
}

fn aws_security_group(id: &str, name: &str, zone: &str) -> EnforcementPoint {
    EnforcementPoint {
        id: EnforcementPointId(id.to_string()),
        name: name.to_string(),
        kind: EnforcementKind::SecurityGroup,
        platform: Platform::Aws,
        zone: zone.to_string(),
    }
}

fn azure_nsg(id: &str, name: &str, zone: &str) -> EnforcementPoint {
    EnforcementPoint {
        id: EnforcementPointId(id.to_string()),
        name: name.to_string(),
        kind: EnforcementKind::Nsg,
        platform: Platform::Azure,
        zone: zone.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use ipnet::IpNet;

    use crate::domain::enforcement::Platform;
    use crate::domain::request::Environment;

    use super::{EnforcementPathResolver, StaticPathResolver};

    fn nets() -> (IpNet, IpNet) {
        (
            "10.100.5.0/24".parse().expect("source"),
            "172.16.20.50/32".parse().expect("destination"),
        )
    }

    #[tokio::test]
    async fn production_path_is_edge_then_aws_then_azure() {
        let (source, destination) = nets();
        let path = StaticPathResolver
            .resolve(&source, &destination, Environment::Production)
            .await
            .expect("production path");

        assert_eq!(path.len(), 3);
        assert_eq!(path[0].platform, Platform::Onprem);
        assert_eq!(path[1].platform, Platform::Aws);
        assert_eq!(path[2].platform, Platform::Azure);
    }

    #[tokio::test]
    async fn uat_path_has_two_hops() {
        let (source, destination) = nets();
        let path = StaticPathResolver
            .resolve(&source, &destination, Environment::Uat)
            .await
            .expect("uat path");

        assert_eq!(path.len(), 2);
        assert_eq!(path[1].platform, Platform::Aws);
    }

    #[tokio::test]
    async fn development_path_is_single_onprem_hop() {
        let (source, destination) = nets();
        let path = StaticPathResolver
            .resolve(&source, &destination, Environment::Development)
            .await
            .expect("development path");

        assert_eq!(path.len(), 1);
        assert_eq!(path[0].platform, Platform::Onprem);
    }
}
