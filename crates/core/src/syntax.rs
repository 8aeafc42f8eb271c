//! Platform-specific rule rendering.
//!
//! Generation is pure and deterministic: the same request and enforcement
//! point always produce the same syntax text, and the abstract rule embedded
//! in the recommendation carries the request fields unchanged.

use ipnet::IpNet;
use sha2::{Digest, Sha256};

use crate::domain::enforcement::{EnforcementKind, EnforcementPoint, Platform};
use crate::domain::request::{Protocol, RuleRequest};
use crate::domain::rule::{AbstractRule, RuleAction, RuleRecommendation};
use crate::errors::PipelineError;

#[derive(Clone, Debug, Default)]
pub struct RuleSyntaxGenerator;

impl RuleSyntaxGenerator {
    pub fn generate(
        &self,
        request: &RuleRequest,
        point: &EnforcementPoint,
    ) -> Result<RuleRecommendation, PipelineError> {
        let rule = AbstractRule {
            source: request.source,
            destination: request.destination,
            port: request.port,
            protocol: request.protocol,
            action: RuleAction::Allow,
        };

        let syntax = match (point.platform, point.kind) {
            (Platform::Onprem, EnforcementKind::Firewall) => render_asa(&rule, point),
            (Platform::Aws, EnforcementKind::SecurityGroup) => render_aws_security_group(&rule, point),
            (Platform::Aws, EnforcementKind::Nacl) => render_aws_nacl(&rule, point),
            (Platform::Azure, EnforcementKind::Nsg) => render_azure_nsg(&rule, point),
            (Platform::Gcp, EnforcementKind::Firewall) => render_gcp_firewall(&rule),
            (platform, kind) => {
                return Err(PipelineError::UnsupportedPlatform {
                    platform: platform.as_str().to_owned(),
                    kind: kind.as_str().to_owned(),
                });
            }
        };

        let fingerprint = syntax_fingerprint(&syntax);
        Ok(RuleRecommendation { point: point.clone(), rule, syntax, fingerprint })
    }
}

/// sha256 of the rendered syntax, recorded alongside applied rules.
pub fn syntax_fingerprint(syntax: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(syntax.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn rule_name(rule: &AbstractRule) -> String {
    format!("chg-{}-{}", rule.protocol.as_str(), rule.port)
}

fn host_or_net(net: &IpNet) -> String {
    if net.prefix_len() == net.max_prefix_len() {
        net.addr().to_string()
    } else {
        net.to_string()
    }
}

/// Cisco-style address segment: `host A.B.C.D`, `any`, or address + netmask.
fn asa_segment(net: &IpNet) -> String {
    if net.prefix_len() == 0 {
        return "any".to_string();
    }
    if net.prefix_len() == net.max_prefix_len() {
        return format!("host {}", net.addr());
    }
    format!("{} {}", net.network(), net.netmask())
}

fn render_asa(rule: &AbstractRule, point: &EnforcementPoint) -> String {
    let protocol = match rule.protocol {
        Protocol::Tcp => "tcp",
        Protocol::Udp => "udp",
        Protocol::Icmp => "icmp",
        Protocol::Any => "ip",
    };
    let action = match rule.action {
        RuleAction::Allow => "permit",
        RuleAction::Deny => "deny",
    };
    format!(
        "access-list {}-in extended {} {} {} {} eq {}",
        point.zone,
        action,
        protocol,
        asa_segment(&rule.source),
        asa_segment(&rule.destination),
        rule.port
    )
}

fn render_aws_security_group(rule: &AbstractRule, point: &EnforcementPoint) -> String {
    let protocol = match rule.protocol {
        Protocol::Tcp => "tcp",
        Protocol::Udp => "udp",
        Protocol::Icmp => "icmp",
        Protocol::Any => "-1",
    };
    let verb = match rule.action {
        RuleAction::Allow => "authorize-security-group-ingress",
        RuleAction::Deny => "revoke-security-group-ingress",
    };
    format!(
        "aws ec2 {} --group-id {} --ip-permissions IpProtocol={},FromPort={},ToPort={},IpRanges=[{{CidrIp={},Description=\"to {}\"}}]",
        verb,
        point.id,
        protocol,
        rule.port,
        rule.port,
        rule.source,
        host_or_net(&rule.destination)
    )
}

fn render_aws_nacl(rule: &AbstractRule, point: &EnforcementPoint) -> String {
    let protocol = match rule.protocol {
        Protocol::Tcp => "tcp",
        Protocol::Udp => "udp",
        Protocol::Icmp => "icmp",
        Protocol::Any => "-1",
    };
    format!(
        "aws ec2 create-network-acl-entry --network-acl-id {} --ingress --rule-number 300 --protocol {} --port-range From={},To={} --cidr-block {} --rule-action {}",
        point.id,
        protocol,
        rule.port,
        rule.port,
        rule.source,
        rule.action.as_str()
    )
}

fn render_azure_nsg(rule: &AbstractRule, point: &EnforcementPoint) -> String {
    let protocol = match rule.protocol {
        Protocol::Tcp => "Tcp",
        Protocol::Udp => "Udp",
        Protocol::Icmp => "Icmp",
        Protocol::Any => "*",
    };
    let access = match rule.action {
        RuleAction::Allow => "Allow",
        RuleAction::Deny => "Deny",
    };
    format!(
        "az network nsg rule create --nsg-name {} --name {} --priority 300 --direction Inbound --access {} --protocol {} --source-address-prefixes {} --destination-address-prefixes {} --destination-port-ranges {}",
        point.id,
        rule_name(rule),
        access,
        protocol,
        rule.source,
        rule.destination,
        rule.port
    )
}

fn render_gcp_firewall(rule: &AbstractRule) -> String {
    let protocol = match rule.protocol {
        Protocol::Tcp => "tcp",
        Protocol::Udp => "udp",
        Protocol::Icmp => "icmp",
        Protocol::Any => "all",
    };
    let action = match rule.action {
        RuleAction::Allow => "ALLOW",
        RuleAction::Deny => "DENY",
    };
    format!(
        "gcloud compute firewall-rules create {} --direction INGRESS --action {} --rules {}:{} --source-ranges {} --destination-ranges {}",
        rule_name(rule),
        action,
        protocol,
        rule.port,
        rule.source,
        rule.destination
    )
}
