use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnforcementPointId(pub String);

impl std::fmt::Display for EnforcementPointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementKind {
    Firewall,
    Nsg,
    SecurityGroup,
    Nacl,
}

impl EnforcementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firewall => "firewall",
            Self::Nsg => "nsg",
            Self::SecurityGroup => "security_group",
            Self::Nacl => "nacl",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "firewall" => Some(Self::Firewall),
            "nsg" => Some(Self::Nsg),
            "security_group" => Some(Self::SecurityGroup),
            "nacl" => Some(Self::Nacl),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Aws,
    Azure,
    Gcp,
    Onprem,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::Onprem => "onprem",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "aws" => Some(Self::Aws),
            "azure" => Some(Self::Azure),
            "gcp" => Some(Self::Gcp),
            "onprem" => Some(Self::Onprem),
            _ => None,
        }
    }
}

/// A device or cloud construct that evaluates traffic against rules.
///
/// The ordered list attached to a ticket reflects traversal order: edge
/// firewall first, cloud-provider enforcement last. The list is fixed at
/// ticket creation and never reordered afterward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementPoint {
    pub id: EnforcementPointId,
    pub name: String,
    pub kind: EnforcementKind,
    pub platform: Platform,
    pub zone: String,
}

#[cfg(test)]
mod tests {
    use super::{EnforcementKind, Platform};

    #[test]
    fn kind_round_trips_from_storage_encoding() {
        for kind in [
            EnforcementKind::Firewall,
            EnforcementKind::Nsg,
            EnforcementKind::SecurityGroup,
            EnforcementKind::Nacl,
        ] {
            assert_eq!(EnforcementKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn platform_rejects_unknown_values() {
        assert_eq!(Platform::parse("aws"), Some(Platform::Aws));
        assert_eq!(Platform::parse("oracle_cloud"), None);
    }
}
