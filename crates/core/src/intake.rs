//! Change-request intake: resolving an external ticket reference into a raw
//! record and parsing that record into a structured `RuleRequest`.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::domain::request::{Environment, Protocol, RuleRequest};
use crate::errors::ParseError;

/// The raw record an external ticketing system holds for a change reference.
/// All fields are optional at this layer; the parser decides what is
/// required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChangeRecord {
    pub reference: String,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub port: Option<String>,
    pub protocol: Option<String>,
    pub environment: Option<String>,
    pub description: Option<String>,
    pub justification: Option<String>,
}

/// Read-only lookup into the external ticketing system, keyed by an opaque
/// reference string.
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Option<RawChangeRecord>, String>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryReferenceResolver {
    records: HashMap<String, RawChangeRecord>,
}

impl InMemoryReferenceResolver {
    pub fn with_records(records: Vec<RawChangeRecord>) -> Self {
        Self {
            records: records.into_iter().map(|record| (record.reference.clone(), record)).collect(),
        }
    }
}

#[async_trait]
impl ReferenceResolver for InMemoryReferenceResolver {
    async fn resolve(&self, reference: &str) -> Result<Option<RawChangeRecord>, String> {
        Ok(self.records.get(reference).cloned())
    }
}

/// Turns a raw change record into an immutable `RuleRequest`, rejecting
/// records with missing or malformed required fields.
#[derive(Clone, Debug, Default)]
pub struct RuleRequestParser;

impl RuleRequestParser {
    pub fn parse(&self, record: &RawChangeRecord) -> Result<RuleRequest, ParseError> {
        let source = required(record, record.source.as_deref(), "source")?;
        let destination = required(record, record.destination.as_deref(), "destination")?;
        let port = required(record, record.port.as_deref(), "port")?;
        let protocol = required(record, record.protocol.as_deref(), "protocol")?;
        let environment = required(record, record.environment.as_deref(), "environment")?;

        let source = parse_cidr("source", source)?;
        let destination = parse_cidr("destination", destination)?;
        let port = port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| ParseError::InvalidPort { value: port.to_owned() })?;
        let protocol = Protocol::parse(protocol)
            .ok_or_else(|| ParseError::InvalidProtocol { value: protocol.to_owned() })?;
        let environment = Environment::parse(environment)
            .ok_or_else(|| ParseError::InvalidEnvironment { value: environment.to_owned() })?;

        Ok(RuleRequest {
            source,
            destination,
            port,
            protocol,
            environment,
            description: record.description.clone().unwrap_or_default(),
            justification: record.justification.clone().unwrap_or_default(),
        })
    }
}

fn required<'a>(
    record: &RawChangeRecord,
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, ParseError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ParseError::MissingField { reference: record.reference.clone(), field }),
    }
}

/// Accepts either CIDR notation or a bare host address, which becomes a
/// host-length network.
fn parse_cidr(field: &'static str, value: &str) -> Result<IpNet, ParseError> {
    let trimmed = value.trim();
    if let Ok(net) = trimmed.parse::<IpNet>() {
        return Ok(net);
    }
    trimmed
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| ParseError::InvalidCidr { field, value: value.to_owned() })
}
