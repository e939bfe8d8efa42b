//! # Query Normalizer
//!
//! Turns an untrusted descriptor into a validated `NormalizedQuery`:
//! dispatches by query type, resolves the dual string/native encoding of
//! filters, projections and pipelines, canonicalizes cone-search
//! coordinates, and routes every branch through the access policy (and,
//! for free-form expressions, the sandbox screen). Rejection is total:
//! a query that fails any check is never partially executed.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::config::EngineConfig;
use crate::coord::{self, ConeSearchUnit};
use crate::literal;
use crate::observability::logger::{excerpt, Logger};
use crate::policy::{AccessDecision, AccessPolicy, Sandbox};

use super::errors::{QueryError, QueryResult};
use super::{ConeQuery, InfoCommand, NormalizedPayload, NormalizedQuery, QueryDescriptor, QueryType};

/// Validates and canonicalizes query descriptors
pub struct Normalizer {
    config: EngineConfig,
    policy: AccessPolicy,
}

impl Normalizer {
    /// Build a normalizer from engine configuration
    pub fn new(config: EngineConfig) -> Self {
        let policy = AccessPolicy::new(&config);
        Self { config, policy }
    }

    /// Normalize a descriptor, or fail with a validation or permission
    /// error
    pub fn normalize(&self, descriptor: &QueryDescriptor) -> QueryResult<NormalizedQuery> {
        let payload = match descriptor.query_type {
            QueryType::Find => self.normalize_find(descriptor)?,
            QueryType::FindOne => self.normalize_find_one(descriptor)?,
            QueryType::CountDocuments => self.normalize_count(descriptor)?,
            QueryType::Aggregate => self.normalize_aggregate(descriptor)?,
            QueryType::ConeSearch => self.normalize_cone_search(descriptor)?,
            QueryType::GeneralSearch => self.normalize_general_search(descriptor)?,
            QueryType::Info => self.normalize_info(descriptor)?,
        };

        Ok(NormalizedQuery {
            query_type: descriptor.query_type,
            query: payload,
            kwargs: descriptor.kwargs.clone(),
            user: descriptor.user.clone(),
        })
    }

    fn normalize_find(&self, descriptor: &QueryDescriptor) -> QueryResult<NormalizedPayload> {
        let payload = query_mapping(descriptor)?;
        let catalog = required_catalog(payload)?;
        self.enforce(
            descriptor,
            self.policy.check_catalog(descriptor.is_admin, &catalog),
        )?;
        let filter = decoded_mapping(required_field(payload, "filter")?, "filter")?;
        let projection = match payload.get("projection") {
            None => json!({}),
            Some(raw) => decoded_mapping(raw, "projection")?,
        };
        Ok(NormalizedPayload::Find {
            catalog,
            filter,
            projection,
        })
    }

    fn normalize_find_one(&self, descriptor: &QueryDescriptor) -> QueryResult<NormalizedPayload> {
        let payload = query_mapping(descriptor)?;
        let catalog = required_catalog(payload)?;
        self.enforce(
            descriptor,
            self.policy.check_catalog(descriptor.is_admin, &catalog),
        )?;
        let filter = decoded_mapping(required_field(payload, "filter")?, "filter")?;
        Ok(NormalizedPayload::FindOne { catalog, filter })
    }

    fn normalize_count(&self, descriptor: &QueryDescriptor) -> QueryResult<NormalizedPayload> {
        let payload = query_mapping(descriptor)?;
        let catalog = required_catalog(payload)?;
        self.enforce(
            descriptor,
            self.policy.check_catalog(descriptor.is_admin, &catalog),
        )?;
        let filter = decoded_mapping(required_field(payload, "filter")?, "filter")?;
        Ok(NormalizedPayload::CountDocuments { catalog, filter })
    }

    fn normalize_aggregate(&self, descriptor: &QueryDescriptor) -> QueryResult<NormalizedPayload> {
        let payload = query_mapping(descriptor)?;
        let catalog = required_catalog(payload)?;
        self.enforce(
            descriptor,
            self.policy.check_catalog(descriptor.is_admin, &catalog),
        )?;
        let pipeline = decoded_pipeline(required_field(payload, "pipeline")?)?;
        self.enforce(
            descriptor,
            self.policy.check_pipeline(descriptor.is_admin, &pipeline),
        )?;
        Ok(NormalizedPayload::Aggregate { catalog, pipeline })
    }

    fn normalize_general_search(
        &self,
        descriptor: &QueryDescriptor,
    ) -> QueryResult<NormalizedPayload> {
        let expression = descriptor
            .query
            .as_str()
            .ok_or_else(|| QueryError::validation("general_search query must be a string"))?
            .to_string();

        if !descriptor.is_admin && !Sandbox::check_expression(&expression) {
            self.log_denial(descriptor, "expression failed sandbox screen");
            return Err(QueryError::Permission);
        }
        self.enforce(
            descriptor,
            self.policy
                .check_expression(descriptor.is_admin, &expression),
        )?;

        Ok(NormalizedPayload::GeneralSearch { expression })
    }

    fn normalize_cone_search(&self, descriptor: &QueryDescriptor) -> QueryResult<NormalizedPayload> {
        let payload = query_mapping(descriptor)?;

        let object_coordinates = required_field(payload, "object_coordinates")?
            .as_object()
            .ok_or_else(|| QueryError::validation("'object_coordinates' must be a mapping"))?;

        let radius_raw = required_field(object_coordinates, "cone_search_radius")?;
        let radius = lenient_f64(radius_raw).ok_or_else(|| {
            QueryError::validation(format!("bad cone_search_radius: {}", radius_raw))
        })?;
        let unit_name = required_field(object_coordinates, "cone_search_unit")?
            .as_str()
            .ok_or_else(|| QueryError::validation("'cone_search_unit' must be a string"))?;
        let radius_rad = ConeSearchUnit::parse(unit_name)?.to_radians(radius);
        if !radius_rad.is_finite() {
            return Err(QueryError::validation("cone search radius is not finite"));
        }

        let objects = coord::parse_coordinates(required_field(object_coordinates, "radec")?)?;

        let catalogs_raw = required_field(payload, "catalogs")?
            .as_object()
            .ok_or_else(|| QueryError::validation("'catalogs' must be a mapping"))?;

        let mut catalogs = BTreeMap::new();
        for (catalog, spec) in catalogs_raw {
            self.enforce(
                descriptor,
                self.policy.check_catalog(descriptor.is_admin, catalog),
            )?;
            let spec = spec.as_object().ok_or_else(|| {
                QueryError::validation(format!("catalog '{}' spec must be a mapping", catalog))
            })?;
            let filter = decoded_mapping(required_field(spec, "filter")?, "filter")?;
            let projection = decoded_mapping(required_field(spec, "projection")?, "projection")?;

            let mut per_object = BTreeMap::new();
            for object in &objects {
                let mut merged = Map::new();
                merged.insert(
                    self.config.geojson_field.clone(),
                    json!({
                        "$geoWithin": {
                            "$centerSphere": [[object.lon, object.lat], radius_rad]
                        }
                    }),
                );
                // caller filter entries win on key collision
                if let Some(extra) = filter.as_object() {
                    for (k, v) in extra {
                        merged.insert(k.clone(), v.clone());
                    }
                }
                per_object.insert(
                    object.name.clone(),
                    ConeQuery {
                        filter: Value::Object(merged),
                        projection: projection.clone(),
                    },
                );
            }
            catalogs.insert(catalog.clone(), per_object);
        }

        Ok(NormalizedPayload::ConeSearch { catalogs })
    }

    fn normalize_info(&self, descriptor: &QueryDescriptor) -> QueryResult<NormalizedPayload> {
        let payload = query_mapping(descriptor)?;
        let command = required_field(payload, "command")?
            .as_str()
            .ok_or_else(|| QueryError::validation("'command' must be a string"))?;

        let command = match command {
            "catalog_names" => InfoCommand::CatalogNames,
            "db_info" => InfoCommand::DbInfo,
            "catalog_info" | "index_info" => {
                let catalog = required_catalog(payload)?;
                self.enforce(
                    descriptor,
                    self.policy.check_catalog(descriptor.is_admin, &catalog),
                )?;
                if command == "catalog_info" {
                    InfoCommand::CatalogInfo { catalog }
                } else {
                    InfoCommand::IndexInfo { catalog }
                }
            }
            other => {
                return Err(QueryError::validation(format!(
                    "unknown info command: {}",
                    other
                )))
            }
        };

        Ok(NormalizedPayload::Info { command })
    }

    /// Fail the query when a policy decision denies it; the denial
    /// reason goes to the log, never to the caller
    fn enforce(&self, descriptor: &QueryDescriptor, decision: AccessDecision) -> QueryResult<()> {
        if decision.allowed {
            return Ok(());
        }
        self.log_denial(
            descriptor,
            decision.reason.as_deref().unwrap_or("access denied"),
        );
        Err(QueryError::Permission)
    }

    fn log_denial(&self, descriptor: &QueryDescriptor, reason: &str) {
        Logger::warn(
            "query_rejected",
            &[
                ("user", descriptor.user.as_str()),
                ("query_type", descriptor.query_type.as_str()),
                ("reason", reason),
                ("payload", &excerpt(&descriptor.query.to_string())),
            ],
        );
    }
}

fn query_mapping(descriptor: &QueryDescriptor) -> QueryResult<&Map<String, Value>> {
    descriptor.query.as_object().ok_or_else(|| {
        QueryError::validation(format!(
            "{} query payload must be a mapping",
            descriptor.query_type.as_str()
        ))
    })
}

fn required_field<'a>(payload: &'a Map<String, Value>, key: &str) -> QueryResult<&'a Value> {
    payload
        .get(key)
        .ok_or_else(|| QueryError::validation(format!("missing required field '{}'", key)))
}

fn required_catalog(payload: &Map<String, Value>) -> QueryResult<String> {
    match required_field(payload, "catalog")? {
        Value::String(name) => Ok(name.clone()),
        other => Err(QueryError::validation(format!(
            "'catalog' must be a string, got {}",
            other
        ))),
    }
}

/// Decode the dual string/native encoding and require a mapping
fn decoded_mapping(raw: &Value, what: &str) -> QueryResult<Value> {
    let decoded = literal::decode(raw)?;
    if decoded.is_object() {
        Ok(decoded)
    } else {
        Err(QueryError::validation(format!(
            "unsupported {} specification",
            what
        )))
    }
}

/// Decode the dual string/native encoding and require a sequence
fn decoded_pipeline(raw: &Value) -> QueryResult<Vec<Value>> {
    match literal::decode(raw)? {
        Value::Array(stages) => Ok(stages),
        _ => Err(QueryError::validation(
            "unsupported pipeline specification",
        )),
    }
}

/// Accept a radius as a native number or a numeric string
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
