// crates/lti1p3-core/src/resolve/static_config.rs
// ============================================================================
// Module: Static Tool Configuration
// Description: JSON-document-backed tool configuration resolver.
// Purpose: Resolve registrations and deployments from declarative records.
// Dependencies: serde, serde_json, trust, resolve::contract
// ============================================================================

//! ## Overview
//! [`StaticToolConfiguration`] resolves trust from a JSON document mapping
//! each issuer to either one record (single-client issuer) or an ordered
//! array of records (multi-client issuer). The document shape registers the
//! issuer relation policy; record contents are validated eagerly so a
//! malformed document fails construction instead of a later lookup. Tool
//! key material lives apart from the declarative document, in four
//! mutex-guarded stores keyed consistently with each issuer's relation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;

use crate::resolve::contract::LaunchContext;
use crate::resolve::contract::ToolConfigError;
use crate::resolve::contract::ToolConfiguration;
use crate::resolve::contract::policy_selected_jwks;
use crate::trust::deployment::Deployment;
use crate::trust::identifiers::ClientId;
use crate::trust::identifiers::DeploymentId;
use crate::trust::identifiers::Issuer;
use crate::trust::jwk::JwkSet;
use crate::trust::policy::IssuerClientPolicy;
use crate::trust::registration::Registration;

// ============================================================================
// SECTION: Issuer Records
// ============================================================================

/// One declarative trust record inside the configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IssuerRecord {
    /// Client id the platform assigned to the tool. Non-empty.
    client_id: String,
    /// Platform OIDC login initiation endpoint. Non-empty.
    auth_login_url: String,
    /// Platform OAuth2 token endpoint. Non-empty.
    auth_token_url: String,
    /// Audience override for token requests.
    #[serde(default)]
    auth_audience: Option<String>,
    /// Platform public key set URL.
    #[serde(default)]
    key_set_url: Option<String>,
    /// Platform public key set document, inline.
    #[serde(default)]
    key_set: Option<serde_json::Value>,
    /// Deployment ids the platform configured for this record.
    deployment_ids: Vec<String>,
    /// Marks the record selected when no client id disambiguates.
    #[serde(default)]
    default: bool,
}

/// Trust records of one issuer, shaped by the issuer's relation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IssuerTrustEntry {
    /// The issuer registered exactly one client id.
    One(IssuerRecord),
    /// The issuer registered several client ids, in configured order.
    Many(Vec<IssuerRecord>),
}

impl IssuerTrustEntry {
    /// Returns the records of this entry in configured order.
    fn records(&self) -> &[IssuerRecord] {
        match self {
            Self::One(record) => std::slice::from_ref(record),
            Self::Many(records) => records,
        }
    }
}

/// Parses and validates one record of the named issuer.
fn parse_record(issuer: &str, value: serde_json::Value) -> Result<IssuerRecord, ToolConfigError> {
    let record: IssuerRecord =
        serde_json::from_value(value).map_err(|err| ToolConfigError::InvalidConfig {
            issuer: issuer.to_string(),
            reason: err.to_string(),
        })?;
    for (field, content) in [
        ("client_id", &record.client_id),
        ("auth_login_url", &record.auth_login_url),
        ("auth_token_url", &record.auth_token_url),
    ] {
        if content.is_empty() {
            return Err(ToolConfigError::InvalidConfig {
                issuer: issuer.to_string(),
                reason: format!("{field} must be a non-empty string"),
            });
        }
    }
    Ok(record)
}

// ============================================================================
// SECTION: Static Tool Configuration
// ============================================================================

/// Tool configuration resolved from a declarative JSON document.
///
/// # Invariants
/// - Construction validates every record; no partially constructed instance
///   is observable.
/// - Within one issuer's record list, client ids are unique.
/// - A resolved [`Registration`] always carries a stored private key.
#[derive(Debug)]
pub struct StaticToolConfiguration {
    /// Validated trust records keyed by issuer.
    issuers: BTreeMap<Issuer, IssuerTrustEntry>,
    /// Issuer relation policy registered from the document shape.
    policy: IssuerClientPolicy,
    /// Tool private keys of single-client issuers, keyed by issuer.
    single_private_keys: Mutex<BTreeMap<String, String>>,
    /// Tool private keys of multi-client issuers, keyed by issuer and client id.
    multi_private_keys: Mutex<BTreeMap<String, String>>,
    /// Tool public keys of single-client issuers, keyed by issuer.
    single_public_keys: Mutex<BTreeMap<String, String>>,
    /// Tool public keys of multi-client issuers, keyed by issuer and client id.
    multi_public_keys: Mutex<BTreeMap<String, String>>,
}

impl StaticToolConfiguration {
    /// Builds a configuration from a parsed JSON document.
    ///
    /// The document must be a JSON object keyed by issuer; each issuer maps
    /// to one record object or an ordered array of record objects. An object
    /// registers the issuer as single-client, an array as multi-client.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::InvalidConfig`] naming the offending
    /// issuer when the document or any record is malformed.
    pub fn new(document: serde_json::Value) -> Result<Self, ToolConfigError> {
        let serde_json::Value::Object(entries) = document else {
            return Err(ToolConfigError::InvalidConfig {
                issuer: "document root".to_string(),
                reason: "configuration must be a json object keyed by issuer".to_string(),
            });
        };
        let policy = IssuerClientPolicy::new();
        let mut issuers = BTreeMap::new();
        for (issuer_key, value) in entries {
            let issuer = Issuer::new(issuer_key.clone());
            let entry = match value {
                serde_json::Value::Object(_) => {
                    let record = parse_record(&issuer_key, value)?;
                    policy.set_one(&issuer);
                    IssuerTrustEntry::One(record)
                }
                serde_json::Value::Array(items) => {
                    let mut records = Vec::with_capacity(items.len());
                    for item in items {
                        records.push(parse_record(&issuer_key, item)?);
                    }
                    for (position, record) in records.iter().enumerate() {
                        let earlier = records[..position]
                            .iter()
                            .any(|other| other.client_id == record.client_id);
                        if earlier {
                            return Err(ToolConfigError::InvalidConfig {
                                issuer: issuer_key,
                                reason: format!(
                                    "client id {} appears more than once",
                                    record.client_id
                                ),
                            });
                        }
                    }
                    policy.set_many(&issuer);
                    IssuerTrustEntry::Many(records)
                }
                _ => {
                    return Err(ToolConfigError::InvalidConfig {
                        issuer: issuer_key,
                        reason: "issuer entry must be a record object or an array of record objects"
                            .to_string(),
                    });
                }
            };
            issuers.insert(issuer, entry);
        }
        Ok(Self {
            issuers,
            policy,
            single_private_keys: Mutex::new(BTreeMap::new()),
            multi_private_keys: Mutex::new(BTreeMap::new()),
            single_public_keys: Mutex::new(BTreeMap::new()),
            multi_public_keys: Mutex::new(BTreeMap::new()),
        })
    }

    /// Builds a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::ConfigParse`] when the text is not valid
    /// JSON, and any [`ToolConfigError::InvalidConfig`] from validation.
    pub fn from_json_str(text: &str) -> Result<Self, ToolConfigError> {
        let document: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| ToolConfigError::ConfigParse {
                source: err,
            })?;
        Self::new(document)
    }

    /// Builds a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::ConfigRead`] when the file cannot be read,
    /// and any parse or validation failure of its content.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ToolConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| ToolConfigError::ConfigRead {
            path: path.display().to_string(),
            source: err,
        })?;
        Self::from_json_str(&text)
    }

    // ========================================================================
    // SECTION: Key Stores
    // ========================================================================

    /// Stores the tool private key for an issuer, and client id when the
    /// issuer's relation is multi-client.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::MissingClientId`] when the issuer is
    /// multi-client and no client id was given.
    pub fn set_private_key(
        &self,
        issuer: &Issuer,
        pem: impl Into<String>,
        client_id: Option<&ClientId>,
    ) -> Result<(), ToolConfigError> {
        store_key(
            &self.single_private_keys,
            &self.multi_private_keys,
            &self.policy,
            issuer,
            pem.into(),
            client_id,
        )
    }

    /// Returns the stored tool private key, when one was set.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::MissingClientId`] when the issuer is
    /// multi-client and no client id was given.
    pub fn private_key(
        &self,
        issuer: &Issuer,
        client_id: Option<&ClientId>,
    ) -> Result<Option<String>, ToolConfigError> {
        fetch_key(
            &self.single_private_keys,
            &self.multi_private_keys,
            &self.policy,
            issuer,
            client_id,
        )
    }

    /// Stores the tool public key for an issuer, and client id when the
    /// issuer's relation is multi-client.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::MissingClientId`] when the issuer is
    /// multi-client and no client id was given.
    pub fn set_public_key(
        &self,
        issuer: &Issuer,
        pem: impl Into<String>,
        client_id: Option<&ClientId>,
    ) -> Result<(), ToolConfigError> {
        store_key(
            &self.single_public_keys,
            &self.multi_public_keys,
            &self.policy,
            issuer,
            pem.into(),
            client_id,
        )
    }

    /// Returns the stored tool public key, when one was set.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::MissingClientId`] when the issuer is
    /// multi-client and no client id was given.
    pub fn public_key(
        &self,
        issuer: &Issuer,
        client_id: Option<&ClientId>,
    ) -> Result<Option<String>, ToolConfigError> {
        fetch_key(
            &self.single_public_keys,
            &self.multi_public_keys,
            &self.policy,
            issuer,
            client_id,
        )
    }

    // ========================================================================
    // SECTION: Record Selection
    // ========================================================================

    /// Selects the record answering a lookup, in configured order.
    ///
    /// With a client id, only an exact match answers. Without one, the first
    /// record marked default answers; failing that, an issuer with exactly
    /// one record answers with it.
    fn issuer_record(
        &self,
        issuer: &Issuer,
        client_id: Option<&ClientId>,
    ) -> Result<&IssuerRecord, ToolConfigError> {
        let entry =
            self.issuers
                .get(issuer)
                .ok_or_else(|| ToolConfigError::RegistrationNotFound {
                    issuer: issuer.clone(),
                    client_id: client_id.cloned(),
                })?;
        let records = entry.records();
        if let Some(client_id) = client_id {
            return records
                .iter()
                .find(|record| record.client_id == client_id.as_str())
                .ok_or_else(|| ToolConfigError::RegistrationNotFound {
                    issuer: issuer.clone(),
                    client_id: Some(client_id.clone()),
                });
        }
        if let Some(default_record) = records.iter().find(|record| record.default) {
            return Ok(default_record);
        }
        if let [single] = records {
            return Ok(single);
        }
        Err(ToolConfigError::AmbiguousClient {
            issuer: issuer.clone(),
        })
    }

    /// Assembles the registration of a selected record, attaching stored key
    /// material.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::PrivateKeyNotFound`] when no private key
    /// was stored for the record's issuer and client id.
    fn build_registration(
        &self,
        issuer: &Issuer,
        record: &IssuerRecord,
    ) -> Result<Registration, ToolConfigError> {
        let client_id = ClientId::new(record.client_id.clone());
        let tool_private_key = self.private_key(issuer, Some(&client_id))?.ok_or_else(|| {
            ToolConfigError::PrivateKeyNotFound {
                issuer: issuer.clone(),
                client_id: client_id.clone(),
            }
        })?;
        let tool_public_key = self.public_key(issuer, Some(&client_id))?;
        Ok(Registration {
            issuer: issuer.clone(),
            client_id,
            auth_login_url: record.auth_login_url.clone(),
            auth_token_url: record.auth_token_url.clone(),
            auth_audience: record.auth_audience.clone(),
            key_set: record.key_set.clone(),
            key_set_url: record.key_set_url.clone(),
            tool_private_key,
            tool_public_key,
        })
    }
}

// ============================================================================
// SECTION: Key Store Helpers
// ============================================================================

/// Composite store key of a multi-client issuer's entry.
fn issuer_client_key(issuer: &Issuer, client_id: &ClientId) -> String {
    format!("{issuer}/{client_id}")
}

/// Writes a key into the store matching the issuer's relation.
fn store_key(
    single: &Mutex<BTreeMap<String, String>>,
    multi: &Mutex<BTreeMap<String, String>>,
    policy: &IssuerClientPolicy,
    issuer: &Issuer,
    pem: String,
    client_id: Option<&ClientId>,
) -> Result<(), ToolConfigError> {
    if policy.is_one(issuer) {
        let mut keys = single.lock().unwrap_or_else(PoisonError::into_inner);
        keys.insert(issuer.as_str().to_string(), pem);
        return Ok(());
    }
    let client_id = client_id.ok_or_else(|| ToolConfigError::MissingClientId {
        issuer: issuer.clone(),
    })?;
    let mut keys = multi.lock().unwrap_or_else(PoisonError::into_inner);
    keys.insert(issuer_client_key(issuer, client_id), pem);
    Ok(())
}

/// Reads a key from the store matching the issuer's relation.
fn fetch_key(
    single: &Mutex<BTreeMap<String, String>>,
    multi: &Mutex<BTreeMap<String, String>>,
    policy: &IssuerClientPolicy,
    issuer: &Issuer,
    client_id: Option<&ClientId>,
) -> Result<Option<String>, ToolConfigError> {
    if policy.is_one(issuer) {
        let keys = single.lock().unwrap_or_else(PoisonError::into_inner);
        return Ok(keys.get(issuer.as_str()).cloned());
    }
    let client_id = client_id.ok_or_else(|| ToolConfigError::MissingClientId {
        issuer: issuer.clone(),
    })?;
    let keys = multi.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(keys.get(&issuer_client_key(issuer, client_id)).cloned())
}

// ============================================================================
// SECTION: ToolConfiguration Implementation
// ============================================================================

impl ToolConfiguration for StaticToolConfiguration {
    fn policy(&self) -> &IssuerClientPolicy {
        &self.policy
    }

    fn find_registration_by_issuer(
        &self,
        issuer: &Issuer,
        context: Option<&LaunchContext>,
    ) -> Result<Registration, ToolConfigError> {
        let _ = context;
        let record = self.issuer_record(issuer, None)?;
        self.build_registration(issuer, record)
    }

    fn find_registration_by_params(
        &self,
        issuer: &Issuer,
        client_id: Option<&ClientId>,
        context: Option<&LaunchContext>,
    ) -> Result<Registration, ToolConfigError> {
        let _ = context;
        let record = self.issuer_record(issuer, client_id)?;
        self.build_registration(issuer, record)
    }

    fn find_deployment(
        &self,
        issuer: &Issuer,
        deployment_id: Option<&DeploymentId>,
    ) -> Result<Option<Deployment>, ToolConfigError> {
        self.find_deployment_by_params(issuer, deployment_id, None)
    }

    fn find_deployment_by_params(
        &self,
        issuer: &Issuer,
        deployment_id: Option<&DeploymentId>,
        client_id: Option<&ClientId>,
    ) -> Result<Option<Deployment>, ToolConfigError> {
        let record = self.issuer_record(issuer, client_id)?;
        let Some(deployment_id) = deployment_id else {
            return Ok(None);
        };
        let configured = record
            .deployment_ids
            .iter()
            .any(|configured| configured == deployment_id.as_str());
        if !configured {
            return Ok(None);
        }
        Ok(Some(Deployment::new(deployment_id.clone())))
    }

    fn get_jwks(
        &self,
        issuer: Option<&Issuer>,
        client_id: Option<&ClientId>,
    ) -> Result<JwkSet, ToolConfigError> {
        if issuer.is_some() || client_id.is_some() {
            return policy_selected_jwks(self, issuer, client_id);
        }
        let mut pems: Vec<String> = Vec::new();
        {
            let keys = self
                .single_public_keys
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            pems.extend(keys.values().cloned());
        }
        {
            let keys = self
                .multi_public_keys
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            pems.extend(keys.values().cloned());
        }
        Ok(crate::trust::jwk::derive_jwk_set(&pems)?)
    }
}
