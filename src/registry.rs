//! Vehicle-registry lookups and the batched bulk refresh.
//!
//! The registry is a remote RPC function that returns registration details
//! for a registration number. A refresh looks up vehicles in fixed-size
//! batches with a pause between batches, collects every outcome, and only
//! then writes the fetched fields to the store.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::{set_document, update_profile};
use crate::error::{FleetError, Result};
use crate::importer::normalize_date;
use crate::models::{DocType, VehicleRecord};
use crate::settings::RegistrySettings;

/// Fields the registry may report for a vehicle. Absent fields leave the
/// stored values untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryRecord {
    pub owner_name: Option<String>,
    pub maker_model: Option<String>,
    pub registration_date: Option<String>,
    #[serde(alias = "rc_expiry", alias = "fit_up_to_rc")]
    pub rc_expiry_date: Option<String>,
    #[serde(alias = "insurance_upto")]
    pub insurance_expiry_date: Option<String>,
    #[serde(alias = "fitness_upto")]
    pub fitness_expiry_date: Option<String>,
    #[serde(alias = "permit_valid_upto")]
    pub permit_expiry_date: Option<String>,
    #[serde(alias = "pucc_upto")]
    pub puc_expiry_date: Option<String>,
    #[serde(alias = "tax_upto")]
    pub tax_expiry_date: Option<String>,
}

impl RegistryRecord {
    pub fn expiry(&self, doc: DocType) -> Option<&str> {
        let field = match doc {
            DocType::Rc => &self.rc_expiry_date,
            DocType::Insurance => &self.insurance_expiry_date,
            DocType::Fitness => &self.fitness_expiry_date,
            DocType::Permit => &self.permit_expiry_date,
            DocType::Puc => &self.puc_expiry_date,
            DocType::Tax => &self.tax_expiry_date,
        };
        field.as_deref()
    }

    /// Interpret an RPC response body: a bare object or an array whose first
    /// element is the record.
    pub fn from_response(registration: &str, body: serde_json::Value) -> Result<Self> {
        let value = match body {
            serde_json::Value::Array(mut items) => {
                if items.is_empty() {
                    return Err(FleetError::Registry {
                        registration: registration.to_string(),
                        message: "no registry record found".to_string(),
                    });
                }
                items.swap_remove(0)
            }
            serde_json::Value::Null => {
                return Err(FleetError::Registry {
                    registration: registration.to_string(),
                    message: "no registry record found".to_string(),
                });
            }
            other => other,
        };
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn lookup(&self, registration_number: &str) -> Result<RegistryRecord>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct HttpRegistryClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpRegistryClient {
    pub fn new(settings: &RegistrySettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: rpc_endpoint(&settings.base_url, &settings.rpc_function),
            api_key: settings.resolved_api_key(),
        })
    }
}

pub fn rpc_endpoint(base_url: &str, function: &str) -> String {
    format!("{}/rest/v1/rpc/{}", base_url.trim_end_matches('/'), function)
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn lookup(&self, registration_number: &str) -> Result<RegistryRecord> {
        debug!(endpoint = %self.endpoint, registration_number, "registry lookup");
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "registration_number": registration_number }));
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FleetError::Registry {
                registration: registration_number.to_string(),
                message: format!("{status}: {}", body.trim()),
            });
        }
        let body: serde_json::Value = response.json().await?;
        RegistryRecord::from_response(registration_number, body)
    }
}

// ---------------------------------------------------------------------------
// Bulk refresh
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay: Duration::from_millis(500),
        }
    }
}

impl From<&RegistrySettings> for BatchPolicy {
    fn from(settings: &RegistrySettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            delay: Duration::from_millis(settings.batch_delay_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshFailure {
    pub registration_number: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub updates: Vec<(i64, RegistryRecord)>,
    pub failures: Vec<RefreshFailure>,
    pub batches: usize,
}

impl RefreshReport {
    pub fn succeeded(&self) -> usize {
        self.updates.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Look up every vehicle, `batch_size` at a time, sleeping `delay` between
/// batches. Lookups inside a batch run concurrently. A failed lookup is
/// logged and recorded; it never stops the run.
pub async fn refresh_fleet<C>(
    client: &C,
    vehicles: &[VehicleRecord],
    policy: BatchPolicy,
) -> RefreshReport
where
    C: RegistryClient + ?Sized,
{
    let mut report = RefreshReport::default();
    let batch_size = policy.batch_size.max(1);
    let total_batches = vehicles.len().div_ceil(batch_size);

    for (n, batch) in vehicles.chunks(batch_size).enumerate() {
        if n > 0 && !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
        info!(batch = n + 1, of = total_batches, size = batch.len(), "refreshing batch");

        let lookups = batch.iter().map(|v| client.lookup(&v.registration_number));
        let outcomes = join_all(lookups).await;

        for (vehicle, outcome) in batch.iter().zip(outcomes) {
            match outcome {
                Ok(record) => report.updates.push((vehicle.id, record)),
                Err(e) => {
                    warn!(vehicle = %vehicle.registration_number, "registry refresh failed: {e}");
                    report.failures.push(RefreshFailure {
                        registration_number: vehicle.registration_number.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report.batches += 1;
    }
    report
}

fn readable_date(vehicle_id: i64, field: &str, raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let date = normalize_date(raw);
    if date.is_none() {
        warn!(vehicle_id, field, raw, "ignoring unreadable registry date");
    }
    date
}

/// Write fetched registry fields to the store in one transaction. Dates the
/// registry reports in a format we cannot read are skipped.
pub fn apply_updates(conn: &Connection, updates: &[(i64, RegistryRecord)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    for (vehicle_id, record) in updates {
        let registration_date =
            readable_date(*vehicle_id, "registration", record.registration_date.as_deref());
        update_profile(
            &tx,
            *vehicle_id,
            registration_date.as_deref(),
            record.owner_name.as_deref(),
            record.maker_model.as_deref(),
        )?;
        for doc in DocType::ALL {
            if let Some(expiry) = readable_date(*vehicle_id, doc.key(), record.expiry(doc)) {
                set_document(&tx, *vehicle_id, doc, Some(&expiry), None)?;
            }
        }
    }
    tx.commit()?;
    Ok(updates.len())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::db::{add_vehicle, get_connection, init_db, load_vehicles};

    /// In-memory registry that records the order of lookups.
    struct FakeRegistry {
        records: HashMap<String, RegistryRecord>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRegistry {
        fn new(records: &[(&str, RegistryRecord)]) -> Self {
            Self {
                records: records.iter().map(|(r, rec)| (r.to_string(), rec.clone())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RegistryClient for FakeRegistry {
        async fn lookup(&self, registration_number: &str) -> Result<RegistryRecord> {
            self.calls.lock().unwrap().push(registration_number.to_string());
            self.records
                .get(registration_number)
                .cloned()
                .ok_or_else(|| FleetError::Registry {
                    registration: registration_number.to_string(),
                    message: "not found".to_string(),
                })
        }
    }

    fn fleet(n: usize) -> Vec<VehicleRecord> {
        (0..n)
            .map(|i| VehicleRecord::new(i as i64 + 1, &format!("MH12AB{:04}", i + 1)))
            .collect()
    }

    fn record_with_insurance(date: &str) -> RegistryRecord {
        RegistryRecord {
            insurance_expiry_date: Some(date.to_string()),
            ..RegistryRecord::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_batches_and_counts() {
        let vehicles = fleet(12);
        let known: Vec<(String, RegistryRecord)> = vehicles
            .iter()
            .take(10)
            .map(|v| (v.registration_number.clone(), record_with_insurance("2026-01-01")))
            .collect();
        let known_refs: Vec<(&str, RegistryRecord)> =
            known.iter().map(|(r, rec)| (r.as_str(), rec.clone())).collect();
        let registry = FakeRegistry::new(&known_refs);
        let policy = BatchPolicy { batch_size: 5, delay: Duration::from_millis(1) };

        let report = refresh_fleet(&registry, &vehicles, policy).await;
        assert_eq!(report.batches, 3);
        assert_eq!(report.succeeded(), 10);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.failures[0].registration_number, "MH12AB0011");
        assert_eq!(registry.calls.lock().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_refresh_waits_between_batches() {
        let vehicles = fleet(3);
        let registry = FakeRegistry::new(&[]);
        let policy = BatchPolicy { batch_size: 1, delay: Duration::from_millis(20) };
        let started = std::time::Instant::now();
        let report = refresh_fleet(&registry, &vehicles, policy).await;
        assert_eq!(report.batches, 3);
        assert_eq!(report.failed(), 3);
        // Two pauses: none before the first batch, none after the last
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_refresh_empty_fleet() {
        let registry = FakeRegistry::new(&[]);
        let report = refresh_fleet(&registry, &[], BatchPolicy::default()).await;
        assert_eq!(report.batches, 0);
        assert_eq!(report.succeeded(), 0);
    }

    #[test]
    fn test_batch_policy_from_settings() {
        let settings = RegistrySettings { batch_size: 0, batch_delay_ms: 250, ..RegistrySettings::default() };
        let policy = BatchPolicy::from(&settings);
        assert_eq!(policy.batch_size, 1);
        assert_eq!(policy.delay, Duration::from_millis(250));
        assert_eq!(BatchPolicy::default().batch_size, 5);
    }

    #[test]
    fn test_record_from_response_shapes() {
        let obj = serde_json::json!({ "insurance_upto": "2026-02-01", "owner_name": "R. Sharma" });
        let rec = RegistryRecord::from_response("MH12AB0001", obj).unwrap();
        assert_eq!(rec.expiry(DocType::Insurance), Some("2026-02-01"));
        assert_eq!(rec.owner_name.as_deref(), Some("R. Sharma"));

        let arr = serde_json::json!([{ "pucc_upto": "2025-10-10" }]);
        let rec = RegistryRecord::from_response("MH12AB0001", arr).unwrap();
        assert_eq!(rec.expiry(DocType::Puc), Some("2025-10-10"));

        let err = RegistryRecord::from_response("MH12AB0001", serde_json::json!([])).unwrap_err();
        assert!(err.to_string().contains("MH12AB0001"));
    }

    #[test]
    fn test_rpc_endpoint() {
        assert_eq!(
            rpc_endpoint("https://api.test/", "get_vehicle_details"),
            "https://api.test/rest/v1/rpc/get_vehicle_details"
        );
    }

    #[test]
    fn test_apply_updates_overwrites_reported_fields_only() {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let id = add_vehicle(&conn, "MH12AB0001", None, Some("Old Owner"), None).unwrap();
        set_document(&conn, id, DocType::Tax, Some("2025-03-31"), Some(12_000.0)).unwrap();

        let record = RegistryRecord {
            registration_date: Some("15/01/2012".to_string()),
            insurance_expiry_date: Some("2026-01-01".to_string()),
            fitness_expiry_date: Some("unknown".to_string()),
            ..RegistryRecord::default()
        };
        assert_eq!(apply_updates(&conn, &[(id, record)]).unwrap(), 1);

        let v = &load_vehicles(&conn).unwrap()[0];
        assert_eq!(v.registration_date.as_deref(), Some("2012-01-15"));
        assert_eq!(v.owner_name.as_deref(), Some("Old Owner"));
        assert_eq!(v.insurance.expiry_date.as_deref(), Some("2026-01-01"));
        assert!(v.fitness.expiry_date.is_none());
        assert_eq!(v.tax.expiry_date.as_deref(), Some("2025-03-31"));
        assert_eq!(v.tax.cost, Some(12_000.0));
    }

    #[test]
    fn test_apply_updates_keeps_stored_dates_when_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let id = add_vehicle(&conn, "MH12AB0001", Some("2012-01-15"), None, None).unwrap();
        set_document(&conn, id, DocType::Permit, Some("2026-05-01"), None).unwrap();

        let record = RegistryRecord {
            registration_date: Some("15-Jan-2030".to_string()),
            permit_expiry_date: Some("next year".to_string()),
            ..RegistryRecord::default()
        };
        assert_eq!(readable_date(id, "permit", record.permit_expiry_date.as_deref()), None);
        assert_eq!(readable_date(id, "permit", None), None);
        apply_updates(&conn, &[(id, record)]).unwrap();

        let v = &load_vehicles(&conn).unwrap()[0];
        assert_eq!(v.registration_date.as_deref(), Some("2012-01-15"));
        assert_eq!(v.permit.expiry_date.as_deref(), Some("2026-05-01"));
    }
}
