use std::collections::HashMap;

use chrono::{Months, NaiveDate};
use tracing::debug;

use crate::expiry::parse_expiry;
use crate::models::VehicleRecord;

/// Registration certificates for transport vehicles run 15 years from
/// the date of registration.
pub const RC_VALIDITY_YEARS: u32 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRcExpiry {
    pub registration_date: String,
    pub rc_expiry: NaiveDate,
}

/// Memoized RC expiry dates derived from registration dates, keyed by
/// vehicle id. An entry only stays valid while the vehicle's registration
/// date matches the one it was derived from.
#[derive(Debug, Clone, Default)]
pub struct RcExpiryCache {
    entries: HashMap<i64, CachedRcExpiry>,
}

pub fn derive_rc_expiry(registration_date: &str) -> Option<NaiveDate> {
    parse_expiry(registration_date)?.checked_add_months(Months::new(RC_VALIDITY_YEARS * 12))
}

impl RcExpiryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (i64, CachedRcExpiry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&i64, &CachedRcExpiry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, vehicle_id: i64) -> Option<&CachedRcExpiry> {
        self.entries.get(&vehicle_id)
    }

    pub fn invalidate(&mut self, vehicle_id: i64) {
        self.entries.remove(&vehicle_id);
    }

    /// Effective RC expiry for a vehicle. An explicit RC expiry on the record
    /// wins; otherwise the derived date is served from (or stored in) the cache.
    pub fn rc_expiry(&mut self, vehicle: &VehicleRecord) -> Option<NaiveDate> {
        if let Some(explicit) = vehicle.rc.expiry_date.as_deref().and_then(parse_expiry) {
            return Some(explicit);
        }
        let Some(reg_date) = vehicle.registration_date.as_deref() else {
            self.invalidate(vehicle.id);
            return None;
        };

        if let Some(hit) = self.get(vehicle.id) {
            if hit.registration_date == reg_date {
                return Some(hit.rc_expiry);
            }
            debug!(
                vehicle = %vehicle.registration_number,
                "registration date changed, dropping cached RC expiry"
            );
        }

        match derive_rc_expiry(reg_date) {
            Some(rc_expiry) => {
                self.entries.insert(
                    vehicle.id,
                    CachedRcExpiry {
                        registration_date: reg_date.to_string(),
                        rc_expiry,
                    },
                );
                Some(rc_expiry)
            }
            None => {
                self.invalidate(vehicle.id);
                None
            }
        }
    }
}
