use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{effective_expiry, RenewalWindow};
use crate::cache::RcExpiryCache;
use crate::expiry::{classify_date, DocumentStatus};
use crate::models::{DocType, VehicleRecord, OTHER_DEFAULT_COST, OTHER_INFLATION_RATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    Recorded,
    FleetAverage,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBasis {
    pub amount: f64,
    pub source: CostSource,
}

/// Projected renewal cost: the base cost moved by the given inflation rate.
pub fn project(base: f64, inflation_rate: f64) -> f64 {
    base * (1.0 + inflation_rate)
}

/// Projected cost of a non-document expense of `base` (or the default).
pub fn project_other(base: Option<f64>) -> f64 {
    project(base.filter(|b| *b > 0.0).unwrap_or(OTHER_DEFAULT_COST), OTHER_INFLATION_RATE)
}

/// Resolves last-known renewal costs for a loaded fleet. Fleet averages are
/// computed once at construction, so an estimator belongs to one snapshot.
#[derive(Debug, Clone, Default)]
pub struct CostEstimator {
    averages: BTreeMap<DocType, f64>,
}

impl CostEstimator {
    pub fn from_fleet(vehicles: &[VehicleRecord]) -> Self {
        let mut averages = BTreeMap::new();
        for doc in DocType::ALL {
            let costs: Vec<f64> = vehicles
                .iter()
                .filter_map(|v| v.slot(doc).positive_cost())
                .collect();
            if !costs.is_empty() {
                averages.insert(doc, costs.iter().sum::<f64>() / costs.len() as f64);
            }
        }
        Self { averages }
    }

    pub fn fleet_average(&self, doc: DocType) -> Option<f64> {
        self.averages.get(&doc).copied()
    }

    pub fn base_cost(&self, vehicle: &VehicleRecord, doc: DocType) -> CostBasis {
        if let Some(amount) = vehicle.slot(doc).positive_cost() {
            return CostBasis { amount, source: CostSource::Recorded };
        }
        if let Some(amount) = self.fleet_average(doc) {
            return CostBasis { amount, source: CostSource::FleetAverage };
        }
        CostBasis {
            amount: doc.default_cost(),
            source: CostSource::Default,
        }
    }

    pub fn estimate(&self, vehicle: &VehicleRecord, doc: DocType) -> f64 {
        project(self.base_cost(vehicle, doc).amount, doc.inflation_rate())
    }
}

// ---------------------------------------------------------------------------
// Projected renewals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ProjectedRenewal {
    pub vehicle_id: i64,
    pub registration_number: String,
    pub doc_type: DocType,
    pub expiry: NaiveDate,
    pub status: DocumentStatus,
    pub basis: CostBasis,
    pub projected_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewalForecast {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub items: Vec<ProjectedRenewal>,
    pub total: f64,
}

/// Every document due for renewal by the end of the window, including ones
/// that have already lapsed, with its projected cost. Sorted by expiry date.
pub fn projected_renewals(
    vehicles: &[VehicleRecord],
    window: &RenewalWindow,
    today: NaiveDate,
    cache: &mut RcExpiryCache,
) -> RenewalForecast {
    let (from, to) = window.resolve(today);
    let estimator = CostEstimator::from_fleet(vehicles);

    let mut items = Vec::new();
    for vehicle in vehicles {
        for doc in DocType::ALL {
            let Some(expiry) = effective_expiry(vehicle, doc, cache) else {
                continue;
            };
            if expiry > to {
                continue;
            }
            let basis = estimator.base_cost(vehicle, doc);
            items.push(ProjectedRenewal {
                vehicle_id: vehicle.id,
                registration_number: vehicle.registration_number.clone(),
                doc_type: doc,
                expiry,
                status: classify_date(Some(expiry), today),
                basis,
                projected_cost: estimator.estimate(vehicle, doc),
            });
        }
    }
    items.sort_by(|a, b| {
        a.expiry
            .cmp(&b.expiry)
            .then_with(|| a.registration_number.cmp(&b.registration_number))
            .then_with(|| a.doc_type.cmp(&b.doc_type))
    });
    let total = items.iter().map(|i| i.projected_cost).sum();

    RenewalForecast { from, to, items, total }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet_without_insurance_cost() -> Vec<VehicleRecord> {
        vec![
            VehicleRecord::new(1, "MH12AB0001"),
            VehicleRecord::new(2, "MH12AB0002"),
            VehicleRecord::new(3, "MH12AB0003"),
        ]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_default_insurance_projection() {
        let fleet = fleet_without_insurance_cost();
        let est = CostEstimator::from_fleet(&fleet);
        let basis = est.base_cost(&fleet[0], DocType::Insurance);
        assert_eq!(basis.source, CostSource::Default);
        assert_eq!(basis.amount, 15_000.0);
        assert!(close(est.estimate(&fleet[0], DocType::Insurance), 13_875.0));
    }

    #[test]
    fn test_recorded_cost_wins() {
        let mut fleet = fleet_without_insurance_cost();
        fleet[0].tax.cost = Some(10_000.0);
        fleet[1].tax.cost = Some(20_000.0);
        let est = CostEstimator::from_fleet(&fleet);
        let basis = est.base_cost(&fleet[0], DocType::Tax);
        assert_eq!(basis.source, CostSource::Recorded);
        assert!(close(est.estimate(&fleet[0], DocType::Tax), 10_750.0));
    }

    #[test]
    fn test_fleet_average_excludes_zero_and_missing() {
        let mut fleet = fleet_without_insurance_cost();
        fleet[0].fitness.cost = Some(4_000.0);
        fleet[1].fitness.cost = Some(0.0);
        let mut fourth = VehicleRecord::new(4, "MH12AB0004");
        fourth.fitness.cost = Some(6_000.0);
        fleet.push(fourth);
        let est = CostEstimator::from_fleet(&fleet);
        assert_eq!(est.fleet_average(DocType::Fitness), Some(5_000.0));
        let basis = est.base_cost(&fleet[2], DocType::Fitness);
        assert_eq!(basis.source, CostSource::FleetAverage);
        assert_eq!(basis.amount, 5_000.0);
    }

    #[test]
    fn test_permit_has_no_inflation() {
        let fleet = fleet_without_insurance_cost();
        let est = CostEstimator::from_fleet(&fleet);
        assert_eq!(est.estimate(&fleet[0], DocType::Permit), 10_000.0);
    }

    #[test]
    fn test_non_negative_inflation_never_decreases_cost() {
        let bases = [0.01, 1.0, 499.99, 15_000.0, 1_234_567.89];
        for doc in DocType::ALL {
            if doc.inflation_rate() < 0.0 {
                continue;
            }
            for base in bases {
                assert!(project(base, doc.inflation_rate()) >= base, "{doc} {base}");
            }
        }
        assert!(project_other(Some(100.0)) >= 100.0);
        assert!(close(project_other(None), 3_240.0));
    }

    #[test]
    fn test_projected_renewals_window() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let mut a = VehicleRecord::new(1, "MH12AB0001");
        a.insurance.expiry_date = Some("2025-06-25".to_string());
        a.insurance.cost = Some(20_000.0);
        a.puc.expiry_date = Some("2025-06-01".to_string());
        a.tax.expiry_date = Some("2026-01-01".to_string());
        let fleet = vec![a];
        let mut cache = RcExpiryCache::new();

        let forecast =
            projected_renewals(&fleet, &RenewalWindow::Next30Days, today, &mut cache);
        assert_eq!(forecast.items.len(), 2);
        assert_eq!(forecast.items[0].doc_type, DocType::Puc);
        assert_eq!(forecast.items[0].status, DocumentStatus::Expired);
        assert_eq!(forecast.items[1].doc_type, DocType::Insurance);
        assert!(close(forecast.items[1].projected_cost, 18_500.0));
        assert!(close(forecast.total, 525.0 + 18_500.0));
    }
}
