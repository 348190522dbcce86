use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DecisionError;
use crate::metrics::{emissions_kg, priority_score};

/// One row of the supplier table. Column names from the legacy dashboard
/// export (`Distance_km`, `Emission_Factor`, ...) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRecord {
    #[serde(alias = "Supplier")]
    pub supplier: String,
    #[serde(alias = "Material")]
    pub material: String,
    #[serde(alias = "Distance_km")]
    pub distance_km: f64,
    #[serde(alias = "Transport")]
    pub transport: String,
    #[serde(alias = "Quantity_ton")]
    pub quantity_ton: f64,
    /// kg CO2 per ton-km.
    #[serde(alias = "Emission_Factor")]
    pub emission_factor: f64,
    #[serde(alias = "Cost_per_ton")]
    pub cost_per_ton: f64,
}

impl SupplierRecord {
    pub fn new(
        supplier: impl Into<String>,
        material: impl Into<String>,
        distance_km: f64,
        transport: impl Into<String>,
        quantity_ton: f64,
        emission_factor: f64,
        cost_per_ton: f64,
    ) -> Self {
        Self {
            supplier: supplier.into(),
            material: material.into(),
            distance_km,
            transport: transport.into(),
            quantity_ton,
            emission_factor,
            cost_per_ton,
        }
    }

    /// Checks the field constraints of a single row. `index` is the row's
    /// position in its batch and is carried into the error.
    pub fn validate(&self, index: usize) -> Result<(), InvalidRecord> {
        let fail = |field, violation| InvalidRecord {
            index,
            supplier: self.supplier.clone(),
            field,
            violation,
        };

        if self.supplier.trim().is_empty() {
            return Err(fail(RecordField::Supplier, Violation::Empty));
        }

        for (field, value) in [
            (RecordField::DistanceKm, self.distance_km),
            (RecordField::QuantityTon, self.quantity_ton),
            (RecordField::EmissionFactor, self.emission_factor),
        ] {
            if !value.is_finite() {
                return Err(fail(field, Violation::NotFinite));
            }
            if value < 0.0 {
                return Err(fail(field, Violation::Negative(value)));
            }
        }

        if !self.cost_per_ton.is_finite() {
            return Err(fail(RecordField::CostPerTon, Violation::NotFinite));
        }
        if self.cost_per_ton <= 0.0 {
            return Err(fail(
                RecordField::CostPerTon,
                Violation::NotPositive(self.cost_per_ton),
            ));
        }

        // In-range inputs can still overflow once multiplied out.
        let emissions = emissions_kg(self);
        if !emissions.is_finite() {
            return Err(fail(RecordField::EmissionsKg, Violation::NotFinite));
        }
        if !priority_score(emissions, self.cost_per_ton).is_finite() {
            return Err(fail(RecordField::PriorityScore, Violation::NotFinite));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Supplier,
    DistanceKm,
    QuantityTon,
    EmissionFactor,
    CostPerTon,
    /// Derived; checked after the raw fields.
    EmissionsKg,
    PriorityScore,
}

impl RecordField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supplier => "supplier",
            Self::DistanceKm => "distance_km",
            Self::QuantityTon => "quantity_ton",
            Self::EmissionFactor => "emission_factor",
            Self::CostPerTon => "cost_per_ton",
            Self::EmissionsKg => "emissions_kg",
            Self::PriorityScore => "priority_score",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Violation {
    #[error("must not be negative (got {0})")]
    Negative(f64),

    #[error("must be greater than zero (got {0})")]
    NotPositive(f64),

    #[error("must be a finite number")]
    NotFinite,

    #[error("must not be empty")]
    Empty,

    #[error("repeats an earlier supplier id")]
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("record {index} ({supplier:?}): {field} {violation}")]
pub struct InvalidRecord {
    pub index: usize,
    pub supplier: String,
    pub field: RecordField,
    pub violation: Violation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Bad rows are reported and skipped; the rest are processed.
    #[default]
    PerRecord,
    /// Any bad row rejects the whole batch.
    AllOrNothing,
}

impl ValidationMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "per_record" | "per-record" => Some(Self::PerRecord),
            "all_or_nothing" | "all-or-nothing" | "strict" => Some(Self::AllOrNothing),
            _ => None,
        }
    }
}

/// An accepted row and its position in the submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedRecord {
    pub index: usize,
    pub record: SupplierRecord,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedRecords {
    pub accepted: Vec<AcceptedRecord>,
    pub rejected: Vec<InvalidRecord>,
}

/// Splits a batch into accepted and rejected rows. A supplier id seen earlier
/// in the batch is rejected as a duplicate; the first occurrence stays.
pub fn validate_records(
    records: &[SupplierRecord],
    mode: ValidationMode,
) -> Result<ValidatedRecords, DecisionError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    let mut out = ValidatedRecords::default();

    for (index, record) in records.iter().enumerate() {
        let checked = record.validate(index).and_then(|()| {
            if seen.insert(record.supplier.as_str()) {
                Ok(())
            } else {
                Err(InvalidRecord {
                    index,
                    supplier: record.supplier.clone(),
                    field: RecordField::Supplier,
                    violation: Violation::Duplicate,
                })
            }
        });

        match checked {
            Ok(()) => out.accepted.push(AcceptedRecord {
                index,
                record: record.clone(),
            }),
            Err(rejection) => {
                log::warn!("rejected supplier row: {rejection}");
                out.rejected.push(rejection);
            }
        }
    }

    if mode == ValidationMode::AllOrNothing && !out.rejected.is_empty() {
        return Err(DecisionError::InvalidRecords(out.rejected));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha() -> SupplierRecord {
        SupplierRecord::new("Alpha", "Palm Oil", 500.0, "Truck", 120.0, 0.12, 90_000.0)
    }

    #[test]
    fn accepts_zero_activity() {
        let mut r = alpha();
        r.distance_km = 0.0;
        r.quantity_ton = 0.0;
        r.emission_factor = 0.0;
        assert!(r.validate(0).is_ok());
    }

    #[test]
    fn rejects_negative_fields_without_clamping() {
        let mut r = alpha();
        r.quantity_ton = -1.0;
        let err = r.validate(4).expect_err("negative quantity");
        assert_eq!(err.index, 4);
        assert_eq!(err.field, RecordField::QuantityTon);
        assert_eq!(err.violation, Violation::Negative(-1.0));
    }

    #[test]
    fn rejects_non_positive_cost() {
        let mut r = alpha();
        r.cost_per_ton = 0.0;
        let err = r.validate(0).expect_err("zero cost");
        assert_eq!(err.field, RecordField::CostPerTon);
        assert_eq!(err.violation, Violation::NotPositive(0.0));
    }

    #[test]
    fn rejects_nan_and_blank_id() {
        let mut r = alpha();
        r.emission_factor = f64::NAN;
        assert_eq!(
            r.validate(0).expect_err("nan").violation,
            Violation::NotFinite
        );

        let mut r = alpha();
        r.supplier = "  ".to_string();
        assert_eq!(r.validate(0).expect_err("blank").field, RecordField::Supplier);
    }

    #[test]
    fn rejects_overflowing_products() {
        let huge = SupplierRecord::new("Huge", "Steel", 1e200, "Ship", 1e200, 0.0, 1.0);
        let err = huge.validate(3).expect_err("nan emissions");
        assert_eq!(err.index, 3);
        assert_eq!(err.field, RecordField::EmissionsKg);
        assert_eq!(err.violation, Violation::NotFinite);

        let mut inf = huge.clone();
        inf.emission_factor = 1.0;
        assert_eq!(
            inf.validate(0).expect_err("infinite emissions").field,
            RecordField::EmissionsKg
        );

        let tiny_cost = SupplierRecord::new("Tiny", "Steel", 1e200, "Ship", 1e100, 1.0, 1e-300);
        assert_eq!(
            tiny_cost.validate(0).expect_err("infinite priority").field,
            RecordField::PriorityScore
        );
    }

    #[test]
    fn per_record_mode_isolates_bad_rows() {
        let mut bad = alpha();
        bad.supplier = "Broken".to_string();
        bad.cost_per_ton = -5.0;
        let mut beta = alpha();
        beta.supplier = "Beta".to_string();

        let out = validate_records(&[alpha(), bad, beta, alpha()], ValidationMode::PerRecord)
            .expect("per-record never fails");
        let accepted: Vec<(usize, &str)> = out
            .accepted
            .iter()
            .map(|a| (a.index, a.record.supplier.as_str()))
            .collect();
        assert_eq!(accepted, vec![(0, "Alpha"), (2, "Beta")]);
        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.rejected[0].index, 1);
        assert_eq!(out.rejected[1].index, 3);
        assert_eq!(out.rejected[1].violation, Violation::Duplicate);
    }

    #[test]
    fn all_or_nothing_mode_fails_batch() {
        let mut bad = alpha();
        bad.distance_km = -10.0;
        let err = validate_records(&[bad], ValidationMode::AllOrNothing).expect_err("strict");
        assert!(matches!(err, DecisionError::InvalidRecords(ref v) if v.len() == 1));
    }

    #[test]
    fn error_message_names_row_and_field() {
        let mut r = alpha();
        r.distance_km = -3.0;
        let msg = r.validate(2).expect_err("negative").to_string();
        assert_eq!(
            msg,
            "record 2 (\"Alpha\"): distance_km must not be negative (got -3)"
        );
    }

    #[test]
    fn validation_mode_names() {
        assert_eq!(
            ValidationMode::from_name("ALL_OR_NOTHING"),
            Some(ValidationMode::AllOrNothing)
        );
        assert_eq!(
            ValidationMode::from_name("per-record"),
            Some(ValidationMode::PerRecord)
        );
        assert_eq!(ValidationMode::from_name("lenient"), None);
    }
}
