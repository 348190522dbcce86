use serde::Serialize;

use crate::record::{InvalidRecord, SupplierRecord};

/// A validated record with its activity-based metrics attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeteredSupplier {
    pub record: SupplierRecord,
    pub emissions_kg: f64,
    /// Emissions per unit of spend: kg CO2 per currency unit of `cost_per_ton`.
    pub priority_score: f64,
}

pub fn emissions_kg(record: &SupplierRecord) -> f64 {
    record.distance_km * record.quantity_ton * record.emission_factor
}

/// `cost_per_ton` must already be validated as positive.
pub fn priority_score(emissions_kg: f64, cost_per_ton: f64) -> f64 {
    emissions_kg / cost_per_ton
}

pub fn meter(record: &SupplierRecord, index: usize) -> Result<MeteredSupplier, InvalidRecord> {
    record.validate(index)?;
    let emissions = emissions_kg(record);
    Ok(MeteredSupplier {
        record: record.clone(),
        emissions_kg: emissions,
        priority_score: priority_score(emissions, record.cost_per_ton),
    })
}

/// Meters every record, stopping at the first invalid one.
pub fn meter_all(records: &[SupplierRecord]) -> Result<Vec<MeteredSupplier>, InvalidRecord> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| meter(record, index))
        .collect()
}
