use std::cmp::Ordering;

use serde::Serialize;

use crate::tiering::RiskLevel;

pub const DEFAULT_TOP_N: usize = 3;

/// A supplier with every derived field populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessedSupplier {
    pub supplier: String,
    pub material: String,
    pub transport: String,
    pub distance_km: f64,
    pub quantity_ton: f64,
    pub emission_factor: f64,
    pub cost_per_ton: f64,
    pub emissions_kg: f64,
    pub cluster_id: usize,
    pub risk_level: RiskLevel,
    pub carbon_cost: f64,
    pub priority_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryKpis {
    pub total_suppliers: usize,
    pub total_emissions_kg: f64,
    pub high_risk_suppliers: usize,
    pub total_carbon_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub supplier: String,
    pub priority_score: f64,
    pub emissions_kg: f64,
    pub risk_level: RiskLevel,
    pub rationale: String,
}

/// Decision-table projection of an assessed supplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierRow {
    pub supplier: String,
    pub material: String,
    pub emissions_kg: f64,
    pub carbon_cost: f64,
    pub risk_level: RiskLevel,
    pub priority_score: f64,
}

impl From<&AssessedSupplier> for SupplierRow {
    fn from(s: &AssessedSupplier) -> Self {
        Self {
            supplier: s.supplier.clone(),
            material: s.material.clone(),
            emissions_kg: s.emissions_kg,
            carbon_cost: s.carbon_cost,
            risk_level: s.risk_level,
            priority_score: s.priority_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub supplier: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: &'static str,
    pub points: Vec<ChartPoint>,
}

/// Highest priority first; equal scores fall back to supplier name.
pub fn priority_order(a: &AssessedSupplier, b: &AssessedSupplier) -> Ordering {
    b.priority_score
        .total_cmp(&a.priority_score)
        .then_with(|| a.supplier.cmp(&b.supplier))
}

pub fn rank(suppliers: &[AssessedSupplier]) -> Vec<AssessedSupplier> {
    let mut ranked = suppliers.to_vec();
    ranked.sort_by(priority_order);
    ranked
}

pub fn summarize(suppliers: &[AssessedSupplier]) -> SummaryKpis {
    SummaryKpis {
        total_suppliers: suppliers.len(),
        total_emissions_kg: suppliers.iter().map(|s| s.emissions_kg).sum(),
        high_risk_suppliers: suppliers
            .iter()
            .filter(|s| s.risk_level == RiskLevel::High)
            .count(),
        total_carbon_cost: suppliers.iter().map(|s| s.carbon_cost).sum(),
    }
}

pub fn rationale(supplier: &AssessedSupplier) -> String {
    format!(
        "Focus on {}: {} risk supplier with {} kg CO2 and strong reduction potential per unit of spend.",
        supplier.supplier,
        supplier.risk_level,
        format_thousands(supplier.emissions_kg)
    )
}

/// Takes the first `n` of an already ranked list.
pub fn recommend(ranked: &[AssessedSupplier], n: usize) -> Vec<Recommendation> {
    ranked
        .iter()
        .take(n)
        .map(|s| Recommendation {
            supplier: s.supplier.clone(),
            priority_score: s.priority_score,
            emissions_kg: s.emissions_kg,
            risk_level: s.risk_level,
            rationale: rationale(s),
        })
        .collect()
}

pub fn table_rows(ranked: &[AssessedSupplier]) -> Vec<SupplierRow> {
    ranked.iter().map(SupplierRow::from).collect()
}

pub fn emissions_series(suppliers: &[AssessedSupplier]) -> ChartSeries {
    ChartSeries {
        label: "Emissions by Supplier (kg)",
        points: suppliers
            .iter()
            .map(|s| ChartPoint {
                supplier: s.supplier.clone(),
                value: s.emissions_kg,
            })
            .collect(),
    }
}

pub fn priority_series(suppliers: &[AssessedSupplier]) -> ChartSeries {
    ChartSeries {
        label: "Priority Score (impact per unit of spend)",
        points: suppliers
            .iter()
            .map(|s| ChartPoint {
                supplier: s.supplier.clone(),
                value: s.priority_score,
            })
            .collect(),
    }
}

/// Integer part of `value` with comma thousands separators.
#[allow(clippy::cast_possible_truncation)]
pub fn format_thousands(value: f64) -> String {
    let whole = value.trunc() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if whole < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
