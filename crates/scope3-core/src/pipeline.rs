use std::sync::Arc;

use scope3_partition::{build_partitioner, GroupPartitioner, PartitionerConfig};
use serde::Serialize;

use crate::error::DecisionError;
use crate::metrics::{meter, MeteredSupplier};
use crate::pricing::{carbon_cost, CarbonPrice};
use crate::record::{validate_records, InvalidRecord, SupplierRecord, ValidationMode};
use crate::report::{
    emissions_series, priority_series, rank, recommend, summarize, table_rows, AssessedSupplier,
    ChartSeries, Recommendation, SummaryKpis, SupplierRow, DEFAULT_TOP_N,
};
use crate::tiering::{DegenerateClustering, GroupSummary, RiskTieringEngine, SupplierTier};

#[derive(Debug, Clone)]
pub struct PipelinePolicy {
    pub top_n: usize,
    pub validation: ValidationMode,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            validation: ValidationMode::PerRecord,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieredSupplier {
    pub metered: MeteredSupplier,
    pub tier: SupplierTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieringReport {
    pub partitioner: String,
    pub groups: Vec<GroupSummary>,
    pub degenerate: Option<DegenerateClustering>,
}

/// Everything that does not depend on the carbon price. Re-pricing a
/// prepared dataset leaves tiers untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct TieredDataset {
    suppliers: Vec<TieredSupplier>,
    rejected: Vec<InvalidRecord>,
    tiering: TieringReport,
}

impl TieredDataset {
    pub fn suppliers(&self) -> &[TieredSupplier] {
        &self.suppliers
    }

    pub fn rejected(&self) -> &[InvalidRecord] {
        &self.rejected
    }

    pub fn tiering(&self) -> &TieringReport {
        &self.tiering
    }

    pub fn price(&self, carbon_price: CarbonPrice, top_n: usize) -> DecisionReport {
        let suppliers: Vec<AssessedSupplier> = self
            .suppliers
            .iter()
            .map(|s| {
                let r = &s.metered.record;
                AssessedSupplier {
                    supplier: r.supplier.clone(),
                    material: r.material.clone(),
                    transport: r.transport.clone(),
                    distance_km: r.distance_km,
                    quantity_ton: r.quantity_ton,
                    emission_factor: r.emission_factor,
                    cost_per_ton: r.cost_per_ton,
                    emissions_kg: s.metered.emissions_kg,
                    cluster_id: s.tier.cluster_id,
                    risk_level: s.tier.risk_level,
                    carbon_cost: carbon_cost(s.metered.emissions_kg, carbon_price),
                    priority_score: s.metered.priority_score,
                }
            })
            .collect();

        let ranked = rank(&suppliers);
        let summary = summarize(&suppliers);
        let recommendations = recommend(&ranked, top_n);

        DecisionReport {
            carbon_price: carbon_price.value(),
            suppliers,
            ranked,
            summary,
            recommendations,
            rejected: self.rejected.clone(),
            tiering: self.tiering.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionReport {
    pub carbon_price: f64,
    /// Input order.
    pub suppliers: Vec<AssessedSupplier>,
    /// Priority order.
    pub ranked: Vec<AssessedSupplier>,
    pub summary: SummaryKpis,
    pub recommendations: Vec<Recommendation>,
    pub rejected: Vec<InvalidRecord>,
    pub tiering: TieringReport,
}

impl DecisionReport {
    pub fn table_rows(&self) -> Vec<SupplierRow> {
        table_rows(&self.ranked)
    }

    pub fn emissions_series(&self) -> ChartSeries {
        emissions_series(&self.suppliers)
    }

    pub fn priority_series(&self) -> ChartSeries {
        priority_series(&self.suppliers)
    }
}

/// Validation, metrics, tiering, costing and ranking in one pass. Each run is a
/// pure function of the records, the carbon price and the partitioner config.
#[derive(Debug, Clone)]
pub struct DecisionPipeline {
    policy: PipelinePolicy,
    engine: RiskTieringEngine,
}

impl DecisionPipeline {
    pub fn new(policy: PipelinePolicy, partitioner: Arc<dyn GroupPartitioner>) -> Self {
        Self {
            policy,
            engine: RiskTieringEngine::new(partitioner),
        }
    }

    pub fn with_config(
        policy: PipelinePolicy,
        partitioner: PartitionerConfig,
    ) -> Result<Self, DecisionError> {
        Ok(Self::new(policy, build_partitioner(partitioner)?))
    }

    pub fn policy(&self) -> &PipelinePolicy {
        &self.policy
    }

    pub fn prepare(&self, records: &[SupplierRecord]) -> Result<TieredDataset, DecisionError> {
        let validated = validate_records(records, self.policy.validation)?;

        let metered = validated
            .accepted
            .iter()
            .map(|accepted| meter(&accepted.record, accepted.index))
            .collect::<Result<Vec<_>, _>>()?;

        let emissions: Vec<f64> = metered.iter().map(|m| m.emissions_kg).collect();
        let assignment = self.engine.assign(&emissions)?;

        log::info!(
            "prepared {} supplier(s), rejected {}, partitioner={}",
            metered.len(),
            validated.rejected.len(),
            assignment.partitioner
        );

        let suppliers = metered
            .into_iter()
            .zip(assignment.tiers)
            .map(|(metered, tier)| TieredSupplier { metered, tier })
            .collect();

        Ok(TieredDataset {
            suppliers,
            rejected: validated.rejected,
            tiering: TieringReport {
                partitioner: assignment.partitioner,
                groups: assignment.groups,
                degenerate: assignment.degenerate,
            },
        })
    }

    pub fn run(
        &self,
        records: &[SupplierRecord],
        carbon_price: CarbonPrice,
    ) -> Result<DecisionReport, DecisionError> {
        Ok(self.prepare(records)?.price(carbon_price, self.policy.top_n))
    }
}

impl Default for DecisionPipeline {
    fn default() -> Self {
        Self::new(
            PipelinePolicy::default(),
            Arc::new(scope3_partition::providers::KMeansPartitioner::default()),
        )
    }
}
