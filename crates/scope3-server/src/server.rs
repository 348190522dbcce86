use std::time::Instant;

use parking_lot::Mutex;
use scope3_core::{
    format_thousands, validate_records, CarbonPrice, CarbonPriceBounds, ChartSeries,
    DecisionError, DecisionPipeline, DecisionReport, SupplierRecord, SupplierRow, TieredDataset,
    ValidationMode,
};
use scope3_dataset::{load_file, resource, resources, sample_suppliers};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{ServerConfig, MAX_TOP_N};
use crate::error::ServerError;
use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    JSONRPC_VERSION, METHOD_NOT_FOUND,
};

const DEFAULT_MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// The table the server was started with, serialized on demand.
pub const CURRENT_DATASET_URI: &str = "scope3://datasets/current.json";

struct DashboardState {
    records: Vec<SupplierRecord>,
    /// Tiers for `records`; only re-priced, never re-clustered.
    prepared: TieredDataset,
    carbon_price: CarbonPrice,
}

/// Tool server over one loaded supplier table and one carbon-price setting.
pub struct DashboardServer {
    pipeline: DecisionPipeline,
    bounds: CarbonPriceBounds,
    state: Mutex<DashboardState>,
}

impl DashboardServer {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::with_config(ServerConfig::from_env())
    }

    pub fn with_config(config: ServerConfig) -> Result<Self, ServerError> {
        let records = match &config.dataset {
            Some(path) => load_file(path)?,
            None => sample_suppliers()?,
        };
        Self::with_records(config, records)
    }

    pub fn with_records(
        config: ServerConfig,
        records: Vec<SupplierRecord>,
    ) -> Result<Self, ServerError> {
        let pipeline = DecisionPipeline::with_config(config.policy(), config.partitioner.clone())?;
        let prepared = pipeline.prepare(&records)?;
        log::info!(
            "dashboard ready: {} supplier(s), carbon_price={}, top_n={}",
            prepared.suppliers().len(),
            config.carbon_price.value(),
            config.top_n
        );
        Ok(Self {
            pipeline,
            bounds: config.bounds,
            state: Mutex::new(DashboardState {
                records,
                prepared,
                carbon_price: config.carbon_price,
            }),
        })
    }

    pub fn carbon_price(&self) -> CarbonPrice {
        self.state.lock().carbon_price
    }

    pub fn bounds(&self) -> CarbonPriceBounds {
        self.bounds
    }

    /// Replaces the current price. Out-of-range values are an error unless
    /// `clamp` is set, in which case they are snapped into range.
    pub fn set_carbon_price(&self, value: f64, clamp: bool) -> Result<CarbonPrice, DecisionError> {
        let next = if clamp {
            CarbonPrice::clamped(value, &self.bounds)
        } else {
            CarbonPrice::within(value, &self.bounds)?
        };
        self.state.lock().carbon_price = next;
        log::info!("carbon price set to {}", next.value());
        Ok(next)
    }

    /// Prices the loaded table. Arguments override the current settings for
    /// this call only.
    pub fn report(
        &self,
        carbon_price: Option<f64>,
        top_n: Option<usize>,
    ) -> Result<DecisionReport, DecisionError> {
        let top_n = self.resolve_top_n(top_n)?;
        let state = self.state.lock();
        let price = match carbon_price {
            Some(value) => CarbonPrice::within(value, &self.bounds)?,
            None => state.carbon_price,
        };
        Ok(state.prepared.price(price, top_n))
    }

    /// Runs the whole pipeline over a caller-supplied table, leaving the
    /// loaded one untouched.
    pub fn report_for(
        &self,
        records: &[SupplierRecord],
        carbon_price: Option<f64>,
        top_n: Option<usize>,
    ) -> Result<DecisionReport, DecisionError> {
        let top_n = self.resolve_top_n(top_n)?;
        let price = match carbon_price {
            Some(value) => CarbonPrice::within(value, &self.bounds)?,
            None => self.carbon_price(),
        };
        Ok(self.pipeline.prepare(records)?.price(price, top_n))
    }

    #[allow(clippy::cast_precision_loss)]
    fn resolve_top_n(&self, requested: Option<usize>) -> Result<usize, DecisionError> {
        match requested {
            None => Ok(self.pipeline.policy().top_n),
            Some(n) if (1..=MAX_TOP_N).contains(&n) => Ok(n),
            Some(n) => Err(DecisionError::ConfigOutOfRange {
                name: "top_n",
                value: n as f64,
                min: 1.0,
                max: MAX_TOP_N as f64,
            }),
        }
    }

    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        let is_notification = request.is_notification();
        let id = request.id.clone().unwrap_or(Value::Null);

        if is_notification && request.method.starts_with("notifications/") {
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_MCP_PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {"name": "scope3-server", "version": env!("CARGO_PKG_VERSION")},
                        "capabilities": {
                            "tools": {"listChanged": false},
                            "resources": {"subscribe": false, "listChanged": false}
                        }
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, tools_list_result()),
            "tools/call" => self.handle_tools_call(id, request.params),
            "resources/list" => JsonRpcResponse::success(id, resources_list_result()),
            "resources/read" => self.handle_resources_read(id, request.params),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "method not found"),
        };

        if is_notification {
            return None;
        }
        Some(response)
    }

    fn handle_resources_read(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ResourceReadParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };

        let (mime_type, text) = if parsed.uri == CURRENT_DATASET_URI {
            let records = self.state.lock().records.clone();
            match serde_json::to_string_pretty(&records) {
                Ok(text) => ("application/json", text),
                Err(err) => {
                    return JsonRpcResponse::error(
                        id,
                        INTERNAL_ERROR,
                        format!("failed to serialize dataset: {err}"),
                    )
                }
            }
        } else if let Some(found) = resource(&parsed.uri) {
            (found.mime_type, found.text.to_string())
        } else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "unknown resource uri");
        };

        JsonRpcResponse::success(
            id,
            json!({
                "contents": [{
                    "uri": parsed.uri,
                    "mimeType": mime_type,
                    "text": text
                }]
            }),
        )
    }

    fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };

        let start = Instant::now();
        let response = match parsed.name.as_str() {
            "decision_report" => self.exec_decision_report(id, parsed.arguments),
            "supplier_table" => self.exec_supplier_table(id, parsed.arguments),
            "recommendations" => self.exec_recommendations(id, parsed.arguments),
            "carbon_price_get" => self.exec_carbon_price_get(id),
            "carbon_price_set" => self.exec_carbon_price_set(id, parsed.arguments),
            "dataset_validate" => exec_dataset_validate(id, parsed.arguments),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "unknown tool"),
        };
        log::debug!(
            "tool {} finished in {:.3}ms (error={})",
            parsed.name,
            start.elapsed().as_secs_f64() * 1000.0,
            response.is_error()
        );
        response
    }

    fn exec_decision_report(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: DecisionReportInput = match parse_args_optional(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };

        let report = match &args.suppliers {
            Some(records) => self.report_for(records, args.carbon_price, args.top_n),
            None => self.report(args.carbon_price, args.top_n),
        };
        let report = match report {
            Ok(v) => v,
            Err(err) => return JsonRpcResponse::decision_error(id, &err),
        };

        let text = format!(
            "suppliers={} total_emissions_kg={} high_risk={} total_carbon_cost={} carbon_price={}",
            report.summary.total_suppliers,
            format_thousands(report.summary.total_emissions_kg),
            report.summary.high_risk_suppliers,
            format_thousands(report.summary.total_carbon_cost),
            format_thousands(report.carbon_price)
        );
        structured(id, &ReportView::new(&report), text)
    }

    fn exec_supplier_table(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: PricedInput = match parse_args_optional(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };
        let report = match self.report(args.carbon_price, None) {
            Ok(v) => v,
            Err(err) => return JsonRpcResponse::decision_error(id, &err),
        };
        let rows = report.table_rows();
        let text = format!(
            "{} supplier row(s) at carbon price {}",
            rows.len(),
            format_thousands(report.carbon_price)
        );
        structured(
            id,
            &json!({
                "carbon_price": report.carbon_price,
                "rows": rows
            }),
            text,
        )
    }

    fn exec_recommendations(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: RecommendationsInput = match parse_args_optional(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };
        let report = match self.report(args.carbon_price, args.top_n) {
            Ok(v) => v,
            Err(err) => return JsonRpcResponse::decision_error(id, &err),
        };
        let text = report
            .recommendations
            .iter()
            .map(|r| r.rationale.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        structured(
            id,
            &json!({
                "carbon_price": report.carbon_price,
                "recommendations": report.recommendations
            }),
            text,
        )
    }

    fn exec_carbon_price_get(&self, id: Value) -> JsonRpcResponse {
        let current = self.carbon_price();
        structured(
            id,
            &json!({
                "carbon_price": current.value(),
                "bounds": self.bounds
            }),
            format!("carbon_price={}", format_thousands(current.value())),
        )
    }

    fn exec_carbon_price_set(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: CarbonPriceSetInput = match parse_args(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };
        let previous = self.carbon_price();
        let current = match self.set_carbon_price(args.carbon_price, args.clamp) {
            Ok(v) => v,
            Err(err) => return JsonRpcResponse::decision_error(id, &err),
        };
        structured(
            id,
            &json!({
                "carbon_price": current.value(),
                "previous": previous.value(),
                "adjusted": current.value() != args.carbon_price
            }),
            format!(
                "carbon_price {} -> {}",
                format_thousands(previous.value()),
                format_thousands(current.value())
            ),
        )
    }
}

fn exec_dataset_validate(id: Value, arguments: Option<Value>) -> JsonRpcResponse {
    let args: DatasetValidateInput = match parse_args(arguments) {
        Ok(v) => v,
        Err(resp) => return with_id(resp, id),
    };
    let validated = match validate_records(&args.suppliers, args.mode.unwrap_or_default()) {
        Ok(v) => v,
        Err(err) => return JsonRpcResponse::decision_error(id, &err),
    };
    let accepted: Vec<&str> = validated
        .accepted
        .iter()
        .map(|a| a.record.supplier.as_str())
        .collect();
    let text = format!(
        "accepted={} rejected={}",
        accepted.len(),
        validated.rejected.len()
    );
    structured(
        id,
        &json!({
            "accepted": accepted,
            "rejected": validated.rejected
        }),
        text,
    )
}

/// A [`DecisionReport`] plus the dashboard's table and chart projections.
#[derive(Serialize)]
pub(crate) struct ReportView<'a> {
    #[serde(flatten)]
    report: &'a DecisionReport,
    table: Vec<SupplierRow>,
    charts: [ChartSeries; 2],
}

impl<'a> ReportView<'a> {
    pub(crate) fn new(report: &'a DecisionReport) -> Self {
        Self {
            report,
            table: report.table_rows(),
            charts: [report.emissions_series(), report.priority_series()],
        }
    }
}

fn structured<T: Serialize>(id: Value, payload: &T, text: String) -> JsonRpcResponse {
    match serde_json::to_value(payload) {
        Ok(content) => JsonRpcResponse::success(
            id,
            json!({
                "structuredContent": content,
                "content": [{"type": "text", "text": text}]
            }),
        ),
        Err(err) => {
            JsonRpcResponse::error(id, INTERNAL_ERROR, format!("failed to serialize result: {err}"))
        }
    }
}

fn with_id(mut response: JsonRpcResponse, id: Value) -> JsonRpcResponse {
    response.id = id;
    response
}

fn parse_args<T: for<'de> Deserialize<'de>>(
    arguments: Option<Value>,
) -> Result<T, JsonRpcResponse> {
    let Some(args) = arguments else {
        return Err(JsonRpcResponse::error(
            Value::Null,
            INVALID_PARAMS,
            "missing tool arguments",
        ));
    };
    serde_json::from_value(args).map_err(|err| {
        JsonRpcResponse::error(
            Value::Null,
            INVALID_PARAMS,
            format!("invalid tool arguments: {err}"),
        )
    })
}

fn parse_args_optional<T: for<'de> Deserialize<'de> + Default>(
    arguments: Option<Value>,
) -> Result<T, JsonRpcResponse> {
    match arguments {
        Some(Value::Null) | None => Ok(T::default()),
        Some(v) => serde_json::from_value(v).map_err(|err| {
            JsonRpcResponse::error(
                Value::Null,
                INVALID_PARAMS,
                format!("invalid tool arguments: {err}"),
            )
        }),
    }
}

fn tools_list_result() -> Value {
    let supplier_item = json!({
        "type": "object",
        "required": [
            "supplier", "material", "distance_km", "transport",
            "quantity_ton", "emission_factor", "cost_per_ton"
        ],
        "properties": {
            "supplier": {"type": "string"},
            "material": {"type": "string"},
            "distance_km": {"type": "number", "minimum": 0},
            "transport": {"type": "string"},
            "quantity_ton": {"type": "number", "minimum": 0},
            "emission_factor": {"type": "number", "minimum": 0},
            "cost_per_ton": {"type": "number", "exclusiveMinimum": 0}
        }
    });
    let bounds = CarbonPriceBounds::default();
    let carbon_price = json!({
        "type": "number",
        "minimum": bounds.min,
        "maximum": bounds.max
    });
    let top_n = json!({"type": "integer", "minimum": 1, "maximum": MAX_TOP_N});

    json!({
        "tools": [
            {
                "name": "decision_report",
                "description": "Emissions, risk tiers, carbon cost, ranking, KPIs and recommendations for the loaded supplier table or for an inline one.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "carbon_price": carbon_price,
                        "top_n": top_n,
                        "suppliers": {"type": "array", "items": supplier_item}
                    }
                }
            },
            {
                "name": "supplier_table",
                "description": "Decision table rows in priority order.",
                "inputSchema": {
                    "type": "object",
                    "properties": {"carbon_price": carbon_price}
                }
            },
            {
                "name": "recommendations",
                "description": "Top-N suppliers to engage, with rationale.",
                "inputSchema": {
                    "type": "object",
                    "properties": {"carbon_price": carbon_price, "top_n": top_n}
                }
            },
            {
                "name": "carbon_price_get",
                "description": "Current carbon price (currency per tonne CO2) and its bounds.",
                "inputSchema": {"type": "object", "properties": {}}
            },
            {
                "name": "carbon_price_set",
                "description": "Set the carbon price. Out-of-range values are rejected unless clamp is true.",
                "inputSchema": {
                    "type": "object",
                    "required": ["carbon_price"],
                    "properties": {
                        "carbon_price": {"type": "number"},
                        "clamp": {"type": "boolean"}
                    }
                }
            },
            {
                "name": "dataset_validate",
                "description": "Check supplier rows without running the pipeline.",
                "inputSchema": {
                    "type": "object",
                    "required": ["suppliers"],
                    "properties": {
                        "suppliers": {"type": "array", "items": supplier_item},
                        "mode": {"type": "string", "enum": ["per_record", "all_or_nothing"]}
                    }
                }
            }
        ]
    })
}

fn resources_list_result() -> Value {
    let mut listed = resources()
        .iter()
        .map(|resource| {
            json!({
                "uri": resource.uri,
                "name": resource.name,
                "description": resource.description,
                "mimeType": resource.mime_type
            })
        })
        .collect::<Vec<_>>();
    listed.push(json!({
        "uri": CURRENT_DATASET_URI,
        "name": "datasets/current.json",
        "description": "Supplier table this server was started with.",
        "mimeType": "application/json"
    }));
    json!({ "resources": listed })
}

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DecisionReportInput {
    carbon_price: Option<f64>,
    top_n: Option<usize>,
    suppliers: Option<Vec<SupplierRecord>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PricedInput {
    carbon_price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecommendationsInput {
    carbon_price: Option<f64>,
    top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CarbonPriceSetInput {
    carbon_price: f64,
    #[serde(default)]
    clamp: bool,
}

#[derive(Debug, Deserialize)]
struct DatasetValidateInput {
    suppliers: Vec<SupplierRecord>,
    mode: Option<ValidationMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> DashboardServer {
        DashboardServer::with_config(ServerConfig::default()).expect("sample server")
    }

    #[test]
    fn price_override_does_not_touch_setting() {
        let server = server();
        let report = server.report(Some(15_000.0), None).expect("report");
        assert_eq!(report.carbon_price, 15_000.0);
        assert_eq!(server.carbon_price().value(), 4000.0);
    }

    #[test]
    fn set_price_rejects_or_clamps() {
        let server = server();
        assert!(matches!(
            server.set_carbon_price(20_000.0, false),
            Err(DecisionError::ConfigOutOfRange { .. })
        ));
        assert_eq!(server.carbon_price().value(), 4000.0);
        let clamped = server.set_carbon_price(20_000.0, true).expect("clamped");
        assert_eq!(clamped.value(), 15_000.0);
        assert_eq!(server.carbon_price().value(), 15_000.0);
    }

    #[test]
    fn top_n_is_bounded() {
        let server = server();
        assert_eq!(server.report(None, Some(1)).expect("one").recommendations.len(), 1);
        assert!(server.report(None, Some(0)).is_err());
        assert!(server.report(None, Some(MAX_TOP_N + 1)).is_err());
    }

    #[test]
    fn report_view_flattens_report() {
        let server = server();
        let report = server.report(None, None).expect("report");
        let value = serde_json::to_value(ReportView::new(&report)).expect("serialize");
        assert_eq!(value["summary"]["total_suppliers"], 6);
        assert_eq!(value["table"][0]["supplier"], "Epsilon");
        assert_eq!(value["charts"][0]["label"], "Emissions by Supplier (kg)");
        assert_eq!(value["charts"][1]["points"][0]["supplier"], "Alpha");
    }

    #[test]
    fn price_schema_matches_accepted_values() {
        let tools = tools_list_result();
        let schema = &tools["tools"][0]["inputSchema"]["properties"]["carbon_price"];
        assert_eq!(schema["minimum"], 1000.0);
        assert_eq!(schema["maximum"], 15_000.0);
        assert!(schema.get("multipleOf").is_none());
        let report = server().report(Some(4250.0), None).expect("off-step price");
        assert_eq!(report.carbon_price, 4250.0);
    }

    #[test]
    fn notifications_get_no_response() {
        let server = server();
        let req = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: Value::Null,
        };
        assert!(server.handle_request(req).is_none());
    }
}
