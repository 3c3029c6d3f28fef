//! In-process handlers that run the deterministic engines from `coreflow-core`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use coreflow_core::bundles::bom::{BomOptimizer, BomRequest};
use coreflow_core::bundles::forecast::{ForecastEngine, ForecastInput, ForecastType};
use coreflow_core::bundles::payroll::{PayrollEngine, PayrollRequest};
use coreflow_core::bundles::sentiment::{SentimentAnalyzer, SentimentContext};

use crate::handler::{BundleHandler, HandlerContext, HandlerHealth};

#[derive(Debug, Deserialize)]
struct SentimentInput {
    text: String,
    #[serde(default)]
    context: Option<SentimentContext>,
}

#[derive(Debug, Deserialize)]
struct BatchSentimentInput {
    texts: Vec<String>,
    #[serde(default)]
    context: Option<SentimentContext>,
}

#[derive(Debug, Deserialize)]
struct ForecastWorkflowInput {
    #[serde(default = "default_forecast_type")]
    forecast_type: String,
    #[serde(default = "default_horizon_months")]
    horizon_months: u32,
    #[serde(default)]
    data: ForecastInput,
}

#[derive(Debug, Deserialize)]
struct StrategicAnalysisInput {
    #[serde(default = "default_analysis_depth", alias = "depth")]
    analysis_depth: String,
}

fn default_forecast_type() -> String {
    "comprehensive".to_string()
}

fn default_horizon_months() -> u32 {
    12
}

fn default_analysis_depth() -> String {
    "comprehensive".to_string()
}

fn parse_input<T: serde::de::DeserializeOwned>(workflow: &str, input: Value) -> Result<T> {
    serde_json::from_value(input).with_context(|| format!("invalid `{workflow}` input"))
}

#[derive(Clone, Debug, Default)]
pub struct FinGptHandler {
    analyzer: SentimentAnalyzer,
}

#[async_trait]
impl BundleHandler for FinGptHandler {
    fn name(&self) -> &str {
        "fingpt-local"
    }

    async fn execute(&self, _ctx: &HandlerContext, workflow: &str, input: Value) -> Result<Value> {
        match workflow {
            "sentiment_analysis" => {
                let input: SentimentInput = parse_input(workflow, input)?;
                let analysis = self.analyzer.analyze(&input.text, input.context.as_ref())?;
                Ok(serde_json::to_value(analysis)?)
            }
            "batch_sentiment" => {
                let input: BatchSentimentInput = parse_input(workflow, input)?;
                let results = self.analyzer.analyze_batch(&input.texts, input.context.as_ref())?;
                let confidences: Vec<f64> = results
                    .iter()
                    .filter_map(|item| item.analysis.as_ref().map(|analysis| analysis.confidence))
                    .collect();
                let confidence = if confidences.is_empty() {
                    0.0
                } else {
                    confidences.iter().sum::<f64>() / confidences.len() as f64
                };
                Ok(json!({
                    "total": results.len(),
                    "successful": confidences.len(),
                    "confidence": confidence,
                    "results": results,
                }))
            }
            other => bail!("fingpt handler does not serve workflow `{other}`"),
        }
    }

    fn capabilities(&self) -> Value {
        self.analyzer.capabilities()
    }

    async fn health(&self) -> HandlerHealth {
        HandlerHealth::healthy()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FinRobotHandler {
    engine: ForecastEngine,
}

#[async_trait]
impl BundleHandler for FinRobotHandler {
    fn name(&self) -> &str {
        "finrobot-local"
    }

    async fn execute(&self, ctx: &HandlerContext, workflow: &str, input: Value) -> Result<Value> {
        match workflow {
            "financial_forecast" => {
                let input: ForecastWorkflowInput = parse_input(workflow, input)?;
                let forecast_type: ForecastType = input.forecast_type.parse()?;
                let report = self.engine.execute_forecast(
                    &ctx.tenant_id,
                    &input.data,
                    forecast_type,
                    input.horizon_months,
                )?;
                Ok(serde_json::to_value(report)?)
            }
            "strategic_analysis" => {
                let input: StrategicAnalysisInput = parse_input(workflow, input)?;
                Ok(self.engine.strategic_analysis(&ctx.tenant_id, &input.analysis_depth))
            }
            other => bail!("finrobot handler does not serve workflow `{other}`"),
        }
    }

    fn capabilities(&self) -> Value {
        self.engine.capabilities()
    }

    async fn health(&self) -> HandlerHealth {
        HandlerHealth::healthy()
    }
}

/// Serves both ERPNext bundles: HR payroll and manufacturing.
#[derive(Clone, Debug, Default)]
pub struct ErpNextHandler {
    payroll: PayrollEngine,
    bom: BomOptimizer,
}

#[async_trait]
impl BundleHandler for ErpNextHandler {
    fn name(&self) -> &str {
        "erpnext-local"
    }

    async fn execute(&self, _ctx: &HandlerContext, workflow: &str, input: Value) -> Result<Value> {
        match workflow {
            "process_payroll" => {
                let request: PayrollRequest = parse_input(workflow, input)?;
                Ok(serde_json::to_value(self.payroll.process_payroll(&request)?)?)
            }
            "optimize_bom" => {
                let request: BomRequest = parse_input(workflow, input)?;
                Ok(serde_json::to_value(self.bom.optimize_bom(&request)?)?)
            }
            other => bail!("erpnext handler does not serve workflow `{other}`"),
        }
    }

    fn capabilities(&self) -> Value {
        json!({
            "service": "erpnext",
            "payroll": self.payroll.capabilities(),
            "manufacturing": self.bom.capabilities(),
        })
    }

    async fn health(&self) -> HandlerHealth {
        HandlerHealth::healthy()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use coreflow_core::domain::bundle::BundleId;
    use coreflow_core::domain::tenant::TenantId;

    use super::{ErpNextHandler, FinGptHandler, FinRobotHandler};
    use crate::handler::{BundleHandler, HandlerContext};

    fn ctx(bundle: &str) -> HandlerContext {
        HandlerContext {
            tenant_id: TenantId::from("tenant-acme"),
            bundle_id: BundleId::from(bundle),
            correlation_id: "req-local".to_string(),
        }
    }

    #[tokio::test]
    async fn finrobot_strategic_analysis_accepts_either_depth_key() {
        let handler = FinRobotHandler::default();
        for input in [json!({ "analysis_depth": "Focused" }), json!({ "depth": "focused" })] {
            let output = handler
                .execute(&ctx("finance_ai_finrobot"), "strategic_analysis", input)
                .await
                .expect("strategic analysis");
            assert_eq!(output["analysis_type"], "strategic_focused");
        }

        let output = handler
            .execute(&ctx("finance_ai_finrobot"), "strategic_analysis", json!({}))
            .await
            .expect("default depth");
        assert_eq!(output["analysis_type"], "strategic_comprehensive");
    }

    #[tokio::test]
    async fn fingpt_analyzes_single_text() {
        let output = FinGptHandler::default()
            .execute(
                &ctx("finance_ai_fingpt"),
                "sentiment_analysis",
                json!({ "text": "Strong profit growth pushed AAPL up 8% this quarter" }),
            )
            .await
            .expect("sentiment output");

        assert_eq!(output["sentiment"], "positive");
        assert!(output["confidence"].as_f64().is_some());
    }

    #[tokio::test]
    async fn fingpt_batch_reports_average_confidence() {
        let output = FinGptHandler::default()
            .execute(
                &ctx("finance_ai_fingpt"),
                "batch_sentiment",
                json!({ "texts": ["Revenue growth beat expectations", "   "] }),
            )
            .await
            .expect("batch output");

        assert_eq!(output["total"], 2);
        assert_eq!(output["successful"], 1);
        assert_eq!(output["results"][1]["success"], false);
    }

    #[tokio::test]
    async fn finrobot_defaults_to_comprehensive_forecast() {
        let output = FinRobotHandler::default()
            .execute(&ctx("finance_ai_finrobot"), "financial_forecast", json!({}))
            .await
            .expect("forecast output");

        assert_eq!(output["forecast_type"], "comprehensive");
        assert_eq!(output["horizon_months"], 12);
        assert!(output["forecast_summary"]["confidence_score"].as_f64().is_some());
    }

    #[tokio::test]
    async fn finrobot_rejects_unknown_forecast_type() {
        let error = FinRobotHandler::default()
            .execute(
                &ctx("finance_ai_finrobot"),
                "financial_forecast",
                json!({ "forecast_type": "weather" }),
            )
            .await
            .expect_err("unknown forecast type");
        assert!(error.to_string().contains("Unknown forecast type"));
    }

    #[tokio::test]
    async fn local_handlers_reject_foreign_workflows() {
        let error = ErpNextHandler::default()
            .execute(&ctx("erp_hr_payroll"), "sentiment_analysis", json!({}))
            .await
            .expect_err("foreign workflow");
        assert!(error.to_string().contains("does not serve workflow"));
    }

    #[tokio::test]
    async fn erpnext_surfaces_payroll_validation_errors() {
        let error = ErpNextHandler::default()
            .execute(&ctx("erp_hr_payroll"), "process_payroll", json!({ "employees": [] }))
            .await
            .expect_err("empty payroll");
        assert!(error.to_string().contains("validation failed"));
    }
}
