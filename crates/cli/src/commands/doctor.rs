use std::sync::Arc;

use merryway_agent::AgentRuntime;
use merryway_core::config::{AppConfig, LlmProvider, LoadOptions};
use merryway_core::recommendations::RecommendationCatalog;
use serde::Serialize;

use crate::commands::{escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["llm_credentials", "vector_credentials", "recommendation_data", "agent_registry"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_llm_credentials(&config));
            checks.push(check_vector_credentials(&config));

            let catalog = Arc::new(RecommendationCatalog::load(
                &config.recommendations.apriori_path,
                &config.recommendations.popularity_path,
            ));
            checks.push(check_recommendation_data(&config, &catalog));
            checks.push(check_agent_registry(&config, catalog));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    match (llm.provider, llm.api_key.is_some()) {
        (LlmProvider::Gemini, true) => {
            DoctorCheck::pass("llm_credentials", format!("gemini api key set for `{}`", llm.model))
        }
        (LlmProvider::Gemini, false) => {
            DoctorCheck::fail("llm_credentials", "gemini requires llm.api_key")
        }
        (LlmProvider::Ollama, _) => DoctorCheck::pass(
            "llm_credentials",
            format!("ollama at `{}` needs no api key", llm.effective_base_url()),
        ),
    }
}

fn check_vector_credentials(config: &AppConfig) -> DoctorCheck {
    match (&config.vector.api_key, config.vector.index_host.as_deref()) {
        (Some(_), Some(host)) => DoctorCheck::pass(
            "vector_credentials",
            format!("index `{host}`, namespace `{}`", config.vector.namespace),
        ),
        _ => DoctorCheck::fail(
            "vector_credentials",
            "vector.api_key and vector.index_host are required",
        ),
    }
}

fn check_recommendation_data(config: &AppConfig, catalog: &RecommendationCatalog) -> DoctorCheck {
    let paths = &config.recommendations;
    let mut missing = Vec::new();
    if catalog.apriori_len() == 0 {
        missing.push(format!("no apriori entries in `{}`", paths.apriori_path.display()));
    }
    if catalog.popular_len() == 0 {
        missing.push(format!("no popular products in `{}`", paths.popularity_path.display()));
    }

    if missing.is_empty() {
        DoctorCheck::pass(
            "recommendation_data",
            format!(
                "{} apriori items, {} popular products",
                catalog.apriori_len(),
                catalog.popular_len()
            ),
        )
    } else {
        DoctorCheck::fail("recommendation_data", missing.join("; "))
    }
}

fn check_agent_registry(config: &AppConfig, catalog: Arc<RecommendationCatalog>) -> DoctorCheck {
    match AgentRuntime::from_config(config, catalog) {
        Ok(runtime) => {
            let missing = runtime.registry().missing();
            if missing.is_empty() {
                DoctorCheck::pass(
                    "agent_registry",
                    format!("{} agents registered", runtime.registry().len()),
                )
            } else {
                let names: Vec<String> = missing.iter().map(|target| target.to_string()).collect();
                DoctorCheck::fail("agent_registry", format!("unrouted: {}", names.join(", ")))
            }
        }
        Err(error) => DoctorCheck::fail("agent_registry", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
