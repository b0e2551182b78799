use metrics_exporter_prometheus::PrometheusHandle;
use metro2_audit::audit::AuditEngine;
use metro2_audit::config::{AppConfig, RulesConfig};
use metro2_audit::error::AppError;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) engine: Arc<AuditEngine>,
}

/// Builds the engine from `rules`, failing fast on any malformed rule document.
pub(crate) fn build_engine(rules: &RulesConfig) -> Result<AuditEngine, AppError> {
    let sources = rules.sources()?;
    Ok(AuditEngine::from_sources(&sources)?)
}

/// CLI variant: an explicit `--rules-dir` wins over `METRO2_RULES_DIR`.
pub(crate) fn engine_for_cli(rules_dir: Option<PathBuf>) -> Result<AuditEngine, AppError> {
    let rules = match rules_dir {
        Some(directory) => RulesConfig {
            directory: Some(directory),
        },
        None => AppConfig::load()?.rules,
    };
    build_engine(&rules)
}
