use crate::cli::ServeArgs;
use crate::infra::{seed_agents, seed_leads, AppState};
use crate::routes::with_assignment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use realty_crm::config::AppConfig;
use realty_crm::error::AppError;
use realty_crm::telemetry;
use realty_crm::workflows::assignment::{
    AssignmentExecutor, InMemoryAgentDirectory, InMemoryLeadStore, JsonFileRuleRepository,
    RuleRepository,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let rules = JsonFileRuleRepository::new(&config.assignment.rules_path);
    let loaded = rules.load()?;
    info!(
        path = %rules.path().display(),
        rules = loaded.len(),
        "assignment rules loaded"
    );

    let directory = Arc::new(InMemoryAgentDirectory::with_agents(seed_agents()));
    let leads = Arc::new(InMemoryLeadStore::with_leads(seed_leads()));
    let executor = Arc::new(AssignmentExecutor::new(
        Arc::new(rules),
        directory,
        leads,
        config.assignment.settings(),
    ));

    let app = with_assignment_routes(executor)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lead assignment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
