use crate::cli::ServeArgs;
use crate::infra::{AppState, RecordingSubmissionGateway, TracingNotifier};
use crate::routes::with_kyc_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use kyc_intake::config::AppConfig;
use kyc_intake::error::AppError;
use kyc_intake::telemetry;
use kyc_intake::workflows::kyc::{KycIntakeService, Notifier, SubmissionGateway};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let intake_service = Arc::new(KycIntakeService::new(
        Arc::new(RecordingSubmissionGateway::default()),
        Arc::new(TracingNotifier),
        config.intake,
    ));

    spawn_session_sweeper(intake_service.clone(), config.intake.session_ttl());

    let app = with_kyc_routes(intake_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        attachment_max_mb = config.intake.attachment_max_mb,
        session_ttl_secs = config.intake.session_ttl_secs,
        "kyc intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Evicts idle sessions on a fixed cadence so abandoned forms release their uploads.
fn spawn_session_sweeper<G, N>(service: Arc<KycIntakeService<G, N>>, ttl: Duration)
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    let period = (ttl / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let evicted = service.evict_idle();
            if evicted > 0 {
                debug!(evicted, "session sweep finished");
            }
        }
    });
}
