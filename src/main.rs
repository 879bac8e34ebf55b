use std::{process, sync::Arc};

use penwright::{
    application::{
        comments::CommentService, error::AppError, generator::StaticPageGenerator,
        repos::ContentRepo, revalidate::RevalidationPolicy,
    },
    cache::PageStore,
    config,
    infra::{
        self,
        error::InfraError,
        export,
        http::{self, HttpState},
        image::ImageUrlBuilder,
        telemetry,
    },
    presentation::post::HtmlPostRenderer,
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Generate(args) => run_generate(settings, args).await,
    }
}

struct ApplicationContext {
    repo: Arc<dyn ContentRepo>,
    policy: RevalidationPolicy,
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let repo = infra::content_backend(&settings.content).await?;
    let images = ImageUrlBuilder::new(&settings.content.project_id, &settings.content.dataset)?;
    let renderer = Arc::new(HtmlPostRenderer::new(images));
    let policy = RevalidationPolicy::with_store(
        repo.clone(),
        renderer,
        settings.revalidate.interval,
        PageStore::with_not_found_capacity(settings.revalidate.not_found_capacity),
    );

    Ok(ApplicationContext { repo, policy })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    if settings.generation.prerender_on_startup {
        let generator = StaticPageGenerator::new(app.repo.clone(), settings.generation.concurrency);
        let report = generator.prerender(&app.policy).await?;
        info!(
            rendered = report.rendered.len(),
            not_found = report.not_found.len(),
            "startup prerender complete"
        );
    }

    let state = HttpState {
        pages: app.policy,
        comments: CommentService::new(app.repo),
    };
    serve_http(&settings.server, state).await
}

async fn run_generate(
    settings: config::Settings,
    args: config::GenerateArgs,
) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;
    let generator = StaticPageGenerator::new(app.repo, settings.generation.concurrency);

    let report = generator.prerender(&app.policy).await?;
    let written = export::write_pages(&app.policy, &report, &args.out_dir).await?;

    info!(
        out_dir = %args.out_dir.display(),
        pages = written.len(),
        skipped = report.not_found.len(),
        "generation complete"
    );
    Ok(())
}

async fn serve_http(server: &config::ServerSettings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %server.addr, "listening");

    let (draining_tx, draining_rx) = oneshot::channel();
    let mut handle = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = draining_tx.send(());
            })
            .await
    });

    tokio::select! {
        joined = &mut handle => return server_outcome(joined),
        _ = draining_rx => {}
    }

    info!(
        grace_seconds = server.graceful_shutdown.as_secs(),
        "draining connections"
    );
    match tokio::time::timeout(server.graceful_shutdown, &mut handle).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!("graceful shutdown timed out; aborting open connections");
            handle.abort();
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
