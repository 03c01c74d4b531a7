use std::{process, sync::Arc};

use docsmith::{
    application::{
        error::AppError,
        ledger::TriggerLedger,
        locks::BuildLockRegistry,
        materialize::Materializer,
        pipeline::SitePipeline,
        repos::{RepoError, Repositories},
        scheduler::Scheduler,
        structure::{StructureError, StructureService},
        toolchain::{BuildInvoker, InvokerSettings},
        versions::LineageError,
    },
    config::{self, Command, CreateVersionArgs, MoveGroupArgs},
    domain::types::BuildOutcome,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        telemetry,
        templates::TemplateBundle,
        toolchain::{CommandSpec, CommandToolchain},
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
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
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Build(args) => run_build(settings, args.documentation).await,
        Command::Status => run_status(settings).await,
        Command::CreateVersion(args) => run_create_version(settings, args).await,
        Command::MoveGroup(args) => run_move_group(settings, args).await,
    }
}

/// Everything a command needs, wired from settings.
struct Context {
    repositories: Repositories,
    ledger: TriggerLedger,
    materializer: Materializer,
    scheduler: Scheduler,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_context(
    settings: &config::Settings,
    store: Arc<PostgresRepositories>,
) -> Result<Context, AppError> {
    let site = &settings.site;
    let repositories = Repositories::from_shared(store);
    let ledger = TriggerLedger::new(repositories.triggers.clone());

    let templates = match site.template_dir.as_deref() {
        Some(dir) => TemplateBundle::from_dir(dir).map_err(|err| {
            AppError::from(InfraError::configuration(format!(
                "failed to load site template from `{}`: {err}",
                dir.display()
            )))
        })?,
        None => TemplateBundle::embedded(),
    };

    let toolchain = CommandToolchain::new(
        CommandSpec::parse(&site.install_command)?,
        CommandSpec::parse(&site.build_command)?,
        site.output_dir.clone(),
    );
    let invoker = BuildInvoker::new(
        Arc::new(toolchain),
        InvokerSettings {
            max_attempts: site.max_attempts.get(),
            dependency_dir: site.dependency_dir.clone().into(),
            output_dir: site.output_dir.clone().into(),
        },
    );

    let locks = BuildLockRegistry::new(settings.scheduler.lock_timeout);
    let materializer = Materializer::new(
        site.data_root.clone(),
        repositories.clone(),
        Arc::new(templates),
    );
    let pipeline = SitePipeline::new(materializer.clone(), invoker, locks.clone());

    let scheduler = Scheduler::new(
        ledger.clone(),
        repositories.documentations.clone(),
        Arc::new(pipeline),
    )
    .with_interval(settings.scheduler.interval)
    .with_lock_registry(locks);

    Ok(Context {
        repositories,
        ledger,
        materializer,
        scheduler,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = init_repositories(&settings).await?;
    let context = build_context(&settings, store)?;

    info!(
        target = "docsmith::serve",
        data_root = %settings.site.data_root.display(),
        interval_secs = settings.scheduler.interval.as_secs(),
        "Starting build scheduler"
    );

    tokio::select! {
        _ = context.scheduler.run_forever() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::from(InfraError::Io(err)))?;
            info!(target = "docsmith::serve", "Shutdown requested");
            Ok(())
        }
    }
}

async fn run_build(settings: config::Settings, documentation_id: Uuid) -> Result<(), AppError> {
    let store = init_repositories(&settings).await?;
    let context = build_context(&settings, store)?;

    let outcome = context
        .scheduler
        .build_now(documentation_id)
        .await
        .map_err(repo_error)?;

    match outcome {
        BuildOutcome::Succeeded => {
            info!(
                target = "docsmith::build",
                documentation_id = %documentation_id,
                "Build finished"
            );
            Ok(())
        }
        BuildOutcome::Failed { message } => Err(AppError::unexpected(format!(
            "build of `{documentation_id}` failed: {message}"
        ))),
    }
}

async fn run_status(settings: config::Settings) -> Result<(), AppError> {
    let store = init_repositories(&settings).await?;
    let context = build_context(&settings, store)?;

    let statuses = context
        .ledger
        .last_status_per_documentation()
        .await
        .map_err(repo_error)?;

    for status in statuses {
        let mut line = serde_json::to_value(&status)
            .map_err(|err| AppError::unexpected(format!("failed to encode status: {err}")))?;
        let shadowed = shadowed_by(&context.materializer, status.documentation_id).await;
        if let Some(replaced_by) = shadowed {
            line["shadowed_by"] = serde_json::Value::String(replaced_by.to_string());
        }
        println!("{line}");
    }
    Ok(())
}

/// The clone that took over the version label of `documentation_id`, if any.
async fn shadowed_by(materializer: &Materializer, documentation_id: Uuid) -> Option<Uuid> {
    let root = materializer.published_root(documentation_id).await?;
    materializer
        .manifest(root)
        .await?
        .shadowed
        .into_iter()
        .find(|version| version.documentation_id == documentation_id)
        .map(|version| version.replaced_by)
}

async fn run_create_version(
    settings: config::Settings,
    args: CreateVersionArgs,
) -> Result<(), AppError> {
    let store = init_repositories(&settings).await?;
    let context = build_context(&settings, store)?;
    let service = StructureService::new(context.repositories, context.ledger);

    let created = service
        .create_version(args.source, &args.label)
        .await
        .map_err(structure_error)?;
    println!("{}", created.id);
    Ok(())
}

async fn run_move_group(settings: config::Settings, args: MoveGroupArgs) -> Result<(), AppError> {
    let store = init_repositories(&settings).await?;
    let context = build_context(&settings, store)?;
    let service = StructureService::new(context.repositories, context.ledger);

    service
        .move_group(args.group, args.parent)
        .await
        .map_err(structure_error)?;
    Ok(())
}

fn repo_error(err: RepoError) -> AppError {
    match err {
        RepoError::NotFound => AppError::NotFound,
        other => AppError::from(InfraError::database(other.to_string())),
    }
}

fn structure_error(err: StructureError) -> AppError {
    match err {
        StructureError::Repo(err) => repo_error(err),
        StructureError::Domain(err) => AppError::from(err),
        StructureError::DocumentationNotFound { .. }
        | StructureError::GroupNotFound { .. }
        | StructureError::Lineage(LineageError::NotFound { .. }) => AppError::NotFound,
        other => AppError::validation(other.to_string()),
    }
}
