//! minly: upload files and share them through short links.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use minly::clipboard::{self, SystemClipboard};
use minly::config::{self, ProjectConfig, validate};
use minly::constants;
use minly::env::Env;
use minly::housekeeping;
use minly::lastrun;
use minly::logging;
use minly::paths::Paths;
use minly::platform::Platform;
use minly::secrets::{KeyringStore, SecretKey, SecretStore};
use minly::shortener::YourlsClient;
use minly::storage::S3Storage;
use minly::store::LinkStore;
use minly::update::Updater;
use minly::upload;

use std::process;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};
use tokio_util::sync::CancellationToken;

use cli::args::{
    Cli, Command, ConfigAction, ConfigsAction, FilesArgs, NewArgs, UpdateArgs, UploadArgs,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::Version) {
        return run_version();
    }

    Platform::current().check_supported()?;

    let env = Env::real();
    let paths = Paths::discover(&env)?;

    if let Some(last) = lastrun::read(&paths).filter(|l| l.failed()) {
        cli::warn_previous_failure(&last);
    }

    // `upload --test` runs without a log file
    let without_log = matches!(&cli.command, Command::Upload(args) if args.test);
    let guard = if without_log {
        None
    } else {
        let guard = logging::init(&paths, &env).context("failed to initialise logging")?;
        let logs_dir = paths.logs_dir();
        housekeeping::spawn("log-cleanup", move || {
            logging::cleanup_old_logs(&logs_dir, constants::LOG_RETENTION, SystemTime::now())
        });
        Some(guard)
    };

    let result = dispatch(cli, &paths, &env).await;

    let error = result.as_ref().err().map(|e| format!("{e:#}"));
    if let Some(message) = &error {
        tracing::error!(error = %message, "command failed");
    }
    if let Err(e) = lastrun::write(&paths, error.as_deref()) {
        tracing::warn!(error = %e, "failed to record last run");
    }

    drop(guard);
    result
}

async fn dispatch(cli: Cli, paths: &Paths, env: &Env) -> Result<()> {
    let project = cli.project.as_deref();
    match cli.command {
        Command::New(args) => run_new(paths, args),
        Command::Configs {
            action: ConfigsAction::List,
        } => run_configs_list(paths, env),
        Command::Config { action } => run_config(paths, env, project, action),
        Command::Upload(args) => run_upload(paths, env, project, args).await,
        Command::Files(args) => run_files(paths, env, project, args),
        Command::Update(args) => run_update(paths, args).await,
        Command::Version => run_version(),
    }
}

/// Print detailed version and build information.
fn run_version() -> Result<()> {
    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    println!("{}     {}", "commit:".dimmed(), constants::GIT_SHA);
    println!("{}      {}", "built:".dimmed(), constants::BUILD_DATE);
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(())
}

/// Interactively create or reconfigure a project.
fn run_new(paths: &Paths, args: NewArgs) -> Result<()> {
    let name = match args.name {
        Some(name) => {
            validate::project_name(&name)?;
            name
        }
        None => Input::<String>::new()
            .with_prompt("Project name")
            .validate_with(|n: &String| validate::project_name(n).map_err(|e| e.to_string()))
            .interact_text()?,
    };

    let existing = config::list_saved(paths)?.contains(&name);
    let mut config = if existing {
        let overwrite = Confirm::new()
            .with_prompt(format!("Project '{name}' exists. Reconfigure it?"))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Nothing changed.");
            return Ok(());
        }
        let mut config = ProjectConfig::from_file(&paths.config_file(&name))
            .unwrap_or_else(|_| ProjectConfig::new(name.clone()));
        config.touch();
        config
    } else {
        ProjectConfig::new(name.clone())
    };

    let storage = &mut config.storage;
    storage.endpoint = Input::<String>::new()
        .with_prompt("Storage endpoint (host[:port])")
        .with_initial_text(storage.endpoint.clone())
        .validate_with(|e: &String| validate::storage_endpoint(e).map_err(|e| e.to_string()))
        .interact_text()?;
    storage.use_ssl = Confirm::new()
        .with_prompt("Use TLS for the storage endpoint?")
        .default(storage.use_ssl)
        .interact()?;
    storage.bucket = Input::<String>::new()
        .with_prompt("Bucket")
        .default(storage.bucket.clone())
        .validate_with(|b: &String| validate::bucket_name(b).map_err(|e| e.to_string()))
        .interact_text()?;
    storage.region = Input::<String>::new()
        .with_prompt("Region")
        .default(storage.region.clone())
        .validate_with(|r: &String| validate::region(r).map_err(|e| e.to_string()))
        .interact_text()?;
    storage.link_expiry_hours = Input::<u32>::new()
        .with_prompt("Link expiry in hours (1-168)")
        .default(storage.link_expiry_hours)
        .validate_with(|h: &u32| validate::link_expiry_hours(*h).map_err(|e| e.to_string()))
        .interact_text()?;

    let shortener = &mut config.shortener;
    shortener.endpoint = Input::<String>::new()
        .with_prompt("YOURLS API endpoint (https://.../yourls-api.php)")
        .with_initial_text(shortener.endpoint.clone())
        .validate_with(|e: &String| validate::shortener_endpoint(e).map_err(|e| e.to_string()))
        .interact_text()?;
    shortener.title = Input::<String>::new()
        .with_prompt("Short link title")
        .default(shortener.title.clone())
        .interact_text()?;

    let path = config.save(paths).context("failed to save project")?;

    let secrets = KeyringStore::for_project(&name);
    for key in SecretKey::ALL {
        prompt_secret(&secrets, key, existing)?;
    }

    println!(
        "  {} Project {} saved to {}",
        "✓".green(),
        name.bold(),
        path.display()
    );
    Ok(())
}

/// Ask for one secret. When `keep_existing` is set an empty answer keeps the
/// stored value.
fn prompt_secret(secrets: &dyn SecretStore, key: SecretKey, keep_existing: bool) -> Result<()> {
    let has_value = keep_existing && secrets.get(key)?.is_some();
    let prompt = if has_value {
        format!("{} (leave empty to keep)", key.label())
    } else {
        key.label().to_string()
    };
    let value = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(has_value)
        .interact()?;
    if !value.is_empty() {
        secrets.set(key, &value)?;
    }
    Ok(())
}

/// List configured projects.
fn run_configs_list(paths: &Paths, env: &Env) -> Result<()> {
    let names = config::list_saved(paths)?;
    if names.is_empty() {
        println!("No projects configured. Run `minly new` to create one.");
        return Ok(());
    }
    let selected = env.non_empty(constants::ENV_PROJECT);
    for name in names {
        if selected.as_deref() == Some(name.as_str()) {
            println!("  {} {}", name.bold(), format!("({})", constants::ENV_PROJECT).dimmed());
        } else {
            println!("  {name}");
        }
    }
    Ok(())
}

fn run_config(paths: &Paths, env: &Env, project: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let name = config::resolve_project(paths, project, env)?;
            let config = ProjectConfig::load(paths, &name, env)?;
            let rendered = toml::to_string_pretty(&config).context("failed to render config")?;
            println!("{}", format!("# {}", paths.config_file(&name).display()).dimmed());
            println!("{rendered}");

            let secrets = KeyringStore::for_project(&name);
            for key in SecretKey::ALL {
                let state = match secrets.get(key) {
                    Ok(Some(_)) => "set".green(),
                    Ok(None) => "missing".red(),
                    Err(e) => format!("unavailable ({e})").yellow(),
                };
                println!("{:<24} {state}", key.label());
            }
            Ok(())
        }
        ConfigAction::Delete { yes } => {
            let name = config::resolve_project(paths, project, env)?;
            if !yes
                && !Confirm::new()
                    .with_prompt(format!("Delete project '{name}' and its stored secrets?"))
                    .default(false)
                    .interact()?
            {
                println!("Nothing deleted.");
                return Ok(());
            }
            if !config::delete(paths, &name)? {
                bail!("project '{name}' does not exist");
            }
            let removed = KeyringStore::for_project(&name).delete_all()?;
            println!(
                "  {} Deleted project {} ({removed} secrets removed). Upload records remain in {}",
                "✓".green(),
                name.bold(),
                paths.storage_dir(&name).display()
            );
            Ok(())
        }
        ConfigAction::Import { file, force } => {
            let config = ProjectConfig::from_file(&file)
                .with_context(|| format!("failed to import {}", file.display()))?;
            if !force && config::list_saved(paths)?.contains(&config.name) {
                bail!(
                    "project '{}' already exists; pass --force to replace it",
                    config.name
                );
            }
            config.save(paths).context("failed to save project")?;

            let secrets = KeyringStore::for_project(&config.name);
            for key in SecretKey::ALL {
                if secrets.get(key)?.is_none() {
                    prompt_secret(&secrets, key, false)?;
                }
            }
            println!("  {} Imported project {}", "✓".green(), config.name.bold());
            Ok(())
        }
    }
}

/// Upload one file, shorten its link and record it.
async fn run_upload(paths: &Paths, env: &Env, project: Option<&str>, args: UploadArgs) -> Result<()> {
    let file = args.file.as_path();
    let name = config::resolve_project(paths, project, env)?;
    let config = ProjectConfig::load(paths, &name, env)?;

    let secrets = KeyringStore::for_project(&name);
    let storage = S3Storage::new(
        &config.storage,
        &secrets.require(SecretKey::StorageAccessKey)?,
        &secrets.require(SecretKey::StorageSecretKey)?,
    );
    let shortener = YourlsClient::new(
        &config.shortener.endpoint,
        secrets.require(SecretKey::ShortenerSignature)?,
        &config.shortener.title,
    );

    let store = Arc::new(LinkStore::new(paths.storage_dir(&name)));
    spawn_prune(&store);

    let record = upload::upload_file(&storage, &shortener, &store, file)
        .await
        .with_context(|| format!("failed to upload {}", file.display()))?;

    println!("  {} {}", "✓".green(), record.short_link.bold());
    if args.no_clip {
        tracing::info!("not copying short link, --no-clip given");
    } else if clipboard::copy_or_warn(&SystemClipboard, &record.short_link) {
        println!("    {}", "copied to clipboard".dimmed());
    }
    println!(
        "    {} {}",
        "expires:".dimmed(),
        record
            .storage_link_expires_at
            .format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

/// List the project's recorded uploads.
fn run_files(paths: &Paths, env: &Env, project: Option<&str>, args: FilesArgs) -> Result<()> {
    let name = config::resolve_project(paths, project, env)?;
    let store = Arc::new(LinkStore::new(paths.storage_dir(&name)));

    let now = Utc::now();
    let mut records = store.load_all().context("failed to read upload records")?;
    spawn_prune(&store);
    if !args.all {
        records.retain(|r| !r.is_expired(now));
    }
    cli::print_records(&records, now);

    if let Ok(stats) = store.stats() {
        println!(
            "{}",
            format!(
                "{} record(s) in {} partition(s), {}",
                records.len(),
                stats.partitions,
                stats.human_size()
            )
            .dimmed()
        );
    }
    Ok(())
}

/// Drop expired records in the background.
fn spawn_prune(store: &Arc<LinkStore>) {
    let store = Arc::clone(store);
    housekeeping::spawn("prune-expired-links", move || {
        store.prune_expired(Utc::now())
    });
}

/// Self-update, cancellable with Ctrl-C until the binary is replaced.
async fn run_update(paths: &Paths, args: UpdateArgs) -> Result<()> {
    let updater = Updater::for_current_exe(paths)?.force(args.force);

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    eprintln!("  Checking for updates...");
    let outcome = updater.run(&cancel).await.context("update failed")?;

    if outcome.updated {
        println!(
            "  {} Updated {} → {} ({})",
            "✓".green(),
            constants::VERSION,
            outcome.version.bold(),
            outcome.date.format("%Y-%m-%d")
        );
        if !outcome.changelog.trim().is_empty() {
            println!();
            println!("{}", outcome.changelog.trim());
        }
    } else {
        println!(
            "  Already on the latest version ({}).",
            constants::VERSION
        );
    }
    Ok(())
}
