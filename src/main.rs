use clap::{Parser, Subcommand, ValueEnum};
use sketch_depot::app_logic::{
    ExampleSyncDriver, SessionError, SessionServices, SketchbookSession, today_local,
};
use sketch_depot::core::config::{APP_NAME, ConfigError};
use sketch_depot::core::drives::{ConfiguredVolumeInfo, SysinfoVolumeInfo, VolumeInfoOperations};
use sketch_depot::core::preferences::PreferenceError;
use sketch_depot::core::ui_callbacks::LoggingUiCallbacks;
use sketch_depot::core::{
    AppConfig, ConfigManagerOperations, ContainerFlags, CoreConfigManager, CoreDriveRegistry,
    CoreFileOps, CoreRecentProjects, CoreSketchLocator, ExampleRepositorySync,
    ExampleSyncOperations, GitCliRepository, JsonPreferenceStore, ListingKind, LocationKind,
    NetworkKind, OutputChannel, PreferenceStore, ProjectAddress, RootLocks, SandboxLayout,
    StaticNetworkMonitor, SyncChoice, SyncCollaborators, SyncError,
};
use sketch_depot::logging;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Preference(#[from] PreferenceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

type Result<T> = std::result::Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "sketch-depot", bin_name = "sketch-depot", version)]
#[command(about = "Manage a sketchbook of projects and the synced examples", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Network the machine is on; decides whether examples may be downloaded
    #[arg(long, global = true, value_parser = parse_network, default_value = "wifi")]
    network: NetworkKind,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the storage drives that can hold the sketchbook
    Drives,
    /// Select the drive holding the sketchbook
    UseDrive {
        /// Use the internal drive
        #[arg(long, conflicts_with = "granted")]
        internal: bool,
        /// Tree root the user granted access to
        #[arg(long)]
        granted: Option<PathBuf>,
    },
    /// List every project in a location
    Projects {
        #[arg(value_enum, default_value_t = KindArg::Sketchbook)]
        kind: KindArg,
        /// How many folder levels to search; negative means unlimited
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        depth: i32,
    },
    /// Show one folder the way the navigator does
    Ls {
        #[arg(value_enum)]
        kind: KindArg,
        #[arg(default_value = "")]
        path: String,
    },
    /// Open a project, recording it as recently used
    Open {
        #[arg(value_enum)]
        kind: KindArg,
        path: String,
    },
    /// Move a project within or between locations
    Mv {
        #[arg(value_enum)]
        kind: KindArg,
        source: String,
        #[arg(value_enum)]
        dest_kind: KindArg,
        dest: String,
    },
    /// List recently opened projects
    Recent,
    /// Create the next temporary project
    NewTemp,
    /// Show the build properties of a project
    Properties {
        #[arg(value_enum)]
        kind: KindArg,
        path: String,
    },
    /// Keep the examples repository in sync
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum SyncAction {
    /// Report whether an update is available
    Check,
    /// Check and apply an update when one is available
    Update,
    /// Delete the local examples and download them again
    Redownload,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Sketchbook,
    Example,
    LibraryExample,
    External,
    Temporary,
}

impl From<KindArg> for LocationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Sketchbook => LocationKind::PrimaryCollection,
            KindArg::Example => LocationKind::BuiltinExample,
            KindArg::LibraryExample => LocationKind::LibraryExample,
            KindArg::External => LocationKind::ExternalReference,
            KindArg::Temporary => LocationKind::Temporary,
        }
    }
}

fn parse_network(value: &str) -> std::result::Result<NetworkKind, String> {
    NetworkKind::parse(value).ok_or_else(|| format!("unknown network kind '{value}'"))
}

// Addresses on the command line may omit the leading slash.
fn address(kind: KindArg, path: &str) -> ProjectAddress {
    let kind = LocationKind::from(kind);
    if kind == LocationKind::ExternalReference || path.is_empty() || path.starts_with('/') {
        ProjectAddress::new(kind, path)
    } else {
        ProjectAddress::new(kind, format!("/{path}"))
    }
}

struct AppContext {
    config: AppConfig,
    layout: SandboxLayout,
    preferences: Arc<dyn PreferenceStore>,
    callbacks: Arc<LoggingUiCallbacks>,
    output: Arc<OutputChannel>,
    session: SketchbookSession,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("Main: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = CoreConfigManager::new().load_config(APP_NAME)?;
    let level = if cli.verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let log_file = config
        .log_file
        .clone()
        .or_else(|| logging::default_log_file(&config.app_name));
    logging::init(level, log_file.as_deref());

    let mut ctx = init_context(config)?;
    let result = execute(&mut ctx, cli.command, cli.network);
    // Whatever was produced before a failure is still shown.
    if let Err(e) = flush_output(&ctx.output, &mut io::stdout().lock()) {
        log::warn!("Main: Could not write output: {e}");
    }
    result
}

fn flush_output(output: &OutputChannel, out: &mut impl Write) -> io::Result<()> {
    for line in output.take_messages() {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

fn execute(ctx: &mut AppContext, command: Commands, network: NetworkKind) -> Result<()> {
    match command {
        Commands::Drives => handle_drives(ctx),
        Commands::UseDrive { internal, granted } => {
            if let Some(root) = granted {
                ctx.session.grant_permissioned_root(&root)?;
            } else if internal {
                ctx.session.use_internal_storage_drive()?;
            }
            handle_drives(ctx)
        }
        Commands::Projects { kind, depth } => {
            for project in ctx.session.list_projects(kind.into(), depth)? {
                ctx.output.push(&project.path().display().to_string());
            }
            Ok(())
        }
        Commands::Ls { kind, path } => handle_ls(ctx, &address(kind, &path)),
        Commands::Open { kind, path } => {
            ctx.session.select_project(address(kind, &path))?;
            if let Some(current) = ctx.session.current_project() {
                ctx.output.push(&format!("Opened {current}"));
            }
            Ok(())
        }
        Commands::Mv {
            kind,
            source,
            dest_kind,
            dest,
        } => {
            let (source, dest) = (address(kind, &source), address(dest_kind, &dest));
            if ctx.session.move_project(&source, &dest)? {
                ctx.output.push(&format!("Moved {source} to {dest}"));
            } else {
                ctx.output.push(&format!("{source} was not moved"));
            }
            Ok(())
        }
        Commands::Recent => handle_recent(ctx),
        Commands::NewTemp => {
            let created = ctx.session.select_new_temporary_project(today_local())?;
            ctx.output.push(&created.to_string());
            Ok(())
        }
        Commands::Properties { kind, path } => {
            for (key, value) in ctx.session.properties_for(&address(kind, &path))?.iter() {
                ctx.output.push(&format!("{key}={value}"));
            }
            Ok(())
        }
        Commands::Sync { action } => handle_sync(ctx, action, network),
    }
}

fn init_context(config: AppConfig) -> Result<AppContext> {
    let layout = SandboxLayout::for_app(&config.app_name)?;
    layout.ensure_dirs()?;

    let preferences: Arc<dyn PreferenceStore> =
        Arc::new(JsonPreferenceStore::open_for_app(&config.app_name)?);
    let volumes: Box<dyn VolumeInfoOperations> = match &config.external_volumes {
        Some(volumes) => Box::new(ConfiguredVolumeInfo::new(volumes.clone())),
        None => Box::new(SysinfoVolumeInfo::new(config.public_storage_root.clone())),
    };
    let drives = Arc::new(CoreDriveRegistry::new(
        config.storage_access,
        &config.app_name,
        layout.clone(),
        config.public_storage_root.clone(),
        volumes,
        Arc::clone(&preferences),
    ));
    let callbacks = Arc::new(LoggingUiCallbacks::new(SyncChoice::Update));

    let session = SketchbookSession::new(SessionServices {
        config: config.clone(),
        layout: layout.clone(),
        preferences: Arc::clone(&preferences),
        drives,
        locator: Arc::new(CoreSketchLocator::new(&config.normalized_marker_extension())),
        file_ops: Arc::new(CoreFileOps::new()),
        recent: Arc::new(CoreRecentProjects::new(Arc::clone(&preferences))),
        callbacks: callbacks.clone(),
    });

    Ok(AppContext {
        config,
        layout,
        preferences,
        callbacks,
        output: Arc::new(OutputChannel::new()),
        session,
    })
}

fn handle_drives(ctx: &AppContext) -> Result<()> {
    let selected = ctx.session.sketchbook_drive()?;
    for drive in ctx.session.list_drives() {
        let marker = if drive.root_id == selected.root_id { "*" } else { " " };
        let root = drive
            .root
            .as_ref()
            .map(|r| r.display().to_string())
            .unwrap_or_else(|| "(access not granted)".to_string());
        ctx.output.push(&format!(
            "{marker} {:<28} {root}  [{}]",
            drive.drive_type.title(),
            drive.space
        ));
    }
    Ok(())
}

fn handle_ls(ctx: &AppContext, location: &ProjectAddress) -> Result<()> {
    for item in ctx.session.list_folder(location, ContainerFlags::default())? {
        let prefix = match item.kind {
            ListingKind::NavigateUp => "^",
            ListingKind::Folder => "d",
            ListingKind::Project => "p",
            ListingKind::Message => " ",
        };
        ctx.output.push(&format!("{prefix} {}", item.text));
    }
    Ok(())
}

fn handle_recent(ctx: &AppContext) -> Result<()> {
    for item in ctx.session.recent_listing_items()?.into_iter().skip(1) {
        let line = match item.secondary_text {
            Some(secondary) => format!("{:<24} {secondary}", item.text),
            None => item.text,
        };
        ctx.output.push(&line);
    }
    Ok(())
}

fn handle_sync(ctx: &AppContext, action: SyncAction, network: NetworkKind) -> Result<()> {
    let sync = Arc::new(ExampleRepositorySync::new(
        ctx.layout.examples_repo_dir(),
        &ctx.config.examples_repo_url,
        &ctx.config.examples_repo_branch,
        SyncCollaborators {
            vcs: Arc::new(GitCliRepository::new()),
            network: Arc::new(StaticNetworkMonitor::new(network)),
            preferences: Arc::clone(&ctx.preferences),
            file_ops: Arc::new(CoreFileOps::new()),
            output: Arc::clone(&ctx.output),
            callbacks: ctx.callbacks.clone(),
            locks: Arc::new(RootLocks::new()),
        },
    ));

    match action {
        SyncAction::Check => {
            sync.check_gate()?;
            let state = sync.check_for_update()?;
            ctx.output.push(&format!("{state:?}"));
        }
        SyncAction::Update => {
            let driver = Arc::new(ExampleSyncDriver::new(
                sync,
                Arc::clone(&ctx.preferences),
                ctx.callbacks.clone(),
            ));
            match driver.spawn_startup_check().join() {
                Ok(Some(outcome)) => ctx.output.push(&format!("{outcome:?}")),
                Ok(None) => ctx.output.push("Examples sync failed, see the log for details"),
                Err(_) => log::error!("Main: The sync thread panicked."),
            }
        }
        SyncAction::Redownload => {
            let driver = Arc::new(ExampleSyncDriver::new(
                sync,
                Arc::clone(&ctx.preferences),
                ctx.callbacks.clone(),
            ));
            match driver.spawn_redownload().join() {
                Ok(result) => {
                    result?;
                    ctx.output.push("Examples downloaded again");
                }
                Err(_) => log::error!("Main: The redownload thread panicked."),
            }
        }
    }
    Ok(())
}
