//! Command dispatch for the thumbcache binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use url::Url;

use crate::cache::fingerprint;
use crate::cli::{Cli, Commands, GenerateArgs, LookupArgs, PathArgs, ThumbnailersArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::factory::ThumbnailFactory;
use crate::logging::init_logging;
use crate::progress::Progress;
use crate::registry::{Registry, Thumbnailer};
use crate::signal::install_handler;

const WATCH_POLL: Duration = Duration::from_millis(500);

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the cache location is
/// unknown. Files that cannot be thumbnailed are logged and reported through
/// [`ExitCode::NotAvailable`] instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);
    let config = Config::load_from(cli.config.as_deref())?;
    log::debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::Fingerprint(args) => {
            println!("{}", fingerprint(&args.uri));
            Ok(ExitCode::Success)
        }
        Commands::Path(args) => print_path(&config, &args),
        Commands::Lookup(args) => lookup(&config, &args),
        Commands::Generate(args) => generate(&config, &args, cli.quiet),
        Commands::Thumbnailers(args) => list_thumbnailers(&config, &args),
        Commands::Watch => watch(&config),
    }
}

fn print_path(config: &Config, args: &PathArgs) -> Result<ExitCode> {
    let paths = config.cache_paths()?;
    let path = if args.failed {
        paths.failed_path(&args.uri)
    } else {
        paths.thumbnail_path(&args.uri, args.size.unwrap_or(config.size))
    };
    println!("{}", path.display());
    Ok(ExitCode::Success)
}

fn lookup(config: &Config, args: &LookupArgs) -> Result<ExitCode> {
    let factory = config.build_factory(args.size)?;
    if let Some(path) = factory.lookup(&args.uri, args.mtime) {
        println!("{}", path.display());
        return Ok(ExitCode::Success);
    }
    if args.check_failed && factory.has_failed(&args.uri, args.mtime) {
        println!("failed: {}", factory.paths().failed_path(&args.uri).display());
    } else {
        log::info!("No valid thumbnail for {}", args.uri);
    }
    Ok(ExitCode::NotAvailable)
}

/// Source URI and modification time of a local file.
fn file_identity(path: &Path) -> Result<(String, i64)> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("Cannot resolve {}", path.display()))?;
    let uri = Url::from_file_path(&absolute)
        .map_err(|()| anyhow::anyhow!("Cannot build a URI for {}", absolute.display()))?
        .to_string();
    let modified = absolute
        .metadata()
        .and_then(|m| m.modified())
        .with_context(|| format!("Cannot read modification time of {}", absolute.display()))?;
    let mtime = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    };
    Ok((uri, mtime))
}

fn regenerate(
    factory: &ThumbnailFactory,
    uri: &str,
    mime_type: Option<&str>,
    mtime: i64,
) -> Option<PathBuf> {
    let mime_type = mime_type?;
    match factory.generate(uri, mime_type) {
        Some(thumbnail) => factory
            .save(&thumbnail, uri, mtime)
            .saved_path()
            .map(Path::to_path_buf),
        None => {
            factory.create_failed_thumbnail(uri, mtime);
            None
        }
    }
}

fn generate(config: &Config, args: &GenerateArgs, quiet: bool) -> Result<ExitCode> {
    let shutdown = install_handler()?;
    let factory = config.build_factory(args.size)?;
    let progress = Progress::new(args.files.len(), quiet);
    let failures = AtomicUsize::new(0);

    args.files.par_iter().for_each(|file| {
        if shutdown.is_shutdown_requested() {
            return;
        }
        let label = file.display().to_string();
        let (uri, mtime) = match file_identity(file) {
            Ok(identity) => identity,
            Err(e) => {
                failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("Skipping {}: {:#}", label, e);
                progress.item_done(&label);
                return;
            }
        };
        let mime_type = args
            .mime
            .clone()
            .or_else(|| mime_guess::from_path(file).first_raw().map(str::to_string));

        let result = if args.force {
            regenerate(&factory, &uri, mime_type.as_deref(), mtime)
        } else {
            factory.thumbnail_for(&uri, mime_type.as_deref(), mtime)
        };

        match result {
            Some(path) => progress.println(&format!("{} -> {}", label, path.display())),
            None => {
                failures.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "No thumbnail for {} ({})",
                    label,
                    mime_type.as_deref().unwrap_or("unknown type")
                );
            }
        }
        progress.item_done(&label);
    });
    progress.finish();

    if shutdown.is_shutdown_requested() {
        return Ok(ExitCode::Interrupted);
    }
    if failures.load(Ordering::Relaxed) > 0 {
        Ok(ExitCode::NotAvailable)
    } else {
        Ok(ExitCode::Success)
    }
}

/// JSON view of a thumbnailer record.
#[derive(Debug, Serialize)]
struct ThumbnailerInfo<'a> {
    path: &'a Path,
    try_exec: Option<&'a str>,
    command: &'a str,
    mime_types: &'a [String],
}

impl<'a> From<&'a Thumbnailer> for ThumbnailerInfo<'a> {
    fn from(t: &'a Thumbnailer) -> Self {
        Self {
            path: t.path(),
            try_exec: t.try_exec(),
            command: t.command(),
            mime_types: t.mime_types(),
        }
    }
}

fn list_thumbnailers(config: &Config, args: &ThumbnailersArgs) -> Result<ExitCode> {
    let registry =
        Registry::with_dirs(config.thumbnailer_dirs(), config.settings()).without_watching();
    let thumbnailers = registry.thumbnailers();

    if args.json {
        let infos: Vec<ThumbnailerInfo<'_>> = thumbnailers
            .iter()
            .map(|t| ThumbnailerInfo::from(t.as_ref()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        for t in &thumbnailers {
            println!("{}", t.path().display());
            println!("  command:    {}", t.command());
            if let Some(try_exec) = t.try_exec() {
                println!("  try_exec:   {}", try_exec);
            }
            println!("  mime types: {}", t.mime_types().join(", "));
        }
        log::info!(
            "{} thumbnailer(s) in {} director(ies)",
            thumbnailers.len(),
            registry.dirs().len()
        );
    }
    Ok(ExitCode::Success)
}

fn snapshot(registry: &Registry) -> BTreeMap<String, PathBuf> {
    registry
        .mime_types()
        .into_iter()
        .map(|(mime, t)| (mime, t.path().to_path_buf()))
        .collect()
}

fn watch(config: &Config) -> Result<ExitCode> {
    let shutdown = install_handler()?;
    let registry = Arc::new(Registry::with_dirs(config.thumbnailer_dirs(), config.settings()));

    let mut last = snapshot(&registry);
    log::info!(
        "Watching {} director(ies), {} mime type(s) mapped",
        registry.watched_dirs().len(),
        last.len()
    );

    registry.watch_forever(shutdown.flag(), WATCH_POLL, |registry| {
        let current = snapshot(registry);
        if current == last {
            return;
        }
        for (mime, path) in &current {
            if last.get(mime) != Some(path) {
                println!("+ {} -> {}", mime, path.display());
            }
        }
        for mime in last.keys().filter(|m| !current.contains_key(*m)) {
            println!("- {}", mime);
        }
        last = current;
    });
    Ok(ExitCode::Interrupted)
}
