//! dsu-install - install a dynamic system image from the command line.

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use dsu::operator::{CommandOperator, FileStreamProvider, GetpropProperties};
use dsu::policy;
use dsu::source::is_gzip_locator;
use dsu::{
    CancellationToken, Collaborators, DsuError, ImagePartition, InstallListener, InstallState,
    InstallationSource, InstallationStep, Installer, InstallerOptions, TracingListener,
    init_logging,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser, Debug)]
#[command(name = "dsu-install", version, about = "Install a dynamic system image")]
#[command(group(ArgGroup::new("source").required(true).args(["image", "images", "package", "url"])))]
struct Args {
    /// JSON options file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Userdata partition size in bytes
    #[arg(long)]
    userdata_size: Option<u64>,

    /// Directory for staged partition payloads
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Also write logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Raw or gzip-compressed system image
    #[arg(long)]
    image: Option<String>,

    /// Uncompressed size of --image in bytes (defaults to the file size)
    #[arg(long, requires = "image")]
    size: Option<u64>,

    /// Partition images as name=path[:size]
    #[arg(long, num_args = 1.., value_parser = parse_image_spec)]
    images: Vec<ImagePartition>,

    /// Zip package of <partition>.img entries
    #[arg(long)]
    package: Option<String>,

    /// Zip package URL (file:// only; remote schemes need a host stream provider)
    #[arg(long, value_parser = parse_package_url)]
    url: Option<String>,
}

/// Parse `name=path[:size]`.
fn parse_image_spec(spec: &str) -> Result<ImagePartition, String> {
    let (name, rest) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected name=path[:size], got `{}`", spec))?;
    if name.is_empty() || rest.is_empty() {
        return Err(format!("expected name=path[:size], got `{}`", spec));
    }
    if !policy::is_valid_name(name) {
        return Err(format!("invalid partition name `{}`", name));
    }
    let (locator, size) = match rest.rsplit_once(':') {
        Some((path, size)) if !path.is_empty() => match size.parse::<u64>() {
            Ok(size) => (path.to_string(), Some(size)),
            Err(_) => (rest.to_string(), None),
        },
        _ => (rest.to_string(), None),
    };
    let size = size.unwrap_or_else(|| local_size(&locator));
    Ok(ImagePartition::new(name, locator, size))
}

/// Accept only URLs the bundled `FileStreamProvider` can open.
fn parse_package_url(url: &str) -> Result<String, String> {
    match url.split_once("://") {
        Some(("file", path)) if !path.is_empty() => Ok(url.to_string()),
        Some((scheme, _)) => Err(format!(
            "`{}` URLs are not supported by dsu-install; use file:// or --package",
            scheme
        )),
        None => Err(format!("expected a file:// URL, got `{}`", url)),
    }
}

/// Size of an uncompressed local image, `0` when unknown.
fn local_size(locator: &str) -> u64 {
    if is_gzip_locator(locator) {
        return 0;
    }
    let path = locator.strip_prefix("file://").unwrap_or(locator);
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Logs progress in 10% steps on top of the tracing listener.
#[derive(Default)]
struct ConsoleListener {
    last: Mutex<Option<(String, u32)>>,
}

impl InstallListener for ConsoleListener {
    fn on_error(&self, step: InstallationStep, error: &DsuError) {
        TracingListener.on_error(step, error);
    }

    fn on_progress(&self, fraction: f32, partition: &str) {
        let decile = (fraction * 10.0) as u32;
        let mut last = match self.last.lock() {
            Ok(last) => last,
            Err(poisoned) => poisoned.into_inner(),
        };
        let changed = match last.as_ref() {
            Some((name, d)) => name != partition || *d != decile,
            None => true,
        };
        if changed {
            tracing::info!(partition = %partition, percent = decile * 10, "Progress");
            *last = Some((partition.to_string(), decile));
        }
    }

    fn on_partition_created(&self, partition: &str) {
        TracingListener.on_partition_created(partition);
    }

    fn on_step_changed(&self, step: InstallationStep) {
        TracingListener.on_step_changed(step);
    }

    fn on_success(&self) {
        TracingListener.on_success();
    }
}

fn build_source(args: &Args) -> Result<InstallationSource> {
    if let Some(image) = &args.image {
        return Ok(InstallationSource::SingleImage {
            locator: image.clone(),
            byte_size: args.size.unwrap_or_else(|| local_size(image)),
        });
    }
    if !args.images.is_empty() {
        return Ok(InstallationSource::MultipleImages {
            images: args.images.clone(),
        });
    }
    if let Some(package) = &args.package {
        return Ok(InstallationSource::Package {
            locator: package.clone(),
        });
    }
    if let Some(url) = &args.url {
        return Ok(InstallationSource::RemoteUrl {
            locator: url.clone(),
        });
    }
    bail!("no installation source given")
}

fn load_options(args: &Args) -> Result<InstallerOptions> {
    let mut options = match &args.config {
        Some(path) => InstallerOptions::from_file(path)?,
        None => InstallerOptions::default(),
    };
    if let Some(size) = args.userdata_size {
        options.userdata_size = size;
    }
    if let Some(dir) = &args.staging_dir {
        options.staging_dir = dir.clone();
    }
    if let Some(dir) = &args.log_dir {
        options.logging.log_dir = Some(dir.clone());
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let options = load_options(&args)?;
    init_logging(&options.logging).context("failed to initialize logging")?;

    let source = build_source(&args)?;
    let cancel = CancellationToken::new();
    let collaborators = Collaborators {
        operator: Arc::new(CommandOperator::new(options.commands.clone())),
        streams: Arc::new(FileStreamProvider::new()),
        properties: Arc::new(GetpropProperties::new(&options.commands)),
        listener: Arc::new(ConsoleListener::default()),
    };

    let installer = Installer::new(&options, source, cancel.clone(), collaborators)
        .context("invalid installer options")?;
    let state = installer.subscribe_state();

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    installer.run().await;

    let final_state = *state.borrow();
    match final_state {
        InstallState::Succeeded => Ok(()),
        InstallState::Cancelled => std::process::exit(130),
        other => bail!("installation ended in state {}", other),
    }
}
