use clap::{Parser, Subcommand};
use gallery_cache::cache::PhotoCacheStore;
use gallery_cache::catalog::RemoteCatalogClient;
use gallery_cache::config::{self, GalleryConfig};
use gallery_cache::imaging::{Quality, RustBackend};
use gallery_cache::normalize::PhotoNormalizer;
use gallery_cache::output;
use gallery_cache::remote::{DriveStore, EnvToken, RemoteStore};
use gallery_cache::strings::SheetStrings;
use gallery_cache::supervisor::RefreshSupervisor;
use gallery_cache::worker::PrewarmJob;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "gallery-cache")]
#[command(about = "Photo cache and catalog refresher for a remote-backed gallery")]
#[command(long_about = "\
Photo cache and catalog refresher for a remote-backed gallery

Originals live in a remote folder. Every size the gallery shows is cached on
disk as <id>-full.jpg or <id>-<w>x<h>.jpg, derived from the full-size entry
or fetched (and rotated upright) on a miss.

A background refresh lists the folder, builds the catalog (captions, capture
dates, orientation, newest first), pre-warms every size of every photo and
then publishes the new catalog in one step.

The access token is read from the environment variable named by
remote.token_env (default GALLERY_ACCESS_TOKEN).

Run 'gallery-cache gen-config' to generate a documented gallery.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing gallery.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Override the cache directory from config
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Override the remote folder id from config
    #[arg(long, global = true)]
    folder_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Get one photo through the cache (0x0 = full size)
    Photo {
        id: String,
        #[arg(long, default_value_t = 0)]
        width: u32,
        #[arg(long, default_value_t = 0)]
        height: u32,
        /// Also copy the bytes to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the cache path of a photo size without touching disk
    Path {
        id: String,
        #[arg(default_value_t = 0)]
        width: u32,
        #[arg(default_value_t = 0)]
        height: u32,
    },
    /// List and normalize the remote catalog
    Catalog {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one full refresh (catalog + pre-warm) and report
    Refresh,
    /// Keep refreshing on the configured interval
    Run,
    /// Print a stock gallery.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let Cli {
        config_dir,
        cache_dir,
        folder_id,
        command,
    } = Cli::parse();
    let load = || load_with_overrides(&config_dir, cache_dir.as_deref(), folder_id.as_deref());

    match command {
        Command::Photo {
            id,
            width,
            height,
            out,
        } => {
            let config = load()?;
            let cache = build_cache(&config, build_store(&config)?);
            let bytes = cache.get_photo(&id, width, height)?;
            println!(
                "{} ({} bytes)",
                cache.photo_path(&id, width, height).display(),
                bytes.len()
            );
            if let Some(out) = out {
                std::fs::write(&out, &bytes)?;
                println!("Copied to {}", out.display());
            }
            output::print_cache_stats(&cache.stats());
        }
        Command::Path { id, width, height } => {
            let config = load()?;
            let store: Arc<dyn RemoteStore> = build_store(&config)?;
            let cache = build_cache(&config, store);
            println!("{}", cache.photo_path(&id, width, height).display());
        }
        Command::Catalog { json } => {
            let config = load()?;
            require_folder(&config)?;
            let store = build_store(&config)?;
            let client = RemoteCatalogClient::new(store, config.remote.limits())?;
            let raw = client.list_catalog(&config.remote.folder_id)?;
            let snapshot = PhotoNormalizer::new(&config.catalog.mime_type).normalize(raw);
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                output::print_catalog(&snapshot, &config.strings.initial());
            }
        }
        Command::Refresh => {
            let config = load()?;
            let (supervisor, cache) = start_supervisor(&config)?;
            // Generous bound: hydration alone is paced at one request per
            // worker per pacing interval.
            if !supervisor.wait_idle(Duration::from_secs(24 * 60 * 60)) {
                log::warn!("refresh still running, giving up");
            }
            let published = supervisor.published();
            output::print_catalog(&published.snapshot, &published.strings);
            println!();
            output::print_health(&supervisor.health());
            output::print_cache_stats(&cache.stats());
            supervisor.shutdown();
        }
        Command::Run => {
            let config = load()?;
            let (supervisor, cache) = start_supervisor(&config)?;
            loop {
                std::thread::sleep(Duration::from_secs(config.refresh.interval_secs));
                let health = supervisor.health();
                log::info!(
                    "{} photos published, refresh {}, {}",
                    health.photo_count,
                    if health.is_active() { "running" } else { "idle" },
                    cache.stats()
                );
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_with_overrides(
    config_dir: &Path,
    cache_dir: Option<&Path>,
    folder_id: Option<&str>,
) -> Result<GalleryConfig, Box<dyn std::error::Error>> {
    let mut config = config::load_config(config_dir)?;
    if let Some(dir) = cache_dir {
        config.cache.dir = dir.to_path_buf();
    }
    if let Some(folder) = folder_id {
        config.remote.folder_id = folder.to_string();
    }
    Ok(config)
}

fn require_folder(config: &GalleryConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.remote.folder_id.trim().is_empty() {
        return Err("remote.folder_id is not set (use gallery.toml or --folder-id)".into());
    }
    Ok(())
}

fn build_store(config: &GalleryConfig) -> Result<Arc<dyn RemoteStore>, Box<dyn std::error::Error>> {
    let token = Arc::new(EnvToken::new(&config.remote.token_env));
    let store = DriveStore::new(&config.remote.api_base, config.remote.timeout(), token)?;
    Ok(Arc::new(store))
}

fn build_cache(config: &GalleryConfig, store: Arc<dyn RemoteStore>) -> PhotoCacheStore {
    PhotoCacheStore::new(
        &config.cache.dir,
        store,
        Arc::new(RustBackend::new()),
        Quality::new(config.cache.quality),
    )
}

/// Wire the production job and start the supervisor with an immediate run.
fn start_supervisor(
    config: &GalleryConfig,
) -> Result<(RefreshSupervisor, Arc<PhotoCacheStore>), Box<dyn std::error::Error>> {
    require_folder(config)?;
    let store = build_store(config)?;
    let cache = Arc::new(build_cache(config, store.clone()));
    let catalog = RemoteCatalogClient::new(store, config.remote.limits())?;

    let mut job = PrewarmJob::new(
        catalog,
        PhotoNormalizer::new(&config.catalog.mime_type),
        cache.clone(),
        &config.remote.folder_id,
    )
    .with_ratios(config.refresh.scale_ratios.clone());
    if config.strings.sheet_enabled() {
        let sheet = SheetStrings::new(
            &config.strings.sheet_url,
            config.strings.entry_indices(),
            config.remote.timeout(),
        )?;
        job = job.with_strings(Box::new(sheet));
    }

    let supervisor = RefreshSupervisor::spawn(Arc::new(job), config.supervisor_config())?;
    Ok((supervisor, cache))
}
