use clap::{Parser, Subcommand};
use gallery_admin::batch::{BatchProgress, BatchSettings};
use gallery_admin::imaging::ImageCodec;
use gallery_admin::ingest::{
    ImageMetadata, IngestionPipeline, RawFile, discover_local_images,
};
use gallery_admin::manifest::{Category, EntryFilter, EntryPatch, validate_document};
use gallery_admin::manifest_store::ManifestStore;
use gallery_admin::store::{DirStore, RemoteObjectStore};
use gallery_admin::{config, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE_NAME: &str = "gallery-admin.toml";

/// Metadata flags shared by the ingest commands.
#[derive(clap::Args, Clone)]
struct MetadataArgs {
    /// Category: evento, keynotes, ponentes, testimonios
    #[arg(long, default_value = "")]
    category: String,

    /// Title (defaults to one derived from the filename)
    #[arg(long, default_value = "")]
    title: String,

    /// Alt text (defaults to the title)
    #[arg(long, default_value = "")]
    alt: String,

    #[arg(long, default_value = "")]
    description: String,
}

impl MetadataArgs {
    fn metadata(&self) -> ImageMetadata {
        ImageMetadata {
            title: self.title.clone(),
            alt: self.alt.clone(),
            category: Category::parse(&self.category),
            description: self.description.clone(),
        }
    }
}

/// Flags for the bulk commands.
#[derive(clap::Args, Clone)]
struct BatchArgs {
    /// Encode but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Process files even if they look optimized already
    #[arg(long)]
    no_skip: bool,
}

impl BatchArgs {
    fn apply(&self, mut settings: BatchSettings) -> BatchSettings {
        settings.dry_run |= self.dry_run;
        if self.no_skip {
            settings.skip_optimized = false;
        }
        settings
    }
}

#[derive(Parser)]
#[command(name = "gallery-admin")]
#[command(about = "Ingest, optimize and keep a repository-hosted gallery manifest consistent")]
#[command(long_about = "\
Ingest, optimize and keep a repository-hosted gallery manifest consistent

Operates on a checkout of the gallery repository:

  site/
  ├── gallery-admin.toml        # Optional config (see gen-config)
  ├── data/
  │   └── gallery.json          # Manifest: baseUrl + images[]
  └── images/
      ├── about/                # evento
      ├── keynotes/             # keynotes
      ├── speakers/             # ponentes
      ├── testimonial/          # testimonios
      └── misc/                 # anything else

Uploads are optimized (max 1200x1200, WebP preferred) when larger than the
bounding box or 500 KB, stored under a unique name, then recorded in the
manifest. Manifest writes detect concurrent edits and retry.

Set RUST_LOG for finer logging control, e.g. RUST_LOG=gallery_admin=debug.

Run 'gallery-admin gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Repository checkout holding data/ and images/
    #[arg(long, default_value = ".", global = true)]
    store: PathBuf,

    /// Config file (defaults to gallery-admin.toml in the store directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty manifest
    Init {
        /// Public URL that entry paths are relative to
        #[arg(long)]
        base_url: String,
    },
    /// Optimize and upload one image, then add it to the manifest
    Ingest {
        file: PathBuf,
        #[command(flatten)]
        meta: MetadataArgs,
    },
    /// Ingest every image in the given files and directories
    Batch {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        meta: MetadataArgs,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Re-encode images already in the store and repoint their entries
    OptimizeExisting {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Change fields of an entry
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        src: Option<String>,
    },
    /// Delete an entry and its image file
    Remove { id: String },
    /// Repoint entries whose file was replaced by an optimized variant
    Reconcile,
    /// Check the manifest for structural problems
    Validate,
    /// List entries
    List {
        #[arg(long)]
        category: Option<String>,
        /// Case-insensitive match on title, description or alt
        #[arg(long)]
        search: Option<String>,
    },
    /// Entry counts per category
    Stats,
    /// Inspect a local image without uploading it
    Analyze {
        file: PathBuf,
        /// Also encode the thumbnail/medium/large variants
        #[arg(long)]
        variants: bool,
    },
    /// Write a square WebP thumbnail of a local image
    Thumbnail {
        file: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Edge length (defaults to codec.thumbnail_size)
        #[arg(long)]
        size: Option<u32>,
    },
    /// Print a stock gallery-admin.toml with all options documented
    GenConfig,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn log_progress(progress: &BatchProgress) -> bool {
    info!(
        processed = progress.processed,
        total = progress.total,
        optimized = progress.optimized,
        skipped = progress.skipped,
        errors = progress.errors,
        "progress"
    );
    true
}

/// Expand directories into the images they contain, keeping explicit files.
fn collect_local_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover_local_images(path));
        } else {
            files.push(path.clone());
        }
    }
    files
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.store.join(CONFIG_FILE_NAME));
    let admin_config = config::load_config(&config_path)?;

    let store = Arc::new(DirStore::new(&cli.store));
    let manifests = Arc::new(ManifestStore::new(
        store.clone(),
        admin_config.manifest_settings(),
    ));
    let pipeline = IngestionPipeline::new(
        store.clone(),
        manifests.clone(),
        ImageCodec::with_settings(admin_config.codec_settings()),
        admin_config.ingest_settings(),
    );

    match cli.command {
        Command::GenConfig => {}
        Command::Init { base_url } => {
            let manifest = manifests.initialize(&base_url).await?;
            println!(
                "Created {} (baseUrl {})",
                manifests.settings().path,
                manifest.base_url
            );
        }
        Command::Ingest { file, meta } => {
            let raw = RawFile::read(&file).await?;
            match pipeline.ingest(&raw, &meta.metadata()).await {
                Ok(outcome) => output::print_ingest_outcome(&outcome),
                Err(e) if e.is_partial_success() => {
                    warn!(error = %e, "uploaded without manifest entry");
                    eprintln!("Image uploaded but not recorded; add its entry again or delete the file by hand");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Batch { paths, meta, batch } => {
            let settings = batch.apply(admin_config.batch_settings());
            let metadata = meta.metadata();
            let mut files = Vec::new();
            for path in collect_local_files(&paths) {
                files.push((RawFile::read(&path).await?, metadata.clone()));
            }
            let report = pipeline
                .batch_ingest(files, &settings, &log_progress)
                .await;
            output::print_batch_report(&report);
        }
        Command::OptimizeExisting { batch } => {
            let settings = batch.apply(admin_config.batch_settings());
            let report = pipeline.optimize_existing(&settings, &log_progress).await?;
            output::print_batch_report(&report);
        }
        Command::Update {
            id,
            title,
            alt,
            description,
            category,
            src,
        } => {
            let patch = EntryPatch {
                title,
                alt,
                description,
                category: category.as_deref().map(Category::parse),
                src,
                ..EntryPatch::default()
            };
            if patch.is_empty() {
                return Err("nothing to update: pass at least one field flag".into());
            }
            let entry = manifests.update(&id, &patch).await?;
            let base_url = manifests.current().await?.base_url;
            output::print_entry_list([&entry], &base_url);
        }
        Command::Remove { id } => {
            let entry = manifests.remove(&id).await?;
            println!("Removed #{} {}", entry.id, entry.src);
        }
        Command::Reconcile => {
            let report = manifests.reconcile().await?;
            output::print_reconcile_report(&report);
        }
        Command::Validate => {
            let report = validate_stored_document(store.as_ref(), &manifests.settings().path).await?;
            output::print_validation_report(&report);
            if !report.valid {
                return Err("manifest is invalid".into());
            }
        }
        Command::List { category, search } => {
            let filter = EntryFilter {
                category: category.as_deref().map(Category::parse),
                search,
            };
            let manifest = manifests.load().await?;
            output::print_entry_list(manifest.filter(&filter), &manifest.base_url);
        }
        Command::Stats => {
            let stats = manifests.stats().await?;
            output::print_stats(&stats);
        }
        Command::Analyze { file, variants } => {
            let data = tokio::fs::read(&file).await?;
            let codec = pipeline.codec();
            let analysis = codec.analyze(&data)?;
            output::print_analysis(&file.display().to_string(), &analysis);
            if variants {
                for variant in codec.create_size_variants(&data) {
                    println!(
                        "    {}: {}",
                        variant.name,
                        output::format_optimization(&variant.result)
                    );
                }
            }
        }
        Command::Thumbnail { file, out, size } => {
            let data = tokio::fs::read(&file).await?;
            let codec = pipeline.codec();
            let size = size.unwrap_or(codec.settings().thumbnail_size);
            let thumbnail = codec.create_thumbnail(&data, size)?;
            write_local(&out, &thumbnail).await?;
            println!(
                "{} → {} ({}×{}, {})",
                file.display(),
                out.display(),
                size,
                size,
                output::format_file_size(thumbnail.len() as u64)
            );
        }
    }

    Ok(())
}

/// Validate the raw manifest document, so structural problems that would
/// stop a typed load are still reported one by one.
async fn validate_stored_document(
    store: &impl RemoteObjectStore,
    path: &str,
) -> Result<gallery_admin::manifest::ValidationReport, Box<dyn std::error::Error>> {
    let object = store.get(path).await?;
    let doc: serde_json::Value = serde_json::from_slice(&object.content)?;
    Ok(validate_document(&doc))
}

async fn write_local(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await
}
