use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use snapstack::Config;
use snapstack::capture::{
    CaptureCoordinator, CaptureDependencies, FileFrameSource, FileRectPreference, LocalOverlay,
    TabId,
};
use snapstack::export::{self, ExportFormat, ExportOptions};
use snapstack::region::Rect;
use snapstack::store::{ItemId, ScreenshotStore, StoreError, options_from_config};
use snapstack::util::format_local_timestamp;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SNAPSTACK_GIT_HASH"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "snapstack")]
#[command(
    version,
    long_version = LONG_VERSION,
    about = "Capture screen regions into collections and export them as slide decks"
)]
struct Cli {
    /// Config file to use instead of ~/.config/snapstack/config.toml
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Data directory to use instead of storage.data_directory
    #[arg(long, value_name = "PATH", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage collections
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },
    /// Inspect or delete captured items
    Items {
        #[command(subcommand)]
        action: ItemsAction,
    },
    /// Capture a region of a saved full-frame image into a collection
    Capture(CaptureArgs),
    /// Export a collection as an archive, report or slideshow
    Export {
        /// Collection id
        collection: String,

        /// archive (zip), report (csv) or slideshow (pptx)
        #[arg(long, short = 'f', value_name = "FORMAT")]
        format: ExportFormat,

        /// Output file (default: <collection name>.<ext> in export.output_directory)
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Remove image files no longer referenced by the catalog
    Vacuum,
}

#[derive(Subcommand, Debug)]
enum CollectionsAction {
    /// List collections, oldest first
    List,
    /// Create a collection and print its id
    Create { name: String },
    /// Delete a collection and all of its items
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ItemsAction {
    /// List the items of a collection, newest first
    List { collection: String },
    /// Delete a single item
    Delete { item_id: ItemId },
}

#[derive(clap::Args, Debug)]
struct CaptureArgs {
    /// Full-frame image standing in for the visible surface
    #[arg(long, value_name = "IMAGE")]
    frame: PathBuf,

    /// Selection as LEFT,TOP,WIDTH,HEIGHT in logical pixels
    /// (default: the remembered or configured rectangle)
    #[arg(long, value_name = "L,T,W,H")]
    rect: Option<Rect>,

    /// Physical pixels per logical pixel of the frame
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,

    /// Target collection id (default: the default collection)
    #[arg(long, value_name = "ID")]
    collection: Option<String>,

    /// Tab the selector is shown on
    #[arg(long, default_value_t = 1)]
    tab: TabId,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let options = options_from_config(&config.storage, cli.data_dir.as_deref())?;
    let data_dir = options.base_dir.clone();
    let store = Arc::new(ScreenshotStore::open(options)?);

    match cli.command {
        Command::Collections { action } => match action {
            CollectionsAction::List => {
                let mut collections = store.list_collections().await?;
                collections.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                if collections.is_empty() {
                    println!("No collections yet.");
                }
                for collection in collections {
                    let count = store.count_items(&collection.id).await?;
                    println!(
                        "{}\t{}\t{} item(s)\t{}",
                        collection.id,
                        collection.name,
                        count,
                        format_local_timestamp(
                            &collection.created_at,
                            &config.export.timestamp_format
                        )
                    );
                }
            }
            CollectionsAction::Create { name } => {
                let collection = store.create_collection(&name).await?;
                println!("{}", collection.id);
            }
            CollectionsAction::Delete { id } => {
                if store.delete_collection(&id).await? {
                    println!("Deleted collection {}", id);
                } else {
                    println!("Collection {} does not exist", id);
                }
            }
        },
        Command::Items { action } => match action {
            ItemsAction::List { collection } => {
                if store.get_collection(&collection).await?.is_none() {
                    return Err(StoreError::collection_not_found(&collection).into());
                }
                for item in store.items_newest_first(&collection).await? {
                    println!(
                        "{}\t#{}\t{}\t{} bytes",
                        item.id,
                        item.order,
                        format_local_timestamp(&item.timestamp, &config.export.timestamp_format),
                        item.image.len()
                    );
                }
            }
            ItemsAction::Delete { item_id } => {
                if store.delete_item(item_id).await? {
                    println!("Deleted item {}", item_id);
                } else {
                    println!("Item {} does not exist", item_id);
                }
            }
        },
        Command::Capture(args) => capture(args, &config, data_dir, store).await?,
        Command::Export {
            collection,
            format,
            output,
        } => {
            let destination = match output {
                Some(path) => path,
                None => {
                    let record = store
                        .get_collection(&collection)
                        .await?
                        .ok_or_else(|| StoreError::collection_not_found(&collection))?;
                    export::default_destination(&config.output_directory(), &record, format)
                }
            };

            let summary = export::export_collection(
                &store,
                &collection,
                format,
                &destination,
                &ExportOptions::from(&config.export),
            )
            .await?;
            println!(
                "Exported {} item(s) to {}",
                summary.item_count,
                summary.path.display()
            );
        }
        Command::Vacuum => {
            let removed = store.vacuum().await?;
            println!("Removed {} unreferenced image file(s)", removed);
        }
    }

    Ok(())
}

/// Drive one Idle -> Adjusting -> confirm cycle against the in-process overlay.
async fn capture(
    args: CaptureArgs,
    config: &Config,
    data_dir: PathBuf,
    store: Arc<ScreenshotStore>,
) -> Result<()> {
    let overlay = Arc::new(LocalOverlay::new(config.default_rect()));
    let dependencies = CaptureDependencies::new(
        overlay.clone(),
        Arc::new(FileFrameSource::new(&args.frame, args.dpr)),
        Arc::new(FileRectPreference::in_directory(&data_dir)),
    );
    let coordinator = CaptureCoordinator::new(dependencies, store, config.settle_delay());

    match &args.collection {
        Some(id) => coordinator.set_active_collection(id).await?,
        None => {
            coordinator
                .use_default_collection(&config.storage.default_collection_name)
                .await?;
        }
    }

    coordinator.begin(args.tab).await?;
    if let Some(rect) = args.rect {
        overlay.adjust(args.tab, rect);
    }
    let result = coordinator.confirm(args.tab).await?;

    let size = result
        .rect
        .to_physical(result.device_pixel_ratio)
        .map(|physical| format!("{}x{}", physical.width, physical.height))
        .unwrap_or_default();
    println!(
        "Captured item {} into collection {} ({} px, {} bytes)",
        result.item_id, result.collection_id, size, result.byte_len
    );
    Ok(())
}
