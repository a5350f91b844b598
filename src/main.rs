mod candidates;
mod config;
mod error;
mod fallback;
mod logging;
mod model;
mod probe;
mod search;
mod store;
mod transfer;

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Map};
use tracing::warn;

use config::{Backend, Config};
use logging::Verbosity;
use model::{Collection, Entry, ErrorEntry, StockEntry, MAX_IMAGES};
use search::{Rendering, SearchEngine};
use store::Store;

#[derive(Parser, Debug)]
#[command(
    name = "fixdex",
    about = "Repair-bench reference index: device error codes, spare parts, photos"
)]
struct Cli {
    /// Path to an explicit config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CollectionArg {
    Errors,
    Stock,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Errors => Collection::Errors,
            CollectionArg::Stock => Collection::Stock,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add an error-code record
    AddError(AddErrorArgs),
    /// Add a stock-part record
    AddStock(AddStockArgs),
    /// List every record in a collection
    List(CollectionOnlyArgs),
    /// Show one record as a card, with the image its slot would display
    Show(IdArgs),
    /// Search a collection the way the suggestion box does
    Search(SearchArgs),
    /// Update one field of a record
    Set(SetArgs),
    /// Remove a record by id
    Rm(IdArgs),
    /// Probe candidate photo URLs for a record
    Resolve(ResolveArgs),
    /// Export a collection to a JSON file
    Export(ExportArgs),
    /// Import records from a JSON file, skipping duplicates
    Import(ImportArgs),
}

#[derive(Args, Debug)]
struct AddErrorArgs {
    #[arg(long)]
    brand: String,

    /// Device type (washer, dryer, ...)
    #[arg(long = "device-type")]
    device_type: String,

    #[arg(long)]
    model: String,

    #[arg(long = "error-code")]
    error_code: String,

    /// Parts usually at fault
    #[arg(long, default_value = "")]
    parts: String,

    /// What to check first
    #[arg(long = "check-list", default_value = "")]
    check_list: String,

    /// How to fix it
    #[arg(long, default_value = "")]
    solution: String,

    /// Explicit image reference; repeatable, up to 8
    #[arg(long = "image")]
    images: Vec<String>,
}

#[derive(Args, Debug)]
struct AddStockArgs {
    #[arg(long = "part-name")]
    part_name: String,

    #[arg(long = "for-model", default_value = "")]
    for_model: String,

    #[arg(long = "part-brand", default_value = "")]
    part_brand: String,

    /// Units in stock
    #[arg(long, default_value_t = 0)]
    qty: u32,

    #[arg(long, default_value = "")]
    note: String,

    /// Explicit image reference; repeatable, up to 8
    #[arg(long = "image")]
    images: Vec<String>,
}

#[derive(Args, Debug)]
struct CollectionOnlyArgs {
    #[arg(value_enum)]
    collection: CollectionArg,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(value_enum)]
    collection: CollectionArg,

    /// Field to search in (wire name, e.g. brand, model, errorCode, partName)
    #[arg(long)]
    field: String,

    query: String,

    /// Treat the query as a picked suggestion (forces resolution)
    #[arg(long)]
    pick: bool,
}

#[derive(Args, Debug)]
struct SetArgs {
    #[arg(value_enum)]
    collection: CollectionArg,

    id: String,

    /// Field to update (wire name, e.g. brand, model, errorCode, partName)
    field: String,

    value: String,
}

#[derive(Args, Debug)]
struct IdArgs {
    #[arg(value_enum)]
    collection: CollectionArg,

    id: String,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    #[arg(value_enum)]
    collection: CollectionArg,

    id: String,

    /// Stop after this many confirmed images (defaults to image.probe_limit)
    #[arg(long)]
    limit: Option<usize>,

    /// Write the confirmed URLs back to the record's images
    #[arg(long)]
    save: bool,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(value_enum)]
    collection: CollectionArg,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(value_enum)]
    collection: CollectionArg,

    /// JSON file to import
    input: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbosity());

    let config = config::load(cli.config.as_deref())?;
    tracing::debug!(config = %config.config_path.display(), "configuration loaded");
    let store = open_store(&config)?;

    match cli.command {
        Command::AddError(args) => handle_add_error(store.as_ref(), args).await,
        Command::AddStock(args) => handle_add_stock(store.as_ref(), args).await,
        Command::List(args) => handle_list(store.as_ref(), args).await,
        Command::Show(args) => handle_show(store.as_ref(), &config, args).await,
        Command::Search(args) => handle_search(store, &config, args).await,
        Command::Set(args) => handle_set(store.as_ref(), args).await,
        Command::Rm(args) => handle_rm(store.as_ref(), args).await,
        Command::Resolve(args) => handle_resolve(store.as_ref(), &config, args).await,
        Command::Export(args) => handle_export(store.as_ref(), args).await,
        Command::Import(args) => handle_import(store.as_ref(), args).await,
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.backend {
        Backend::Local => Ok(Arc::new(store::local::LocalStore::open(&config.data_dir)?)),
        Backend::Remote => {
            let url = config
                .remote_url
                .as_ref()
                .context("backend \"remote\" requires remote_url")?;
            Ok(Arc::new(store::remote::RemoteStore::new(url)))
        }
    }
}

async fn handle_add_error(store: &dyn Store, args: AddErrorArgs) -> Result<()> {
    let entry = ErrorEntry {
        brand: args.brand.trim().to_string(),
        device_type: args.device_type.trim().to_string(),
        model: args.model.trim().to_string(),
        error_code: args.error_code.trim().to_string(),
        parts: args.parts.trim().to_string(),
        check_list: args.check_list.trim().to_string(),
        solution: args.solution.trim().to_string(),
        images: args.images,
        ..Default::default()
    };
    add_entry(store, entry).await
}

async fn handle_add_stock(store: &dyn Store, args: AddStockArgs) -> Result<()> {
    let entry = StockEntry {
        part_name: args.part_name.trim().to_string(),
        for_model: args.for_model.trim().to_string(),
        part_brand: args.part_brand.trim().to_string(),
        quantity: args.qty,
        note: args.note.trim().to_string(),
        images: args.images,
        ..Default::default()
    };
    add_entry(store, entry).await
}

async fn add_entry<E: Entry>(store: &dyn Store, entry: E) -> Result<()> {
    if entry.images().len() > MAX_IMAGES {
        bail!("at most {MAX_IMAGES} images per record");
    }
    entry.validate()?;
    let id = store.add(E::COLLECTION, model::to_fields(&entry)?).await?;
    println!("Added {id}");
    Ok(())
}

async fn handle_list(store: &dyn Store, args: CollectionOnlyArgs) -> Result<()> {
    let collection: Collection = args.collection.into();
    match collection {
        Collection::Errors => list_entries::<ErrorEntry>(store).await,
        Collection::Stock => list_entries::<StockEntry>(store).await,
    }
}

async fn list_entries<E: Entry>(store: &dyn Store) -> Result<()> {
    for entry in load_entries::<E>(store).await? {
        println!("{}", entry.label());
    }
    Ok(())
}

async fn handle_show(store: &dyn Store, config: &Config, args: IdArgs) -> Result<()> {
    let collection: Collection = args.collection.into();
    match collection {
        Collection::Errors => run_show::<ErrorEntry>(store, config, &args).await,
        Collection::Stock => run_show::<StockEntry>(store, config, &args).await,
    }
}

async fn run_show<E: Entry>(store: &dyn Store, config: &Config, args: &IdArgs) -> Result<()> {
    let entry = load_entries::<E>(store)
        .await?
        .into_iter()
        .find(|entry| entry.id() == args.id)
        .with_context(|| format!("no record with id {}", args.id))?;

    println!("{}", entry.label());

    // Stored references render in insertion order; a record without any
    // falls back to the candidate cascade, placeholder last.
    if entry.images().is_empty() {
        let urls = candidates::candidate_urls(&config.image.root, &entry.photo_bases());
        let slot = fallback::ImageSlot::new(urls, config.image.placeholder.clone());
        let loader = probe::loader_for_root(&config.image.root);
        println!("photo: {}", slot.resolve(loader.as_ref()).await);
    } else {
        for image in entry.images() {
            println!("photo: {image}");
        }
    }
    Ok(())
}

async fn handle_search(store: Arc<dyn Store>, config: &Config, args: SearchArgs) -> Result<()> {
    let collection: Collection = args.collection.into();
    match collection {
        Collection::Errors => run_search::<ErrorEntry>(store, config, &args).await,
        Collection::Stock => run_search::<StockEntry>(store, config, &args).await,
    }
}

async fn run_search<E: Entry>(
    store: Arc<dyn Store>,
    config: &Config,
    args: &SearchArgs,
) -> Result<()> {
    let field: E::Field = args.field.parse()?;

    let engine = Arc::new(Mutex::new(SearchEngine::<E>::new(
        field,
        config.search.identity_override,
    )));

    // Live wiring: the subscription callback is the only writer of the
    // engine's mirror, so any store change re-evaluates the current query.
    let listener_engine = engine.clone();
    let subscription = store
        .subscribe(
            E::COLLECTION,
            Arc::new(move |snapshot| {
                let entries = snapshot
                    .iter()
                    .filter_map(|doc| match model::from_document::<E>(doc) {
                        Ok(entry) => Some(entry),
                        Err(err) => {
                            warn!(%err, "skipping malformed document");
                            None
                        }
                    })
                    .collect();
                listener_engine.lock().unwrap().apply_snapshot(entries);
            }),
        )
        .await?;

    let rendering = {
        let mut engine = engine.lock().unwrap();
        if args.pick {
            engine.pick_suggestion(&args.query);
        } else {
            engine.set_query(&args.query);
        }
        engine.rendering()
    };

    match rendering {
        Rendering::Blank => println!("(no query)"),
        Rendering::Suggestions(suggestions) if suggestions.is_empty() => {
            println!("No suggestions.");
        }
        Rendering::Suggestions(suggestions) => {
            println!("Suggestions:");
            for value in suggestions {
                println!("  {value}");
            }
        }
        Rendering::Entries(entries) => {
            for entry in entries {
                println!("{}", entry.label());
            }
        }
        Rendering::NoData => println!("No data found."),
    }

    subscription.unsubscribe();
    Ok(())
}

async fn handle_set(store: &dyn Store, args: SetArgs) -> Result<()> {
    let collection: Collection = args.collection.into();
    match collection {
        Collection::Errors => run_set::<ErrorEntry>(store, &args).await,
        Collection::Stock => run_set::<StockEntry>(store, &args).await,
    }
}

async fn run_set<E: Entry>(store: &dyn Store, args: &SetArgs) -> Result<()> {
    let field: E::Field = args.field.parse()?;
    let wire = E::field_wire_name(field);
    let value = args.value.trim();

    // Validate against the merged record before anything is written.
    let doc = store
        .get_all(E::COLLECTION)
        .await?
        .into_iter()
        .find(|doc| doc.id == args.id)
        .with_context(|| format!("no record with id {}", args.id))?;
    let mut merged = doc.fields.clone();
    merged.insert(wire.to_string(), json!(value));
    let updated: E = model::from_document(&store::Document {
        id: doc.id.clone(),
        fields: merged,
    })?;
    updated.validate()?;

    let mut patch = Map::new();
    patch.insert(wire.to_string(), json!(value));
    store.update(E::COLLECTION, &args.id, patch).await?;
    println!("Updated {}", args.id);
    Ok(())
}

async fn handle_rm(store: &dyn Store, args: IdArgs) -> Result<()> {
    store.remove(args.collection.into(), &args.id).await?;
    println!("Removed {}", args.id);
    Ok(())
}

async fn handle_resolve(store: &dyn Store, config: &Config, args: ResolveArgs) -> Result<()> {
    let collection: Collection = args.collection.into();
    match collection {
        Collection::Errors => run_resolve::<ErrorEntry>(store, config, &args).await,
        Collection::Stock => run_resolve::<StockEntry>(store, config, &args).await,
    }
}

async fn run_resolve<E: Entry>(
    store: &dyn Store,
    config: &Config,
    args: &ResolveArgs,
) -> Result<()> {
    let entry = load_entries::<E>(store)
        .await?
        .into_iter()
        .find(|entry| entry.id() == args.id)
        .with_context(|| format!("no record with id {}", args.id))?;

    let bases = entry.photo_bases();
    let urls = candidates::candidate_urls(&config.image.root, &bases);
    let limit = args
        .limit
        .unwrap_or(config.image.probe_limit)
        .min(MAX_IMAGES);

    let loader = probe::loader_for_root(&config.image.root);
    let hits = probe::probe(loader.as_ref(), &urls, limit).await;

    if hits.is_empty() {
        println!(
            "No images found; placeholder {} applies.",
            config.image.placeholder
        );
        return Ok(());
    }
    for url in &hits {
        println!("{url}");
    }

    if args.save {
        let mut patch = Map::new();
        patch.insert("images".to_string(), json!(hits));
        store.update(E::COLLECTION, &args.id, patch).await?;
        println!("Saved {} image reference(s).", hits.len());
    }
    Ok(())
}

async fn handle_export(store: &dyn Store, args: ExportArgs) -> Result<()> {
    let (count, payload) = transfer::export(store, args.collection.into()).await?;
    fs::write(&args.output, payload)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!("Exported {count} record(s) to {}", args.output.display());
    Ok(())
}

async fn handle_import(store: &dyn Store, args: ImportArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let report = transfer::import(store, args.collection.into(), &raw).await?;
    println!(
        "Import complete: {} added, {} skipped as duplicates.",
        report.added, report.skipped
    );
    Ok(())
}

async fn load_entries<E: Entry>(store: &dyn Store) -> Result<Vec<E>> {
    let docs = store.get_all(E::COLLECTION).await?;
    Ok(docs
        .iter()
        .filter_map(|doc| match model::from_document::<E>(doc) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(%err, "skipping malformed document");
                None
            }
        })
        .collect())
}
