use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use shoptrack::api::{GeminiClient, ReceiptExtractor, ReceiptImage};
use shoptrack::auth::{AuthProvider, LocalAuth};
use shoptrack::models::{CATEGORIES, NewItem, UNITS};
use shoptrack::viz::{self, format_price};
use shoptrack::{Config, JsonFileStore, Tracker, User, storage};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "shoptrack",
    version,
    about = "Keep a shopping list, record purchases & track prices"
)]
struct Cli {
    /// Data directory (defaults to $SHOPTRACK_DATA_DIR or the platform data dir).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Log debug output to stderr.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and sign in.
    Signup(Credentials),
    /// Sign in to an existing account.
    Signin(Credentials),
    /// Sign out.
    Signout,
    /// Show the signed-in user.
    Whoami,
    /// Add an item to the shopping list.
    Add(ItemArgs),
    /// Change a list item.
    Edit {
        /// Item id or position on the list (1-based).
        id: String,
        #[command(flatten)]
        item: ItemArgs,
        /// Drop the item's store suggestion.
        #[arg(long, default_value_t = false, conflicts_with = "suggest")]
        clear_suggestion: bool,
    },
    /// Show the shopping list.
    List,
    /// Remove an item from the list without buying it.
    Remove {
        /// Item id or position on the list (1-based).
        id: String,
    },
    /// Record that a list item was bought.
    Buy(BuyArgs),
    /// Show recently bought items, grouped by name.
    History {
        /// Number of items to show (defaults to the configured limit).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the price history of one item.
    Item {
        name: String,
        /// Write a price trend chart to this .svg file.
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Read a receipt photo and record its items as purchases.
    Scan {
        image: PathBuf,
        #[arg(long)]
        store: String,
        /// Only print the extracted items.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Ask where an item is likely cheapest.
    Suggest { name: String },
    /// Save the purchase history to a file.
    Export {
        out: PathBuf,
        /// Output format (csv or json). If omitted, inferred from the extension.
        #[arg(long, value_enum)]
        format: Option<OutFormat>,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Args, Debug)]
struct ItemArgs {
    name: String,
    #[arg(short, long, default_value_t = 1)]
    quantity: u32,
    /// Unit (pcs, kg, g, L, ml, pack, box, bottle, can, dozen).
    #[arg(short, long)]
    unit: Option<String>,
    #[arg(short, long)]
    category: Option<String>,
    /// Ask for a store suggestion based on past purchases.
    #[arg(long, default_value_t = false)]
    suggest: bool,
}

#[derive(Args, Debug)]
struct BuyArgs {
    /// Item id or position on the list (1-based).
    id: String,
    #[arg(long)]
    price: f64,
    #[arg(long)]
    store: String,
    /// Photo of the item to keep with the purchase.
    #[arg(long)]
    image: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = Config::load(cli.data_dir.as_deref()).context("loading configuration")?;
    let auth = LocalAuth::open(config.auth_path())
        .with_context(|| format!("opening {}", config.auth_path().display()))?;

    match cli.cmd {
        Command::Signup(c) => {
            let user = auth.sign_up(&c.email, &c.password)?;
            println!("Signed up as {}", user.email);
        }
        Command::Signin(c) => {
            let user = auth.sign_in(&c.email, &c.password)?;
            println!("Signed in as {}", user.email);
        }
        Command::Signout => {
            auth.sign_out()?;
            println!("Signed out");
        }
        Command::Whoami => match auth.current_user() {
            Some(u) => println!("{} ({})", u.email, u.id),
            None => println!("Not signed in"),
        },
        cmd => {
            let user = signed_in(&auth)?;
            let store = JsonFileStore::new(&config.data_dir);
            let tracker = Tracker::open(user, store, config).context("loading your data")?;
            run(tracker, cmd)?;
        }
    }
    Ok(())
}

fn signed_in(auth: &LocalAuth) -> Result<User> {
    auth.current_user()
        .ok_or_else(|| anyhow!("not signed in; run `shoptrack signin --email ... --password ...`"))
}

fn run(mut tracker: Tracker<JsonFileStore>, cmd: Command) -> Result<()> {
    match cmd {
        Command::Add(args) => {
            let suggest = args.suggest;
            let mut item = new_item(args)?;
            if suggest {
                item.suggested_store = Some(suggestion(&tracker, &item.name));
            }
            let added = tracker.add_item(item)?;
            tracker.save_list()?;
            println!("Added {} ({})", added.name, added.id);
            if let Some(s) = &added.suggested_store {
                println!("  Suggestion: {s}");
            }
        }
        Command::Edit {
            id,
            item,
            clear_suggestion,
        } => {
            let id = resolve_id(&tracker, &id)?;
            let suggest = item.suggest;
            let mut item = new_item(item)?;
            if suggest {
                item.suggested_store = Some(suggestion(&tracker, &item.name));
            }
            if clear_suggestion {
                tracker.clear_suggestion(&id)?;
            }
            let edited = tracker.edit_item(&id, item)?;
            tracker.save_list()?;
            println!("Updated {}", edited.name);
        }
        Command::List => print_list(&tracker),
        Command::Remove { id } => {
            let id = resolve_id(&tracker, &id)?;
            let removed = tracker.remove_item(&id)?;
            tracker.save_list()?;
            println!("Removed {}", removed.name);
        }
        Command::Buy(args) => {
            let id = resolve_id(&tracker, &args.id)?;
            let image_url = match &args.image {
                Some(p) => Some(ReceiptImage::from_path(p)?.to_data_url()),
                None => None,
            };
            let rec = tracker.confirm_purchase(&id, args.price, &args.store, image_url)?;
            tracker.save_list()?;
            println!(
                "Bought {} at {} for {}",
                rec.name,
                rec.store,
                format_price(rec.price, &tracker.config().locale)
            );
        }
        Command::History { limit } => {
            let limit = limit.unwrap_or(tracker.config().display_limit);
            if limit == 0 {
                bail!("--limit must be at least 1");
            }
            let view = tracker.grouped_history_limited(limit);
            if view.entries.is_empty() {
                println!("No purchases yet");
            }
            for e in &view.entries {
                let r = &e.most_recent;
                println!(
                    "{:<24} {:>10}  {:<16} {}  ({} purchase{})",
                    r.name,
                    format_price(r.price, &tracker.config().locale),
                    r.store,
                    r.date.format("%Y-%m-%d"),
                    e.count,
                    if e.count == 1 { "" } else { "s" }
                );
            }
            if view.truncated {
                println!(
                    "Showing the {} most recent of {} items",
                    view.entries.len(),
                    view.total_groups
                );
            }
        }
        Command::Item { name, chart } => cmd_item(&tracker, &name, chart.as_deref())?,
        Command::Scan {
            image,
            store,
            dry_run,
        } => {
            let client = GeminiClient::new(&tracker.config().extraction)?;
            let image = ReceiptImage::from_path(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let items = client.extract_items(&image)?;
            for i in &items {
                println!(
                    "{:<24} x{:<5} {}",
                    i.name,
                    i.quantity,
                    format_price(i.price, &tracker.config().locale)
                );
            }
            if !dry_run {
                let saved = tracker.confirm_receipt(&items, &store)?;
                println!("Saved {} item(s) from {}", saved.len(), store.trim());
            }
        }
        Command::Suggest { name } => println!("{}", suggestion(&tracker, &name)),
        Command::Export { out, format } => {
            let fmt = match format {
                Some(OutFormat::Csv) => "csv".to_string(),
                Some(OutFormat::Json) => "json".to_string(),
                None => out
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("csv")
                    .to_ascii_lowercase(),
            };
            match fmt.as_str() {
                "csv" => storage::save_csv(tracker.history(), &out)?,
                "json" => storage::save_json(tracker.history(), &out)?,
                other => bail!("unsupported format: {}", other),
            }
            eprintln!("Saved {} purchases to {}", tracker.history().len(), out.display());
        }
        Command::Signup(_) | Command::Signin(_) | Command::Signout | Command::Whoami => {
            unreachable!("handled before opening the tracker")
        }
    }
    Ok(())
}

fn new_item(args: ItemArgs) -> Result<NewItem> {
    let unit = match &args.unit {
        Some(u) => Some(canonical(u, &UNITS).ok_or_else(|| {
            anyhow!("unknown unit {u:?}; expected one of {}", UNITS.join(", "))
        })?),
        None => None,
    };
    let category = match &args.category {
        Some(c) => Some(canonical(c, &CATEGORIES).ok_or_else(|| {
            anyhow!("unknown category {c:?}; expected one of {}", CATEGORIES.join(", "))
        })?),
        None => None,
    };
    let mut item = NewItem::named(args.name);
    item.quantity = args.quantity;
    if unit.is_some() {
        item.unit = unit;
    }
    item.category = category;
    Ok(item)
}

/// Case-insensitive lookup in a fixed list, returning the listed spelling.
fn canonical(value: &str, allowed: &[&str]) -> Option<String> {
    allowed
        .iter()
        .find(|a| a.eq_ignore_ascii_case(value.trim()))
        .map(|a| a.to_string())
}

/// Accept either a full item id or a 1-based position on the list.
fn resolve_id(tracker: &Tracker<JsonFileStore>, id: &str) -> Result<String> {
    let items = tracker.list().items();
    if items.iter().any(|i| i.id == id) {
        return Ok(id.to_string());
    }
    match id.parse::<usize>() {
        Ok(n) if n >= 1 && n <= items.len() => Ok(items[n - 1].id.clone()),
        _ => bail!("no list item {id:?}; see `shoptrack list`"),
    }
}

/// Print the list grouped by category. Positions are list positions, as
/// accepted by `resolve_id`.
fn print_list(tracker: &Tracker<JsonFileStore>) {
    let list = tracker.list();
    if list.is_empty() {
        println!("Your shopping list is empty");
        return;
    }
    for (category, items) in list.by_category() {
        println!("{category}");
        for i in items {
            let n = list
                .items()
                .iter()
                .position(|it| it.id == i.id)
                .map_or(0, |p| p + 1);
            let unit = i.unit.as_deref().unwrap_or("");
            println!("{:>3}. {} {} {}", n, i.name, i.quantity, unit);
            if let Some(s) = &i.suggested_store {
                println!("     {s}");
            }
        }
    }
}

fn suggestion(tracker: &Tracker<JsonFileStore>, name: &str) -> String {
    match GeminiClient::new(&tracker.config().extraction) {
        Ok(client) => tracker.suggest_store(name, &client),
        Err(e) => e.to_string(),
    }
}

fn cmd_item(tracker: &Tracker<JsonFileStore>, name: &str, chart: Option<&Path>) -> Result<()> {
    let Some(history) = tracker.item_history(name) else {
        bail!("no purchases of {:?} yet", name.trim());
    };
    let locale = &tracker.config().locale;
    println!("{}", history.display_name);
    for r in &history.records {
        println!(
            "  {}  {:>10}  {}",
            r.date.format("%Y-%m-%d"),
            format_price(r.price, locale),
            r.store
        );
    }
    let key = shoptrack::ItemKey::new(name);
    if let Some(s) = tracker.price_summary().into_iter().find(|s| s.key == key) {
        println!(
            "  min {}  max {}  mean {}  cheapest at {}",
            format_price(s.min, locale),
            format_price(s.max, locale),
            format_price(s.mean, locale),
            s.cheapest_store
        );
    }
    if let Some(path) = chart {
        viz::plot_price_history(
            &history.records,
            path,
            tracker.config().chart,
            &format!("{} price history", history.display_name),
            locale,
        )?;
        eprintln!("Wrote chart to {}", path.display());
    }
    Ok(())
}
