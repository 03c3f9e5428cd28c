use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use flow_api::AppState;
use flow_data::rpc::RpcClient;
use flow_data::store::Store;
use flow_graph::Viewport;
use flow_view::{
    BlockApiClient, FileCanvas, Navigation, SqliteCursor, ViewEvent, ViewSession, ViewerState,
    DEFAULT_API_URL,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct AppContext {
    db_path: String,
    rpc_url: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "blockflow")]
#[command(about = "Force-directed graphs of Ethereum block transactions")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[arg(long, global = true, default_value = "data/blockflow.sqlite")]
    db_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the block service.
    Serve(ServeArgs),
    /// Download a block range into the local cache.
    Fetch(FetchArgs),
    /// Render the current block.
    Show(ViewArgs),
    /// Step forward one block and render it.
    Next(ViewArgs),
    /// Step back one block and render it.
    Prev(ViewArgs),
    /// Jump to a block and render it.
    Goto(GotoArgs),
    /// Navigate interactively from stdin.
    Browse(ViewArgs),
    /// Show cached blocks and the viewer cursor.
    Status,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,
}

#[derive(Args, Debug)]
struct FetchArgs {
    #[arg(long)]
    start_block: u64,

    #[arg(long)]
    end_block: u64,
}

#[derive(Args, Debug, Clone)]
struct ViewArgs {
    /// Base URL of the block service.
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// SVG file the graph is drawn into.
    #[arg(long, default_value = "data/blockflow.svg")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct GotoArgs {
    block: u64,

    #[command(flatten)]
    view: ViewArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        db_path: cli.db_path,
        rpc_url: std::env::var("BLOCKFLOW_RPC_URL").ok(),
    };

    match cli.command {
        Commands::Serve(args) => handle_serve(&ctx, args).await,
        Commands::Fetch(args) => handle_fetch(&ctx, args).await,
        Commands::Show(args) => handle_view(&ctx, None, args).await,
        Commands::Next(args) => handle_view(&ctx, Some(Navigation::Next), args).await,
        Commands::Prev(args) => handle_view(&ctx, Some(Navigation::Previous), args).await,
        Commands::Goto(args) => {
            handle_view(&ctx, Some(Navigation::Goto(args.block)), args.view).await
        }
        Commands::Browse(args) => handle_browse(&ctx, args).await,
        Commands::Status => handle_status(&ctx),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn open_store(db_path: &str) -> Result<Arc<Store>> {
    if db_path != ":memory:" {
        if let Some(parent) = Path::new(db_path).parent() {
            ensure_dir(parent)?;
        }
    }
    let store = Store::new(db_path).wrap_err("failed to open SQLite store")?;
    Ok(Arc::new(store))
}

fn rpc_url(ctx: &AppContext, command: &str) -> Result<String> {
    ctx.rpc_url
        .clone()
        .ok_or_else(|| eyre!("BLOCKFLOW_RPC_URL is required for {command} command"))
}

async fn handle_serve(ctx: &AppContext, args: ServeArgs) -> Result<()> {
    let rpc_url = rpc_url(ctx, "serve")?;
    let store = open_store(&ctx.db_path)?;
    let client = RpcClient::connect(&rpc_url).await?;

    info!(bind = %args.bind, db_path = %ctx.db_path, "starting block service");
    flow_api::serve(args.bind, AppState::new(store, Arc::new(client))).await
}

async fn handle_fetch(ctx: &AppContext, args: FetchArgs) -> Result<()> {
    if args.start_block > args.end_block {
        return Err(eyre!(
            "invalid range: start-block {} is greater than end-block {}",
            args.start_block,
            args.end_block
        ));
    }

    let rpc_url = rpc_url(ctx, "fetch")?;
    let store = open_store(&ctx.db_path)?;
    let client = RpcClient::connect(&rpc_url).await?;

    let fetched = client
        .fetch_range(args.start_block, args.end_block, &store)
        .await
        .wrap_err("failed to fetch block range")?;

    info!(
        start_block = args.start_block,
        end_block = args.end_block,
        fetched,
        db_path = %ctx.db_path,
        "fetch command finished"
    );
    Ok(())
}

fn view_session(args: &ViewArgs) -> (ViewSession, tokio::sync::mpsc::UnboundedReceiver<ViewEvent>) {
    ViewSession::new(
        Arc::new(BlockApiClient::new(&args.api_url)),
        Box::new(FileCanvas::new(args.out.clone())),
        Viewport::default(),
    )
}

/// Apply one navigation (or none, for `show`) and render the resulting block.
async fn handle_view(ctx: &AppContext, navigation: Option<Navigation>, args: ViewArgs) -> Result<()> {
    let store = open_store(&ctx.db_path)?;
    let mut state = ViewerState::load(Box::new(SqliteCursor::new(store)))?;
    let block = match navigation {
        Some(navigation) => state.navigate(navigation)?,
        None => state.current_block(),
    };

    let (mut session, mut events) = view_session(&args);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.set_message(format!("loading block {block}"));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    session
        .request(block)
        .await
        .wrap_err("render task failed")?;

    match events.recv().await {
        Some(ViewEvent::Rendered {
            block,
            nodes,
            links,
            ticks,
        }) => {
            pb.finish_and_clear();
            info!(block, nodes, links, ticks, out = %args.out.display(), "block rendered");
            println!(
                "block {block}: {nodes} addresses, {links} transactions -> {}",
                args.out.display()
            );
            Ok(())
        }
        Some(ViewEvent::Failed { block, message }) => {
            pb.finish_and_clear();
            Err(eyre!("failed to load block {block}: {message}"))
        }
        None => {
            pb.finish_and_clear();
            Err(eyre!("render task ended without a result"))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum BrowseCommand {
    Navigate(Navigation),
    Drag { address: String, x: f64, y: f64 },
    Help,
    Quit,
}

fn parse_command(line: &str) -> std::result::Result<BrowseCommand, String> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some("n") | Some("next") => BrowseCommand::Navigate(Navigation::Next),
        Some("p") | Some("prev") => BrowseCommand::Navigate(Navigation::Previous),
        Some("g") | Some("goto") => {
            let block = words
                .next()
                .ok_or("usage: g <block>")?
                .parse()
                .map_err(|_| "block must be a non-negative integer".to_string())?;
            BrowseCommand::Navigate(Navigation::Goto(block))
        }
        Some("d") | Some("drag") => {
            let (Some(address), Some(x), Some(y)) = (words.next(), words.next(), words.next())
            else {
                return Err("usage: d <address> <x> <y>".to_string());
            };
            let x = x.parse().map_err(|_| format!("invalid x coordinate: {x}"))?;
            let y = y.parse().map_err(|_| format!("invalid y coordinate: {y}"))?;
            BrowseCommand::Drag {
                address: address.to_string(),
                x,
                y,
            }
        }
        Some("h") | Some("help") | None => BrowseCommand::Help,
        Some("q") | Some("quit") => BrowseCommand::Quit,
        Some(other) => return Err(format!("unknown command: {other} (h for help)")),
    };
    Ok(command)
}

const BROWSE_HELP: &str = "commands: n (next), p (prev), g <block>, d <address> <x> <y>, q (quit)";

async fn handle_browse(ctx: &AppContext, args: ViewArgs) -> Result<()> {
    let store = open_store(&ctx.db_path)?;
    let mut state = ViewerState::load(Box::new(SqliteCursor::new(store)))?;
    let (mut session, mut events) = view_session(&args);

    println!("{BROWSE_HELP}");
    println!("loading block {}", state.current_block());
    drop(session.request(state.current_block()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.wrap_err("failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(BrowseCommand::Navigate(navigation)) => {
                        let block = state.navigate(navigation)?;
                        println!("loading block {block}");
                        drop(session.request(block));
                    }
                    Ok(BrowseCommand::Drag { address, x, y }) => {
                        match session.drag(&address, x, y).await {
                            Ok(()) => println!("moved {address} to ({x}, {y})"),
                            Err(e) => eprintln!("error: {e:#}"),
                        }
                    }
                    Ok(BrowseCommand::Help) => println!("{BROWSE_HELP}"),
                    Ok(BrowseCommand::Quit) => break,
                    Err(message) => eprintln!("{message}"),
                }
            }
            Some(event) = events.recv() => match event {
                ViewEvent::Rendered { block, nodes, links, .. } => println!(
                    "block {block}: {nodes} addresses, {links} transactions -> {}",
                    args.out.display()
                ),
                ViewEvent::Failed { block, message } => {
                    eprintln!("error loading block {block}: {message}");
                }
            },
        }
    }

    session.cancel();
    Ok(())
}

fn handle_status(ctx: &AppContext) -> Result<()> {
    let store = open_store(&ctx.db_path)?;
    let blocks = store
        .cached_blocks()
        .wrap_err("failed to list cached blocks")?;
    let state = ViewerState::load(Box::new(SqliteCursor::new(store)))?;

    let db_size_str = if ctx.db_path == ":memory:" {
        "N/A (in-memory)".to_string()
    } else {
        match std::fs::metadata(&ctx.db_path) {
            Ok(metadata) => format!("{} KB", metadata.len() / 1_000),
            Err(_) => "N/A (file not found)".to_string(),
        }
    };

    let mut summary = Table::new();
    summary.load_preset(UTF8_BORDERS_ONLY);
    summary.set_header(vec!["Metric", "Value"]);
    summary.add_row(vec!["Database Path", ctx.db_path.as_str()]);
    summary.add_row(vec!["DB Size", &db_size_str]);
    summary.add_row(vec!["Current Block", &state.current_block().to_string()]);
    summary.add_row(vec!["Cached Blocks", &blocks.len().to_string()]);
    println!("\n{}\n", summary);

    if !blocks.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Block", "Hash", "Transactions", "Fetched At"]);
        for block in &blocks {
            table.add_row(vec![
                block.block_number.to_string(),
                short_hash(&block.block_hash),
                block.transaction_count.to_string(),
                block.fetched_at.clone(),
            ]);
        }
        println!("{}\n", table);
    }

    info!(
        cached_blocks = blocks.len(),
        current_block = state.current_block(),
        "status command finished"
    );
    Ok(())
}

/// First 10 and last 6 characters of a long hash. Counts chars, since the
/// cached hash is whatever the node sent.
fn short_hash(hash: &str) -> String {
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() > 18 {
        let head: String = chars[..10].iter().collect();
        let tail: String = chars[chars.len() - 6..].iter().collect();
        format!("{head}…{tail}")
    } else {
        hash.to_string()
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
        .wrap_err_with(|| format!("failed to create data directory {}", path.display()))?;
    Ok(())
}
