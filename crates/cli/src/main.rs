mod commands;
mod context;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::context::{Overrides, RunContext};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Bulk content loading and maintenance for Contentful environments.
#[derive(Parser)]
#[command(
    name = "cmsload",
    version,
    about = "Bulk content loading and maintenance for Contentful environments"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// More diagnostics (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Target environment id (overrides CONTENTFUL_ENVIRONMENT)
    #[arg(long, global = true)]
    environment: Option<String>,

    /// Skip the production confirmation prompt
    #[arg(long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load course pages from the course-template GraphQL feed
    Courses {
        /// GraphQL endpoint of the course feed
        #[arg(long)]
        feed: String,
        /// Collection holding the course templates
        #[arg(long, default_value = "allCourseTemplate")]
        collection: String,
        /// Publish entries created or linked by this run
        #[arg(long)]
        publish: bool,
        /// Records per batch (overrides LOADER_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Pause between batches in milliseconds (overrides LOADER_BATCH_DELAY_MS)
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Load local authorities, then their service contact points
    Councils {
        /// Directory holding councils.json and one <service>.json per service
        #[arg(long)]
        data_dir: PathBuf,
        /// Publish entries created or linked by this run
        #[arg(long)]
        publish: bool,
        /// Comma-separated services to load (dhp,homelessness,council-housing,lwa). Default: all.
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
        /// Base URL that relative documentDownload paths are fetched from
        #[arg(long)]
        downloads_url: Option<String>,
        /// Records per batch (overrides LOADER_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Pause between batches in milliseconds (overrides LOADER_BATCH_DELAY_MS)
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Copy fields of paired entries from one space to another
    Align {
        /// TOML file listing the source space, target space and entry pairs
        #[arg(long)]
        config: PathBuf,
        /// Publish each aligned target entry
        #[arg(long)]
        publish: bool,
    },

    /// Delete every never-published entry of the given content types
    PruneDrafts {
        /// Content type id (repeatable)
        #[arg(long = "content-type", required = true)]
        content_types: Vec<String>,
        /// Pause after each delete in milliseconds (overrides LOADER_BATCH_DELAY_MS)
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Copy tagged entries and everything they link to from another environment
    Mirror {
        /// Source environment id; the target is --environment
        #[arg(long)]
        from: String,
        /// Tag id selecting the root entries
        #[arg(long)]
        tag: String,
        /// Link hops followed from each tagged entry
        #[arg(long, default_value = "4")]
        max_depth: usize,
        /// Tag id selecting extra assets to copy besides the linked ones
        #[arg(long)]
        asset_tag: Option<String>,
    },

    /// Write every entry of the given content types to a JSON file
    Export {
        /// Content type id (repeatable)
        #[arg(long = "content-type", required = true)]
        content_types: Vec<String>,
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Write one content-model migration script per content type
    GenerateMigrations {
        /// Directory receiving <content-type-id>.js
        #[arg(long, default_value = "migrations")]
        out_dir: PathBuf,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let overrides = Overrides {
        environment: cli.environment.clone(),
        batch_size: match &cli.command {
            Commands::Courses { batch_size, .. } | Commands::Councils { batch_size, .. } => {
                *batch_size
            }
            _ => None,
        },
        delay_ms: match &cli.command {
            Commands::Courses { delay_ms, .. }
            | Commands::Councils { delay_ms, .. }
            | Commands::PruneDrafts { delay_ms, .. } => *delay_ms,
            _ => None,
        },
    };
    let ctx = match RunContext::load(overrides, cli.output, cli.quiet, cli.yes) {
        Ok(ctx) => ctx,
        Err(e) => {
            report_error(&format!("configuration error: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Courses {
            feed,
            collection,
            publish,
            ..
        } => {
            commands::courses::cmd_courses(&ctx, &feed, &collection, publish);
        }
        Commands::Councils {
            data_dir,
            publish,
            only,
            downloads_url,
            ..
        } => {
            commands::councils::cmd_councils(&ctx, &data_dir, &only, downloads_url, publish);
        }
        Commands::Align { config, publish } => {
            commands::align::cmd_align(&ctx, &config, publish);
        }
        Commands::PruneDrafts { content_types, .. } => {
            commands::prune::cmd_prune_drafts(&ctx, &content_types);
        }
        Commands::Mirror {
            from,
            tag,
            max_depth,
            asset_tag,
        } => {
            commands::mirror::cmd_mirror(&ctx, &from, &tag, asset_tag, max_depth);
        }
        Commands::Export { content_types, out } => {
            commands::export::cmd_export(&ctx, &content_types, &out);
        }
        Commands::GenerateMigrations { out_dir } => {
            commands::migrations::cmd_generate_migrations(&ctx, &out_dir);
        }
    }
}

/// Diagnostics go to stderr; stdout is kept for summaries.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},ureq=warn")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Print an error message to stderr in the appropriate format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
