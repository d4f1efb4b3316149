mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "forge",
    about = "Agent orchestration — plan, generate, run, debug, and merge model-written code",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .forge/ or .git/)
    #[arg(long, global = true, env = "FORGE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a forge workspace (config, agent roster, ledger)
    Init,

    /// Generate a single file from a description
    Generate {
        /// Target file path, workspace-relative (e.g. src/app/main.py)
        file: String,

        /// Natural-language description of what to build
        #[arg(long, short = 'd')]
        desc: String,

        /// After generating, run the file and auto-debug failures
        #[arg(long)]
        run: bool,

        /// Use the three engineering personas plus the chief to generate
        #[arg(long, conflicts_with = "run", conflicts_with = "edit")]
        triad: bool,

        /// Edit the existing file instead of generating from scratch
        #[arg(long, conflicts_with = "run")]
        edit: bool,

        /// Debug rewrites after a failed run (default: from config)
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Plan and build a multi-file project
    Build {
        /// Project root directory, workspace-relative (e.g. src/my_app)
        project_root: String,

        /// High-level goal of the project
        #[arg(long, short = 'd')]
        desc: String,

        /// Run the project's test suite after building
        #[arg(long)]
        run_tests: bool,
    },

    /// Triad meta-plan and build: agents + files + dependencies + tests
    MetaBuild {
        /// Project root directory, workspace-relative
        project_root: String,

        /// High-level goal of the project
        #[arg(long, short = 'd')]
        desc: String,

        /// Run the project's test suite after building
        #[arg(long)]
        run_tests: bool,
    },

    /// Run a project's test suite
    Test {
        /// Project root directory, workspace-relative
        project_root: String,
    },

    /// List recent ledger tasks
    Tasks {
        /// Maximum number of tasks to show
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Only show tasks whose target starts with this prefix
        #[arg(long)]
        target: Option<String>,
    },

    /// List recent memory entries
    Memory {
        /// Maximum number of entries to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Validate the workspace configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Generate {
            file,
            desc,
            run,
            triad,
            edit,
            max_retries,
        } => cmd::generate::run(&root, &file, &desc, run, triad, edit, max_retries, cli.json),
        Commands::Build {
            project_root,
            desc,
            run_tests,
        } => cmd::build::run(&root, &project_root, &desc, run_tests, cli.json),
        Commands::MetaBuild {
            project_root,
            desc,
            run_tests,
        } => cmd::meta::run(&root, &project_root, &desc, run_tests, cli.json),
        Commands::Test { project_root } => cmd::test::run(&root, &project_root, cli.json),
        Commands::Tasks { limit, target } => {
            cmd::tasks::run(&root, limit, target.as_deref(), cli.json)
        }
        Commands::Memory { limit } => cmd::memory::run(&root, limit, cli.json),
        Commands::Config => cmd::config::run(&root, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
