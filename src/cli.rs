//! CLI module - Command-line interface definitions and handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::backends::extract::Extractor;
use crate::cache::store::{clear_state, read_state, SnapshotStore};
use crate::core::config::DigestConfig;
use crate::core::paths::{normalize_dependency_path, STATE_DIR};
use crate::core::render::{OutputFormat, RenderConfig, Renderer};
use crate::flows::digest::Session;

/// cpdigest - decide whether a compilation unit's dependencies changed.
#[derive(Parser, Debug)]
#[command(name = "cpdigest")]
#[command(
    author,
    version,
    about,
    long_about = r#"cpdigest fingerprints the dependencies of a compilation unit (library files and
class-output directories) and compares them with the fingerprints recorded by the
previous run.

Files are fingerprinted by size and modification time; directories by the number
of matching members and their newest modification time. Artifact bytes are never
read.

Examples:
    cpdigest digest lib/guava.jar ../core/target/classes
    cpdigest digest --classpath "$CLASSPATH" --exit-code
    cpdigest fingerprint target/classes --format md
    cpdigest show
    cpdigest clear
"#
)]
pub struct Cli {
    /// Directory holding the build state.
    #[arg(
        long,
        global = true,
        env = "CPDIGEST_STATE",
        default_value = STATE_DIR,
        value_name = "DIR",
        long_help = "Directory holding the build state (inputs.jsonl and meta.json).\n\n\
Each compilation unit should use its own state directory."
    )]
    pub state: PathBuf,

    /// Glob selecting build-output members of directory dependencies.
    #[arg(
        long = "include",
        global = true,
        env = "CPDIGEST_INCLUDE",
        value_delimiter = ',',
        value_name = "GLOB",
        long_help = "Glob selecting which members of a directory dependency count as build\n\
outputs. Repeatable. Defaults to **/*.class.\n\n\
Changing the patterns invalidates the stored build state."
    )]
    pub include: Vec<String>,

    /// Output format (jsonl/json/md/text).
    #[arg(
        long,
        global = true,
        value_enum,
        ignore_case = true,
        default_value_t = OutputFormat::Jsonl,
        value_name = "FORMAT"
    )]
    pub format: OutputFormat,

    /// Pretty-print JSON/JSONL output with indentation.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output (text format).
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose mode (logs the change trail to stderr).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Log each new, modified and removed dependency to stderr.\n\n\
RUST_LOG takes precedence when set."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare dependencies with the previous run and record them.
    Digest {
        /// Dependency paths, in classpath order.
        #[arg(value_name = "DEP")]
        dependencies: Vec<PathBuf>,

        /// Platform path list appended to the positional dependencies.
        #[arg(long, value_name = "PATHS")]
        classpath: Option<String>,

        /// Do not record this run's fingerprints.
        #[arg(long)]
        no_commit: bool,

        /// Exit with status 1 when the dependencies changed.
        #[arg(long)]
        exit_code: bool,
    },

    /// Print fingerprints of the given paths without touching the state.
    Fingerprint {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the fingerprints recorded by the previous run.
    Show,

    /// Delete the build state.
    Clear,
}

/// Install the stderr log subscriber
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let renderer = Renderer::with_config(RenderConfig::with_pretty(cli.format, cli.pretty));
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = DigestConfig {
        state_dir: cli.state,
        include: cli.include,
    };

    match cli.command {
        Commands::Digest {
            dependencies,
            classpath,
            no_commit,
            exit_code,
        } => {
            let mut dependencies = dependencies;
            if let Some(classpath) = classpath {
                dependencies.extend(classpath_entries(&classpath));
            }

            let changed = run_digest(&config, &dependencies, !no_commit, &renderer)?;
            if exit_code && changed {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Fingerprint { paths } => run_fingerprint(&config, &paths, &renderer),

        Commands::Show => {
            let (meta, inputs) = read_state(&config.state_dir)
                .with_context(|| format!("Failed to read build state in {:?}", config.state_dir))?;
            if meta.is_none() {
                tracing::warn!("No build state in {}", config.state_dir.display());
            }
            let fingerprints: Vec<_> = inputs.into_values().collect();
            println!("{}", renderer.render_fingerprints(&fingerprints));
            Ok(())
        }

        Commands::Clear => clear_state(&config.state_dir)
            .with_context(|| format!("Failed to remove {:?}", config.state_dir)),
    }
}

/// Split a platform path list, dropping empty entries
fn classpath_entries(classpath: &str) -> Vec<PathBuf> {
    std::env::split_paths(classpath)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

/// Digest `dependencies` against the stored state; returns the verdict
pub fn run_digest(
    config: &DigestConfig,
    dependencies: &[PathBuf],
    commit: bool,
    renderer: &Renderer,
) -> Result<bool> {
    let filter = config.member_filter()?;
    let mut store = config
        .open_store(&filter)
        .with_context(|| format!("Failed to read build state in {:?}", config.state_dir))?;
    let session = Session::new(filter);

    let report = session
        .digester()
        .detect_changes(&mut store, dependencies)
        .context("Failed to digest classpath dependencies")?;

    if commit {
        store.commit().context("Failed to write build state")?;
    }

    println!("{}", renderer.render_report(&report));
    Ok(report.changed)
}

/// Print fingerprints of `paths`; absent paths are reported on stderr
pub fn run_fingerprint(config: &DigestConfig, paths: &[PathBuf], renderer: &Renderer) -> Result<()> {
    let session = Session::new(config.member_filter()?);
    let mut fingerprints = Vec::new();

    for path in paths {
        let path = normalize_dependency_path(path)
            .with_context(|| format!("Failed to resolve {:?}", path))?;
        match session.extractor().extract(&path)? {
            Some(fp) => fingerprints.push(fp),
            None => eprintln!("absent: {}", path.display()),
        }
    }

    println!("{}", renderer.render_fingerprints(&fingerprints));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digest_command() {
        let cli = Cli::try_parse_from([
            "cpdigest",
            "--state",
            "/tmp/state",
            "--include",
            "**/*.o,**/*.a",
            "digest",
            "a.jar",
            "b/classes",
            "--exit-code",
        ])
        .unwrap();

        assert_eq!(cli.state, PathBuf::from("/tmp/state"));
        assert_eq!(cli.include, vec!["**/*.o", "**/*.a"]);
        match cli.command {
            Commands::Digest {
                dependencies,
                exit_code,
                no_commit,
                ..
            } => {
                assert_eq!(dependencies.len(), 2);
                assert!(exit_code);
                assert!(!no_commit);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_fingerprint_requires_path() {
        assert!(Cli::try_parse_from(["cpdigest", "fingerprint"]).is_err());
    }

    #[test]
    fn test_parse_format() {
        let cli = Cli::try_parse_from(["cpdigest", "--format", "markdown", "show"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Markdown);
        let cli = Cli::try_parse_from(["cpdigest", "show"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Jsonl);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["cpdigest", "--format", "xml", "show"]).is_err());
    }

    #[test]
    fn test_classpath_entries_skip_empty() {
        let joined = std::env::join_paths(["a.jar", "lib/classes"]).unwrap();
        let classpath = format!("{}{}", joined.to_str().unwrap(), sep());
        assert_eq!(
            classpath_entries(&classpath),
            vec![PathBuf::from("a.jar"), PathBuf::from("lib/classes")]
        );
        assert!(classpath_entries("").is_empty());
    }

    fn sep() -> char {
        if cfg!(windows) {
            ';'
        } else {
            ':'
        }
    }
}
