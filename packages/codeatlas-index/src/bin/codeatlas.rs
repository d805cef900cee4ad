//! CodeAtlas CLI
//!
//! Exit codes: 0 success, 1 generic failure, 2 invalid query/args,
//! 3 resource exceeded, 4 partial result (timeout/truncation).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;
use walkdir::WalkDir;

use codeatlas_index::{
    Engine, EnvConfig, HashingEmbedder, IntentKind, MultiIndexStore, VectorIndexConfig,
};
use codeatlas_ir::{ErrorKind, Language, SourceFile};

const EXIT_GENERIC: u8 = 1;
const EXIT_INVALID: u8 = 2;
const EXIT_RESOURCE: u8 = 3;
const EXIT_PARTIAL: u8 = 4;

#[derive(Parser)]
#[command(name = "codeatlas", about = "Code intelligence engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a repository
    Index {
        repo_path: PathBuf,
        /// Full rebuild (default)
        #[arg(long, conflicts_with = "incremental")]
        full: bool,
        /// Incremental refresh
        #[arg(long)]
        incremental: bool,
        /// Parallel workers (0 = auto)
        #[arg(long, default_value_t = 0)]
        workers: usize,
    },
    /// Hybrid search over an indexed repository
    Search {
        repo_id: String,
        query: String,
        #[arg(long)]
        intent: Option<String>,
        #[arg(long = "top-k", default_value_t = 10)]
        top_k: usize,
        #[arg(long = "include-inactive")]
        include_inactive: bool,
    },
    /// Trace paths between symbols
    Trace {
        repo_id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: Option<String>,
        /// Taint label filter (runs a taint trace)
        #[arg(long)]
        taint: Option<String>,
        #[arg(long, default_value_t = 50)]
        depth: usize,
        #[arg(long, default_value_t = 30_000)]
        timeout: u64,
    },
    /// Change impact analysis
    Impact {
        repo_id: String,
        /// Comma-separated changed files
        #[arg(long, value_delimiter = ',')]
        files: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = EnvConfig::from_env();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "runtime_init_failed");
            return ExitCode::from(EXIT_GENERIC);
        }
    };

    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: EnvConfig) -> ExitCode {
    let store = MultiIndexStore::new(
        Arc::new(HashingEmbedder::default()),
        VectorIndexConfig {
            upsert_batch_size: config.embed_batch_size,
            upsert_concurrency: config.embed_concurrency,
            ..Default::default()
        },
    );
    let engine = Engine::new(store);

    match cli.command {
        Command::Index {
            repo_path,
            workers,
            ..
        } => {
            if workers > 0 {
                if let Err(e) = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build_global()
                {
                    error!(error = %e, "thread_pool_config_failed");
                }
            }
            let repo_id = repo_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "repo".to_string());

            let files = match collect_sources(&repo_path) {
                Ok(files) => files,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::from(EXIT_INVALID);
                }
            };

            match engine.index_repository(&repo_id, "working", &files).await {
                Ok(summary) => {
                    println!(
                        "indexed {} files, {} chunks, {} functions ({} failed)",
                        summary.files, summary.chunks, summary.functions, summary.failed_files
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => exit_for(e),
            }
        }

        Command::Search {
            repo_id,
            query,
            intent,
            top_k,
            include_inactive,
        } => {
            let intent = match intent.as_deref() {
                None => None,
                Some(raw) => match IntentKind::parse(raw) {
                    Some(kind) => Some(kind),
                    None => {
                        eprintln!("error: unknown intent '{}'", raw);
                        return ExitCode::from(EXIT_INVALID);
                    }
                },
            };

            match engine
                .search(&repo_id, &query, top_k, intent, include_inactive)
                .await
            {
                Ok(result) => {
                    println!("intent: {}", result.intent.as_str());
                    for (rank, hit) in result.hits.iter().enumerate() {
                        println!(
                            "{:>3}. {:<50} {:.4} [{} strategies]",
                            rank + 1,
                            hit.hit.chunk_id,
                            hit.final_score,
                            hit.strategy_count
                        );
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => exit_for(e),
            }
        }

        Command::Trace {
            repo_id,
            from,
            to,
            taint,
            depth,
            timeout,
        } => match taint {
            Some(label) => {
                let Some(to) = to else {
                    eprintln!("error: --taint requires --to");
                    return ExitCode::from(EXIT_INVALID);
                };
                match engine
                    .trace_taint(&repo_id, &from, &to, &label, depth, timeout)
                    .await
                {
                    Ok(result) => {
                        for path in &result.paths {
                            println!("{}", path.node_ids.join(" -> "));
                        }
                        println!("{} taint path(s)", result.paths.len());
                        if result.truncated {
                            eprintln!("warning: truncated by deadline");
                            return ExitCode::from(EXIT_PARTIAL);
                        }
                        ExitCode::SUCCESS
                    }
                    Err(e) => exit_for(e),
                }
            }
            None => match engine.trace(&repo_id, &from, to.as_deref(), depth, timeout).await {
                Ok(outcome) => {
                    for path in &outcome.paths {
                        println!("{}", path.node_ids.join(" -> "));
                    }
                    println!("{} path(s)", outcome.paths.len());
                    if outcome.truncated {
                        eprintln!("warning: truncated by deadline");
                        return ExitCode::from(EXIT_PARTIAL);
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => exit_for(e),
            },
        },

        Command::Impact { repo_id, files } => {
            if files.is_empty() {
                eprintln!("error: --files requires at least one file");
                return ExitCode::from(EXIT_INVALID);
            }
            match engine.impact(&repo_id, &files).await {
                Ok(report) => {
                    println!("directly affected:     {:?}", report.directly_affected);
                    println!("transitively affected: {:?}", report.transitively_affected);
                    println!("max depth:             {}", report.max_depth);
                    println!("risk score:            {:.3}", report.risk_score);
                    ExitCode::SUCCESS
                }
                Err(e) => exit_for(e),
            }
        }
    }
}

fn collect_sources(root: &PathBuf) -> codeatlas_ir::Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(codeatlas_ir::AtlasError::config(format!(
            "not a directory: {}",
            root.display()
        )));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if Language::from_path(&rel).is_none() {
            continue;
        }
        let content = std::fs::read_to_string(path)?;
        files.push(SourceFile { path: rel, content });
    }
    Ok(files)
}

fn exit_for(error: codeatlas_ir::AtlasError) -> ExitCode {
    eprintln!("error: {}", error);
    match error.kind {
        ErrorKind::ResourceExceeded => ExitCode::from(EXIT_RESOURCE),
        ErrorKind::Timeout => ExitCode::from(EXIT_PARTIAL),
        ErrorKind::Config => ExitCode::from(EXIT_INVALID),
        _ => ExitCode::from(EXIT_GENERIC),
    }
}
