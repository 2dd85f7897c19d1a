//! Tektree CLI - browse Tekton resources as a tree.

use clap::Parser;
use std::process;
use std::sync::Arc;
use tektree::cli::{Cli, Commands, ConfigCommands, StartCommands};
use tektree::commands::{self, Output};
use tektree::config::{ConfigOverrides, ResolvedConfig, resolve_config};
use tektree::executor::{Executor, ProcessExecutor};
use tektree::explorer::Explorer;
use tektree::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let _log_guard = match logging::init(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => fail(&e, human),
    };

    let overrides = overrides(&cli);
    let config = match resolve_config(&overrides) {
        Ok(config) => config,
        Err(e) => fail(&e, human),
    };

    if let Err(e) = run_command(cli.command, config, human).await {
        fail(&e, human);
    }
}

fn overrides(cli: &Cli) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::new();
    if let Some(path) = &cli.config {
        overrides = overrides.with_config_path(path);
    }
    if let Some(page_size) = cli.page_size {
        overrides = overrides.with_page_size(page_size as usize);
    }
    if let Some(level) = cli.verbosity {
        overrides = overrides.with_verbosity(level);
    }
    if let Some(path) = &cli.tkn {
        overrides = overrides.with_tkn_path(path);
    }
    if let Some(path) = &cli.kubectl {
        overrides = overrides.with_kubectl_path(path);
    }
    overrides
}

async fn run_command(
    command: Commands,
    config: ResolvedConfig,
    human: bool,
) -> Result<(), tektree::Error> {
    let executor: Arc<dyn Executor> = Arc::new(ProcessExecutor::new(
        config.tool_paths(),
        config.command_timeout(),
    ));
    let explorer = Explorer::new(executor.clone(), config.explorer_options());

    match command {
        Commands::Tree { depth } => {
            let result = commands::tree(&explorer, depth).await;
            output(&result, human);
        }
        Commands::Children { path, pages } => {
            let result = commands::children(&explorer, &path, pages).await?;
            output(&result, human);
        }
        Commands::Watch { depth } => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            commands::watch(&explorer, depth, shutdown, |frame| {
                if human {
                    println!("{}\n", frame.to_human());
                } else {
                    println!("{}", frame.to_json());
                }
            })
            .await?;
        }
        Commands::Logs { kind, name, follow } => {
            commands::logs(executor.as_ref(), kind, &name, follow, config.verbosity()).await?;
        }
        Commands::Resources { task, cluster } => {
            let result = commands::resources(explorer.fetcher(), &task, cluster).await?;
            output(&result, human);
        }
        Commands::Start { command } => {
            let result = match command {
                StartCommands::Task { args, cluster } => {
                    commands::start_task(explorer.fetcher(), &args, cluster).await?
                }
                StartCommands::Pipeline { args } => {
                    commands::start_pipeline(explorer.fetcher(), &args).await?
                }
            };
            output(&result, human);
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => output(&commands::config_show(config), human),
            ConfigCommands::Init { force } => {
                output(&commands::config_init(&config, force)?, human);
            }
        },
        Commands::Version => {
            let result = commands::version(executor.as_ref(), config.verbosity()).await;
            output(&result, human);
        }
    }

    explorer.shutdown();
    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn fail(error: &tektree::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", error);
    } else {
        eprintln!("{}", serde_json::json!({ "error": error.to_string() }));
    }
    process::exit(1);
}
