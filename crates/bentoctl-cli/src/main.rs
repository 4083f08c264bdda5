mod commands;

use bentoctl_core::{Engine, RunOptions};
use bentoctl_schema::{Config, Environment};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{CommandError, EXIT_CONFIG_ERROR, EXIT_FAILURE};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Env file picked up from the working directory when present.
const LOCAL_ENV_FILE: &str = "local.env";

#[derive(Debug, Parser)]
#[command(
    name = "bentoctl",
    version,
    about = "Orchestrate the services of a Bento deployment"
)]
struct Cli {
    /// Load variables from an env file before reading configuration.
    /// Earlier files win; the process environment wins over all of them.
    #[arg(long = "env-file", global = true, value_name = "PATH")]
    env_files: Vec<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start services in their recorded mode.
    #[command(visible_aliases = ["start", "up"])]
    Run {
        /// Service id, kind, group prefix, or `all`.
        #[arg(default_value = "all")]
        service: String,
        /// Pull images before starting.
        #[arg(short, long, default_value_t = false)]
        pull: bool,
        /// Recreate containers even if their configuration is unchanged.
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
    /// Stop services. `all` brings the whole deployment down.
    #[command(visible_alias = "down")]
    Stop {
        #[arg(default_value = "all")]
        service: String,
    },
    /// Stop, then start services again.
    Restart {
        #[arg(default_value = "all")]
        service: String,
        /// Pull images before starting.
        #[arg(short, long, default_value_t = false)]
        pull: bool,
        /// Recreate containers even if their configuration is unchanged.
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
    /// Stop and remove service containers and their anonymous volumes.
    Clean {
        #[arg(default_value = "all")]
        service: String,
    },
    /// Pull the images for services in their recorded mode.
    Pull {
        #[arg(default_value = "all")]
        service: String,
    },
    /// Switch one service to its local development build.
    #[command(name = "work-on", visible_aliases = ["dev", "develop", "local"])]
    WorkOn {
        /// A single service id or kind.
        service: String,
    },
    /// Switch services back to their published images.
    #[command(visible_aliases = ["pre-built", "prod"])]
    Prebuilt {
        service: String,
    },
    /// Show the recorded mode of services.
    #[command(visible_alias = "state")]
    Mode {
        #[arg(default_value = "all")]
        service: String,
    },
    /// Show container status next to the recorded mode.
    Status {
        #[arg(default_value = "all")]
        service: String,
    },
    /// Open a shell inside a running service container.
    #[command(visible_alias = "sh")]
    Shell {
        service: String,
        #[arg(long, default_value = "/bin/bash", value_parser = ["/bin/bash", "/bin/sh"])]
        shell: String,
    },
    /// Start a one-off container for a service with a shell as its command.
    #[command(name = "run-as-shell")]
    RunAsShell {
        service: String,
        #[arg(long, default_value = "/bin/bash", value_parser = ["/bin/bash", "/bin/sh"])]
        shell: String,
    },
    /// Show service logs.
    Logs {
        /// Limit to one service; all services when omitted.
        service: Option<String>,
        /// Keep streaming new output.
        #[arg(short, long, default_value_t = false)]
        follow: bool,
    },
    /// Print the merged compose configuration.
    #[command(name = "compose-config")]
    ComposeConfig {
        /// Only list service names.
        #[arg(long, default_value_t = false)]
        services: bool,
    },
    /// Create the configured container networks if missing.
    #[command(name = "init-docker")]
    InitDocker,
    /// Generate shell completions.
    Completions {
        shell: Shell,
    },
    /// Generate man pages.
    #[command(name = "man-pages")]
    ManPages {
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BENTOCTL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Completions { shell } => {
            return finish(commands::completions::run::<Cli>(shell));
        }
        Commands::ManPages { ref dir } => {
            return finish(commands::man_pages::run::<Cli>(dir));
        }
        _ => {}
    }

    if let Err(msg) = load_env_files(&cli.env_files) {
        return finish(Err(CommandError::new(msg, EXIT_CONFIG_ERROR)));
    }

    let config = match Config::from_environment(Environment::capture()) {
        Ok(config) => config,
        Err(e) => return finish(Err(CommandError::new(e.to_string(), EXIT_CONFIG_ERROR))),
    };

    let needs_runtime = !matches!(cli.command, Commands::Mode { .. });
    if needs_runtime && !config.skip_prereqs && config.runtime_backend != "mock" {
        let mut missing = bentoctl_runtime::check_runtime_prereqs(&config.compose_command);
        if matches!(cli.command, Commands::WorkOn { .. }) {
            missing.extend(bentoctl_runtime::check_git_prereqs());
        }
        if !missing.is_empty() {
            return finish(Err(CommandError::new(
                bentoctl_runtime::format_missing(&missing),
                EXIT_FAILURE,
            )));
        }
    }

    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => return finish(Err(e.into())),
    };
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Run {
            service,
            pull,
            force,
        } => commands::run::run(
            &engine,
            &service,
            RunOptions {
                pull,
                force_recreate: force,
            },
            json_output,
        ),
        Commands::Stop { service } => commands::stop::run(&engine, &service, json_output),
        Commands::Restart {
            service,
            pull,
            force,
        } => commands::restart::run(
            &engine,
            &service,
            RunOptions {
                pull,
                force_recreate: force,
            },
            json_output,
        ),
        Commands::Clean { service } => commands::clean::run(&engine, &service, json_output),
        Commands::Pull { service } => commands::pull::run(&engine, &service, json_output),
        Commands::WorkOn { service } => commands::work_on::run(&engine, &service, json_output),
        Commands::Prebuilt { service } => {
            commands::prebuilt::run(&engine, &service, json_output)
        }
        Commands::Mode { service } => commands::mode::run(&engine, &service, json_output),
        Commands::Status { service } => commands::status::run(&engine, &service, json_output),
        Commands::Shell { service, shell } => commands::shell::run(&engine, &service, &shell),
        Commands::RunAsShell { service, shell } => {
            commands::shell::run_as_shell(&engine, &service, &shell)
        }
        Commands::Logs { service, follow } => {
            commands::logs::run(&engine, service.as_deref(), follow)
        }
        Commands::ComposeConfig { services } => {
            commands::compose_config::run(&engine, services, json_output)
        }
        Commands::InitDocker => commands::init_docker::run(&engine, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    finish(result)
}

fn finish(result: Result<u8, CommandError>) -> ExitCode {
    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{} error: {}", commands::fail_mark(), err.message);
            ExitCode::from(err.code)
        }
    }
}

/// `--env-file` paths must exist. `local.env` is optional. dotenvy never
/// overrides a variable that is already set, so the first source wins.
fn load_env_files(paths: &[PathBuf]) -> Result<(), String> {
    for path in paths {
        dotenvy::from_path(path)
            .map_err(|e| format!("failed to load env file {}: {e}", path.display()))?;
        tracing::debug!("loaded env file {}", path.display());
    }
    let local = Path::new(LOCAL_ENV_FILE);
    if local.is_file() {
        dotenvy::from_path(local)
            .map_err(|e| format!("failed to load env file {}: {e}", local.display()))?;
        tracing::debug!("loaded env file {}", local.display());
    }
    Ok(())
}
