use std::{
    env,
    error::Error,
    io,
    path::PathBuf,
    process::{Command, ExitStatus},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use red5wrapper::{
    cli::{Cli, Commands, TargetArgs, parse_args},
    config::{TargetConfig, load_config},
    constants::{APP_ROOT_ENV_VAR, ENVIRONMENT_ENV_VAR},
    logs,
    probe,
    supervisor::{Readiness, Supervisor},
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    match args.command {
        Commands::Start { target } => {
            let (mut supervisor, config) = resolve_target(&target)?;
            register_cancel_handler(supervisor.cancel_flag())?;
            supervisor.configure(config)?;
            match supervisor.start()? {
                Readiness::Ready => info!("Red5 is ready"),
                Readiness::TimedOut => warn!("Red5 started but is not answering yet"),
                Readiness::Cancelled => warn!("Stopped waiting for Red5"),
            }
            if let Some(pid) = supervisor.pid() {
                println!("{pid}");
            }
        }
        Commands::Stop { target } => {
            let (mut supervisor, config) = resolve_target(&target)?;
            supervisor.configure(config)?.stop()?;
        }
        Commands::Status { target } => {
            let (mut supervisor, config) = resolve_target(&target)?;
            let port = config.port;
            match supervisor.pid_for(config)? {
                Some(pid) if probe::is_pid_running(pid) => {
                    let details = probe::describe_process(pid)
                        .map(|summary| {
                            format!(
                                ", {} using {} KiB, up {}s",
                                summary.name,
                                summary.memory_bytes / 1024,
                                summary.run_time_secs
                            )
                        })
                        .unwrap_or_default();
                    let answering = if probe::is_ready(port) {
                        "answering"
                    } else {
                        "not answering"
                    };
                    println!("red5 running (pid {pid}{details}), {answering} on port {port}");
                }
                Some(pid) => println!("red5 not running (stale pid file for pid {pid})"),
                None => println!("red5 not running"),
            }
        }
        Commands::Pid { target } => {
            let (mut supervisor, config) = resolve_target(&target)?;
            match supervisor.pid_for(config)? {
                Some(pid) => println!("{pid}"),
                None => {
                    warn!("No pid recorded");
                    std::process::exit(1);
                }
            }
        }
        Commands::Logs { lines } => {
            let dir = env::current_dir()?;
            logs::show_log(&logs::resolve_log_path(&dir), lines, &mut io::stdout())?;
        }
        Commands::Wrap { target, command } => {
            let status = run_wrapped(&target, &command)?;
            if !status.success() {
                std::process::exit(status.code().unwrap_or(1));
            }
        }
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Builds the supervisor and configuration for a command from the config
/// file, environment, and command-line overrides.
fn resolve_target(target: &TargetArgs) -> Result<(Supervisor, TargetConfig), Box<dyn Error>> {
    let explicit_root = target
        .app_root
        .clone()
        .or_else(|| env::var_os(APP_ROOT_ENV_VAR).map(PathBuf::from));
    let app_root = explicit_root.clone().unwrap_or_else(|| PathBuf::from("."));

    let environment = target
        .environment
        .clone()
        .or_else(|| env::var(ENVIRONMENT_ENV_VAR).ok());

    let params = load_config(&app_root, environment.as_deref())?.merge(target.overrides());
    let config = params.resolve(explicit_root.as_deref())?;

    Ok((Supervisor::new(app_root), config))
}

fn run_wrapped(target: &TargetArgs, command: &[String]) -> Result<ExitStatus, Box<dyn Error>> {
    let (mut supervisor, config) = resolve_target(target)?;
    register_stop_handler(
        supervisor.base_path().to_path_buf(),
        config.clone(),
        supervisor.cancel_flag(),
    )?;

    let (program, rest) = command
        .split_first()
        .ok_or("wrap needs a command to run")?;

    supervisor.wrap(config, |_| -> Result<ExitStatus, Box<dyn Error>> {
        info!("Running {}", command.join(" "));
        Ok(Command::new(program).args(rest).status()?)
    })
}

fn register_cancel_handler(cancel: Arc<AtomicBool>) -> Result<(), Box<dyn Error>> {
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })?;

    Ok(())
}

/// On interrupt, stop the recorded Red5 through a fresh supervisor and exit.
fn register_stop_handler(
    base_path: PathBuf,
    config: TargetConfig,
    cancel: Arc<AtomicBool>,
) -> Result<(), Box<dyn Error>> {
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
        warn!("Interrupted; stopping red5");

        let mut supervisor = Supervisor::new(base_path.clone());
        match supervisor.configure(config.clone()) {
            Ok(supervisor) => {
                if let Err(err) = supervisor.stop() {
                    error!("Failed to stop red5: {err}");
                }
            }
            Err(err) => error!("Failed to stop red5: {err}"),
        }

        std::process::exit(130);
    })?;

    Ok(())
}
