use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use proxy_balancer::config::ProxyConfig;
use proxy_balancer::lifecycle::LifecycleController;
use proxy_balancer::{logging, pidfile, server};

#[derive(Parser)]
#[command(name = "proxy-balancer", about = "HTTP reverse proxy load balancer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the proxy in the foreground.
    Start {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Stop a running proxy by sending SIGTERM to its pidfile-recorded pid.
    Stop,
    /// Report whether a proxy process recorded in the pidfile is alive.
    Status,
    /// Load and validate a configuration file without starting the proxy.
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Start { config } => run_start(config),
        Command::Stop => run_stop(),
        Command::Status => run_status(),
        Command::Validate { config } => run_validate(config),
    }
}

fn run_start(config_path: PathBuf) -> ExitCode {
    let config = match ProxyConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _logging_guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("logging error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let worker_threads = server::runtime::get_container_cpu_limit();
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to build tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async move {
        let controller = match LifecycleController::new(config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("config error: {e}");
                return ExitCode::FAILURE;
            }
        };

        if let Err(e) = controller.start().await {
            eprintln!("failed to start: {e}");
            return ExitCode::FAILURE;
        }

        let pid_path = pidfile::default_path();
        if let Err(e) = pidfile::write(&pid_path, std::process::id()) {
            tracing::warn!("failed to write pid file: {}", e);
        }

        wait_for_shutdown().await;

        if let Err(e) = controller.stop().await {
            tracing::error!("error during shutdown: {}", e);
        }
        pidfile::remove(&pid_path);

        ExitCode::SUCCESS
    })
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

fn run_stop() -> ExitCode {
    let pid_path = pidfile::default_path();
    if !pid_path.exists() {
        eprintln!("not running");
        return ExitCode::FAILURE;
    }

    match pidfile::send_terminate(&pid_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("failed to stop: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_status() -> ExitCode {
    let pid_path = pidfile::default_path();
    let pid = match pidfile::read(&pid_path) {
        Ok(pid) => pid,
        Err(_) => {
            println!("not running");
            return ExitCode::FAILURE;
        }
    };

    if pidfile::is_alive(pid) {
        println!("running (pid {pid})");
        ExitCode::SUCCESS
    } else {
        println!("not running");
        ExitCode::FAILURE
    }
}

fn run_validate(config_path: PathBuf) -> ExitCode {
    match ProxyConfig::load(&config_path) {
        Ok(_) => {
            println!("ok");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
