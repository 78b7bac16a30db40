use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use eyre::Result;
use tracing::{error, info};

use virtwho::config::ResolvedConfig;
use virtwho::Executor;
use virtwho_base::settings::RawOptions;
use virtwho_base::TracingConfig;

/// Harvests virtualization inventory from configured sources and forwards
/// it to configured subscription-management destinations.
#[derive(Parser, Debug)]
#[command(name = "virt-who", version)]
struct Cli {
    /// Seconds between collection cycles (minimum enforced: 60).
    #[arg(long)]
    interval: Option<u64>,

    /// Run one cycle per worker, then exit.
    #[arg(long)]
    one_shot: bool,

    /// Gather reports without submitting them anywhere; print at exit.
    #[arg(long)]
    print: bool,

    /// Raise the log level to debug.
    #[arg(long)]
    debug: bool,

    /// Emit JSON-formatted logs instead of human-readable ones.
    #[arg(long)]
    background: bool,

    /// Stable identifier attached to every submission.
    #[arg(long)]
    reporter_id: Option<String>,

    /// Path to the configuration file (sources, destinations, defaults).
    #[arg(long)]
    config: Option<String>,
}

impl Cli {
    fn into_raw_options(self) -> RawOptions {
        RawOptions {
            interval: self.interval,
            one_shot: if self.one_shot { Some(true) } else { None },
            print_only: if self.print { Some(true) } else { None },
            reporter_id: self.reporter_id,
            debug: if self.debug { Some(true) } else { None },
            config_dir: self.config.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let background = cli.background;
    let config_path = cli.config.clone();
    let raw = cli.into_raw_options();

    let resolved = match ResolvedConfig::load(raw, config_path.as_deref()) {
        Ok(resolved) => resolved,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    TracingConfig {
        level: if resolved.global.debug { "debug".into() } else { "info".into() },
        json: background,
    }
    .init();

    match run(resolved).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "virt-who exited with an error");
            ExitCode::from(1)
        }
    }
}

/// Runs the worker set to completion. Exits with code 1 on an
/// interrupt-initiated shutdown (spec §4.2/§6/§7), since `wait_on_threads`
/// cannot otherwise distinguish "every one-shot worker finished on its own"
/// from "Ctrl-C set the shared terminate flag out from under them" — both
/// converge on the same `is_terminated()` state.
async fn run(config: ResolvedConfig) -> Result<ExitCode> {
    let mut executor = Executor::new();
    executor.start(&config)?;

    let shared_terminate = executor.shared_terminate_flag();
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupt = tokio::spawn({
        let interrupted = interrupted.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            interrupted.store(true, Ordering::SeqCst);
            shared_terminate.set();
        }
    });

    info!("virt-who started, {} source(s) configured", config.sources.len());
    executor.wait_on_threads(None, false).await;
    executor.terminate_threads().await;
    interrupt.abort();

    for report in executor.take_reports_to_print() {
        println!("{report:?}");
    }

    if interrupted.load(Ordering::SeqCst) {
        info!("virt-who stopped by interrupt");
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
