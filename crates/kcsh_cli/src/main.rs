use std::process::ExitCode;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kcsh_core::logging::{self, LogOutput, LoggingConfig, LOG_ENV};
use kcsh_core::startup::{self, Preflight, SESSION_ENV};
use kcsh_core::{FsChangeSource, KubectlClient, RunOutcome, SessionSupervisor, Settings, ShellError};
use kcsh_ui::{LineSource, PipedLines, PromptRenderer, TerminalLineEditor};
use tokio_util::sync::CancellationToken;

mod session;

use session::InteractiveSession;

/// How long blocking session threads get once the supervisor has returned
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(200);

/// Interactive shell that keeps track of the active kubectl context.
#[derive(Parser, Debug)]
#[command(name = "kcsh", version, about, long_about = None)]
struct Cli {
    /// Do not watch the kubeconfig for changes made outside this shell
    #[arg(short = 'i', long = "no-watch")]
    no_watch: bool,

    /// Start with the context hidden from the prompt
    #[arg(short = 'p', long = "no-prompt")]
    no_prompt: bool,

    /// Log filter, e.g. `debug` or `kcsh_core=trace` (overrides KCSH_LOG)
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if self.no_watch {
            settings.watch_enabled = false;
        }
        if self.no_prompt {
            settings.prompt_enabled = false;
        }
        if let Some(level) = &self.log_level {
            settings.log_level = Some(level.clone());
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(status) => ExitCode::from(u8::try_from(status.rem_euclid(256)).unwrap_or(1)),
        Err(err) => {
            eprintln!("kcsh: {err:#}");
            let code = err.downcast_ref::<ShellError>().map_or(1, ShellError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let (mut settings, problem) = Settings::load();
    cli.apply(&mut settings);

    let _log_guard = init_logging(&settings, cli.log_level.is_some());
    if let Some(problem) = problem {
        kcsh_core::kcsh_log_warn!(error = %problem, "ignoring configuration file");
        eprintln!("kcsh: ignoring configuration file: {problem}");
    }

    let marker = std::env::var(SESSION_ENV).ok();
    let preflight = startup::preflight(&settings, marker.as_deref())?;
    kcsh_core::kcsh_log_info!(
        version = env!("CARGO_PKG_VERSION"),
        watch = settings.watch_enabled,
        "kcsh starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("kcsh-worker")
        .build()?;
    let result = runtime.block_on(supervise(settings, preflight));
    // a session stuck in a foreground command must not hold the process open
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    restore_terminal();
    result
}

/// A logging failure is reported once and the shell runs without logs
fn init_logging(settings: &Settings, flag_given: bool) -> Option<logging::WorkerGuard> {
    let mut config = LoggingConfig::default();
    if let Some(level) = &settings.log_level {
        config.level = level.clone();
    }
    if let Some(path) = &settings.log_file {
        config.output = LogOutput::File(path.clone());
    }
    let env = if flag_given { None } else { std::env::var(LOG_ENV).ok() };
    match logging::init_with(&config, env.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("kcsh: logging disabled: {err}");
            None
        }
    }
}

async fn supervise(settings: Settings, preflight: Preflight) -> anyhow::Result<i32> {
    let client = Arc::new(KubectlClient::new(
        preflight.kubectl.to_string_lossy().into_owned(),
    ));

    let interactive = kcsh_ui::interactive_input();
    let input: Box<dyn LineSource> = if interactive {
        Box::new(TerminalLineEditor::new())
    } else {
        Box::new(PipedLines::stdin())
    };
    let renderer =
        PromptRenderer::new(settings.prompt_template.clone()).with_color(kcsh_ui::color_enabled());
    let runner = InteractiveSession::new(input, renderer, preflight.host_shell.path, interactive);

    let source = settings
        .watch_enabled
        .then(|| Arc::new(FsChangeSource::new(settings.watch_paths.clone(), settings.debounce())));
    let mut supervisor = SessionSupervisor::new(client, Box::new(runner), settings);
    if let Some(source) = source {
        supervisor = supervisor.with_change_source(source);
    }

    let received = Arc::new(AtomicI32::new(0));
    listen_for_signals(supervisor.shutdown_token(), received.clone())?;

    let outcome = supervisor.run().await?;
    kcsh_core::kcsh_log_info!(?outcome, restarts = supervisor.restarts(), "kcsh finished");
    Ok(match outcome {
        RunOutcome::Exited(status) => status,
        RunOutcome::Shutdown => 128 + received.load(Ordering::SeqCst),
    })
}

/// SIGTERM and SIGHUP end the shell. SIGINT is swallowed: at the prompt
/// Ctrl-C arrives as a key, and during a command it belongs to the child.
#[cfg(unix)]
fn listen_for_signals(shutdown: CancellationToken, received: Arc<AtomicI32>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    const SIGHUP: i32 = 1;
    const SIGTERM: i32 = 15;

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        let number = loop {
            tokio::select! {
                _ = terminate.recv() => break SIGTERM,
                _ = hangup.recv() => break SIGHUP,
                _ = interrupt.recv() => {
                    kcsh_core::kcsh_log_debug!("ignoring SIGINT");
                }
            }
        };
        kcsh_core::kcsh_log_info!(signal = number, "termination requested");
        received.store(number, Ordering::SeqCst);
        shutdown.cancel();
    });
    Ok(())
}

#[cfg(not(unix))]
fn listen_for_signals(_shutdown: CancellationToken, _received: Arc<AtomicI32>) -> std::io::Result<()> {
    Ok(())
}

fn restore_terminal() {
    if let Ok(true) = crossterm::terminal::is_raw_mode_enabled() {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}
