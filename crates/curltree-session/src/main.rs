use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use curltree_core::config::{Config, LogFormat, LogOutput, LoggingConfig};
use curltree_session::{
    identity::{self, Bootstrap, CredentialSource},
    ui, Command, Completion, MutationDispatcher, Session, SessionEvent,
};
use curltree_storage::{ProfileStore, SqliteProfileStore};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

const COMPLETION_QUEUE_CAPACITY: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "curltree-session", about = "Interactive curltree profile editor")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Public key file to identify as, instead of $SSH_USER_AUTH.
    #[arg(long)]
    public_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    init_logging(&config.logging)?;

    let store: Arc<dyn ProfileStore> = Arc::new(
        SqliteProfileStore::open(&config.database.path).with_context(|| {
            format!("failed to open database {}", config.database.path.display())
        })?,
    );
    let source = CredentialSource::detect(args.public_key.as_deref());
    info!(event = "session_start", credential = ?source);

    let mut session = Session::new();
    let mut terminal = setup_terminal()?;
    let result = run(
        &mut terminal,
        &mut session,
        store,
        source,
        &config.server.public_host,
    )
    .await;
    restore_terminal(&mut terminal)?;

    if let Err(err) = &result {
        error!(event = "session_error", error = %err);
    }
    if let Some(note) = session.exit_note() {
        println!("{note}");
    }
    info!(event = "session_end");
    result
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    // The terminal belongs to the UI; logs go to a file or nowhere.
    let writer = match (config.output, &config.output_file) {
        (LogOutput::File, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        _ => BoxMakeWriter::new(io::sink),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false);
    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut Session,
    store: Arc<dyn ProfileStore>,
    source: CredentialSource,
    public_host: &str,
) -> Result<()> {
    let (completion_tx, mut completion_rx) = mpsc::channel::<Completion>(COMPLETION_QUEUE_CAPACITY);
    let dispatcher = MutationDispatcher::new(Arc::clone(&store), completion_tx);

    let (bootstrap_tx, mut bootstrap_rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let _ = bootstrap_tx.send(identity::bootstrap(&source, store.as_ref()));
    });
    let mut bootstrapped = false;
    let mut events = EventStream::new();

    loop {
        if session.should_quit() {
            break;
        }
        terminal.draw(|f| ui::render(f, session, public_host))?;

        tokio::select! {
            result = &mut bootstrap_rx, if !bootstrapped => {
                bootstrapped = true;
                let outcome = result.unwrap_or_else(|_| {
                    Bootstrap::Fault("identity lookup did not complete".to_string())
                });
                session.apply_bootstrap(outcome);
            }
            Some(completion) = completion_rx.recv() => {
                session.handle(SessionEvent::Completed(completion));
            }
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                        if let Some(Command::Dispatch { ticket, mutation }) =
                            session.handle(SessionEvent::Key(key))
                        {
                            dispatcher.dispatch(ticket, mutation);
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err).context("failed to read terminal input"),
                None => break,
            },
        }
    }

    Ok(())
}
