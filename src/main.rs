use std::io::stdout;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::ExecutableCommand;
use futures::StreamExt;
use log::info;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc;

use restform::client::HttpTransport;
use restform::config::EngineConfig;
use restform::form::{EngineEvent, FormEngine, FormMsg, NotifyLevel, OpenFormOptions};
use restform::ui::element::FocusId;
use restform::ui::{Command, Theme};
use restform::HttpMethod;

/// Open a schema-driven form against a REST resource.
#[derive(Parser, Debug)]
#[command(name = "restform", version, about)]
struct Cli {
    /// Resource URL to introspect and submit against
    url: String,

    /// Wire method for the submission
    #[arg(short, long, default_value = "POST")]
    method: String,

    /// Form title override
    #[arg(short, long)]
    title: Option<String>,

    /// Require a confirmation checkbox before submitting
    #[arg(long)]
    confirm: bool,
}

fn parse_method(text: &str) -> Result<HttpMethod> {
    let method = match text.to_ascii_uppercase().as_str() {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => anyhow::bail!("Unsupported method '{}'", other),
    };
    Ok(method)
}

#[tokio::main]
async fn main() -> Result<()> {
    // log to a file so the TUI stays clean
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("restform.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    let method = parse_method(&cli.method)?;
    let config = EngineConfig::load()?;
    let theme = Theme::new(config.theme);
    info!("Starting restform against {} {}", method, cli.url);

    let transport = Arc::new(HttpTransport::new(
        config.request_timeout(),
        config.connect_timeout(),
    )?);
    let mut engine = FormEngine::new(transport, config);
    let options = OpenFormOptions {
        title: cli.title,
        confirm: cli.confirm,
        ..Default::default()
    };

    let initial = engine.open(cli.url, method, options);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = run(&mut engine, initial, &theme).await;
    stdout().execute(LeaveAlternateScreen)?;
    disable_raw_mode()?;
    result
}

async fn run(
    engine: &mut FormEngine,
    initial: Command<FormMsg>,
    theme: &Theme,
) -> Result<()> {
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).context("Failed to initialize terminal")?;
    let (tx, mut rx) = mpsc::unbounded_channel::<FormMsg>();
    let mut events = EventStream::new();
    let mut focused: Option<FocusId> = None;

    execute(initial, &tx, &mut focused);

    loop {
        while let Some(event) = engine.poll_event() {
            match event {
                EngineEvent::Closed { .. } => return Ok(()),
                EngineEvent::Reload => info!("Form requested a reload"),
                EngineEvent::Navigate(url) => info!("Form requested navigation to {}", url),
                EngineEvent::Notify { level, message } => match level {
                    NotifyLevel::Error => log::error!("{}", message),
                    NotifyLevel::Warning => log::warn!("{}", message),
                    NotifyLevel::Info => info!("{}", message),
                },
            }
        }
        if !engine.is_open() {
            return Ok(());
        }

        let view = engine.view(theme);
        let mut focusable = Vec::new();
        view.collect_focusable(&mut focusable);
        // keep focus valid as fields appear and disappear
        if focused.as_ref().is_none_or(|f| !focusable.contains(f)) {
            focused = focusable.first().cloned();
        }

        terminal.draw(|frame| {
            restform::ui::render::draw(frame, &view, frame.area(), theme, focused.as_ref());
        })?;

        tokio::select! {
            Some(msg) = rx.recv() => {
                let command = engine.update(msg);
                execute(command, &tx, &mut focused);
            }
            Some(Ok(event)) = events.next() => {
                if let Event::Key(key) = event {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        return Ok(());
                    }
                    let msg = match key.code {
                        KeyCode::Tab => {
                            focused = cycle(&focusable, focused.as_ref(), 1);
                            None
                        }
                        KeyCode::BackTab => {
                            focused = cycle(&focusable, focused.as_ref(), -1);
                            None
                        }
                        other => {
                            let routed = focused
                                .as_ref()
                                .and_then(|id| view.route_key(id, other));
                            // Esc cancels the form unless a widget consumed it
                            match routed {
                                Some(msg) => Some(msg),
                                None if other == KeyCode::Esc => Some(FormMsg::Cancel),
                                None => None,
                            }
                        }
                    };
                    if let Some(msg) = msg {
                        let command = engine.update(msg);
                        execute(command, &tx, &mut focused);
                    }
                }
            }
        }
    }
}

/// Run a command's leaves: spawn async work, apply focus changes.
fn execute(
    command: Command<FormMsg>,
    tx: &mpsc::UnboundedSender<FormMsg>,
    focused: &mut Option<FocusId>,
) {
    for leaf in command.into_leaves() {
        match leaf {
            Command::Perform(future) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(future.await);
                });
            }
            Command::SetFocus(id) => *focused = Some(id),
            Command::None | Command::Batch(_) => {}
        }
    }
}

fn cycle(focusable: &[FocusId], current: Option<&FocusId>, step: i64) -> Option<FocusId> {
    if focusable.is_empty() {
        return None;
    }
    let len = focusable.len() as i64;
    let index = current
        .and_then(|id| focusable.iter().position(|f| f == id))
        .map(|i| i as i64)
        .unwrap_or(-step);
    let next = (index + step).rem_euclid(len) as usize;
    focusable.get(next).cloned()
}
