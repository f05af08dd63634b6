mod app;
mod components;
mod draw;
mod keys;
mod query;
mod state;
mod ui;

use crate::app::App;
use crate::keys::KeyOutcome;
use crate::query::persist::CachePersister;
use crate::query::{LeagueSource, QueryClient};
use crate::state::app_settings::AppSettings;
use crate::state::messages::{NetworkResponse, UiEvent};
use crate::state::network::{LoadingState, NetworkWorker};
use crate::state::refresher::GarbageCollector;
use crossterm::event::{self as crossterm_event, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::{cursor, execute, terminal};
use log::{info, warn};
use sportsdb_api::client::SportsDbApi;
use std::io::Stdout;
use std::sync::Arc;
use std::time::Instant;
use std::{io, panic};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Duration;
use tui::{Terminal, backend::CrosstermBackend};

const INPUT_POLL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if handle_cli_args() {
        return Ok(());
    }

    better_panic::install();

    let settings = AppSettings::load();

    let backend = CrosstermBackend::new(io::stdout());
    let terminal = Terminal::new(backend)?;

    setup_panic_hook();
    setup_terminal()?;

    tui_logger::init_logger(settings.log_level)?;
    tui_logger::set_default_level(settings.log_level);

    let client = QueryClient::new(settings.query_config());
    let source: Arc<dyn LeagueSource> = Arc::new(SportsDbApi::with_base_url(settings.base_url.as_str()));
    info!("using {}", settings.base_url);

    let persister = settings.cache_path.clone().map(CachePersister::new);
    if let Some(persister) = &persister {
        match persister.restore(&client) {
            Ok(restored) => info!("restored {restored} cached queries"),
            Err(e) => warn!("ignoring cache at {}: {e:#}", persister.path().display()),
        }
    }

    let app = Arc::new(Mutex::new(App::new(settings, client.clone(), source)));

    let (ui_event_tx, ui_event_rx) = mpsc::channel::<UiEvent>(100);
    let (network_resp_tx, network_resp_rx) = mpsc::channel::<NetworkResponse>(100);

    // Input handler thread
    let input_handler = tokio::spawn(input_handler_task(ui_event_tx.clone()));

    // Cache events → UI
    let network_worker = NetworkWorker::new(client.clone(), network_resp_tx);
    let network_task = tokio::spawn(network_worker.run());

    // Cache eviction sweep
    let gc_task = tokio::spawn(GarbageCollector::new(client.clone()).run());

    // Throttled cache writes
    let persist_task = persister.clone().map(|p| tokio::spawn(p.run(client.clone())));

    // Toast expiry tick
    let tick_tx = ui_event_tx.clone();
    let tick_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            if tick_tx.send(UiEvent::Tick).await.is_err() {
                break;
            }
        }
    });

    let _ = ui_event_tx.send(UiEvent::AppStarted).await;

    main_ui_loop(terminal, app, ui_event_rx, network_resp_rx).await;

    input_handler.abort();
    network_task.abort();
    gc_task.abort();
    tick_task.abort();
    if let Some(task) = persist_task {
        task.abort();
    }
    if let Some(persister) = &persister
        && let Err(e) = persister.persist(&client)
    {
        warn!("final cache write failed: {e:#}");
    }

    cleanup_terminal()?;
    Ok(())
}

fn handle_cli_args() -> bool {
    let mut args = std::env::args().skip(1);
    let Some(arg) = args.next() else {
        return false;
    };

    match arg.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            true
        }
        "-V" | "--version" => {
            println!("leaguetui {}", env!("CARGO_PKG_VERSION"));
            true
        }
        _ => {
            eprintln!("Unknown argument: {arg}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn usage_text() -> &'static str {
    "leaguetui - browse sports leagues from TheSportsDB

Usage:
  leaguetui
  leaguetui --help
  leaguetui --version

Environment:
  SPORTSDB_API_BASE_URL          API base URL (default https://www.thesportsdb.com/api/v1/json/3)
  LEAGUETUI_LOG                  Log level: error, warn, info, debug, trace (default error)
  LEAGUETUI_NO_PERSIST           Set to disable the on-disk query cache
  LEAGUETUI_LEAGUES_STALE_SECS   League list freshness in seconds (default 300)
  LEAGUETUI_BADGES_STALE_SECS    Season badge freshness in seconds (default 86400)"
}

async fn main_ui_loop(
    mut terminal: Terminal<CrosstermBackend<Stdout>>,
    app: Arc<Mutex<App>>,
    mut ui_events: mpsc::Receiver<UiEvent>,
    mut network_responses: mpsc::Receiver<NetworkResponse>,
) {
    let mut loading = LoadingState::default();

    loop {
        tokio::select! {
            Some(ui_event) = ui_events.recv() => {
                match handle_ui_event(ui_event, &app).await {
                    UiOutcome::Quit => break,
                    UiOutcome::Redraw => {
                        let mut app_guard = app.lock().await;
                        draw::draw(&mut terminal, &mut app_guard, loading);
                    }
                    UiOutcome::Idle => {}
                }
            }

            Some(response) = network_responses.recv() => {
                if handle_network_response(response, &app, &mut loading).await {
                    let mut app_guard = app.lock().await;
                    draw::draw(&mut terminal, &mut app_guard, loading);
                }
            }

            else => break,
        }
    }
}

enum UiOutcome {
    Redraw,
    Idle,
    Quit,
}

async fn handle_ui_event(ui_event: UiEvent, app: &Arc<Mutex<App>>) -> UiOutcome {
    match ui_event {
        UiEvent::AppStarted => {
            app.lock().await.start();
            UiOutcome::Redraw
        }
        UiEvent::KeyPressed(key_event) => match keys::handle_key_bindings(key_event, app).await {
            KeyOutcome::Quit => UiOutcome::Quit,
            KeyOutcome::Continue => UiOutcome::Redraw,
        },
        UiEvent::Mouse(mouse_event) => {
            if keys::handle_mouse(mouse_event, app).await {
                UiOutcome::Redraw
            } else {
                UiOutcome::Idle
            }
        }
        UiEvent::Resize => UiOutcome::Redraw,
        UiEvent::Tick => {
            if app.lock().await.on_tick(Instant::now()) {
                UiOutcome::Redraw
            } else {
                UiOutcome::Idle
            }
        }
    }
}

async fn handle_network_response(
    response: NetworkResponse,
    app: &Arc<Mutex<App>>,
    loading: &mut LoadingState,
) -> bool {
    match response {
        NetworkResponse::LoadingStateChanged { loading_state } => {
            *loading = loading_state;
            true
        }
        NetworkResponse::QueryUpdated { key } => app.lock().await.on_query_updated(&key, Instant::now()),
    }
}

async fn input_handler_task(ui_events: mpsc::Sender<UiEvent>) {
    loop {
        // Short polls keep the task abortable between reads.
        if !crossterm_event::poll(INPUT_POLL).unwrap_or(false) {
            tokio::task::yield_now().await;
            continue;
        }
        let Ok(event) = crossterm_event::read() else {
            continue;
        };
        let ui_event = match event {
            Event::Key(key_event) => Some(UiEvent::KeyPressed(key_event)),
            Event::Mouse(mouse_event) => Some(UiEvent::Mouse(mouse_event)),
            Event::Resize(_, _) => Some(UiEvent::Resize),
            _ => None,
        };

        if let Some(ui_event) = ui_event
            && ui_events.send(ui_event).await.is_err()
        {
            break;
        }
    }
}

fn setup_terminal() -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, cursor::Hide)?;
    execute!(stdout, terminal::EnterAlternateScreen)?;
    execute!(stdout, EnableMouseCapture)?;
    execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
    terminal::enable_raw_mode()
}

pub fn cleanup_terminal() -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, DisableMouseCapture)?;
    execute!(stdout, cursor::MoveTo(0, 0))?;
    execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
    execute!(stdout, terminal::LeaveAlternateScreen)?;
    execute!(stdout, cursor::Show)?;
    terminal::disable_raw_mode()
}

fn setup_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let _ = cleanup_terminal();
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));
}
