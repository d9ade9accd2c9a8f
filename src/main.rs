mod app;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use lazyview::prefetch::{PrefetchConfig, Prefetcher};
use lazyview::reader::CursorReader;
use lazyview::tree::JsonTree;
use lazyview::window::SlidingWindow;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Constants
const INPUT_POLL_DURATION_MS: u64 = 100;
const PAGE_SIZE_OFFSET: usize = 5;
const MOUSE_SCROLL_LINES: i64 = 3;

#[derive(Parser, Debug)]
#[command(name = "lazyview")]
#[command(about = "A lazy terminal viewer for huge newline-delimited JSON log files", long_about = None)]
struct Args {
    /// Log file to view (one JSON value per line)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Treat the input as gzip-compressed (also inferred from a .gz extension)
    #[arg(long)]
    gzip: bool,

    /// Keys shown in a collapsed record's preview, comma-separated
    #[arg(
        short = 'p',
        long,
        value_delimiter = ',',
        default_value = "_t,severity,event_name,__time__"
    )]
    preview_keys: Vec<String>,

    /// Records kept loaded on each side of the focused record
    #[arg(long, default_value_t = 100)]
    capacity: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let gzip = args.gzip || args.file.extension().is_some_and(|ext| ext == "gz");
    let reader = CursorReader::open(&args.file, gzip)
        .with_context(|| format!("Failed to open log file: {}", args.file.display()))?;

    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| args.file.display().to_string());

    // Window and prefetcher are created (and the window pre-filled)
    // before any terminal state changes, so open errors print plainly.
    let preview_keys = args.preview_keys;
    let window = Arc::new(Mutex::new(SlidingWindow::new(args.capacity, move |rec| {
        JsonTree::build(rec, &preview_keys)
    })));
    let (prefetcher, error_rx) =
        Prefetcher::spawn(reader, window.clone(), PrefetchConfig::default())
            .context("Failed to read the start of the log file")?;

    let mut app = App::new(window, prefetcher, error_rx, file_name);

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal, stop the prefetcher, then report.
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    app.shutdown();

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }
    if let Some(err) = &app.last_error {
        eprintln!("Error: {}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.drain_errors();

        terminal.draw(|f| ui::render(f, app))?;

        if event::poll(Duration::from_millis(INPUT_POLL_DURATION_MS))? {
            match event::read()? {
                Event::Key(key) => {
                    let page_size =
                        (terminal.size()?.height as usize).saturating_sub(PAGE_SIZE_OFFSET);
                    app.on_key(key, page_size);
                }
                Event::Mouse(mouse_event) => match mouse_event.kind {
                    MouseEventKind::ScrollDown => app.move_focus(MOUSE_SCROLL_LINES),
                    MouseEventKind::ScrollUp => app.move_focus(-MOUSE_SCROLL_LINES),
                    _ => {}
                },
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
