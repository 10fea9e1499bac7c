mod app;
mod config;
mod demo_seed;
mod keybinds;
mod ui;

use std::fs::{self, File};
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::WriteLogger;

use app::App;
use config::HubConfig;

fn main() -> Result<()> {
    let config = HubConfig::from_env()?;
    init_logging(&config)?;
    log::info!("starting treegrid (multi_select={})", config.multi_select);

    let mut app = App::new(&config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main event loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        log::error!("exiting on error: {err:?}");
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

/// Log to a file: the terminal belongs to the UI.
fn init_logging(config: &HubConfig) -> Result<()> {
    fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.data_dir.display()
        )
    })?;
    let path = config.log_path();
    let log_file = File::create(&path)
        .with_context(|| format!("Failed to create log file at {}", path.display()))?;
    WriteLogger::init(config.log_level, simplelog::Config::default(), log_file)
        .context("Failed to initialize logger")?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    const TICK_RATE: Duration = Duration::from_millis(50);

    loop {
        terminal.draw(|frame| {
            app.render(frame);
        })?;

        if app.should_quit {
            return Ok(());
        }

        if event::poll(TICK_RATE)? {
            let ev = event::read()?;
            app.handle_event(ev)?;
        }
    }
}
