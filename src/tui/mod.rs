//! Terminal host for the particle backdrop.

mod app;
mod draw;
mod event;
mod input;

use std::io::{self, IsTerminal};
use std::time::Duration;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc;

use crate::config::ParticleConfig;
use crate::particles::{ThemeAttribute, Viewport};

pub use self::event::AnimationEvent;

use self::app::App;
use self::draw::draw;
use self::input::handle_event;

/// RAII guard that ensures terminal cleanup on drop.
/// Restores terminal to normal mode even if a panic occurs.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        crossterm::execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
    }
}

/// Run the particle animation until the user quits.
///
/// Returns immediately when stdout is not an interactive terminal.
///
/// # Errors
/// Returns an error if terminal setup or drawing fails.
#[allow(clippy::unused_async)]
pub async fn run(config: ParticleConfig) -> io::Result<()> {
    if !io::stdout().is_terminal() {
        log::info!("stdout is not a terminal, skipping particle animation");
        return Ok(());
    }

    let _terminal_guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;
    terminal.clear()?;

    let size = terminal.size()?;
    let viewport = Viewport::new(size.width, size.height);
    if viewport.is_empty() {
        return Ok(());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<AnimationEvent>();

    let mut theme = ThemeAttribute::new(Some(config.theme.as_str()));
    let theme_tx = tx.clone();
    theme.on_theme_change(move |mode| {
        let _ = theme_tx.send(AnimationEvent::ThemeChanged(mode));
    });

    let frame = Duration::from_millis(config.frame_ms.max(1));
    let mut app = App::new(config, viewport, theme.current(), &mut rand::rng());

    loop {
        terminal.draw(|f| draw(f, &app))?;

        if crossterm::event::poll(frame)? {
            let event = crossterm::event::read()?;
            handle_event(&event, app.camera.viewport(), &mut theme, &tx);
        }

        while let Ok(event) = rx.try_recv() {
            app.apply(event);
        }

        if app.should_quit {
            break;
        }
        app.tick();
    }

    terminal.show_cursor()?;
    Ok(())
}
