//! Keyboard, mouse and resize input handling.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use tokio::sync::mpsc::UnboundedSender;

use crate::particles::{Pointer, ThemeAttribute, Viewport};

use super::event::AnimationEvent;

/// Translates one terminal event into animation events.
///
/// Theme toggles go through `theme`, whose subscribers report the change.
pub fn handle_event(
    event: &Event,
    viewport: Viewport,
    theme: &mut ThemeAttribute,
    tx: &UnboundedSender<AnimationEvent>,
) {
    match event {
        Event::Key(key) => handle_key(key, theme, tx),
        Event::Mouse(mouse) => {
            if matches!(mouse.kind, MouseEventKind::Moved | MouseEventKind::Drag(_)) {
                let pointer = Pointer::from_screen(
                    u32::from(mouse.column),
                    u32::from(mouse.row),
                    u32::from(viewport.width),
                    u32::from(viewport.height),
                );
                let _ = tx.send(AnimationEvent::PointerMoved(pointer));
            }
        }
        Event::Resize(width, height) => {
            let _ = tx.send(AnimationEvent::Resized(Viewport::new(*width, *height)));
        }
        _ => {}
    }
}

fn handle_key(key: &KeyEvent, theme: &mut ThemeAttribute, tx: &UnboundedSender<AnimationEvent>) {
    if key.kind == KeyEventKind::Release {
        return;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        let _ = tx.send(AnimationEvent::Quit);
        return;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            let _ = tx.send(AnimationEvent::Quit);
        }
        KeyCode::Char('t') => {
            theme.toggle();
        }
        _ => {}
    }
}
