//! Canvas rendering of the particle field.

use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::canvas::{Canvas, Line, Points};

use crate::particles::Rgb;

use super::app::App;

const fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

pub fn draw(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let projected = app.field.project(&app.camera);
    let palette = app.palette;
    let line_color = color(palette.line_color());
    let point_color = color(palette.point_color());
    let hint_color = color(palette.color);
    let hint = format!(" {} | t: theme | q: quit ", app.mode);

    let canvas = Canvas::default()
        .block(Block::default().style(Style::default().bg(color(palette.background))))
        .marker(Marker::Braille)
        .x_bounds([-1.0, 1.0])
        .y_bounds([-1.0, 1.0])
        .paint(move |ctx| {
            // Lines first so points stay on top.
            for &((x1, y1), (x2, y2)) in &projected.lines {
                ctx.draw(&Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    color: line_color,
                });
            }
            ctx.layer();
            ctx.draw(&Points {
                coords: &projected.points,
                color: point_color,
            });
            ctx.print(-1.0, -1.0, Span::styled(hint.clone(), Style::default().fg(hint_color)));
        });

    frame.render_widget(canvas, area);
}
