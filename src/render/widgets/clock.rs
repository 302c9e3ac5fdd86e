/// Date and time widgets.
use chrono::{DateTime, TimeZone};
use tiny_skia::Pixmap;

use crate::render::widgets::DrawContext;
use crate::theme::model::{DateConfig, TimeConfig};

pub fn date_text<Tz: TimeZone>(cfg: &DateConfig, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format(&cfg.format_pattern()).to_string()
}

pub fn time_text<Tz: TimeZone>(cfg: &TimeConfig, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format(&cfg.format_pattern()).to_string()
}

pub fn draw_date<Tz: TimeZone>(canvas: &mut Pixmap, ctx: &DrawContext, cfg: &DateConfig, now: &DateTime<Tz>)
where
    Tz::Offset: std::fmt::Display,
{
    let text = date_text(cfg, now);
    ctx.text(canvas, &text, cfg.font_size, cfg.position.x, cfg.position.y, cfg.color);
}

pub fn draw_time<Tz: TimeZone>(canvas: &mut Pixmap, ctx: &DrawContext, cfg: &TimeConfig, now: &DateTime<Tz>)
where
    Tz::Offset: std::fmt::Display,
{
    let text = time_text(cfg, now);
    ctx.text(canvas, &text, cfg.font_size, cfg.position.x, cfg.position.y, cfg.color);
}
