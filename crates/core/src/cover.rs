//! Cover image rendering.
//!
//! Rasterizes the book title onto a fixed 600x800 canvas, shrinking the
//! font until the title fits: words are wrapped greedily left to right,
//! and whenever a single word cannot fit the line width or the wrapped
//! block runs past the bottom margin, the whole layout restarts one step
//! smaller. Measurement is summed glyph advances on the bundled face; no
//! kerning or hyphenation. Pure function of the title string apart from
//! the final file write.

use std::path::Path;

use ab_glyph::{Font, FontRef, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage};

use crate::{BinderyError, Result};

const CANVAS_WIDTH: u32 = 600;
const CANVAS_HEIGHT: u32 = 800;
const SIDE_MARGIN: f32 = 50.0;
const TOP_MARGIN: f32 = 200.0;
const BOTTOM_MARGIN: f32 = 100.0;

const START_FONT_SIZE: f32 = 160.0;
const FONT_STEP: f32 = 20.0;
/// Explicit floor for the shrink recursion; pathological titles that still
/// don't fit here are a render error instead of degenerating toward zero.
const MIN_FONT_SIZE: f32 = 20.0;

static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

/// One laid-out line: its text and the baseline y position.
type Line = (String, f32);

/// Renders the title onto a white 600x800 canvas.
pub fn render_cover(title: &str) -> Result<RgbaImage> {
    let font = load_font()?;
    let (lines, font_size) = fit_title(&font, title)?;
    Ok(rasterize(&font, &lines, font_size))
}

/// Renders the cover and writes it as PNG bytes to `path`.
pub fn write_cover(title: &str, path: &Path) -> Result<()> {
    let image = render_cover(title)?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| BinderyError::Render(format!("failed to write cover image: {}", e)))
}

fn load_font() -> Result<FontRef<'static>> {
    FontRef::try_from_slice(FONT_BYTES).map_err(|e| BinderyError::Render(format!("bundled font failed to load: {}", e)))
}

/// Finds the largest font size at or below the start size whose layout
/// fits both width and height constraints.
fn fit_title<F: Font>(font: &F, title: &str) -> Result<(Vec<Line>, f32)> {
    let mut font_size = START_FONT_SIZE;

    while font_size >= MIN_FONT_SIZE {
        if let Some(lines) = layout_lines(font, title, font_size) {
            return Ok((lines, font_size));
        }
        font_size -= FONT_STEP;
    }

    Err(BinderyError::Render(format!(
        "title does not fit the cover even at font size {}",
        MIN_FONT_SIZE
    )))
}

/// Greedy word wrap at one font size.
///
/// Returns `None` when this size cannot work: either a single word is
/// wider than the canvas interior, or the wrapped block overruns the
/// bottom margin.
fn layout_lines<F: Font>(font: &F, title: &str, font_size: f32) -> Option<Vec<Line>> {
    let scaled = font.as_scaled(PxScale::from(font_size));
    let canvas_width = CANVAS_WIDTH as f32;
    let x = SIDE_MARGIN;
    let mut y = TOP_MARGIN;

    let mut lines = Vec::new();
    let mut last_line = String::new();

    for word in title.split_whitespace() {
        if line_width(&scaled, word) + SIDE_MARGIN * 2.0 > canvas_width {
            return None;
        }

        let candidate = format!("{}{} ", last_line, word);
        if line_width(&scaled, &candidate) + x * 2.0 < canvas_width {
            last_line = candidate;
        } else {
            lines.push((last_line, y));
            y += font_size;
            last_line = format!("{} ", word);
        }
    }
    lines.push((last_line, y));

    if y + BOTTOM_MARGIN > CANVAS_HEIGHT as f32 {
        return None;
    }

    Some(lines)
}

/// Advance width of a string: summed horizontal advances, no kerning.
fn line_width<F: Font, S: ScaleFont<F>>(scaled: &S, text: &str) -> f32 {
    text.chars().map(|c| scaled.h_advance(scaled.glyph_id(c))).sum()
}

/// Draws the laid-out lines in black on a white canvas, baselines at the
/// layout's y positions.
fn rasterize<F: Font>(font: &F, lines: &[Line], font_size: f32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Rgba([255, 255, 255, 255]));
    let scale = PxScale::from(font_size);
    let scaled = font.as_scaled(scale);

    for (line, baseline) in lines {
        let mut x = SIDE_MARGIN;
        for c in line.trim_end().chars() {
            let id = scaled.glyph_id(c);
            let glyph = id.with_scale_and_position(scale, point(x, *baseline));

            if let Some(outline) = font.outline_glyph(glyph) {
                let bounds = outline.px_bounds();
                outline.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    if px >= 0 && py >= 0 && (px as u32) < CANVAS_WIDTH && (py as u32) < CANVAS_HEIGHT {
                        let shade = (255.0 * (1.0 - coverage.clamp(0.0, 1.0))) as u8;
                        let pixel = image.get_pixel_mut(px as u32, py as u32);
                        for channel in &mut pixel.0[..3] {
                            *channel = (*channel).min(shade);
                        }
                    }
                });
            }

            x += scaled.h_advance(id);
        }
    }

    image
}
