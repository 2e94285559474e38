//! Window decorations (border + title bar) for kwm
//!
//! The title bar is rasterized into a per-client pixel buffer and blitted to
//! the frame; the remaining three border edges are filled directly on the
//! server.

use tracing::{debug, warn};

use crate::wm::client::Client;
use crate::wm::conn::{Gcontext, Geometry, XConn};
use crate::wm::font::{self, Canvas, GLYPH_HEIGHT};

pub const BASE_TITLE_HEIGHT: u32 = 24;
pub const BASE_BORDER: u32 = 1;

/// Widths beyond this come from a garbage geometry read on a dying window
pub const MAX_TITLE_WIDTH: u32 = 10_000;

/// Decoration thickness after applying the display scale factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationMetrics {
    pub scale: u32,
    pub title_height: u32,
    pub border_width: u32,
}

impl DecorationMetrics {
    pub fn new(scale: u32) -> Self {
        let scale = scale.max(1);
        Self {
            scale,
            title_height: BASE_TITLE_HEIGHT * scale,
            border_width: BASE_BORDER * scale,
        }
    }

    /// Offset of the client inside its frame
    pub fn client_offset(&self) -> (i32, i32) {
        (
            self.border_width as i32,
            (self.title_height + self.border_width) as i32,
        )
    }

    /// Frame wrapping a client of the given size
    pub fn frame_size(&self, client_width: u32, client_height: u32) -> (u32, u32) {
        (
            client_width + 2 * self.border_width,
            client_height + self.title_height + 2 * self.border_width,
        )
    }

    /// Client area left inside a frame; `None` if decorations eat it all
    pub fn client_size(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32)> {
        let w = frame_width.checked_sub(2 * self.border_width)?;
        let h = frame_height.checked_sub(self.title_height + 2 * self.border_width)?;
        (w > 0 && h > 0).then_some((w, h))
    }

    /// Frame geometry wrapping `client` at the client's current position
    pub fn frame_for(&self, client: Geometry) -> Geometry {
        let (width, height) = self.frame_size(client.width, client.height);
        Geometry::new(client.x, client.y, width, height)
    }
}

impl Default for DecorationMetrics {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Decoration colors (0xRRGGBB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: u32,
    pub text: u32,
    pub border: u32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: 0xffffff,
            text: 0x000000,
            border: 0x000000,
        }
    }
}

/// Everything needed to paint a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Theme {
    pub metrics: DecorationMetrics,
    pub palette: Palette,
}

/// Per-client title bar resources: a drawing surface on the server plus a
/// pixel buffer and its wire image, both sized `width * title_height`.
#[derive(Debug, Default)]
pub struct TitleBar {
    surface: Option<Gcontext>,
    width: u32,
    pixels: Option<Vec<u32>>,
    image: Option<Vec<u8>>,
    allocations: u64,
    #[cfg(test)]
    fail_next_allocation: bool,
}

impl TitleBar {
    pub fn new(surface: Option<Gcontext>) -> Self {
        Self {
            surface,
            ..Self::default()
        }
    }

    /// Width of the current buffers (0 before the first render)
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of times buffers have been (re)allocated
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn is_allocated(&self) -> bool {
        self.pixels.is_some() && self.image.is_some()
    }

    pub fn surface(&self) -> Option<Gcontext> {
        self.surface
    }

    #[cfg(test)]
    fn allocation_blocked(&mut self) -> bool {
        std::mem::take(&mut self.fail_next_allocation)
    }

    #[cfg(not(test))]
    fn allocation_blocked(&mut self) -> bool {
        false
    }

    /// Drop the buffers and size them for `width * height`. On allocation
    /// failure both stay `None` and the next render tries again.
    fn reallocate(&mut self, width: u32, height: u32) -> bool {
        self.pixels = None;
        self.image = None;
        self.width = width;

        let Some(len) = (width as usize).checked_mul(height as usize) else {
            return false;
        };

        if self.allocation_blocked() {
            return false;
        }

        let mut pixels: Vec<u32> = Vec::new();
        let mut image: Vec<u8> = Vec::new();
        if pixels.try_reserve_exact(len).is_err() || image.try_reserve_exact(len * 4).is_err() {
            warn!("Failed to allocate {}x{} title bar buffer", width, height);
            return false;
        }
        pixels.resize(len, 0);
        image.resize(len * 4, 0);

        self.pixels = Some(pixels);
        self.image = Some(image);
        self.allocations += 1;
        true
    }

    /// Release the server-side surface and the local buffers
    pub fn release<C: XConn>(&mut self, conn: &C) {
        if let Some(surface) = self.surface.take() {
            if let Err(e) = conn.free_surface(surface) {
                debug!("Ignoring error freeing surface {:#x}: {}", surface, e);
            }
        }
        self.pixels = None;
        self.image = None;
        self.width = 0;
    }
}

/// Why a render did or did not reach the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn,
    /// Width was zero or absurd
    InvalidWidth,
    /// The frame vanished before or during the render
    Stale,
    /// Buffers or surface could not be allocated
    Unallocated,
}

/// Paint `client`'s border and title bar at `width`.
///
/// Buffers are only reallocated when `width` differs from the last render
/// (or a previous allocation failed). Errors from the server abort the render
/// and leave whatever was on screen before.
pub fn render_title_bar<C: XConn>(
    conn: &C,
    client: &mut Client,
    theme: &Theme,
    width: u32,
) -> RenderOutcome {
    if width == 0 || width > MAX_TITLE_WIDTH {
        debug!("Refusing to render title bar of width {}", width);
        return RenderOutcome::InvalidWidth;
    }

    let Some(frame) = conn.geometry(client.frame) else {
        return RenderOutcome::Stale;
    };

    let metrics = &theme.metrics;
    let palette = &theme.palette;
    let title_height = metrics.title_height;
    let border = metrics.border_width;
    let bar = &mut client.title_bar;

    if bar.surface.is_none() {
        match conn.create_surface(client.frame) {
            Ok(surface) => bar.surface = Some(surface),
            Err(e) => {
                debug!("Failed to create surface for frame {:#x}: {}", client.frame, e);
                return RenderOutcome::Unallocated;
            }
        }
    }
    if (width != bar.width || !bar.is_allocated()) && !bar.reallocate(width, title_height) {
        return RenderOutcome::Unallocated;
    }
    let (Some(surface), Some(pixels), Some(image)) =
        (bar.surface, bar.pixels.as_mut(), bar.image.as_mut())
    else {
        return RenderOutcome::Unallocated;
    };
    let Some(mut canvas) = Canvas::new(pixels, width, title_height) else {
        return RenderOutcome::Unallocated;
    };

    canvas.fill_rect(0, 0, width, title_height, palette.background);
    canvas.fill_rect(0, 0, width, border, palette.border);
    canvas.fill_rect(0, (title_height - border) as i32, width, border, palette.border);
    canvas.fill_rect(0, 0, border, title_height, palette.border);
    canvas.fill_rect((width - border.min(width)) as i32, 0, border, title_height, palette.border);

    let title = conn.window_title(client.window);
    let text_x = title_x(width, font::text_width(&title, metrics.scale), border);
    let text_y = (title_height as i32 - (GLYPH_HEIGHT * metrics.scale) as i32) / 2;
    canvas.draw_text(text_x, text_y, &title, metrics.scale, palette.text);

    for (px, out) in pixels.iter().zip(image.chunks_exact_mut(4)) {
        out.copy_from_slice(&px.to_le_bytes());
    }

    if let Err(e) = conn.put_pixels(client.frame, surface, width, title_height, image) {
        debug!("Title bar blit for frame {:#x} failed: {}", client.frame, e);
        return RenderOutcome::Stale;
    }

    let body = frame.height.saturating_sub(title_height);
    let sides = [
        Geometry::new(0, title_height as i32, border, body),
        Geometry::new(
            frame.width.saturating_sub(border) as i32,
            title_height as i32,
            border,
            body,
        ),
        Geometry::new(0, frame.height.saturating_sub(border) as i32, frame.width, border),
    ];
    if let Err(e) = conn.fill_rectangles(client.frame, surface, palette.border, &sides) {
        debug!("Border fill for frame {:#x} failed: {}", client.frame, e);
    }

    RenderOutcome::Drawn
}

/// Horizontal start of a centered title, never left of the border
fn title_x(width: u32, text_width: u32, border: u32) -> i32 {
    let centered = (width as i64 - text_width as i64) / 2;
    centered.max(border as i64) as i32
}
