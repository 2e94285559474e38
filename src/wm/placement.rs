//! Placement Module
//!
//! Maximize geometry (monitor aware) and validation of interactive resizes.

use tracing::debug;

use crate::wm::client::Client;
use crate::wm::conn::{Geometry, XConn, XError};
use crate::wm::decorations::{render_title_bar, DecorationMetrics, Theme};

/// Smallest frame width a resize may produce (scaled)
pub const MIN_FRAME_WIDTH: u32 = 50;

/// Extra height a frame keeps below its title bar
pub const MIN_FRAME_BODY: u32 = 20;

/// Smallest size for an undecorated window
pub const MIN_FOREIGN_SIZE: u32 = 10;

/// Result of validating a proposed interactive resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeVerdict {
    /// Resize to this size
    Accept { width: u32, height: u32 },
    /// Proposal was too small; carries the unchanged starting size
    Reject { width: u32, height: u32 },
}

impl ResizeVerdict {
    pub fn size(&self) -> (u32, u32) {
        match *self {
            ResizeVerdict::Accept { width, height } | ResizeVerdict::Reject { width, height } => {
                (width, height)
            }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ResizeVerdict::Accept { .. })
    }
}

/// Validate `start + delta` against the minimum sizes for frames or
/// undecorated windows
pub fn clamp_resize(
    start_width: u32,
    start_height: u32,
    dx: i32,
    dy: i32,
    is_frame: bool,
    metrics: &DecorationMetrics,
) -> ResizeVerdict {
    let width = i64::from(start_width) + i64::from(dx);
    let height = i64::from(start_height) + i64::from(dy);

    let (min_width, min_height) = if is_frame {
        (
            i64::from(MIN_FRAME_WIDTH * metrics.scale),
            i64::from(metrics.title_height + MIN_FRAME_BODY),
        )
    } else {
        (i64::from(MIN_FOREIGN_SIZE), i64::from(MIN_FOREIGN_SIZE))
    };

    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if width > min_width && height > min_height => {
            ResizeVerdict::Accept { width: w, height: h }
        }
        _ => ResizeVerdict::Reject {
            width: start_width,
            height: start_height,
        },
    }
}

/// Monitor containing (x, y); the whole screen if none does or enumeration
/// is unavailable
pub fn monitor_at(monitors: Option<&[Geometry]>, screen: Geometry, x: i32, y: i32) -> Geometry {
    monitors
        .and_then(|ms| ms.iter().find(|m| m.contains(x, y)).copied())
        .unwrap_or(screen)
}

/// Frame and client geometry for a maximized window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaximizeTarget {
    pub frame: Geometry,
    pub client_width: u32,
    pub client_height: u32,
}

/// Fill `monitor`, leaving one title bar of space at the bottom for the
/// status bar
pub fn maximize_target(monitor: Geometry, metrics: &DecorationMetrics) -> MaximizeTarget {
    let frame_width = monitor.width;
    let frame_height = monitor.height.saturating_sub(metrics.title_height);

    MaximizeTarget {
        frame: Geometry::new(monitor.x, monitor.y, frame_width, frame_height),
        client_width: frame_width.saturating_sub(2 * metrics.border_width),
        client_height: frame_height
            .saturating_sub(metrics.title_height + 2 * metrics.border_width),
    }
}

/// Maximize `client` on the monitor holding its frame's top-left corner.
///
/// Returns the new frame geometry, or `None` if the frame is already gone.
pub fn maximize<C: XConn>(
    conn: &C,
    client: &mut Client,
    theme: &Theme,
) -> Result<Option<Geometry>, XError> {
    let Some(current) = conn.geometry(client.frame) else {
        debug!("Frame {:#x} vanished before maximize", client.frame);
        return Ok(None);
    };

    let monitors = conn.monitors();
    let monitor = monitor_at(monitors.as_deref(), conn.screen_geometry(), current.x, current.y);
    let target = maximize_target(monitor, &theme.metrics);

    debug!("Maximizing {:#x} to {:?}", client.window, target.frame);

    conn.move_resize_window(client.frame, target.frame)?;
    conn.resize_window(client.window, target.client_width, target.client_height)?;
    render_title_bar(conn, client, theme, target.frame.width);

    Ok(Some(target.frame))
}
