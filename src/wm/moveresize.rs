//! MoveResize Module
//!
//! Interactive move/resize driven by pointer drags. At most one drag is in
//! flight; it starts on a qualifying button press and ends on any release.

use tracing::debug;

use crate::wm::conn::{ButtonPress, Geometry, Window, XConn, XError, MOD_SHIFT, MOD_SUPER};
use crate::wm::decorations::{render_title_bar, DecorationMetrics};
use crate::wm::placement::clamp_resize;
use crate::wm::WindowManager;

/// Drag operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Resize,
}

/// State of an in-progress drag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    /// Window being moved/resized (a frame when `is_frame`)
    pub target: Window,

    /// Target is one of our frames rather than a foreign window
    pub is_frame: bool,

    pub mode: DragMode,

    /// Pointer position at press (root coordinates)
    pub origin_x: i32,
    pub origin_y: i32,

    /// Target geometry at press
    pub start: Geometry,
}

/// What a pointer motion asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragStep {
    Move { x: i32, y: i32 },
    Resize { width: u32, height: u32 },
    /// Proposed size was rejected; leave the target alone
    Hold,
}

impl DragSession {
    /// Translate a pointer position into a request relative to the drag start
    pub fn step(&self, root_x: i32, root_y: i32, metrics: &DecorationMetrics) -> DragStep {
        let dx = root_x - self.origin_x;
        let dy = root_y - self.origin_y;

        match self.mode {
            DragMode::Move => DragStep::Move {
                x: self.start.x + dx,
                y: self.start.y + dy,
            },
            DragMode::Resize => {
                let verdict =
                    clamp_resize(self.start.width, self.start.height, dx, dy, self.is_frame, metrics);
                if !verdict.is_accepted() {
                    return DragStep::Hold;
                }
                let (width, height) = verdict.size();
                DragStep::Resize { width, height }
            }
        }
    }
}

impl<C: XConn> WindowManager<C> {
    /// Start a drag, or focus a clicked client and replay the click to it
    pub(crate) fn handle_button_press(&mut self, ev: ButtonPress) -> Result<(), XError> {
        // Title bar / border: always a move, whatever the modifiers
        if let Some(index) = self.clients.find_by_frame(ev.window) {
            let (frame, window) = match self.clients.get(index) {
                Some(c) => (c.frame, c.window),
                None => return Ok(()),
            };
            let Some(start) = self.conn.geometry(frame) else {
                return Ok(());
            };

            self.drag = Some(DragSession {
                target: frame,
                is_frame: true,
                mode: DragMode::Move,
                origin_x: ev.root_x,
                origin_y: ev.root_y,
                start,
            });
            debug!("Drag started on frame {:#x}", frame);

            self.conn.raise_window(frame)?;
            self.conn.focus_window(window)?;
            return Ok(());
        }

        // Only the root grab delivers modifier drags; a press caught by a
        // client's own grab (e.g. with Lock or NumLock on) must be replayed
        if ev.window == self.conn.root() && ev.state & MOD_SUPER != 0 {
            let Some(under) = ev.subwindow else {
                return Ok(());
            };
            let frame = self
                .clients
                .find_by_frame(under)
                .and_then(|i| self.clients.get(i))
                .map(|c| c.frame);
            let target = frame.unwrap_or(under);
            let Some(attrs) = self.conn.window_attributes(target) else {
                return Ok(());
            };
            let mode = if ev.state & MOD_SHIFT != 0 {
                DragMode::Resize
            } else {
                DragMode::Move
            };

            self.drag = Some(DragSession {
                target,
                is_frame: frame.is_some(),
                mode,
                origin_x: ev.root_x,
                origin_y: ev.root_y,
                start: attrs.geometry,
            });
            debug!("{:?} drag started on {:#x}", mode, target);

            self.conn.raise_window(target)?;
            return Ok(());
        }

        if ev.window != self.conn.root() {
            match self.clients.find(ev.window).and_then(|i| self.clients.get(i)) {
                Some(client) => {
                    self.conn.raise_window(client.frame)?;
                    self.conn.focus_window(client.window)?;
                }
                None => {
                    self.conn.raise_window(ev.window)?;
                    self.conn.focus_window(ev.window)?;
                }
            }
            self.conn.replay_pointer()?;
        }

        Ok(())
    }

    pub(crate) fn handle_motion(&mut self, root_x: i32, root_y: i32) -> Result<(), XError> {
        let Some(drag) = self.drag else {
            return Ok(());
        };

        match drag.step(root_x, root_y, &self.theme.metrics) {
            DragStep::Move { x, y } => self.conn.move_window(drag.target, x, y)?,
            DragStep::Resize { width, height } => {
                self.conn.resize_window(drag.target, width, height)?;
                if drag.is_frame {
                    self.resize_framed_client(drag.target, width, height)?;
                }
            }
            DragStep::Hold => {}
        }

        Ok(())
    }

    /// Fit the client inside a frame that was just resized and repaint it
    fn resize_framed_client(&mut self, frame: Window, width: u32, height: u32) -> Result<(), XError> {
        let Some(client) = self
            .clients
            .find_by_frame(frame)
            .and_then(|i| self.clients.get_mut(i))
        else {
            return Ok(());
        };

        if let Some((client_width, client_height)) = self.theme.metrics.client_size(width, height) {
            self.conn.resize_window(client.window, client_width, client_height)?;
        }
        render_title_bar(&self.conn, client, &self.theme, width);
        Ok(())
    }

    pub(crate) fn handle_button_release(&mut self) {
        if let Some(drag) = self.drag.take() {
            debug!("Drag on {:#x} ended", drag.target);
        }
    }
}
