//! Client/frame registry
//!
//! An insertion-ordered list of managed windows, each wrapped in a frame the
//! manager owns, plus a focus cursor used by focus-next.

use tracing::{debug, info};

use crate::wm::conn::{Window, WmState, XConn, XError};
use crate::wm::decorations::{Theme, TitleBar};

/// Window Manager client state
/// Represents a window being managed by the WM
#[derive(Debug)]
pub struct Client {
    /// Application window
    pub window: Window,

    /// Decoration frame owned by the manager
    pub frame: Window,

    /// Frame is unmapped but the client stays registered
    pub iconified: bool,

    /// UnmapNotify events caused by our own reparenting, still to be ignored
    pub pending_unmaps: u32,

    /// Title bar drawing resources
    pub title_bar: TitleBar,
}

/// Ordered collection of managed clients
#[derive(Debug, Default)]
pub struct ClientList {
    clients: Vec<Client>,
    current: Option<usize>,
}

impl ClientList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Focus cursor (not necessarily the server's input focus)
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn get(&self, index: usize) -> Option<&Client> {
        self.clients.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Client> {
        self.clients.get_mut(index)
    }

    pub fn find(&self, window: Window) -> Option<usize> {
        self.clients.iter().position(|c| c.window == window)
    }

    pub fn find_by_frame(&self, frame: Window) -> Option<usize> {
        self.clients.iter().position(|c| c.frame == frame)
    }

    /// Start managing `window`: wrap it in a frame at its current position and
    /// make it current.
    ///
    /// Returns `Ok(false)` without side effects if the window is already gone
    /// or already managed.
    pub fn add<C: XConn>(&mut self, conn: &C, theme: &Theme, window: Window) -> Result<bool, XError> {
        if self.find(window).is_some() {
            debug!("Window {:#x} is already managed", window);
            return Ok(false);
        }
        let Some(attrs) = conn.window_attributes(window) else {
            debug!("Window {:#x} vanished before it could be managed", window);
            return Ok(false);
        };

        let metrics = &theme.metrics;
        let frame = conn.create_frame(metrics.frame_for(attrs.geometry), theme.palette.background)?;
        let (offset_x, offset_y) = metrics.client_offset();

        conn.reparent_window(window, frame, offset_x, offset_y)?;
        conn.map_window(frame)?;
        conn.map_window(window)?;

        let surface = match conn.create_surface(frame) {
            Ok(surface) => Some(surface),
            Err(e) => {
                debug!("No drawing surface for frame {:#x} yet: {}", frame, e);
                None
            }
        };

        conn.set_border_width(window, 0)?;
        conn.watch_client(window)?;
        conn.set_wm_state(window, WmState::Normal)?;

        info!("Managing window {:#x} in frame {:#x}", window, frame);

        self.clients.push(Client {
            window,
            frame,
            iconified: false,
            // reparenting a viewable window unmaps it once
            pending_unmaps: u32::from(attrs.viewable),
            title_bar: TitleBar::new(surface),
        });
        self.current = Some(self.clients.len() - 1);

        Ok(true)
    }

    /// Stop managing `window`: free its decoration resources, hand the window
    /// back to the root and destroy the frame.
    ///
    /// Returns `Ok(false)` if the window was not managed.
    pub fn remove<C: XConn>(&mut self, conn: &C, window: Window) -> Result<bool, XError> {
        let Some(index) = self.find(window) else {
            return Ok(false);
        };

        let mut client = self.clients.remove(index);
        if let Some(current) = self.current {
            if current >= self.clients.len() {
                self.current = self.clients.len().checked_sub(1);
            }
        }

        client.title_bar.release(conn);
        if let Some(frame) = conn.geometry(client.frame) {
            // keep a still-living client alive when its frame goes away
            conn.reparent_window(client.window, conn.root(), frame.x, frame.y)?;
        }
        conn.destroy_window(client.frame)?;

        info!("Unmanaged window {:#x}", window);
        Ok(true)
    }

    /// Hide `window`'s frame, keeping it registered
    pub fn iconify<C: XConn>(&mut self, conn: &C, window: Window) -> Result<bool, XError> {
        let Some(client) = self.find(window).and_then(|i| self.clients.get_mut(i)) else {
            return Ok(false);
        };

        client.iconified = true;
        conn.set_wm_state(client.window, WmState::Iconic)?;
        conn.unmap_window(client.frame)?;

        debug!("Iconified window {:#x}", window);
        Ok(true)
    }

    /// Advance the focus cursor circularly, restoring an iconified target,
    /// then raise and focus it
    pub fn focus_next<C: XConn>(&mut self, conn: &C) -> Result<Option<Window>, XError> {
        if self.clients.is_empty() {
            return Ok(None);
        }

        let next = self.current.map_or(0, |c| (c + 1) % self.clients.len());
        self.current = Some(next);
        let client = &mut self.clients[next];

        if client.iconified {
            conn.map_window(client.frame)?;
            client.iconified = false;
            conn.set_wm_state(client.window, WmState::Normal)?;
        }
        conn.raise_window(client.frame)?;
        conn.focus_window(client.window)?;

        Ok(Some(client.window))
    }
}
