//! Window Manager Module
//!
//! Handles X11 window management, decorations, and user interactions.

pub mod client;
pub mod conn;
pub mod decorations;
pub mod display;
pub mod events;
pub mod font;
pub mod keyboard;
#[cfg(test)]
pub mod mock;
pub mod moveresize;
pub mod placement;
pub mod spawn;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::wm::client::ClientList;
use crate::wm::conn::{XConn, XError, MOD_SUPER};
use crate::wm::decorations::{render_title_bar, Theme};
use crate::wm::keyboard::KeyBindings;
use crate::wm::moveresize::DragSession;

pub use events::Flow;

pub struct WindowManager<C: XConn> {
    conn: C,
    clients: ClientList,
    /// Drag in progress, if any
    drag: Option<DragSession>,
    bindings: KeyBindings,
    theme: Theme,
}

impl<C: XConn> WindowManager<C> {
    pub fn new(conn: C, config: &Config) -> Self {
        let theme = config.theme();
        let bindings = KeyBindings::from_config(&config.keybindings);
        info!(
            "Window manager ready: scale {}, {} key bindings",
            theme.metrics.scale,
            bindings.len()
        );

        Self {
            conn,
            clients: ClientList::new(),
            drag: None,
            bindings,
            theme,
        }
    }

    pub fn conn(&self) -> &C {
        &self.conn
    }

    pub fn clients(&self) -> &ClientList {
        &self.clients
    }

    /// Install grabs and adopt windows that were mapped before we started
    pub fn start(&mut self) -> Result<(), XError> {
        self.conn.grab_keys(&self.bindings.keysyms(), MOD_SUPER)?;
        self.conn.grab_drag_buttons()?;

        for window in self.conn.top_level_windows()? {
            let Some(attrs) = self.conn.window_attributes(window) else {
                continue;
            };
            if !attrs.viewable || attrs.override_redirect {
                continue;
            }
            if self.clients.add(&self.conn, &self.theme, window)? {
                if let Some(index) = self.clients.find(window) {
                    self.redraw(index);
                }
            }
        }
        info!("Adopted {} existing windows", self.clients.len());

        self.conn.flush()
    }

    /// Dispatch events until a quit binding fires or the connection dies
    pub fn run(&mut self) -> Result<(), XError> {
        loop {
            let event = self.conn.next_event()?;
            match self.handle_event(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => return Ok(()),
                Err(e @ XError::Connection(_)) => return Err(e),
                Err(e) => warn!("Event handler failed: {}", e),
            }
            self.conn.flush()?;
        }
    }

    /// Repaint a client's decorations at its frame's current width
    fn redraw(&mut self, index: usize) {
        let Some(client) = self.clients.get_mut(index) else {
            return;
        };
        let Some(frame) = self.conn.geometry(client.frame) else {
            debug!("Frame {:#x} is gone, skipping redraw", client.frame);
            return;
        };
        render_title_bar(&self.conn, client, &self.theme, frame.width);
    }
}
