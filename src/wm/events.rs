//! Events Module
//!
//! One handler per protocol event. Handlers never block; a failure inside
//! one is reported to the loop, which logs it and moves on.

use tracing::{debug, info, warn};

use crate::wm::conn::{ConfigureRequest, Window, XConn, XError, XEvent};
use crate::wm::decorations::render_title_bar;
use crate::wm::keyboard::Action;
use crate::wm::placement;
use crate::wm::spawn;
use crate::wm::WindowManager;

/// Whether the event loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

impl<C: XConn> WindowManager<C> {
    pub fn handle_event(&mut self, event: XEvent) -> Result<Flow, XError> {
        match event {
            XEvent::MapRequest(window) => self.handle_map_request(window)?,
            XEvent::DestroyNotify(window) => {
                self.clients.remove(&self.conn, window)?;
            }
            XEvent::UnmapNotify(window) => self.handle_unmap(window)?,
            XEvent::KeyPress { keysym, state } => {
                let Some(action) = self.bindings.lookup(keysym, state).cloned() else {
                    return Ok(Flow::Continue);
                };
                return self.run_action(&action);
            }
            XEvent::Expose { window, count } => {
                if count == 0 {
                    if let Some(index) = self.clients.find_by_frame(window) {
                        self.redraw(index);
                    }
                }
            }
            XEvent::TitleChanged(window) => {
                if let Some(index) = self.clients.find(window) {
                    self.redraw(index);
                }
            }
            XEvent::ButtonPress(press) => self.handle_button_press(press)?,
            XEvent::Motion { root_x, root_y } => self.handle_motion(root_x, root_y)?,
            XEvent::ButtonRelease => self.handle_button_release(),
            XEvent::Enter(window) => self.conn.focus_window(window)?,
            XEvent::ConfigureRequest(request) => self.handle_configure_request(request)?,
            XEvent::IconifyRequest(window) => {
                self.clients.iconify(&self.conn, window)?;
            }
            XEvent::ProtocolError(error) => debug!("Ignoring X error: {}", error),
            XEvent::Ignored => {}
        }

        Ok(Flow::Continue)
    }

    fn handle_map_request(&mut self, window: Window) -> Result<(), XError> {
        if self.clients.add(&self.conn, &self.theme, window)? {
            if let Some(index) = self.clients.find(window) {
                self.redraw(index);
            }
        } else if self.clients.find(window).is_none() {
            return Ok(());
        }
        self.conn.focus_window(window)
    }

    fn handle_unmap(&mut self, window: Window) -> Result<(), XError> {
        let Some(client) = self
            .clients
            .find(window)
            .and_then(|i| self.clients.get_mut(i))
        else {
            return Ok(());
        };

        if client.pending_unmaps > 0 {
            client.pending_unmaps -= 1;
            debug!("Ignoring unmap of {:#x} caused by reparenting", window);
            return Ok(());
        }
        if client.iconified {
            return Ok(());
        }

        self.clients.remove(&self.conn, window)?;
        Ok(())
    }

    fn handle_configure_request(&mut self, request: ConfigureRequest) -> Result<(), XError> {
        let ConfigureRequest { window, aux } = request;

        let Some(index) = self.clients.find(window) else {
            debug!("Forwarding configure request for unmanaged window {:#x}", window);
            return self.conn.configure_window(window, &aux);
        };
        let Some(frame) = self.clients.get(index).map(|c| c.frame) else {
            return Ok(());
        };

        if aux.width.is_some() || aux.height.is_some() {
            let Some(current) = self.conn.geometry(window) else {
                return Ok(());
            };
            let width = aux.width.unwrap_or(current.width);
            let height = aux.height.unwrap_or(current.height);
            let (frame_width, frame_height) = self.theme.metrics.frame_size(width, height);

            self.conn.resize_window(window, width, height)?;
            self.conn.resize_window(frame, frame_width, frame_height)?;
            if let Some(client) = self.clients.get_mut(index) {
                render_title_bar(&self.conn, client, &self.theme, frame_width);
            }
        }

        if aux.x.is_some() || aux.y.is_some() {
            let Some(current) = self.conn.geometry(frame) else {
                return Ok(());
            };
            let x = aux.x.unwrap_or(current.x);
            let y = aux.y.unwrap_or(current.y);
            self.conn.move_window(frame, x, y)?;
        }

        Ok(())
    }

    fn run_action(&mut self, action: &Action) -> Result<Flow, XError> {
        match action {
            Action::Quit => {
                info!("Quit requested");
                return Ok(Flow::Quit);
            }
            Action::FocusNext => {
                if let Some(window) = self.clients.focus_next(&self.conn)? {
                    debug!("Focused {:#x}", window);
                }
            }
            Action::KillFocused => {
                if let Some(window) = self.conn.focused_window() {
                    if window != self.conn.root() {
                        info!("Killing client owning {:#x}", window);
                        self.conn.kill_client(window)?;
                    }
                }
            }
            Action::MaximizeFocused => {
                let index = self
                    .conn
                    .focused_window()
                    .and_then(|w| self.clients.find(w).or_else(|| self.clients.find_by_frame(w)))
                    .or(self.clients.current());
                if let Some(client) = index.and_then(|i| self.clients.get_mut(i)) {
                    placement::maximize(&self.conn, client, &self.theme)?;
                }
            }
            Action::Spawn { command } => {
                if let Err(e) = spawn::spawn(command, self.conn.connection_fd()) {
                    warn!("Failed to spawn {:?}: {}", command, e);
                }
            }
        }

        Ok(Flow::Continue)
    }
}
