//! In-memory `XConn` that records every request
//!
//! Keeps just enough server state (geometry, parent, mapping, properties)
//! for the engine's reads to see the effect of its own writes.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::os::fd::RawFd;

use x11rb::errors::ConnectionError;

use crate::wm::conn::{
    ConfigureWindowAux, Gcontext, Geometry, Keysym, Window, WindowAttrs, WmState, XConn, XError,
    XEvent,
};

const ROOT: Window = 1;
const FIRST_ID: u32 = 0x100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockWindow {
    pub geometry: Geometry,
    pub parent: Window,
    pub mapped: bool,
    pub override_redirect: bool,
    pub title: String,
    pub border_width: u32,
    pub wm_state: Option<WmState>,
    pub is_frame: bool,
}

impl MockWindow {
    fn new(geometry: Geometry, mapped: bool) -> Self {
        Self {
            geometry,
            parent: ROOT,
            mapped,
            override_redirect: false,
            title: String::new(),
            border_width: 1,
            wm_state: None,
            is_frame: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateFrame(Window, Geometry),
    Destroy(Window),
    Reparent { window: Window, parent: Window, x: i32, y: i32 },
    Map(Window),
    Unmap(Window),
    Raise(Window),
    Move { window: Window, x: i32, y: i32 },
    Resize { window: Window, width: u32, height: u32 },
    MoveResize(Window, Geometry),
    Configure {
        window: Window,
        x: Option<i32>,
        y: Option<i32>,
        width: Option<u32>,
        height: Option<u32>,
    },
    BorderWidth(Window, u32),
    Watch(Window),
    Focus(Window),
    Kill(Window),
    ReplayPointer,
    WmState(Window, WmState),
    CreateSurface(Window),
    FreeSurface(Gcontext),
    FillRects { window: Window, color: u32, rects: Vec<Geometry> },
    PutPixels { window: Window, width: u32, height: u32 },
    GrabKeys(Vec<Keysym>, u16),
    GrabDragButtons,
}

#[derive(Debug, Default)]
struct State {
    windows: BTreeMap<Window, MockWindow>,
    /// Stacking order, bottom to top
    stack: Vec<Window>,
    surfaces: Vec<Gcontext>,
    next_id: u32,
    requests: Vec<Request>,
    events: VecDeque<XEvent>,
    monitors: Option<Vec<Geometry>>,
    focus: Option<Window>,
    fail_blits: bool,
    last_blit: Option<(Window, u32, u32, Vec<u8>)>,
}

impl State {
    fn alloc_id(&mut self) -> u32 {
        let id = FIRST_ID + self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, id: Window, window: MockWindow) {
        self.windows.insert(id, window);
        self.stack.retain(|&w| w != id);
        self.stack.push(id);
    }

    fn remove_tree(&mut self, id: Window) {
        let children: Vec<Window> = self
            .windows
            .iter()
            .filter(|(_, w)| w.parent == id)
            .map(|(&child, _)| child)
            .collect();
        for child in children {
            self.remove_tree(child);
        }
        self.windows.remove(&id);
        self.stack.retain(|&w| w != id);
        if self.focus == Some(id) {
            self.focus = None;
        }
    }
}

#[derive(Debug)]
pub struct MockConn {
    state: RefCell<State>,
}

impl MockConn {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
        }
    }

    /// Add a mapped top-level window
    pub fn add_window(&self, id: Window, geometry: Geometry) {
        self.state.borrow_mut().insert(id, MockWindow::new(geometry, true));
    }

    /// Add a top-level window that has not been mapped yet
    pub fn add_unmapped_window(&self, id: Window, geometry: Geometry) {
        self.state.borrow_mut().insert(id, MockWindow::new(geometry, false));
    }

    pub fn add_override_redirect_window(&self, id: Window, geometry: Geometry) {
        let mut window = MockWindow::new(geometry, true);
        window.override_redirect = true;
        self.state.borrow_mut().insert(id, window);
    }

    pub fn set_title(&self, id: Window, title: &str) {
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&id) {
            w.title = title.to_string();
        }
    }

    pub fn set_monitors(&self, monitors: Vec<Geometry>) {
        self.state.borrow_mut().monitors = Some(monitors);
    }

    /// Make a window disappear without the engine asking for it
    pub fn forget_window(&self, id: Window) {
        self.state.borrow_mut().remove_tree(id);
    }

    pub fn window(&self, id: Window) -> Option<MockWindow> {
        self.state.borrow().windows.get(&id).cloned()
    }

    pub fn live_frames(&self) -> usize {
        self.state.borrow().windows.values().filter(|w| w.is_frame).count()
    }

    pub fn live_surfaces(&self) -> usize {
        self.state.borrow().surfaces.len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.borrow().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.borrow_mut().requests.clear();
    }

    pub fn fail_blits(&self, fail: bool) {
        self.state.borrow_mut().fail_blits = fail;
    }

    /// Last successful title bar blit: (window, width, height, pixels)
    pub fn last_blit(&self) -> Option<(Window, u32, u32, Vec<u8>)> {
        self.state.borrow().last_blit.clone()
    }

    pub fn focus(&self) -> Option<Window> {
        self.state.borrow().focus
    }

    pub fn push_event(&self, event: XEvent) {
        self.state.borrow_mut().events.push_back(event);
    }

    fn record(&self, request: Request) {
        self.state.borrow_mut().requests.push(request);
    }

    fn with_window(&self, id: Window, f: impl FnOnce(&mut MockWindow)) {
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&id) {
            f(w);
        }
    }
}

impl XConn for MockConn {
    fn root(&self) -> Window {
        ROOT
    }

    fn screen_geometry(&self) -> Geometry {
        Geometry::new(0, 0, 1920, 1080)
    }

    fn connection_fd(&self) -> Option<RawFd> {
        None
    }

    fn next_event(&self) -> Result<XEvent, XError> {
        self.state
            .borrow_mut()
            .events
            .pop_front()
            .ok_or(XError::Connection(ConnectionError::UnknownError))
    }

    fn flush(&self) -> Result<(), XError> {
        Ok(())
    }

    fn top_level_windows(&self) -> Result<Vec<Window>, XError> {
        let state = self.state.borrow();
        Ok(state
            .stack
            .iter()
            .copied()
            .filter(|id| state.windows.get(id).is_some_and(|w| w.parent == ROOT))
            .collect())
    }

    fn window_attributes(&self, window: Window) -> Option<WindowAttrs> {
        self.state.borrow().windows.get(&window).map(|w| WindowAttrs {
            geometry: w.geometry,
            viewable: w.mapped,
            override_redirect: w.override_redirect,
        })
    }

    fn geometry(&self, window: Window) -> Option<Geometry> {
        self.state.borrow().windows.get(&window).map(|w| w.geometry)
    }

    fn window_title(&self, window: Window) -> String {
        self.state
            .borrow()
            .windows
            .get(&window)
            .map(|w| w.title.clone())
            .unwrap_or_default()
    }

    fn monitors(&self) -> Option<Vec<Geometry>> {
        self.state.borrow().monitors.clone()
    }

    fn focused_window(&self) -> Option<Window> {
        self.state.borrow().focus
    }

    fn create_frame(&self, geometry: Geometry, _background: u32) -> Result<Window, XError> {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.alloc_id();
            let mut frame = MockWindow::new(geometry, false);
            frame.is_frame = true;
            frame.border_width = 0;
            state.insert(id, frame);
            id
        };
        self.record(Request::CreateFrame(id, geometry));
        Ok(id)
    }

    fn destroy_window(&self, window: Window) -> Result<(), XError> {
        self.state.borrow_mut().remove_tree(window);
        self.record(Request::Destroy(window));
        Ok(())
    }

    fn reparent_window(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<(), XError> {
        self.with_window(window, |w| {
            w.parent = parent;
            w.geometry.x = x;
            w.geometry.y = y;
        });
        self.record(Request::Reparent { window, parent, x, y });
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<(), XError> {
        self.with_window(window, |w| w.mapped = true);
        self.record(Request::Map(window));
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<(), XError> {
        self.with_window(window, |w| w.mapped = false);
        self.record(Request::Unmap(window));
        Ok(())
    }

    fn raise_window(&self, window: Window) -> Result<(), XError> {
        {
            let mut state = self.state.borrow_mut();
            if state.windows.contains_key(&window) {
                state.stack.retain(|&w| w != window);
                state.stack.push(window);
            }
        }
        self.record(Request::Raise(window));
        Ok(())
    }

    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<(), XError> {
        self.with_window(window, |w| {
            w.geometry.x = x;
            w.geometry.y = y;
        });
        self.record(Request::Move { window, x, y });
        Ok(())
    }

    fn resize_window(&self, window: Window, width: u32, height: u32) -> Result<(), XError> {
        self.with_window(window, |w| {
            w.geometry.width = width;
            w.geometry.height = height;
        });
        self.record(Request::Resize { window, width, height });
        Ok(())
    }

    fn move_resize_window(&self, window: Window, geometry: Geometry) -> Result<(), XError> {
        self.with_window(window, |w| w.geometry = geometry);
        self.record(Request::MoveResize(window, geometry));
        Ok(())
    }

    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<(), XError> {
        self.with_window(window, |w| {
            if let Some(x) = aux.x {
                w.geometry.x = x;
            }
            if let Some(y) = aux.y {
                w.geometry.y = y;
            }
            if let Some(width) = aux.width {
                w.geometry.width = width;
            }
            if let Some(height) = aux.height {
                w.geometry.height = height;
            }
        });
        self.record(Request::Configure {
            window,
            x: aux.x,
            y: aux.y,
            width: aux.width,
            height: aux.height,
        });
        Ok(())
    }

    fn set_border_width(&self, window: Window, width: u32) -> Result<(), XError> {
        self.with_window(window, |w| w.border_width = width);
        self.record(Request::BorderWidth(window, width));
        Ok(())
    }

    fn watch_client(&self, window: Window) -> Result<(), XError> {
        self.record(Request::Watch(window));
        Ok(())
    }

    fn focus_window(&self, window: Window) -> Result<(), XError> {
        {
            let mut state = self.state.borrow_mut();
            if state.windows.contains_key(&window) {
                state.focus = Some(window);
            }
        }
        self.record(Request::Focus(window));
        Ok(())
    }

    fn kill_client(&self, window: Window) -> Result<(), XError> {
        self.record(Request::Kill(window));
        Ok(())
    }

    fn replay_pointer(&self) -> Result<(), XError> {
        self.record(Request::ReplayPointer);
        Ok(())
    }

    fn set_wm_state(&self, window: Window, state: WmState) -> Result<(), XError> {
        self.with_window(window, |w| w.wm_state = Some(state));
        self.record(Request::WmState(window, state));
        Ok(())
    }

    fn create_surface(&self, drawable: Window) -> Result<Gcontext, XError> {
        let id = {
            let mut state = self.state.borrow_mut();
            if !state.windows.contains_key(&drawable) {
                return Err(XError::BadWindow(drawable));
            }
            let id = state.alloc_id();
            state.surfaces.push(id);
            id
        };
        self.record(Request::CreateSurface(drawable));
        Ok(id)
    }

    fn free_surface(&self, surface: Gcontext) -> Result<(), XError> {
        self.state.borrow_mut().surfaces.retain(|&s| s != surface);
        self.record(Request::FreeSurface(surface));
        Ok(())
    }

    fn fill_rectangles(
        &self,
        drawable: Window,
        _surface: Gcontext,
        color: u32,
        rects: &[Geometry],
    ) -> Result<(), XError> {
        self.record(Request::FillRects {
            window: drawable,
            color,
            rects: rects.to_vec(),
        });
        Ok(())
    }

    fn put_pixels(
        &self,
        drawable: Window,
        _surface: Gcontext,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), XError> {
        {
            let mut state = self.state.borrow_mut();
            if state.fail_blits || !state.windows.contains_key(&drawable) {
                return Err(XError::BadWindow(drawable));
            }
            state.last_blit = Some((drawable, width, height, pixels.to_vec()));
        }
        self.record(Request::PutPixels {
            window: drawable,
            width,
            height,
        });
        Ok(())
    }

    fn grab_keys(&self, keysyms: &[Keysym], modifiers: u16) -> Result<(), XError> {
        self.record(Request::GrabKeys(keysyms.to_vec(), modifiers));
        Ok(())
    }

    fn grab_drag_buttons(&self) -> Result<(), XError> {
        self.record(Request::GrabDragButtons);
        Ok(())
    }
}
