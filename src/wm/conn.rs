//! Protocol seam
//!
//! Everything the window manager asks of the X server goes through [`XConn`].
//! The live implementation is [`crate::wm::display::X11Display`]; tests use a
//! recording in-memory connection.

use std::os::fd::RawFd;

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
pub use x11rb::protocol::xproto::{ConfigureWindowAux, Gcontext, Window};

/// X keysym value (e.g. `0xff09` for Tab)
pub type Keysym = u32;

/// Super key mask (Mod4Mask)
pub const MOD_SUPER: u16 = 0x40;

/// Shift key mask (ShiftMask)
pub const MOD_SHIFT: u16 = 0x01;

/// Window geometry in root (or parent) coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// True if the point lies inside this rectangle (right/bottom edges exclusive)
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }
}

/// Subset of window attributes the manager cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttrs {
    pub geometry: Geometry,
    pub viewable: bool,
    pub override_redirect: bool,
}

/// ICCCM `WM_STATE` codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    Normal,
    Iconic,
}

impl WmState {
    pub fn code(self) -> u32 {
        match self {
            WmState::Normal => 1,
            WmState::Iconic => 3,
        }
    }
}

/// Button press as seen by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    /// Window the event was reported on
    pub window: Window,
    /// Child of `window` under the pointer, if any
    pub subwindow: Option<Window>,
    pub root_x: i32,
    pub root_y: i32,
    /// Modifier and button state at press time
    pub state: u16,
}

/// A client asking for a geometry change
#[derive(Debug, Clone)]
pub struct ConfigureRequest {
    pub window: Window,
    /// The requested values, exactly as the client sent them
    pub aux: ConfigureWindowAux,
}

/// Protocol events, translated out of the wire representation
#[derive(Debug, Clone)]
pub enum XEvent {
    MapRequest(Window),
    DestroyNotify(Window),
    UnmapNotify(Window),
    KeyPress { keysym: Keysym, state: u16 },
    Expose { window: Window, count: u16 },
    /// `WM_NAME` or `_NET_WM_NAME` changed
    TitleChanged(Window),
    ButtonPress(ButtonPress),
    Motion { root_x: i32, root_y: i32 },
    ButtonRelease,
    Enter(Window),
    ConfigureRequest(ConfigureRequest),
    /// `WM_CHANGE_STATE` client message asking for `IconicState`
    IconifyRequest(Window),
    /// Error reported asynchronously for an earlier request
    ProtocolError(String),
    Ignored,
}

#[derive(Debug, Error)]
pub enum XError {
    #[error("failed to connect to X server: {0}")]
    Connect(#[from] ConnectError),

    #[error("X connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("X request failed: {0}")]
    Reply(#[from] ReplyError),

    #[error("X request failed: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),

    #[error("window {0:#x} no longer exists")]
    BadWindow(Window),

    #[error("another window manager is already running")]
    AnotherWmRunning,
}

/// Requests and queries the window manager issues against the server.
///
/// Reads that can race with window destruction return `Option` (or an empty
/// value) rather than an error. Fire-and-forget requests only fail when the
/// connection itself fails; errors the server reports for them come back
/// later as [`XEvent::ProtocolError`].
pub trait XConn {
    fn root(&self) -> Window;

    /// Full rectangle of the default screen
    fn screen_geometry(&self) -> Geometry;

    /// File descriptor of the protocol connection, if there is one
    fn connection_fd(&self) -> Option<RawFd>;

    /// Block until the next event arrives
    fn next_event(&self) -> Result<XEvent, XError>;

    fn flush(&self) -> Result<(), XError>;

    /// Children of the root window, bottom to top
    fn top_level_windows(&self) -> Result<Vec<Window>, XError>;

    fn window_attributes(&self, window: Window) -> Option<WindowAttrs>;

    fn geometry(&self, window: Window) -> Option<Geometry>;

    /// `_NET_WM_NAME`, falling back to `WM_NAME`, empty if neither is set
    fn window_title(&self, window: Window) -> String;

    /// Monitor rectangles, or `None` if enumeration is unavailable
    fn monitors(&self) -> Option<Vec<Geometry>>;

    /// Window holding input focus, `None` for root/PointerRoot/None
    fn focused_window(&self) -> Option<Window>;

    /// Create an (unmapped) frame window on the root with the frame event mask
    fn create_frame(&self, geometry: Geometry, background: u32) -> Result<Window, XError>;

    fn destroy_window(&self, window: Window) -> Result<(), XError>;

    fn reparent_window(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<(), XError>;

    fn map_window(&self, window: Window) -> Result<(), XError>;

    fn unmap_window(&self, window: Window) -> Result<(), XError>;

    fn raise_window(&self, window: Window) -> Result<(), XError>;

    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<(), XError>;

    fn resize_window(&self, window: Window, width: u32, height: u32) -> Result<(), XError>;

    fn move_resize_window(&self, window: Window, geometry: Geometry) -> Result<(), XError>;

    /// Forward a configure request verbatim
    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<(), XError>;

    fn set_border_width(&self, window: Window, width: u32) -> Result<(), XError>;

    /// Select enter/property events on a client and grab button 1 synchronously
    /// so a click can focus it and then be replayed
    fn watch_client(&self, window: Window) -> Result<(), XError>;

    fn focus_window(&self, window: Window) -> Result<(), XError>;

    fn kill_client(&self, window: Window) -> Result<(), XError>;

    /// Release a frozen pointer and replay the click to the application
    fn replay_pointer(&self) -> Result<(), XError>;

    fn set_wm_state(&self, window: Window, state: WmState) -> Result<(), XError>;

    /// Create a drawing surface (graphics context) for `drawable`
    fn create_surface(&self, drawable: Window) -> Result<Gcontext, XError>;

    fn free_surface(&self, surface: Gcontext) -> Result<(), XError>;

    fn fill_rectangles(
        &self,
        drawable: Window,
        surface: Gcontext,
        color: u32,
        rects: &[Geometry],
    ) -> Result<(), XError>;

    /// Blit a 32bpp Z-pixmap image at the origin of `drawable`, waiting for
    /// the server's verdict
    fn put_pixels(
        &self,
        drawable: Window,
        surface: Gcontext,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), XError>;

    /// Grab every key producing one of `keysyms` under `modifiers` on the root
    fn grab_keys(&self, keysyms: &[Keysym], modifiers: u16) -> Result<(), XError>;

    /// Grab button 1 with Super and Super+Shift on the root for drags
    fn grab_drag_buttons(&self) -> Result<(), XError>;
}
