//! Display Module
//!
//! Owns the X11 connection and implements [`XConn`] on top of x11rb:
//! atoms, keyboard mapping, RandR monitor queries and event translation.

use std::os::fd::{AsRawFd, RawFd};

use tracing::{debug, info};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{CURRENT_TIME, NONE};

use crate::wm::conn::{
    ButtonPress, ConfigureRequest, Geometry, Keysym, WindowAttrs, WmState, XConn, XError, XEvent,
    MOD_SHIFT, MOD_SUPER,
};

/// `XC_left_ptr` glyph in the standard cursor font
const XC_LEFT_PTR: u16 = 68;

/// PointerRoot focus value
const POINTER_ROOT: Window = 1;

/// Longest title read from a name property, in 32-bit units
const TITLE_MAX_LONGS: u32 = 256;

/// Atoms interned at startup
#[derive(Debug)]
pub struct Atoms {
    pub wm_state: Atom,
    pub wm_change_state: Atom,
    pub wm_name: Atom,
    pub net_wm_name: Atom,
    pub utf8_string: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self, XError> {
        let intern = |name: &str| -> Result<Atom, XError> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            wm_state: intern("WM_STATE")?,
            wm_change_state: intern("WM_CHANGE_STATE")?,
            wm_name: AtomEnum::WM_NAME.into(),
            net_wm_name: intern("_NET_WM_NAME")?,
            utf8_string: intern("UTF8_STRING")?,
        })
    }
}

/// Keycode <-> keysym table fetched once at startup
#[derive(Debug)]
struct KeyboardMap {
    min_keycode: u8,
    keysyms_per_keycode: usize,
    keysyms: Vec<Keysym>,
}

impl KeyboardMap {
    fn load(conn: &RustConnection) -> Result<Self, XError> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode - min_keycode + 1;
        let reply = conn.get_keyboard_mapping(min_keycode, count)?.reply()?;

        Ok(Self {
            min_keycode,
            keysyms_per_keycode: usize::from(reply.keysyms_per_keycode),
            keysyms: reply.keysyms,
        })
    }

    /// Every keycode whose unshifted or shifted symbol is `keysym`
    fn keycodes(&self, keysym: Keysym) -> Vec<Keycode> {
        if self.keysyms_per_keycode == 0 {
            return Vec::new();
        }
        self.keysyms
            .chunks(self.keysyms_per_keycode)
            .enumerate()
            .filter(|(_, syms)| syms.iter().take(2).any(|&s| s == keysym))
            .filter_map(|(i, _)| u8::try_from(i).ok())
            .map(|i| self.min_keycode.saturating_add(i))
            .collect()
    }

    /// Unshifted symbol of `keycode`, `0` (NoSymbol) if unknown
    fn keysym(&self, keycode: Keycode) -> Keysym {
        let Some(offset) = keycode.checked_sub(self.min_keycode) else {
            return 0;
        };
        self.keysyms
            .get(usize::from(offset) * self.keysyms_per_keycode)
            .copied()
            .unwrap_or(0)
    }
}

/// Live connection to the X server
pub struct X11Display {
    conn: RustConnection,
    screen_num: usize,
    root: Window,
    atoms: Atoms,
    keymap: KeyboardMap,
    have_randr: bool,
}

impl X11Display {
    /// Connect to the server named by `$DISPLAY`
    pub fn connect() -> Result<Self, XError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let root = conn.setup().roots[screen_num].root;

        info!("Connected to X server, screen {}, root window {:#x}", screen_num, root);

        let atoms = Atoms::new(&conn)?;
        let keymap = KeyboardMap::load(&conn)?;
        let have_randr = conn
            .extension_information(x11rb::protocol::randr::X11_EXTENSION_NAME)?
            .is_some();
        debug!("RandR available: {}", have_randr);

        Ok(Self {
            conn,
            screen_num,
            root,
            atoms,
            keymap,
            have_randr,
        })
    }

    /// Take over window management on the root and set the root cursor
    pub fn become_wm(&self) -> Result<(), XError> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::STRUCTURE_NOTIFY;

        self.conn
            .change_window_attributes(self.root, &ChangeWindowAttributesAux::new().event_mask(mask))?
            .check()
            .map_err(|_| XError::AnotherWmRunning)?;

        let font = self.conn.generate_id()?;
        self.conn.open_font(font, b"cursor")?;
        let cursor = self.conn.generate_id()?;
        self.conn.create_glyph_cursor(
            cursor,
            font,
            font,
            XC_LEFT_PTR,
            XC_LEFT_PTR + 1,
            0,
            0,
            0,
            0xffff,
            0xffff,
            0xffff,
        )?;
        self.conn
            .change_window_attributes(self.root, &ChangeWindowAttributesAux::new().cursor(cursor))?;
        self.conn.close_font(font)?;

        info!("Registered as window manager");
        Ok(())
    }

    fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    fn translate(&self, event: Event) -> XEvent {
        match event {
            Event::MapRequest(e) => XEvent::MapRequest(e.window),
            Event::DestroyNotify(e) => XEvent::DestroyNotify(e.window),
            Event::UnmapNotify(e) => XEvent::UnmapNotify(e.window),
            Event::KeyPress(e) => XEvent::KeyPress {
                keysym: self.keymap.keysym(e.detail),
                state: u16::from(e.state),
            },
            Event::Expose(e) => XEvent::Expose {
                window: e.window,
                count: e.count,
            },
            Event::PropertyNotify(e)
                if e.atom == self.atoms.wm_name || e.atom == self.atoms.net_wm_name =>
            {
                XEvent::TitleChanged(e.window)
            }
            Event::ButtonPress(e) => XEvent::ButtonPress(ButtonPress {
                window: e.event,
                subwindow: (e.child != NONE).then_some(e.child),
                root_x: i32::from(e.root_x),
                root_y: i32::from(e.root_y),
                state: u16::from(e.state),
            }),
            Event::MotionNotify(e) => XEvent::Motion {
                root_x: i32::from(e.root_x),
                root_y: i32::from(e.root_y),
            },
            Event::ButtonRelease(_) => XEvent::ButtonRelease,
            Event::EnterNotify(e) => XEvent::Enter(e.event),
            Event::ConfigureRequest(e) => XEvent::ConfigureRequest(ConfigureRequest {
                window: e.window,
                aux: ConfigureWindowAux::from_configure_request(&e),
            }),
            Event::ClientMessage(e)
                if e.type_ == self.atoms.wm_change_state
                    && e.format == 32
                    && e.data.as_data32()[0] == WmState::Iconic.code() =>
            {
                XEvent::IconifyRequest(e.window)
            }
            Event::Error(e) => XEvent::ProtocolError(format!(
                "{:?} (request {}, resource {:#x})",
                e.error_kind,
                e.request_name.unwrap_or("?"),
                e.bad_value
            )),
            _ => XEvent::Ignored,
        }
    }

    fn read_string_property(&self, window: Window, property: Atom, type_: Atom) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, property, type_, 0, TITLE_MAX_LONGS)
            .ok()?
            .reply()
            .ok()?;
        if reply.type_ == NONE || (type_ != u32::from(AtomEnum::ANY) && reply.type_ != type_) {
            return None;
        }
        let end = reply.value.iter().position(|&b| b == 0).unwrap_or(reply.value.len());
        Some(String::from_utf8_lossy(&reply.value[..end]).into_owned())
    }
}

/// Clamp a length to the protocol's 16-bit range
fn dim(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Clamp a coordinate to the protocol's 16-bit range
fn coord(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn rectangle(g: &Geometry) -> Rectangle {
    Rectangle {
        x: coord(g.x),
        y: coord(g.y),
        width: dim(g.width),
        height: dim(g.height),
    }
}

impl XConn for X11Display {
    fn root(&self) -> Window {
        self.root
    }

    fn screen_geometry(&self) -> Geometry {
        let screen = self.screen();
        Geometry::new(
            0,
            0,
            u32::from(screen.width_in_pixels),
            u32::from(screen.height_in_pixels),
        )
    }

    fn connection_fd(&self) -> Option<RawFd> {
        Some(self.conn.stream().as_raw_fd())
    }

    fn next_event(&self) -> Result<XEvent, XError> {
        let event = self.conn.wait_for_event()?;
        Ok(self.translate(event))
    }

    fn flush(&self) -> Result<(), XError> {
        self.conn.flush()?;
        Ok(())
    }

    fn top_level_windows(&self) -> Result<Vec<Window>, XError> {
        Ok(self.conn.query_tree(self.root)?.reply()?.children)
    }

    fn window_attributes(&self, window: Window) -> Option<WindowAttrs> {
        let attrs = self.conn.get_window_attributes(window).ok()?.reply().ok()?;
        let geometry = self.geometry(window)?;
        Some(WindowAttrs {
            geometry,
            viewable: attrs.map_state == MapState::VIEWABLE,
            override_redirect: attrs.override_redirect,
        })
    }

    fn geometry(&self, window: Window) -> Option<Geometry> {
        let geom = self.conn.get_geometry(window).ok()?.reply().ok()?;
        Some(Geometry::new(
            i32::from(geom.x),
            i32::from(geom.y),
            u32::from(geom.width),
            u32::from(geom.height),
        ))
    }

    fn window_title(&self, window: Window) -> String {
        self.read_string_property(window, self.atoms.net_wm_name, self.atoms.utf8_string)
            .or_else(|| {
                self.read_string_property(window, self.atoms.wm_name, AtomEnum::ANY.into())
            })
            .unwrap_or_default()
    }

    fn monitors(&self) -> Option<Vec<Geometry>> {
        if !self.have_randr {
            return None;
        }
        let reply = self.conn.randr_get_monitors(self.root, true).ok()?.reply().ok()?;
        if reply.monitors.is_empty() {
            return None;
        }
        Some(
            reply
                .monitors
                .iter()
                .map(|m| {
                    Geometry::new(
                        i32::from(m.x),
                        i32::from(m.y),
                        u32::from(m.width),
                        u32::from(m.height),
                    )
                })
                .collect(),
        )
    }

    fn focused_window(&self) -> Option<Window> {
        let focus = self.conn.get_input_focus().ok()?.reply().ok()?.focus;
        (focus != NONE && focus != POINTER_ROOT && focus != self.root).then_some(focus)
    }

    fn create_frame(&self, geometry: Geometry, background: u32) -> Result<Window, XError> {
        let screen = self.screen();
        let frame = self.conn.generate_id()?;

        self.conn.create_window(
            screen.root_depth,
            frame,
            self.root,
            coord(geometry.x),
            coord(geometry.y),
            dim(geometry.width).max(1),
            dim(geometry.height).max(1),
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(background)
                .border_pixel(screen.black_pixel)
                .event_mask(
                    EventMask::SUBSTRUCTURE_REDIRECT
                        | EventMask::SUBSTRUCTURE_NOTIFY
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::POINTER_MOTION
                        | EventMask::EXPOSURE,
                ),
        )?;

        Ok(frame)
    }

    fn destroy_window(&self, window: Window) -> Result<(), XError> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn reparent_window(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<(), XError> {
        self.conn.reparent_window(window, parent, coord(x), coord(y))?;
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<(), XError> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<(), XError> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn raise_window(&self, window: Window) -> Result<(), XError> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
        Ok(())
    }

    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<(), XError> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().x(x).y(y))?;
        Ok(())
    }

    fn resize_window(&self, window: Window, width: u32, height: u32) -> Result<(), XError> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().width(width).height(height),
        )?;
        Ok(())
    }

    fn move_resize_window(&self, window: Window, geometry: Geometry) -> Result<(), XError> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(geometry.x)
                .y(geometry.y)
                .width(geometry.width)
                .height(geometry.height),
        )?;
        Ok(())
    }

    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<(), XError> {
        self.conn.configure_window(window, aux)?;
        Ok(())
    }

    fn set_border_width(&self, window: Window, width: u32) -> Result<(), XError> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().border_width(width))?;
        Ok(())
    }

    fn watch_client(&self, window: Window) -> Result<(), XError> {
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new()
                .event_mask(EventMask::ENTER_WINDOW | EventMask::PROPERTY_CHANGE),
        )?;
        self.conn.grab_button(
            true,
            window,
            EventMask::BUTTON_PRESS,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            NONE,
            NONE,
            ButtonIndex::M1,
            ModMask::ANY,
        )?;
        Ok(())
    }

    fn focus_window(&self, window: Window) -> Result<(), XError> {
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, window, CURRENT_TIME)?;
        Ok(())
    }

    fn kill_client(&self, window: Window) -> Result<(), XError> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn replay_pointer(&self) -> Result<(), XError> {
        self.conn.allow_events(Allow::REPLAY_POINTER, CURRENT_TIME)?;
        Ok(())
    }

    fn set_wm_state(&self, window: Window, state: WmState) -> Result<(), XError> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.wm_state,
            self.atoms.wm_state,
            &[state.code(), NONE],
        )?;
        Ok(())
    }

    fn create_surface(&self, drawable: Window) -> Result<Gcontext, XError> {
        let gc = self.conn.generate_id()?;
        self.conn.create_gc(gc, drawable, &CreateGCAux::new())?;
        Ok(gc)
    }

    fn free_surface(&self, surface: Gcontext) -> Result<(), XError> {
        self.conn.free_gc(surface)?;
        Ok(())
    }

    fn fill_rectangles(
        &self,
        drawable: Window,
        surface: Gcontext,
        color: u32,
        rects: &[Geometry],
    ) -> Result<(), XError> {
        let rects: Vec<Rectangle> = rects.iter().map(rectangle).collect();
        self.conn.change_gc(surface, &ChangeGCAux::new().foreground(color))?;
        self.conn.poly_fill_rectangle(drawable, surface, &rects)?;
        Ok(())
    }

    fn put_pixels(
        &self,
        drawable: Window,
        surface: Gcontext,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), XError> {
        self.conn
            .put_image(
                ImageFormat::Z_PIXMAP,
                drawable,
                surface,
                dim(width),
                dim(height),
                0,
                0,
                0,
                self.screen().root_depth,
                pixels,
            )?
            .check()?;
        Ok(())
    }

    fn grab_keys(&self, keysyms: &[Keysym], modifiers: u16) -> Result<(), XError> {
        for &keysym in keysyms {
            let keycodes = self.keymap.keycodes(keysym);
            if keycodes.is_empty() {
                debug!("No keycode produces keysym {:#x}", keysym);
            }
            for keycode in keycodes {
                self.conn.grab_key(
                    true,
                    self.root,
                    ModMask::from(modifiers),
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )?;
            }
        }
        Ok(())
    }

    fn grab_drag_buttons(&self) -> Result<(), XError> {
        for modifiers in [MOD_SUPER, MOD_SUPER | MOD_SHIFT] {
            self.conn.grab_button(
                true,
                self.root,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                ButtonIndex::M1,
                ModMask::from(modifiers),
            )?;
        }
        Ok(())
    }
}
