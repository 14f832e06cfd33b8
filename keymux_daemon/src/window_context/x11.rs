//! X11/Xorg window context via Xlib-equivalent properties over
//! `x11rb`: the focused window's `_NET_WM_NAME` (falling back to the
//! legacy `WM_NAME` only when absent) and the second string of its
//! `WM_CLASS` pair (instance, **class**). Grounded on the `Xorg_WindowContext`
//! provider of a Python remapper's `window_context.py`, including its
//! "FocusProxy" workaround: some toolkits (observed with certain Java
//! apps) report focus on a proxy window with no name/class of its own,
//! so we climb `query_tree` parents looking for one that does.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, AtomEnum, Window};
use x11rb::rust_connection::RustConnection;

use keymux_core::{WindowContext, WindowContextProvider};

pub struct X11Provider {
    conn: Option<RustConnection>,
    net_wm_name: u32,
    wm_class: u32,
    utf8_string: u32,
}

impl X11Provider {
    pub fn connect() -> Self {
        match x11rb::connect(None) {
            Ok((conn, _screen)) => {
                let net_wm_name = intern(&conn, "_NET_WM_NAME").unwrap_or(AtomEnum::NONE.into());
                let wm_class = AtomEnum::WM_CLASS.into();
                let utf8_string = intern(&conn, "UTF8_STRING").unwrap_or(AtomEnum::STRING.into());
                Self {
                    conn: Some(conn),
                    net_wm_name,
                    wm_class,
                    utf8_string,
                }
            }
            Err(e) => {
                log::warn!("failed to connect to the X server: {e}");
                Self {
                    conn: None,
                    net_wm_name: 0,
                    wm_class: 0,
                    utf8_string: 0,
                }
            }
        }
    }

    fn focused_window(&self, conn: &RustConnection) -> Option<Window> {
        conn.get_input_focus().ok()?.reply().ok().map(|r| r.focus)
    }

    fn property_string(&self, conn: &RustConnection, window: Window, property: u32, kind: u32) -> Option<String> {
        let reply = conn
            .get_property(false, window, property, kind, 0, u32::MAX)
            .ok()?
            .reply()
            .ok()?;
        if reply.value.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&reply.value).trim_end_matches('\0').to_string())
    }

    fn wm_class_second_field(&self, conn: &RustConnection, window: Window) -> Option<String> {
        let raw = self.property_string(conn, window, self.wm_class, AtomEnum::STRING.into())?;
        raw.split('\0').nth(1).map(|s| s.to_string())
    }

    /// Some toolkits report input focus on a nameless/classless proxy
    /// window. Climb up to 5 parents looking for one with either field
    /// set, matching the Python original's `get_actual_window` loop.
    fn resolve_actual_window(&self, conn: &RustConnection, mut window: Window) -> (Option<String>, Option<String>) {
        for _ in 0..5 {
            let wm_class = self.wm_class_second_field(conn, window);
            let wm_name = self
                .property_string(conn, window, self.net_wm_name, self.utf8_string)
                .or_else(|| self.property_string(conn, window, AtomEnum::WM_NAME.into(), AtomEnum::STRING.into()));

            let proxy = wm_class.as_deref().is_some_and(|c| c.contains("FocusProxy"));
            if !proxy && (wm_class.is_some() || wm_name.is_some()) {
                return (wm_class, wm_name);
            }

            let Ok(tree) = conn.query_tree(window).and_then(|c| c.reply()) else {
                break;
            };
            if tree.parent == 0 || tree.parent == window {
                break;
            }
            window = tree.parent;
        }
        (None, None)
    }
}

fn intern(conn: &RustConnection, name: &str) -> Option<u32> {
    conn.intern_atom(false, name.as_bytes()).ok()?.reply().ok().map(|r| r.atom)
}

impl WindowContextProvider for X11Provider {
    fn get_window_context(&mut self) -> WindowContext {
        let Some(conn) = self.conn.as_ref() else {
            return WindowContext::error();
        };
        let Some(window) = self.focused_window(conn) else {
            return WindowContext::error();
        };

        let (wm_class, wm_name) = self.resolve_actual_window(conn, window);
        WindowContext {
            wm_class: wm_class.unwrap_or_default(),
            wm_name: wm_name.unwrap_or_default(),
            error: false,
        }
    }
}
