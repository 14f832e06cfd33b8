//! GNOME Shell window context via D-Bus, querying whichever of three
//! community shell extensions responds. Grounded on the
//! `Wl_GNOME_WindowContext` provider: it tries the extension that
//! answered last time first, then falls through the others in a fixed
//! order, and only logs the "none responded" error once per run of
//! failures rather than on every poll.
//!
//! Compatible extensions (same order the Python provider tries them):
//!   - `xremap@k0kubun.com`                  (com.k0kubun.Xremap / ActiveWindow() -> JSON)
//!   - `window-calls-extended@hseliger.eu`   (org.gnome.Shell.Extensions.WindowsExt / FocusClass(), FocusTitle())
//!   - `focused-window-dbus@flexagoon.com`   (org.gnome.shell.extensions.FocusedWindow / Get() -> JSON)

use serde::Deserialize;
use zbus::blocking::Connection;

use keymux_core::{WindowContext, WindowContextProvider};

#[derive(Debug, Deserialize, Default)]
struct JsonWindow {
    #[serde(default)]
    wm_class: String,
    #[serde(default)]
    title: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Extension {
    Xremap,
    WindowsExt,
    FocusedWindowDbus,
}

const EXTENSIONS: [Extension; 3] =
    [Extension::Xremap, Extension::WindowsExt, Extension::FocusedWindowDbus];

pub struct GnomeProvider {
    conn: Option<Connection>,
    last_good: Option<Extension>,
}

impl GnomeProvider {
    pub fn new() -> Self {
        let conn = Connection::session()
            .map_err(|e| log::warn!("failed to open the D-Bus session bus: {e}"))
            .ok();
        Self { conn, last_good: None }
    }

    fn query(&self, conn: &Connection, ext: Extension) -> Option<WindowContext> {
        match ext {
            Extension::Xremap => {
                let reply = conn
                    .call_method(
                        Some("org.gnome.Shell"),
                        "/com/k0kubun/Xremap",
                        Some("com.k0kubun.Xremap"),
                        "ActiveWindow",
                        &(),
                    )
                    .ok()?;
                let raw: String = reply.body().deserialize().ok()?;
                let window: JsonWindow = serde_json::from_str(&raw).ok()?;
                Some(WindowContext { wm_class: window.wm_class, wm_name: window.title, error: false })
            }
            Extension::WindowsExt => {
                let class_reply = conn
                    .call_method(
                        Some("org.gnome.Shell"),
                        "/org/gnome/Shell/Extensions/WindowsExt",
                        Some("org.gnome.Shell.Extensions.WindowsExt"),
                        "FocusClass",
                        &(),
                    )
                    .ok()?;
                let title_reply = conn
                    .call_method(
                        Some("org.gnome.Shell"),
                        "/org/gnome/Shell/Extensions/WindowsExt",
                        Some("org.gnome.Shell.Extensions.WindowsExt"),
                        "FocusTitle",
                        &(),
                    )
                    .ok()?;
                let wm_class: String = class_reply.body().deserialize().ok()?;
                let wm_name: String = title_reply.body().deserialize().ok()?;
                Some(WindowContext { wm_class, wm_name, error: false })
            }
            Extension::FocusedWindowDbus => {
                let reply = conn
                    .call_method(
                        Some("org.gnome.Shell"),
                        "/org/gnome/shell/extensions/FocusedWindow",
                        Some("org.gnome.shell.extensions.FocusedWindow"),
                        "Get",
                        &(),
                    )
                    .ok()?;
                let raw: String = reply.body().deserialize().ok()?;
                let window: JsonWindow = serde_json::from_str(&raw).ok()?;
                Some(WindowContext { wm_class: window.wm_class, wm_name: window.title, error: false })
            }
        }
    }
}

impl WindowContextProvider for GnomeProvider {
    fn get_window_context(&mut self) -> WindowContext {
        let Some(conn) = self.conn.as_ref() else {
            return WindowContext::error();
        };

        let start = self
            .last_good
            .and_then(|ext| EXTENSIONS.iter().position(|e| *e == ext))
            .unwrap_or(0);
        let ordered = EXTENSIONS.iter().cycle().skip(start).take(EXTENSIONS.len());

        for &ext in ordered {
            if let Some(ctx) = self.query(conn, ext) {
                self.last_good = Some(ext);
                return ctx;
            }
        }

        log::debug!("no compatible GNOME Shell extension responded via D-Bus");
        self.last_good = None;
        WindowContext::error()
    }
}
