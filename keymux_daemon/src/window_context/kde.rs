//! KDE Plasma (kwin_wayland) window context via a helper D-Bus service
//! fed by an injected KWin script. Grounded on the `Wl_KWin_WindowContext`
//! provider: it talks to a well-known service/path pair and maps
//! `resource_class`/`caption` to `wm_class`/`wm_name` the same way X11's
//! `WM_CLASS`/`_NET_WM_NAME` are interpreted elsewhere in this module.

use std::collections::HashMap;

use zbus::blocking::Connection;
use zbus::zvariant::OwnedValue;

use keymux_core::{WindowContext, WindowContextProvider};

const SERVICE: &str = "org.toshy.Plasma";
const PATH: &str = "/org/toshy/Plasma";

pub struct KdeProvider {
    conn: Option<Connection>,
}

impl KdeProvider {
    pub fn new() -> Self {
        let conn = Connection::session()
            .map_err(|e| log::warn!("failed to open the D-Bus session bus: {e}"))
            .ok();
        Self { conn }
    }
}

impl WindowContextProvider for KdeProvider {
    fn get_window_context(&mut self) -> WindowContext {
        let Some(conn) = self.conn.as_ref() else {
            return WindowContext::error();
        };

        let reply = match conn.call_method(Some(SERVICE), PATH, Some(SERVICE), "GetActiveWindow", &()) {
            Ok(reply) => reply,
            Err(e) => {
                log::debug!("KWin helper D-Bus service did not respond: {e}");
                return WindowContext::error();
            }
        };

        let fields: HashMap<String, OwnedValue> = match reply.body().deserialize() {
            Ok(fields) => fields,
            Err(e) => {
                log::debug!("KWin helper D-Bus reply did not parse: {e}");
                return WindowContext::error();
            }
        };

        let wm_name = field_as_string(&fields, "caption");
        let wm_class = field_as_string(&fields, "resource_class");

        WindowContext { wm_class, wm_name, error: false }
    }
}

fn field_as_string(fields: &HashMap<String, OwnedValue>, key: &str) -> String {
    fields
        .get(key)
        .and_then(|v| String::try_from(v.clone()).ok())
        .unwrap_or_default()
}
