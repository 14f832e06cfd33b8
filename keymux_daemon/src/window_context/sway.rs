//! Sway/i3 window context via the native IPC socket protocol (no
//! `i3ipc`-equivalent crate in the dependency stack, so this speaks the
//! wire format directly: a 6-byte magic string, a little-endian `u32`
//! payload length, a little-endian `u32` message type, then a JSON
//! payload). Grounded on the `Wl_sway_WindowContext` provider of a
//! Python remapper's `window_context.py`, which issues a `GET_TREE`
//! request and walks the reply for the focused container.

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use serde::Deserialize;

use keymux_core::{WindowContext, WindowContextProvider};

const MAGIC: &[u8; 6] = b"i3-ipc";
const GET_TREE: u32 = 4;

#[derive(Debug, Deserialize)]
struct Node {
    focused: bool,
    app_id: Option<String>,
    window_properties: Option<WindowProperties>,
    name: Option<String>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    floating_nodes: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct WindowProperties {
    class: Option<String>,
}

impl Node {
    fn find_focused(&self) -> Option<&Node> {
        if self.focused {
            return Some(self);
        }
        self.nodes
            .iter()
            .chain(self.floating_nodes.iter())
            .find_map(Node::find_focused)
    }
}

pub struct SwayProvider {
    socket_path: Option<PathBuf>,
}

impl SwayProvider {
    pub fn new() -> Self {
        let socket_path = env::var_os("SWAYSOCK")
            .or_else(|| env::var_os("I3SOCK"))
            .map(PathBuf::from);
        if socket_path.is_none() {
            log::warn!("neither SWAYSOCK nor I3SOCK is set; sway window context disabled");
        }
        Self { socket_path }
    }

    fn query_tree(&self) -> Option<Node> {
        let path = self.socket_path.as_ref()?;
        let mut stream = UnixStream::connect(path)
            .map_err(|e| log::debug!("sway IPC connection failed: {e}"))
            .ok()?;

        let mut request = Vec::with_capacity(14);
        request.extend_from_slice(MAGIC);
        request.extend_from_slice(&0u32.to_le_bytes());
        request.extend_from_slice(&GET_TREE.to_le_bytes());
        stream.write_all(&request).ok()?;

        let mut header = [0u8; 14];
        stream.read_exact(&mut header).ok()?;
        if &header[0..6] != MAGIC {
            log::debug!("sway IPC reply had an unexpected magic prefix");
            return None;
        }
        let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).ok()?;
        serde_json::from_slice(&payload)
            .map_err(|e| log::debug!("sway IPC tree reply did not parse: {e}"))
            .ok()
    }
}

impl WindowContextProvider for SwayProvider {
    fn get_window_context(&mut self) -> WindowContext {
        let Some(tree) = self.query_tree() else {
            return WindowContext::error();
        };
        let Some(focused) = tree.find_focused() else {
            return WindowContext::error();
        };

        let wm_class = focused
            .app_id
            .clone()
            .or_else(|| focused.window_properties.as_ref().and_then(|p| p.class.clone()))
            .unwrap_or_default();
        let wm_name = focused.name.clone().unwrap_or_default();

        WindowContext { wm_class, wm_name, error: false }
    }
}
