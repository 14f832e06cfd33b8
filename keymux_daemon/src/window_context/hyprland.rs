//! Hyprland window context via its IPC socket, with a shell-out to
//! `hyprctl` as a fallback when the socket is unreachable. Grounded on
//! the `Wl_Hyprland_WindowContext` provider's `get_active_wdw_ctx_hypr_ipc`/
//! `get_active_wdw_ctx_hypr_shell` methods: the IPC path is strictly
//! faster, the shell command exists only to keep working when the
//! socket briefly isn't there (e.g. during compositor restart).

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::process::Command;

use serde::Deserialize;

use keymux_core::{WindowContext, WindowContextProvider};

#[derive(Debug, Deserialize)]
struct ActiveWindow {
    #[serde(default)]
    class: String,
    #[serde(default)]
    title: String,
}

pub struct HyprlandProvider {
    socket_path: Option<std::path::PathBuf>,
}

impl HyprlandProvider {
    pub fn new() -> Self {
        let socket_path = env::var("HYPRLAND_INSTANCE_SIGNATURE").ok().map(|sig| {
            std::path::PathBuf::from(format!("/tmp/hypr/{sig}/.socket.sock"))
        });
        if socket_path.is_none() {
            log::warn!("HYPRLAND_INSTANCE_SIGNATURE is not set; Hyprland IPC disabled, falling back to hyprctl");
        }
        Self { socket_path }
    }

    fn via_ipc_socket(&self) -> Option<ActiveWindow> {
        let path = self.socket_path.as_ref()?;
        let mut stream = UnixStream::connect(path)
            .map_err(|e| log::debug!("Hyprland IPC socket connect failed: {e}"))
            .ok()?;
        stream.write_all(b"-j activewindow").ok()?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response).ok()?;
        if response.iter().all(u8::is_ascii_whitespace) {
            return Some(ActiveWindow::default_empty());
        }
        serde_json::from_slice(&response)
            .map_err(|e| log::debug!("Hyprland IPC activewindow reply did not parse: {e}"))
            .ok()
    }

    fn via_hyprctl_shell(&self) -> Option<ActiveWindow> {
        let output = Command::new("hyprctl").args(["-j", "activewindow"]).output().ok()?;
        if !output.status.success() {
            log::debug!("hyprctl exited with {}", output.status);
            return None;
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| log::debug!("hyprctl activewindow output did not parse: {e}"))
            .ok()
    }
}

impl ActiveWindow {
    fn default_empty() -> Self {
        Self { class: String::new(), title: String::new() }
    }
}

impl WindowContextProvider for HyprlandProvider {
    fn get_window_context(&mut self) -> WindowContext {
        let window = self.via_ipc_socket().or_else(|| self.via_hyprctl_shell());
        match window {
            Some(w) => WindowContext { wm_class: w.class, wm_name: w.title, error: false },
            None => WindowContext::error(),
        }
    }
}
