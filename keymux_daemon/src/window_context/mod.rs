//! Window-context providers: the daemon-side implementations of
//! `keymux_core::WindowContextProvider`, one per supported session/
//! compositor combination. Selected at boot from `Configuration::environ`
//! (spec.md §6's "(session_type, compositor_or_wm_name)" tuple), grounded
//! on a Python remapper's `window_context.py` dispatcher, which performs
//! the same session/compositor-tuple lookup via subclass introspection.

pub mod gnome;
pub mod hyprland;
pub mod kde;
pub mod sway;
pub mod x11;

use keymux_core::config::Environ;
use keymux_core::WindowContextProvider;

use crate::error::PlatformError;

/// Picks the concrete provider for `environ`, boxed behind the trait
/// object the daemon event loop drives. Every concrete provider already
/// honors the "never panic, report `WindowContext::error` instead"
/// contract `keymux_core::WindowContextProvider` requires.
pub fn select(environ: &Environ) -> Result<Box<dyn WindowContextProvider>, PlatformError> {
    let session = environ.session_type.as_str();
    let compositor = environ.compositor.as_str();

    match (session, compositor) {
        ("x11", _) => Ok(Box::new(x11::X11Provider::connect())),
        ("wayland", "sway") | ("wayland", "i3") => Ok(Box::new(sway::SwayProvider::new())),
        ("wayland", "hyprland") => Ok(Box::new(hyprland::HyprlandProvider::new())),
        ("wayland", "gnome") => Ok(Box::new(gnome::GnomeProvider::new())),
        ("wayland", "kde") | ("wayland", "kwin") => Ok(Box::new(kde::KdeProvider::new())),
        _ => Err(PlatformError::UnsupportedEnviron {
            session_type: environ.session_type.clone(),
            compositor: environ.compositor.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tuple_is_rejected() {
        let environ = Environ {
            session_type: "wayland".into(),
            compositor: "some-future-compositor".into(),
        };
        assert!(select(&environ).is_err());
    }

    #[test]
    fn known_tuples_resolve() {
        for (session, compositor) in [
            ("x11", "any"),
            ("wayland", "sway"),
            ("wayland", "hyprland"),
            ("wayland", "gnome"),
            ("wayland", "kde"),
        ] {
            let environ = Environ {
                session_type: session.into(),
                compositor: compositor.into(),
            };
            assert!(select(&environ).is_ok());
        }
    }
}
