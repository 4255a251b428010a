//! The displays, windows and applications a simulated backend reports.

use scbridge_types::{ContentOptions, Rect};
use serde::{Deserialize, Serialize};

/// Window layer of desktop-level windows such as the wallpaper.
pub const DESKTOP_WINDOW_LAYER: i32 = -2_147_483_623;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimDisplay {
    pub display_id: u32,
    pub width: u32,
    pub height: u32,
    pub frame: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimWindow {
    pub window_id: u32,
    pub title: Option<String>,
    pub frame: Rect,
    pub on_screen: bool,
    pub layer: i32,
    pub active: bool,
    pub owner_pid: Option<i32>,
}

impl SimWindow {
    pub fn is_desktop(&self) -> bool {
        self.layer == DESKTOP_WINDOW_LAYER
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimApplication {
    pub bundle_identifier: String,
    pub application_name: String,
    pub process_id: i32,
}

/// Shareable content of a simulated machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimWorld {
    pub displays: Vec<SimDisplay>,
    pub windows: Vec<SimWindow>,
    pub applications: Vec<SimApplication>,
}

impl SimWorld {
    /// A machine with nothing to share.
    pub fn empty() -> Self {
        Self {
            displays: Vec::new(),
            windows: Vec::new(),
            applications: Vec::new(),
        }
    }

    pub fn display(&self, display_id: u32) -> Option<&SimDisplay> {
        self.displays.iter().find(|d| d.display_id == display_id)
    }

    pub fn window(&self, window_id: u32) -> Option<&SimWindow> {
        self.windows.iter().find(|w| w.window_id == window_id)
    }

    /// Windows visible under the given request options.
    pub fn visible_windows(&self, options: ContentOptions) -> impl Iterator<Item = &SimWindow> {
        self.windows.iter().filter(move |w| {
            !(options.exclude_desktop_windows && w.is_desktop())
                && !(options.on_screen_windows_only && !w.on_screen)
        })
    }
}

impl Default for SimWorld {
    /// Two displays side by side with a handful of application windows.
    fn default() -> Self {
        let app = |bundle: &str, name: &str, pid: i32| SimApplication {
            bundle_identifier: bundle.to_string(),
            application_name: name.to_string(),
            process_id: pid,
        };

        Self {
            displays: vec![
                SimDisplay {
                    display_id: 1,
                    width: 1920,
                    height: 1080,
                    frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
                },
                SimDisplay {
                    display_id: 2,
                    width: 2560,
                    height: 1440,
                    frame: Rect::new(1920.0, 0.0, 2560.0, 1440.0),
                },
            ],
            windows: vec![
                SimWindow {
                    window_id: 100,
                    title: Some("Terminal".to_string()),
                    frame: Rect::new(40.0, 60.0, 800.0, 500.0),
                    on_screen: true,
                    layer: 0,
                    active: true,
                    owner_pid: Some(501),
                },
                SimWindow {
                    window_id: 101,
                    title: Some("Editor".to_string()),
                    frame: Rect::new(900.0, 80.0, 960.0, 900.0),
                    on_screen: true,
                    layer: 0,
                    active: false,
                    owner_pid: Some(502),
                },
                SimWindow {
                    window_id: 102,
                    title: None,
                    frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
                    on_screen: true,
                    layer: DESKTOP_WINDOW_LAYER,
                    active: false,
                    owner_pid: Some(400),
                },
                SimWindow {
                    window_id: 103,
                    title: Some("Notes".to_string()),
                    frame: Rect::new(2000.0, 100.0, 600.0, 400.0),
                    on_screen: false,
                    layer: 0,
                    active: false,
                    owner_pid: Some(503),
                },
            ],
            applications: vec![
                app("com.example.finder", "Finder", 400),
                app("com.example.terminal", "Terminal", 501),
                app("com.example.editor", "Editor", 502),
                app("com.example.notes", "Notes", 503),
            ],
        }
    }
}
