//! Content filters.
//!
//! A filter decides what a stream may capture. It copies the identifying data
//! of the displays, windows and applications it was built from and keeps no
//! native references to them, so the originals may be dropped right away.

use scbridge_types::Rect;
use serde::{Deserialize, Serialize};

use crate::content::{Application, Display, Window};

/// Identifying data of a display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRef {
    pub display_id: u32,
    pub width: u32,
    pub height: u32,
    pub frame: Rect,
}

impl From<&Display> for DisplayRef {
    fn from(display: &Display) -> Self {
        Self {
            display_id: display.display_id(),
            width: display.width(),
            height: display.height(),
            frame: display.frame(),
        }
    }
}

/// Identifying data of a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowRef {
    pub window_id: u32,
    pub frame: Rect,
}

impl From<&Window> for WindowRef {
    fn from(window: &Window) -> Self {
        Self {
            window_id: window.window_id(),
            frame: window.frame(),
        }
    }
}

/// Identifying data of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRef {
    pub bundle_identifier: String,
    pub process_id: i32,
}

impl From<&Application> for ApplicationRef {
    fn from(application: &Application) -> Self {
        Self {
            bundle_identifier: application.bundle_identifier(),
            process_id: application.process_id(),
        }
    }
}

/// What a filter selects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterMode {
    /// Everything on the display except the listed windows.
    DisplayExcludingWindows {
        display: DisplayRef,
        excluded: Vec<WindowRef>,
    },

    /// Only the listed windows on the display.
    DisplayIncludingWindows {
        display: DisplayRef,
        included: Vec<WindowRef>,
    },

    /// Windows of the listed applications on the display, minus the
    /// excepted windows.
    DisplayIncludingApplications {
        display: DisplayRef,
        applications: Vec<ApplicationRef>,
        excepted: Vec<WindowRef>,
    },

    /// A single window, wherever it is.
    DesktopIndependentWindow { window: WindowRef },
}

/// An immutable capture filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFilter {
    mode: FilterMode,
    content_rect: Option<Rect>,
}

impl ContentFilter {
    /// Capture a display, leaving out some windows. An empty list excludes
    /// nothing.
    pub fn excluding_windows(display: &Display, windows: &[Window]) -> Self {
        Self::from_mode(FilterMode::DisplayExcludingWindows {
            display: display.into(),
            excluded: windows.iter().map(WindowRef::from).collect(),
        })
    }

    /// Capture only some windows of a display. An empty list includes
    /// nothing.
    pub fn including_windows(display: &Display, windows: &[Window]) -> Self {
        Self::from_mode(FilterMode::DisplayIncludingWindows {
            display: display.into(),
            included: windows.iter().map(WindowRef::from).collect(),
        })
    }

    /// Capture the windows of some applications on a display.
    pub fn including_applications(
        display: &Display,
        applications: &[Application],
        excepting_windows: &[Window],
    ) -> Self {
        Self::from_mode(FilterMode::DisplayIncludingApplications {
            display: display.into(),
            applications: applications.iter().map(ApplicationRef::from).collect(),
            excepted: excepting_windows.iter().map(WindowRef::from).collect(),
        })
    }

    /// Capture a single window independent of the display it is on.
    pub fn desktop_independent_window(window: &Window) -> Self {
        Self::from_mode(FilterMode::DesktopIndependentWindow {
            window: window.into(),
        })
    }

    fn from_mode(mode: FilterMode) -> Self {
        Self {
            mode,
            content_rect: None,
        }
    }

    /// Restrict capture to a region of the source, in source coordinates.
    pub fn with_content_rect(mut self, rect: Rect) -> Self {
        self.content_rect = Some(rect);
        self
    }

    pub fn mode(&self) -> &FilterMode {
        &self.mode
    }

    pub fn content_rect(&self) -> Option<Rect> {
        self.content_rect
    }

    /// The display this filter targets, if any.
    pub fn display_id(&self) -> Option<u32> {
        match &self.mode {
            FilterMode::DisplayExcludingWindows { display, .. }
            | FilterMode::DisplayIncludingWindows { display, .. }
            | FilterMode::DisplayIncludingApplications { display, .. } => {
                Some(display.display_id)
            }
            FilterMode::DesktopIndependentWindow { .. } => None,
        }
    }

    /// Natural capture size in pixels.
    pub fn source_size(&self) -> (u32, u32) {
        if let Some(rect) = self.content_rect {
            return rect.pixel_size();
        }

        match &self.mode {
            FilterMode::DisplayExcludingWindows { display, .. }
            | FilterMode::DisplayIncludingWindows { display, .. }
            | FilterMode::DisplayIncludingApplications { display, .. } => {
                (display.width, display.height)
            }
            FilterMode::DesktopIndependentWindow { window } => window.frame.pixel_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::{SimWorld, SimulatedBackend};
    use crate::CaptureBridge;

    #[test]
    fn test_filter_outlives_source_handles() {
        let sim = Arc::new(SimulatedBackend::with_world(SimWorld::default()));
        let bridge = CaptureBridge::new(sim.clone());
        let content = bridge.shareable_content_blocking(Default::default()).unwrap();
        let display = content.displays().get(0).unwrap();
        let windows = content.windows().into_vec();

        let filter = ContentFilter::excluding_windows(&display, &windows[..1]);
        let expected = (display.width(), display.height());

        drop(windows);
        drop(display);
        drop(content);

        assert_eq!(sim.live_objects(), 0);
        assert_eq!(filter.source_size(), expected);
        assert!(filter.display_id().is_some());
    }

    #[test]
    fn test_empty_window_lists_are_valid() {
        let sim = Arc::new(SimulatedBackend::with_world(SimWorld::default()));
        let bridge = CaptureBridge::new(sim);
        let content = bridge.shareable_content_blocking(Default::default()).unwrap();
        let display = content.displays().get(0).unwrap();

        let filter = ContentFilter::including_windows(&display, &[]);
        match filter.mode() {
            FilterMode::DisplayIncludingWindows { included, .. } => assert!(included.is_empty()),
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn test_window_filter_uses_window_frame() {
        let sim = Arc::new(SimulatedBackend::with_world(SimWorld::default()));
        let bridge = CaptureBridge::new(sim);
        let content = bridge.shareable_content_blocking(Default::default()).unwrap();
        let window = content.windows().get(0).unwrap();

        let filter = ContentFilter::desktop_independent_window(&window);
        assert_eq!(filter.source_size(), window.frame().pixel_size());
        assert_eq!(filter.display_id(), None);

        let cropped = filter.with_content_rect(Rect::new(0.0, 0.0, 320.0, 200.0));
        assert_eq!(cropped.source_size(), (320, 200));
    }
}
