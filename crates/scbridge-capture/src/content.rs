//! Shareable content: displays, windows and running applications.
//!
//! A [`ContentSnapshot`] owns its native snapshot handle. Each element it
//! hands out owns its own native reference, so elements stay valid after the
//! snapshot or the array they came from is dropped.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use scbridge_types::Rect;

use crate::error::CaptureError;
use crate::handle::{HandleId, HandleKind, HandleRegistry, OwnedHandle};
use crate::native::{ApplicationRecord, ContentRecord, DisplayRecord, WindowRecord};
use crate::CaptureResult;

struct DisplayInner {
    handle: OwnedHandle,
    display_id: u32,
    width: u32,
    height: u32,
    frame: Rect,
}

/// A display that can be captured.
#[derive(Clone)]
pub struct Display {
    inner: Arc<DisplayInner>,
}

impl Display {
    fn adopt(registry: &Arc<HandleRegistry>, record: DisplayRecord) -> Self {
        Self {
            inner: Arc::new(DisplayInner {
                handle: registry.adopt(HandleKind::Display, record.token),
                display_id: record.display_id,
                width: record.width,
                height: record.height,
                frame: record.frame,
            }),
        }
    }

    /// Platform display id.
    pub fn display_id(&self) -> u32 {
        self.inner.display_id
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.inner.height
    }

    /// Frame in global screen coordinates.
    pub fn frame(&self) -> Rect {
        self.inner.frame
    }

    /// Registry id of the native reference this element owns.
    pub fn handle_id(&self) -> HandleId {
        self.inner.handle.id()
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("display_id", &self.inner.display_id)
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .finish()
    }
}

struct WindowInner {
    handle: OwnedHandle,
    window_id: u32,
    title: Option<String>,
    frame: Rect,
    on_screen: bool,
    layer: i32,
    active: bool,
    owner_pid: Option<i32>,
}

/// A window that can be captured.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

impl Window {
    fn adopt(registry: &Arc<HandleRegistry>, record: WindowRecord) -> Self {
        Self {
            inner: Arc::new(WindowInner {
                handle: registry.adopt(HandleKind::Window, record.token),
                window_id: record.window_id,
                title: record.title,
                frame: record.frame,
                on_screen: record.on_screen,
                layer: record.layer,
                active: record.active,
                owner_pid: record.owner_pid,
            }),
        }
    }

    pub fn window_id(&self) -> u32 {
        self.inner.window_id
    }

    /// Window title. Some windows have none.
    pub fn title(&self) -> Option<String> {
        self.inner.title.clone()
    }

    pub fn frame(&self) -> Rect {
        self.inner.frame
    }

    pub fn is_on_screen(&self) -> bool {
        self.inner.on_screen
    }

    /// Window layer. Normal application windows are at layer 0.
    pub fn window_layer(&self) -> i32 {
        self.inner.layer
    }

    pub fn is_active(&self) -> bool {
        self.inner.active
    }

    /// Process id of the owning application, if known.
    pub fn owner_pid(&self) -> Option<i32> {
        self.inner.owner_pid
    }

    /// Registry id of the native reference this element owns.
    pub fn handle_id(&self) -> HandleId {
        self.inner.handle.id()
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("window_id", &self.inner.window_id)
            .field("title", &self.inner.title)
            .field("on_screen", &self.inner.on_screen)
            .finish()
    }
}

struct ApplicationInner {
    handle: OwnedHandle,
    bundle_identifier: String,
    application_name: String,
    process_id: i32,
}

/// A running application.
#[derive(Clone)]
pub struct Application {
    inner: Arc<ApplicationInner>,
}

impl Application {
    fn adopt(registry: &Arc<HandleRegistry>, record: ApplicationRecord) -> Self {
        Self {
            inner: Arc::new(ApplicationInner {
                handle: registry.adopt(HandleKind::Application, record.token),
                bundle_identifier: record.bundle_identifier,
                application_name: record.application_name,
                process_id: record.process_id,
            }),
        }
    }

    pub fn bundle_identifier(&self) -> String {
        self.inner.bundle_identifier.clone()
    }

    pub fn application_name(&self) -> String {
        self.inner.application_name.clone()
    }

    pub fn process_id(&self) -> i32 {
        self.inner.process_id
    }

    /// Registry id of the native reference this element owns.
    pub fn handle_id(&self) -> HandleId {
        self.inner.handle.id()
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("bundle_identifier", &self.inner.bundle_identifier)
            .field("process_id", &self.inner.process_id)
            .finish()
    }
}

/// Owned collection of content elements.
///
/// Elements are reference counted: taking one out keeps it alive after the
/// array is dropped, and dropping an element leaves the array intact.
#[derive(Debug, Clone)]
pub struct HandleArray<T> {
    items: Vec<T>,
}

impl<T: Clone> HandleArray<T> {
    fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`, as a new owned reference.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.get(index).cloned()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Index<usize> for HandleArray<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> IntoIterator for HandleArray<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a HandleArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Point-in-time enumeration of shareable content.
pub struct ContentSnapshot {
    handle: OwnedHandle,
    displays: Vec<Display>,
    windows: Vec<Window>,
    applications: Vec<Application>,
}

impl ContentSnapshot {
    /// Adopt every reference carried by a content record.
    pub(crate) fn from_record(registry: &Arc<HandleRegistry>, record: ContentRecord) -> Self {
        let ContentRecord {
            token,
            displays,
            windows,
            applications,
        } = record;

        Self {
            handle: registry.adopt(HandleKind::ContentSnapshot, token),
            displays: displays
                .into_iter()
                .map(|d| Display::adopt(registry, d))
                .collect(),
            windows: windows
                .into_iter()
                .map(|w| Window::adopt(registry, w))
                .collect(),
            applications: applications
                .into_iter()
                .map(|a| Application::adopt(registry, a))
                .collect(),
        }
    }

    pub fn displays(&self) -> HandleArray<Display> {
        HandleArray::new(self.displays.clone())
    }

    pub fn windows(&self) -> HandleArray<Window> {
        HandleArray::new(self.windows.clone())
    }

    pub fn applications(&self) -> HandleArray<Application> {
        HandleArray::new(self.applications.clone())
    }

    pub fn find_display(&self, display_id: u32) -> Option<Display> {
        self.displays
            .iter()
            .find(|d| d.display_id() == display_id)
            .cloned()
    }

    pub fn find_window(&self, window_id: u32) -> Option<Window> {
        self.windows
            .iter()
            .find(|w| w.window_id() == window_id)
            .cloned()
    }

    /// Display by id, or an error naming the missing id.
    pub fn display(&self, display_id: u32) -> CaptureResult<Display> {
        self.find_display(display_id)
            .ok_or(CaptureError::UnknownDisplay(display_id))
    }

    /// Window by id, or an error naming the missing id.
    pub fn window(&self, window_id: u32) -> CaptureResult<Window> {
        self.find_window(window_id)
            .ok_or(CaptureError::UnknownWindow(window_id))
    }

    /// Windows owned by the application with the given process id.
    pub fn windows_of(&self, application: &Application) -> HandleArray<Window> {
        HandleArray::new(
            self.windows
                .iter()
                .filter(|w| w.owner_pid() == Some(application.process_id()))
                .cloned()
                .collect(),
        )
    }

    pub fn handle_id(&self) -> HandleId {
        self.handle.id()
    }
}

impl fmt::Debug for ContentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSnapshot")
            .field("handle", &self.handle.id())
            .field("displays", &self.displays.len())
            .field("windows", &self.windows.len())
            .field("applications", &self.applications.len())
            .finish()
    }
}
