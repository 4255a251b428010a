//! Entry point for callers of the capture boundary.

use std::fmt;
use std::sync::Arc;

use scbridge_types::{BridgeSettings, ContentOptions};
use tracing::{debug, info, instrument};

use crate::completion::{self, Correlator, Operation};
use crate::configuration::StreamConfiguration;
use crate::content::ContentSnapshot;
use crate::error::{CaptureError, NativeError};
use crate::filter::ContentFilter;
use crate::handle::{HandleKind, HandleRegistry};
use crate::native::{ContentRecord, ImageRecord, NativeBackend};
use crate::screenshot::CapturedImage;
use crate::stream::{ErrorHandler, Stream};
use crate::CaptureResult;

/// Handle to a native capture backend.
///
/// Cheap to clone; clones share the handle registry and request correlator.
#[derive(Clone)]
pub struct CaptureBridge {
    backend: Arc<dyn NativeBackend>,
    registry: Arc<HandleRegistry>,
    correlator: Correlator,
    settings: Arc<BridgeSettings>,
}

impl CaptureBridge {
    pub fn new(backend: Arc<dyn NativeBackend>) -> Self {
        Self::with_settings(backend, BridgeSettings::default())
    }

    pub fn with_settings(backend: Arc<dyn NativeBackend>, settings: BridgeSettings) -> Self {
        info!(backend = backend.name(), ?settings, "Capture bridge created");
        Self {
            registry: HandleRegistry::new(Arc::clone(&backend)),
            backend,
            correlator: Correlator::new(),
            settings: Arc::new(settings),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Registry of every native handle this bridge owns.
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Outstanding native requests.
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Enumerate shareable displays, windows and applications.
    #[instrument(skip(self, completion))]
    pub fn shareable_content<F>(&self, options: ContentOptions, completion: F)
    where
        F: FnOnce(CaptureResult<ContentSnapshot>) + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let native = self
            .correlator
            .issue(Operation::ShareableContent, move |result| {
                completion(result.map(|record: ContentRecord| {
                    ContentSnapshot::from_record(&registry, record)
                }))
            });
        self.backend.shareable_content(options, native);
    }

    /// Enumerate shareable content and wait for the result.
    pub fn shareable_content_blocking(
        &self,
        options: ContentOptions,
    ) -> CaptureResult<ContentSnapshot> {
        let (callback, rx) = completion::channel();
        self.shareable_content(options, callback);
        rx.recv().map_err(|_| CaptureError::ChannelDisconnected)?
    }

    /// Create a stream. Native rejections are reported here, synchronously.
    pub fn create_stream(
        &self,
        filter: &ContentFilter,
        configuration: &StreamConfiguration,
    ) -> CaptureResult<Stream> {
        self.build_stream(filter, configuration, None)
    }

    /// Create a stream with a handler for native failure events.
    ///
    /// The handler runs on a native thread, once per failure event.
    pub fn create_stream_with_error_handler<H>(
        &self,
        filter: &ContentFilter,
        configuration: &StreamConfiguration,
        handler: H,
    ) -> CaptureResult<Stream>
    where
        H: Fn(NativeError) + Send + Sync + 'static,
    {
        self.build_stream(filter, configuration, Some(Box::new(handler)))
    }

    #[instrument(skip_all)]
    fn build_stream(
        &self,
        filter: &ContentFilter,
        configuration: &StreamConfiguration,
        error_handler: Option<ErrorHandler>,
    ) -> CaptureResult<Stream> {
        let filter_handle = self
            .registry
            .adopt(HandleKind::Filter, self.backend.create_filter(filter)?);
        let configuration_handle = self.registry.adopt(
            HandleKind::Configuration,
            self.backend.create_configuration(configuration)?,
        );

        debug!(
            width = configuration.width(),
            height = configuration.height(),
            "Creating stream"
        );

        Stream::create(
            Arc::clone(&self.backend),
            Arc::clone(&self.registry),
            self.correlator.clone(),
            &self.settings,
            filter.clone(),
            filter_handle,
            configuration.clone(),
            configuration_handle,
            error_handler,
        )
    }

    /// Capture a single image of the filtered content.
    #[instrument(skip_all)]
    pub fn capture_image<F>(
        &self,
        filter: &ContentFilter,
        configuration: &StreamConfiguration,
        completion: F,
    ) where
        F: FnOnce(CaptureResult<CapturedImage>) + Send + 'static,
    {
        let handles = self.backend.create_filter(filter).and_then(|filter_token| {
            let filter_handle = self.registry.adopt(HandleKind::Filter, filter_token);
            let configuration_token = self.backend.create_configuration(configuration)?;
            let configuration_handle = self
                .registry
                .adopt(HandleKind::Configuration, configuration_token);
            Ok((filter_handle, configuration_handle))
        });

        let (filter_handle, configuration_handle) = match handles {
            Ok(handles) => handles,
            Err(err) => {
                completion(Err(err.into()));
                return;
            }
        };

        let filter_token = filter_handle.token();
        let configuration_token = configuration_handle.token();
        let registry = Arc::clone(&self.registry);
        let native = self.correlator.issue(Operation::CaptureImage, move |result| {
            // The request objects are only needed until the capture finishes.
            drop(filter_handle);
            drop(configuration_handle);
            completion(result.map(|record: ImageRecord| {
                let handle = registry.adopt(HandleKind::Image, record.token);
                CapturedImage::new(handle, record.width, record.height, record.data)
            }))
        });
        self.backend
            .capture_image(filter_token, configuration_token, native);
    }
}

impl fmt::Debug for CaptureBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureBridge")
            .field("backend", &self.backend.name())
            .field("registry", &self.registry)
            .field("correlator", &self.correlator)
            .finish()
    }
}
