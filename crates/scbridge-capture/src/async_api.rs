//! Async wrappers over the completion based API.
//!
//! Each wrapper registers a completion that forwards into a
//! `tokio::sync::oneshot` channel. The futures are runtime agnostic apart from
//! the channel itself.

use scbridge_types::ContentOptions;
use tokio::sync::oneshot;

use crate::bridge::CaptureBridge;
use crate::completion::Callback;
use crate::configuration::StreamConfiguration;
use crate::content::ContentSnapshot;
use crate::error::CaptureError;
use crate::filter::ContentFilter;
use crate::screenshot::CapturedImage;
use crate::stream::Stream;
use crate::CaptureResult;

fn oneshot_callback<T: Send + 'static>() -> (Callback<T>, oneshot::Receiver<CaptureResult<T>>) {
    let (tx, rx) = oneshot::channel();
    let callback: Callback<T> = Box::new(move |result| {
        let _ = tx.send(result);
    });
    (callback, rx)
}

async fn wait<T>(rx: oneshot::Receiver<CaptureResult<T>>) -> CaptureResult<T> {
    rx.await.map_err(|_| CaptureError::ChannelDisconnected)?
}

impl CaptureBridge {
    pub async fn shareable_content_async(
        &self,
        options: ContentOptions,
    ) -> CaptureResult<ContentSnapshot> {
        let (callback, rx) = oneshot_callback();
        self.shareable_content(options, callback);
        wait(rx).await
    }

    pub async fn capture_image_async(
        &self,
        filter: &ContentFilter,
        configuration: &StreamConfiguration,
    ) -> CaptureResult<CapturedImage> {
        let (callback, rx) = oneshot_callback();
        self.capture_image(filter, configuration, callback);
        wait(rx).await
    }
}

impl Stream {
    pub async fn start_capture_async(&self) -> CaptureResult<()> {
        let (callback, rx) = oneshot_callback();
        self.start_capture(callback);
        wait(rx).await
    }

    pub async fn stop_capture_async(&self) -> CaptureResult<()> {
        let (callback, rx) = oneshot_callback();
        self.stop_capture(callback);
        wait(rx).await
    }

    pub async fn update_configuration_async(
        &self,
        configuration: StreamConfiguration,
    ) -> CaptureResult<()> {
        let (callback, rx) = oneshot_callback();
        self.update_configuration(configuration, callback);
        wait(rx).await
    }

    pub async fn update_content_filter_async(&self, filter: ContentFilter) -> CaptureResult<()> {
        let (callback, rx) = oneshot_callback();
        self.update_content_filter(filter, callback);
        wait(rx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::{SimWorld, SimulatedBackend};

    #[tokio::test]
    async fn test_async_start_stop() {
        let sim = Arc::new(SimulatedBackend::with_world(SimWorld::default()));
        let bridge = CaptureBridge::new(sim.clone());
        let content = bridge
            .shareable_content_async(ContentOptions::default())
            .await
            .unwrap();
        let display = content.displays().get(0).unwrap();
        let filter = ContentFilter::excluding_windows(&display, &[]);
        let config = StreamConfiguration::new().with_size(320, 240);

        let stream = bridge.create_stream(&filter, &config).unwrap();
        stream.start_capture_async().await.unwrap();
        assert!(stream.state().is_running());

        stream
            .update_configuration_async(config.clone().with_size(640, 480))
            .await
            .unwrap();
        assert_eq!(stream.configuration().width(), 640);

        stream.stop_capture_async().await.unwrap();
        assert!(stream.state().is_stopped());

        drop(stream);
        drop(display);
        drop(content);
        assert_eq!(sim.live_objects(), 0);
    }

    #[tokio::test]
    async fn test_async_screenshot() {
        let sim = Arc::new(SimulatedBackend::with_world(SimWorld::default()));
        let bridge = CaptureBridge::new(sim.clone());
        let content = bridge
            .shareable_content_async(ContentOptions::default())
            .await
            .unwrap();
        let window = content.windows().get(0).unwrap();
        let filter = ContentFilter::desktop_independent_window(&window);
        let config = StreamConfiguration::new().with_size(64, 32);

        let image = bridge.capture_image_async(&filter, &config).await.unwrap();
        assert_eq!((image.width(), image.height()), (64, 32));
        assert_eq!(image.rgba().len(), 64 * 32 * 4);
    }
}
