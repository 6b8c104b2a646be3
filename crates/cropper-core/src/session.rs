//! Background setup and export for one crop screen.
//!
//! [`CropSession`] is driven from the host's UI thread. Decoding the preview
//! and exporting the crop both run on named worker threads; their results
//! come back over a channel and are only applied, and reported to the
//! callback, when the host calls [`CropSession::poll`]. Workers never touch
//! the controller.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CropConfig, EngineSettings};
use crate::decode::{ByteSource, Orientation, SourceImage};
use crate::error::{CropError, Result};
use crate::export::{ExportPipeline, ExportSummary};
use crate::preview::{PreviewImage, PreviewSize};
use crate::viewport::ViewportController;

/// A setup was requested while another one was still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a setup task is already running")]
pub struct SessionBusy;

/// Lifecycle of one background task.
#[derive(Debug)]
pub enum TaskEvent<T> {
    Started,
    Finished(T),
    Failed(CropError),
}

/// What a successful setup produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupSummary {
    /// Stored source size.
    pub source_width: u32,
    pub source_height: u32,
    pub orientation: Orientation,
    /// Oriented preview size.
    pub preview_width: u32,
    pub preview_height: u32,
    pub sample_size: u32,
}

/// Events delivered to the session callback.
#[derive(Debug)]
pub enum SessionEvent {
    Setup(TaskEvent<SetupSummary>),
    Export(TaskEvent<ExportSummary>),
}

/// What the host asks setup to do.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub source: Arc<dyn ByteSource>,
    /// Bounds the preview bitmap is decoded to fill.
    pub preview_width: u32,
    pub preview_height: u32,
    /// Size of the on-screen viewport the preview is fitted into.
    pub viewport_width: f64,
    pub viewport_height: f64,
}

/// Messages sent from worker threads back to the session.
enum TaskResult {
    Setup {
        viewport: (f64, f64),
        result: Result<(SourceImage, PreviewImage)>,
    },
    Export(Result<ExportSummary>),
}

type Callback = Box<dyn FnMut(SessionEvent)>;

/// One crop screen: source, controller and its background tasks.
pub struct CropSession {
    config: CropConfig,
    settings: EngineSettings,
    callback: Callback,
    source: Option<SourceImage>,
    controller: Option<ViewportController>,
    setup_busy: bool,
    export_busy: bool,
    result_tx: Sender<TaskResult>,
    result_rx: Receiver<TaskResult>,
}

impl fmt::Debug for CropSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CropSession")
            .field("config", &self.config)
            .field("source", &self.source)
            .field("has_controller", &self.controller.is_some())
            .field("setup_busy", &self.setup_busy)
            .field("export_busy", &self.export_busy)
            .finish()
    }
}

impl CropSession {
    /// Create a session. `callback` runs on the thread that calls
    /// [`setup`](Self::setup), [`export`](Self::export) and
    /// [`poll`](Self::poll).
    ///
    /// # Errors
    ///
    /// Returns `CropError::InvalidInput` if either configuration is invalid.
    pub fn new(
        config: CropConfig,
        settings: EngineSettings,
        callback: impl FnMut(SessionEvent) + 'static,
    ) -> Result<Self> {
        config.validate()?;
        settings.validate()?;

        let (result_tx, result_rx) = mpsc::channel();
        Ok(Self {
            config,
            settings,
            callback: Box::new(callback),
            source: None,
            controller: None,
            setup_busy: false,
            export_busy: false,
            result_tx,
            result_rx,
        })
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    /// The interactive controller, once setup has finished.
    pub fn controller(&self) -> Option<&ViewportController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut ViewportController> {
        self.controller.as_mut()
    }

    pub fn is_setup_running(&self) -> bool {
        self.setup_busy
    }

    pub fn is_export_running(&self) -> bool {
        self.export_busy
    }

    /// Probe the source and build its preview in the background.
    ///
    /// # Errors
    ///
    /// Returns [`SessionBusy`] if a setup is already running. Failures of
    /// the task itself arrive through the callback.
    pub fn setup(&mut self, request: SetupRequest) -> std::result::Result<(), SessionBusy> {
        if self.setup_busy {
            warn!("setup requested while another is running");
            return Err(SessionBusy);
        }

        let tx = self.result_tx.clone();
        let settings = self.settings.clone();
        let spawned = thread::Builder::new()
            .name("cropper-setup".into())
            .spawn(move || {
                let viewport = (request.viewport_width, request.viewport_height);
                let result = guarded("setup", || run_setup(&request, &settings));
                let _ = tx.send(TaskResult::Setup { viewport, result });
            });

        match spawned {
            Ok(_) => {
                self.setup_busy = true;
                debug!("setup task started");
                self.emit(SessionEvent::Setup(TaskEvent::Started));
            }
            Err(e) => {
                self.emit(SessionEvent::Setup(TaskEvent::Failed(e.into())));
            }
        }
        Ok(())
    }

    /// Export the current crop in the background.
    ///
    /// Returns false without doing anything if an export is already running
    /// or setup has not finished.
    pub fn export(&mut self) -> bool {
        if self.export_busy {
            debug!("export already running, ignoring request");
            return false;
        }
        let (Some(source), Some(controller)) = (&self.source, &self.controller) else {
            warn!("export requested before setup finished");
            return false;
        };

        let crop_rect = controller.crop_rect();
        let pipeline = ExportPipeline::new(source.clone(), self.settings.clone());
        let config = self.config.clone();
        let tx = self.result_tx.clone();

        let spawned = thread::Builder::new()
            .name("cropper-export".into())
            .spawn(move || {
                let result = guarded("export", || pipeline.run(crop_rect, &config));
                let _ = tx.send(TaskResult::Export(result));
            });

        match spawned {
            Ok(_) => {
                self.export_busy = true;
                info!(
                    x = crop_rect.x,
                    y = crop_rect.y,
                    width = crop_rect.width,
                    height = crop_rect.height,
                    "export task started"
                );
                self.emit(SessionEvent::Export(TaskEvent::Started));
                true
            }
            Err(e) => {
                self.emit(SessionEvent::Export(TaskEvent::Failed(e.into())));
                false
            }
        }
    }

    /// Apply every finished task without blocking. Returns how many were
    /// handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(result) = self.result_rx.try_recv() {
            self.handle(result);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for a task to finish, then drain any others.
    pub fn poll_timeout(&mut self, timeout: Duration) -> usize {
        if !self.setup_busy && !self.export_busy {
            return self.poll();
        }
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => {
                self.handle(result);
                1 + self.poll()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Drop the controller and its preview.
    pub fn close(mut self) {
        if let Some(controller) = self.controller.take() {
            controller.release();
        }
    }

    fn handle(&mut self, result: TaskResult) {
        match result {
            TaskResult::Setup { viewport, result } => {
                self.setup_busy = false;
                match result {
                    Ok((source, preview)) => self.finish_setup(source, preview, viewport),
                    Err(e) => {
                        warn!(error = %e, "setup failed");
                        self.emit(SessionEvent::Setup(TaskEvent::Failed(e)));
                    }
                }
            }
            TaskResult::Export(result) => {
                self.export_busy = false;
                let event = match result {
                    Ok(summary) => TaskEvent::Finished(summary),
                    Err(e) => {
                        warn!(error = %e, "export failed");
                        TaskEvent::Failed(e)
                    }
                };
                self.emit(SessionEvent::Export(event));
            }
        }
    }

    fn finish_setup(&mut self, source: SourceImage, preview: PreviewImage, viewport: (f64, f64)) {
        let summary = SetupSummary {
            source_width: source.width(),
            source_height: source.height(),
            orientation: source.orientation(),
            preview_width: preview.width(),
            preview_height: preview.height(),
            sample_size: preview.sample_size(),
        };

        if let Some(old) = self.controller.take() {
            old.release();
        }
        self.controller = Some(ViewportController::new(
            preview,
            viewport.0,
            viewport.1,
            self.config.aspect(),
            &self.settings,
        ));
        self.source = Some(source);

        info!(
            width = summary.preview_width,
            height = summary.preview_height,
            sample_size = summary.sample_size,
            "setup finished"
        );
        self.emit(SessionEvent::Setup(TaskEvent::Finished(summary)));
    }

    fn emit(&mut self, event: SessionEvent) {
        (self.callback)(event);
    }
}

/// Run a worker body, turning a panic into a failed result so the
/// session's busy flag is always cleared.
fn guarded<T>(task: &str, body: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|_| {
        warn!(task, "worker panicked");
        Err(CropError::DecodeFailure(format!("{task} task panicked")))
    })
}

fn run_setup(
    request: &SetupRequest,
    settings: &EngineSettings,
) -> Result<(SourceImage, PreviewImage)> {
    if !(request.viewport_width > 0.0 && request.viewport_height > 0.0) {
        return Err(CropError::InvalidInput(format!(
            "viewport must be positive, got {}x{}",
            request.viewport_width, request.viewport_height
        )));
    }
    let size = PreviewSize::new(
        request.preview_width,
        request.preview_height,
        settings.max_texture_size,
    )?;
    let source = SourceImage::probe(Arc::clone(&request.source))?;
    let preview = PreviewImage::build(&source, size, settings)?;
    Ok((source, preview))
}
