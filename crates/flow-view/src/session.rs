//! Fetch-and-render tasks with superseding cancellation.
//!
//! Every [`ViewSession::request`] cancels the request before it. A cancelled
//! task stops at its next checkpoint and never touches the canvas, so a
//! slow response for an old block cannot overwrite a newer one.

use std::sync::Arc;

use eyre::{eyre, Context};
use flow_graph::{Scene, Viewport};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::RecordSource;
use crate::layout::{Canvas, Layout};

/// Outcome of one request that was not superseded.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    Rendered {
        block: u64,
        nodes: usize,
        links: usize,
        ticks: usize,
    },
    Failed {
        block: u64,
        message: String,
    },
}

/// Layout on screen, tagged with the request that produced it.
struct Shown {
    generation: u64,
    layout: Layout,
}

/// Request tasks and drags lock `canvas` before `shown`.
pub struct ViewSession {
    source: Arc<dyn RecordSource>,
    canvas: Arc<Mutex<Box<dyn Canvas>>>,
    shown: Arc<Mutex<Option<Shown>>>,
    viewport: Viewport,
    generation: u64,
    in_flight: Option<CancellationToken>,
    events: mpsc::UnboundedSender<ViewEvent>,
}

impl ViewSession {
    pub fn new(
        source: Arc<dyn RecordSource>,
        canvas: Box<dyn Canvas>,
        viewport: Viewport,
    ) -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            source,
            canvas: Arc::new(Mutex::new(canvas)),
            shown: Arc::new(Mutex::new(None)),
            viewport,
            generation: 0,
            in_flight: None,
            events,
        };
        (session, receiver)
    }

    /// Fetch and render `block`, superseding any request still in flight.
    pub fn request(&mut self, block: u64) -> JoinHandle<()> {
        let token = CancellationToken::new();
        if let Some(previous) = self.in_flight.replace(token.clone()) {
            previous.cancel();
        }
        self.generation += 1;
        let generation = self.generation;

        let source = self.source.clone();
        let canvas = self.canvas.clone();
        let shown = self.shown.clone();
        let events = self.events.clone();
        let viewport = self.viewport;

        tokio::spawn(async move {
            let fetched = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(block, "request superseded while fetching");
                    return;
                }
                result = source.records(block) => result,
            };

            let outcome = match fetched {
                Ok(records) => {
                    let laid_out = tokio::task::spawn_blocking(move || {
                        let mut layout = Layout::new(block, &records, viewport);
                        let ticks = layout.settle();
                        (layout, ticks)
                    })
                    .await;
                    match laid_out {
                        Ok(result) => Ok(result),
                        Err(e) => Err(format!("layout task failed: {e}")),
                    }
                }
                Err(e) => Err(e.to_string()),
            };

            let mut canvas = canvas.lock().await;
            if token.is_cancelled() {
                tracing::debug!(block, "request superseded before drawing");
                return;
            }

            let event = match outcome {
                Ok((layout, ticks)) => {
                    let event = ViewEvent::Rendered {
                        block,
                        nodes: layout.graph().node_count(),
                        links: layout.graph().link_count(),
                        ticks,
                    };
                    match canvas.present(&layout.to_svg()) {
                        Ok(()) => {
                            *shown.lock().await = Some(Shown { generation, layout });
                            event
                        }
                        Err(e) => ViewEvent::Failed {
                            block,
                            message: format!("{e:#}"),
                        },
                    }
                }
                Err(message) => {
                    tracing::error!(block, "failed to load block: {}", message);
                    *shown.lock().await = None;
                    let error_svg = Scene::error(message.clone()).to_svg(&viewport);
                    if let Err(e) = canvas.present(&error_svg) {
                        tracing::error!(block, "failed to draw error: {:#}", e);
                    }
                    ViewEvent::Failed { block, message }
                }
            };

            if events.send(event).is_err() {
                tracing::debug!(block, "no listener for view events");
            }
        })
    }

    /// Cancel the request in flight, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }

    /// Drag a node of the block currently on screen and redraw.
    ///
    /// Refused while a newer request is in flight, since its block is about
    /// to replace the one on screen.
    pub async fn drag(&self, address: &str, x: f64, y: f64) -> eyre::Result<()> {
        let mut canvas = self.canvas.lock().await;
        let mut slot = self.shown.lock().await;
        let Shown { generation, layout } =
            slot.take().ok_or_else(|| eyre!("no block is rendered yet"))?;

        if generation != self.generation {
            let block = layout.block_number();
            *slot = Some(Shown { generation, layout });
            return Err(eyre!("block {block} is being replaced by a newer request"));
        }

        let address = address.to_string();
        let (layout, dragged) = tokio::task::spawn_blocking(move || {
            let mut layout = layout;
            let dragged = layout.drag(&address, x, y);
            (layout, dragged)
        })
        .await
        .wrap_err("drag task failed")?;

        let svg = dragged.map(|()| layout.to_svg());
        *slot = Some(Shown { generation, layout });
        drop(slot);
        canvas.present(&svg?)
    }

    /// Block number of the layout currently on screen.
    pub async fn rendered_block(&self) -> Option<u64> {
        self.shown
            .lock()
            .await
            .as_ref()
            .map(|shown| shown.layout.block_number())
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        self.cancel();
    }
}
