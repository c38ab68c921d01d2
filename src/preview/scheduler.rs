use super::assemble::assemble;
use super::handles::ContentHandles;
use super::rewrite::{AssetRewriter, QuotedLiteralRewriter};
use crate::state::FileItem;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One published preview. A host must discard its execution context
/// whenever `generation` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub generation: u64,
    pub document: String,
}

/// Owns the handles of the current generation.
pub struct Generations<H: ContentHandles> {
    handles: H,
    rewriter: Box<dyn AssetRewriter>,
    live: Vec<String>,
    generation: u64,
}

impl<H: ContentHandles> Generations<H> {
    pub fn new(handles: H) -> Self {
        Self::with_rewriter(handles, Box::new(QuotedLiteralRewriter))
    }

    pub fn with_rewriter(handles: H, rewriter: Box<dyn AssetRewriter>) -> Self {
        Self {
            handles,
            rewriter,
            live: Vec::new(),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Releases the previous generation, then assembles the next one.
    pub fn rebuild(&mut self, files: &[FileItem]) -> PreviewFrame {
        self.release_all();
        let assembly = assemble(files, &mut self.handles, self.rewriter.as_ref());
        self.live = assembly.handles;
        self.generation += 1;
        tracing::info!(
            generation = self.generation,
            handles = self.live.len(),
            "preview generation built"
        );
        PreviewFrame {
            generation: self.generation,
            document: assembly.document,
        }
    }

    fn release_all(&mut self) {
        for handle in self.live.drain(..) {
            self.handles.release(&handle);
        }
    }
}

impl<H: ContentHandles> Drop for Generations<H> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Debounced single-flight rebuilds on a background task.
///
/// Every [`schedule`](Self::schedule) restarts the delay; only the latest file
/// set is built once the delay passes without another change.
pub struct PreviewScheduler {
    files_tx: mpsc::UnboundedSender<Vec<FileItem>>,
    frames: watch::Receiver<Option<PreviewFrame>>,
    task: JoinHandle<()>,
}

impl PreviewScheduler {
    pub fn spawn<H>(generations: Generations<H>, debounce: Duration) -> Self
    where
        H: ContentHandles + 'static,
    {
        let (files_tx, files_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames) = watch::channel(None);
        let task = tokio::spawn(run(generations, debounce, files_rx, frames_tx));
        Self {
            files_tx,
            frames,
            task,
        }
    }

    pub fn schedule(&self, files: Vec<FileItem>) {
        if self.files_tx.send(files).is_err() {
            tracing::warn!("preview scheduler stopped; change dropped");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PreviewFrame>> {
        self.frames.clone()
    }

    /// Drops any not-yet-built change and releases every live handle.
    pub async fn shutdown(self) {
        let Self { files_tx, task, .. } = self;
        drop(files_tx);
        if let Err(error) = task.await {
            tracing::warn!(%error, "preview scheduler task failed");
        }
    }
}

async fn run<H: ContentHandles>(
    mut generations: Generations<H>,
    debounce: Duration,
    mut files_rx: mpsc::UnboundedReceiver<Vec<FileItem>>,
    frames_tx: watch::Sender<Option<PreviewFrame>>,
) {
    let mut pending: Option<Vec<FileItem>> = None;
    let timer = tokio::time::sleep(debounce);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            change = files_rx.recv() => match change {
                Some(files) => {
                    pending = Some(files);
                    timer.as_mut().reset(Instant::now() + debounce);
                }
                None => break,
            },
            _ = &mut timer, if pending.is_some() => {
                if let Some(files) = pending.take() {
                    let frame = generations.rebuild(&files);
                    frames_tx.send_replace(Some(frame));
                }
            }
        }
    }
}
