use crate::config::{ProductConfig, ProductName};
use spinframe::sequence::SequenceError;
use spinframe::{
    AssetFetcher, Channel, FrameAddress, FrameSequence, InputEvent, InputResponse, Listeners,
    PreloadProgress, Preloader, SpinController,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("{name} is still loading ({progress})")]
    NotReady {
        name: ProductName,
        progress: PreloadProgress,
    },
}

/// One product on screen: a spin controller gated on its preloaded frames.
pub struct ViewerSession<F: AssetFetcher> {
    product: ProductConfig,
    sequence: FrameSequence,
    controller: SpinController,
    preloader: Preloader<F>,
}

impl<F: AssetFetcher> ViewerSession<F> {
    /// Opens `product` and starts preloading its frames. Needs a tokio runtime.
    pub fn open(
        product: ProductConfig,
        fetcher: Arc<F>,
        timeout: Option<Duration>,
    ) -> Result<Self, SessionError> {
        let sequence = product.sequence()?;
        let controller =
            SpinController::new(sequence.total_frames(), product.rig, Listeners::new());
        let mut preloader = Preloader::new(fetcher).with_timeout(timeout);
        preloader.activate(&sequence);

        log::info!(
            "Opened {} ({} frames, {} rig)",
            product.name,
            sequence.total_frames(),
            product.rig
        );

        Ok(Self {
            product,
            sequence,
            controller,
            preloader,
        })
    }

    pub fn product(&self) -> &ProductConfig {
        &self.product
    }

    pub fn listeners(&self) -> &Listeners {
        self.controller.listeners()
    }

    pub fn progress(&self) -> PreloadProgress {
        self.preloader.progress()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreloadProgress> {
        self.preloader.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.preloader.is_ready()
    }

    pub fn current_frame(&self) -> usize {
        self.controller.current_frame()
    }

    pub fn current_address(&self) -> FrameAddress {
        self.sequence.address(self.controller.current_frame())
    }

    /// Routes input to the controller once every frame has been attempted.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<InputResponse, SessionError> {
        if !self.is_ready() {
            return Err(SessionError::NotReady {
                name: self.product.name.clone(),
                progress: self.progress(),
            });
        }
        Ok(self.controller.handle(event))
    }

    /// Applies an updated registry entry for the open product. Returns `true` when the
    /// controller was rebuilt, which restarts it at frame 0.
    pub fn reconfigure(&mut self, product: ProductConfig) -> Result<bool, SessionError> {
        let sequence = product.sequence()?;
        let sequence_changed = sequence != self.sequence;
        let rebuild = sequence_changed || product.rig != self.controller.rig();

        if rebuild {
            self.controller.teardown();
            self.controller =
                SpinController::new(sequence.total_frames(), product.rig, Listeners::new());
        }
        if sequence_changed {
            log::info!(
                "{} changed to {} frames, preloading again",
                product.name,
                sequence.total_frames()
            );
            self.preloader.activate(&sequence);
            self.sequence = sequence;
        }
        self.product = product;
        Ok(rebuild)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            name: self.product.name.clone(),
            frame: self.current_frame(),
            total: self.sequence.total_frames(),
            address: self.current_address(),
            progress: self.progress(),
            dragging: self.controller.is_dragging(),
            listeners: self.listeners().attached(),
        }
    }

    pub fn teardown(mut self) {
        self.controller.teardown();
        self.preloader.shutdown();
        log::info!("Closed {}", self.product.name);
    }
}

#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub name: ProductName,
    pub frame: usize,
    pub total: usize,
    pub address: FrameAddress,
    pub progress: PreloadProgress,
    pub dragging: bool,
    pub listeners: Vec<Channel>,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: frame {}/{} {}",
            self.name,
            self.frame + 1,
            self.total,
            self.address
        )?;
        writeln!(
            f,
            "preload {} {}",
            self.progress,
            if self.progress.ready { "ready" } else { "loading" }
        )?;
        let listeners: Vec<String> = self.listeners.iter().map(|c| c.to_string()).collect();
        write!(
            f,
            "{} listeners: {}",
            if self.dragging { "dragging" } else { "idle" },
            if listeners.is_empty() {
                "none".to_string()
            } else {
                listeners.join(",")
            }
        )
    }
}
