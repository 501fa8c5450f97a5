use crate::config::{self, Config, ProductName};
use crate::events::AppEvent;
use crate::session::ViewerSession;
use async_channel::Receiver;
use spinframe::protocol::{Command, Reply};
use spinframe::{AssetFetcher, InputEvent};
use std::sync::Arc;

/// Owns the registry and the open session. Every socket command and reload
/// notification is applied here, one at a time.
pub struct App<F: AssetFetcher> {
    config: Config,
    fetcher: Arc<F>,
    session: Option<ViewerSession<F>>,
}

impl<F: AssetFetcher> App<F> {
    pub fn new(config: Config, fetcher: F) -> Self {
        Self {
            config,
            fetcher: Arc::new(fetcher),
            session: None,
        }
    }

    pub async fn run(mut self, rx: Receiver<AppEvent>) {
        while let Ok(event) = rx.recv().await {
            if !self.update(event) {
                break;
            }
        }
        self.close();
        log::info!("Shutting down");
    }

    /// Returns `false` once the loop should stop.
    pub fn update(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Request { command, reply } => {
                log::debug!("> {command}");
                let response = self.execute(command);
                log::debug!("< {response}");
                // The client may already be gone.
                let _ = reply.send(response);
            }
            AppEvent::ConfigReload => match config::load_config() {
                Ok(new_config) => {
                    self.apply_config(new_config);
                    log::info!("Configuration reloaded");
                }
                Err(e) => log::error!("Failed to reload config: {}", e),
            },
            AppEvent::Shutdown => return false,
        }
        true
    }

    pub fn execute(&mut self, command: Command) -> Reply {
        match command {
            Command::Open(path) => self.open(&path),
            Command::Close => match self.close() {
                Some(name) => Reply::ok(format!("closed {name}")),
                None => Reply::ok("nothing open"),
            },
            Command::Status => match &self.session {
                Some(session) => Reply::ok(session.status()),
                None => Reply::err("no product open"),
            },
            Command::Products => Reply::ok(self.products()),
            Command::Input(event) => self.input(event),
        }
    }

    fn open(&mut self, path: &str) -> Reply {
        let Some(product) = self.config.find_product(path).cloned() else {
            return Reply::err(format!("no product at '{path}'"));
        };
        self.close();

        let total = product.total_frames;
        match ViewerSession::open(
            product,
            Arc::clone(&self.fetcher),
            self.config.fetch_timeout(),
        ) {
            Ok(session) => {
                let reply = Reply::ok(format!(
                    "opened {} ({} frames)",
                    session.product().name,
                    total
                ));
                self.session = Some(session);
                reply
            }
            Err(e) => Reply::err(e),
        }
    }

    fn close(&mut self) -> Option<ProductName> {
        self.session.take().map(|session| {
            let name = session.product().name.clone();
            session.teardown();
            name
        })
    }

    fn input(&mut self, event: InputEvent) -> Reply {
        let Some(session) = self.session.as_mut() else {
            return Reply::err("no product open");
        };
        match session.handle_input(event) {
            Ok(response) => Reply::ok(format!(
                "frame {}/{} {}",
                response.frame + 1,
                session.product().total_frames,
                session.current_address()
            )),
            Err(e) => Reply::err(e),
        }
    }

    fn products(&self) -> String {
        if self.config.products.is_empty() {
            return "no products".to_string();
        }
        self.config
            .products
            .iter()
            .map(|p| {
                let line = match p.thumbnail() {
                    Ok(thumbnail) => format!(
                        "{} {} {} frames {}",
                        p.name, p.path, p.total_frames, thumbnail
                    ),
                    Err(e) => format!("{} {} invalid: {}", p.name, p.path, e),
                };
                if p.description.is_empty() {
                    line
                } else {
                    format!("{line} - {}", p.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Brings the open session in line with a reloaded registry.
    pub fn apply_config(&mut self, new_config: Config) {
        if new_config.origin != self.config.origin {
            log::warn!(
                "Asset origin changed to {}; restart turntable to use it",
                new_config.origin
            );
        }
        if new_config.socket_path != self.config.socket_path {
            log::warn!(
                "Socket path changed to {}; restart turntable to use it",
                new_config.socket_path.display()
            );
        }
        for (product, e) in new_config.invalid_products() {
            log::error!("Product {} is invalid: {}", product.name, e);
        }

        let keep = match self.session.as_mut() {
            None => true,
            Some(session) => match new_config.find_product(session.product().path.as_str()) {
                None => {
                    log::info!("{} was removed from the registry", session.product().name);
                    false
                }
                Some(product) if product == session.product() => true,
                Some(product) => match session.reconfigure(product.clone()) {
                    Ok(rebuilt) => {
                        if rebuilt {
                            log::info!("{} restarted at its first frame", product.name);
                        }
                        true
                    }
                    Err(e) => {
                        log::error!("{} can no longer be shown: {}", product.name, e);
                        false
                    }
                },
            },
        };
        if !keep {
            self.close();
        }
        self.config = new_config;
    }
}
