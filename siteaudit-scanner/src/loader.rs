use crate::error::Result;
use crate::render::PageRenderer;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Unloaded,
    Loading,
    Loaded,
}

pub type RendererFactory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn PageRenderer>>> + Send + Sync>;

/// Starts a renderer on first use and hands the same instance to every later
/// caller. Concurrent first calls share one in-flight launch. A failed launch
/// returns to `Unloaded` so the next call tries again.
pub struct BrowserLoader {
    state: Mutex<LoaderState>,
    renderer: OnceCell<Arc<dyn PageRenderer>>,
    factory: RendererFactory,
}

impl BrowserLoader {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn PageRenderer>>> + Send + 'static,
    {
        Self {
            state: Mutex::new(LoaderState::Unloaded),
            renderer: OnceCell::new(),
            factory: Box::new(move || -> BoxFuture<'static, Result<Arc<dyn PageRenderer>>> {
                Box::pin(factory())
            }),
        }
    }

    /// A loader that is already holding `renderer`.
    pub fn preloaded(renderer: Arc<dyn PageRenderer>) -> Self {
        let loader = Self::new(|| async {
            Err::<Arc<dyn PageRenderer>, _>(crate::error::ScanError::Other(
                "preloaded renderer has no factory".to_string(),
            ))
        });
        let _ = loader.renderer.set(renderer);
        loader.set_state(LoaderState::Loaded);
        loader
    }

    pub fn state(&self) -> LoaderState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(LoaderState::Unloaded)
    }

    fn set_state(&self, next: LoaderState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn PageRenderer>> {
        let renderer = self
            .renderer
            .get_or_try_init(|| async {
                debug!("Launching renderer");
                self.set_state(LoaderState::Loading);
                match (self.factory)().await {
                    Ok(renderer) => {
                        self.set_state(LoaderState::Loaded);
                        Ok(renderer)
                    }
                    Err(e) => {
                        warn!("Renderer launch failed: {}", e);
                        self.set_state(LoaderState::Unloaded);
                        Err(e)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(renderer))
    }

    /// Shut the renderer down if it was ever started.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(renderer) = self.renderer.get() {
            renderer.shutdown().await?;
        }
        Ok(())
    }
}
