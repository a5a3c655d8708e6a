use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::Result;

/// Resources acquired during startup, released in reverse order.
#[derive(Default)]
pub struct Releasers {
    stack: Vec<(&'static str, BoxFuture<'static, Result<()>>)>,
}

impl Releasers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the release of a resource just acquired. The future is not
    /// polled until [`Releasers::release_all`].
    pub fn push<F>(&mut self, name: &'static str, release: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.stack.push((name, release.boxed()));
    }

    /// Release everything, last acquired first. A failing releaser is logged
    /// and the rest still run. Returns the names in release order.
    pub async fn release_all(mut self) -> Vec<&'static str> {
        let mut released = Vec::with_capacity(self.stack.len());
        while let Some((name, release)) = self.stack.pop() {
            tracing::info!("closing {}", name);
            if let Err(e) = release.await {
                tracing::error!("closing {} failed: {}", name, e);
            }
            released.push(name);
        }
        released
    }
}
