use crate::config::AppConfig;
use crate::http::create_app;
use crate::relay::RelayManager;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::log::info;

pub struct App {
    router: Router,
    address: SocketAddr,
}
impl App {
    /// Connects the store and builds the HTTP router. Fails fast so a bad
    /// database path or client configuration never reaches the serve loop.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let relay = RelayManager::connect(config.database, config.whatsapp.clone(), config.model).await?;
        let router = create_app(relay, config.whatsapp.verify_token);

        Ok(Self {
            router,
            address: config.http.address,
        })
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.address).await?;

        info!("Starting HTTP listener @ {}", self.address);
        axum::serve(listener, self.router).await.map_err(Into::into)
    }
}
