//! `GamehallServer` builder, HTTP routes, and server loop.
//!
//! One axum router serves the whole surface:
//!
//! | route                       | response                                  |
//! |-----------------------------|-------------------------------------------|
//! | `GET /`                     | WebSocket upgrade, then the join handshake |
//! | `GET /createPlayer`         | a new player ID                           |
//! | `GET /createLobby?playerID` | a new lobby ID, or `400`                  |
//!
//! Every response carries `Access-Control-Allow-Origin: <frontend_host>`.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use gamehall_lobby::GameCatalog;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::{GamehallError, Gateway, GatewayError, ServerConfig};

/// Builder for configuring and starting a Gamehall server.
///
/// # Example
///
/// ```rust,no_run
/// use gamehall::prelude::*;
///
/// # async fn start() -> Result<(), GamehallError> {
/// let server = GamehallServer::builder()
///     .bind("0.0.0.0:8080")
///     .frontend_host("https://play.example.com")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct GamehallServerBuilder {
    config: ServerConfig,
    bind_addr: Option<String>,
    catalog: Option<GameCatalog>,
}

impl GamehallServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            bind_addr: None,
            catalog: None,
        }
    }

    /// Replaces the whole configuration, e.g. with [`ServerConfig::load`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to, overriding the configured
    /// host and port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Sets the allowed cross-origin frontend.
    pub fn frontend_host(mut self, origin: &str) -> Self {
        self.config.frontend_host = origin.to_string();
        self
    }

    /// Sets the games lobbies can start. Defaults to every built-in game.
    pub fn catalog(mut self, catalog: GameCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Binds the listener and assembles the router.
    pub async fn build(self) -> Result<GamehallServer, GamehallError> {
        let addr = self.bind_addr.unwrap_or_else(|| self.config.bind_addr());
        let listener = TcpListener::bind(&addr).await?;

        let catalog = self.catalog.unwrap_or_else(gamehall_games::default_catalog);
        tracing::debug!(games = ?catalog.names(), "game catalog loaded");

        let gateway = Gateway::new(catalog, &self.config);
        let router = router(gateway.clone(), &self.config.frontend_host)?;

        Ok(GamehallServer {
            listener,
            gateway,
            router,
        })
    }
}

impl Default for GamehallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Gamehall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GamehallServer {
    listener: TcpListener,
    gateway: Gateway,
    router: Router,
}

impl GamehallServer {
    /// Creates a new builder.
    pub fn builder() -> GamehallServerBuilder {
        GamehallServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The gateway behind every route.
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The HTTP router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serves connections until the process is terminated.
    pub async fn run(self) -> Result<(), GamehallError> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "gamehall server running");
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

fn router(gateway: Gateway, frontend_host: &str) -> Result<Router, GamehallError> {
    let allow_origin = HeaderValue::from_str(frontend_host)?;

    Ok(Router::new()
        .route("/", get(upgrade))
        .route("/createPlayer", get(create_player))
        .route("/createLobby", get(create_lobby))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            allow_origin,
        ))
        .with_state(gateway))
}

async fn upgrade(State(gateway): State<Gateway>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = gamehall_transport::split(socket);
        gateway.accept(sink, stream).await;
    })
}

async fn create_player(State(gateway): State<Gateway>) -> String {
    gateway.create_player().to_string()
}

#[derive(Debug, Deserialize)]
struct CreateLobbyParams {
    #[serde(rename = "playerID")]
    player_id: Option<String>,
}

async fn create_lobby(
    State(gateway): State<Gateway>,
    Query(params): Query<CreateLobbyParams>,
) -> Result<String, GatewayError> {
    let player_id = params.player_id.ok_or(GatewayError::MissingPlayerId)?;
    let lobby_id = gateway.create_lobby(&player_id)?;
    Ok(lobby_id.to_string())
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "createLobby rejected");
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}
