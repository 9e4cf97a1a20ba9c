//! ==============================================================================
//! server.rs - minimal http request loop
//! ==============================================================================
//!
//! purpose:
//!     serves the telemetry store to the local web page. one request per
//!     connection, one connection at a time:
//!
//!         accept -> read request (bounded, with timeout) -> dispatch -> respond -> close
//!
//!     - request line contains the data marker -> json snapshot
//!     - anything else -> the static page, written in bounded chunks
//!
//!     the store is only touched to copy a snapshot out; formatting and
//!     socket writes happen after the lock is released.
//!
//! relationships:
//!     - reads: store.rs (TelemetryStore::read_snapshot)
//!     - uses: domain.rs (DataPayload), page.rs (StaticPage)
//!     - spawned by: main.rs
//!
//! ==============================================================================

use crate::config::ServerConfig;
use crate::domain::DataPayload;
use crate::error::TransportError;
use crate::page::StaticPage;
use crate::store::TelemetryStore;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const JSON_HEADER: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n";
const HTML_HEADER: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Data,
    Page,
}

/// pick the route from the first line of the request
pub fn route(request: &[u8], data_marker: &str) -> Route {
    let line_end = request
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(request.len());
    let request_line = String::from_utf8_lossy(&request[..line_end]);

    if request_line.contains(data_marker) {
        Route::Data
    } else {
        Route::Page
    }
}

pub struct RequestLoop {
    listener: TcpListener,
    store: TelemetryStore,
    page: StaticPage,
    data_marker: String,
    request_buffer: usize,
    write_chunk: usize,
    read_timeout: Duration,
}

impl RequestLoop {
    pub fn new(listener: TcpListener, store: TelemetryStore, page: StaticPage, config: &ServerConfig) -> Self {
        Self {
            listener,
            store,
            page,
            data_marker: config.data_marker.clone(),
            request_buffer: config.request_buffer.max(1),
            write_chunk: config.write_chunk.max(1),
            read_timeout: config.read_timeout(),
        }
    }

    /// accept and answer connections forever
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("request loop listening on http://{}", addr);
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("{}", TransportError::Accept(e));
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };
            tracing::debug!("connection from {}", peer);

            // the stream is moved in and dropped on every return path
            match self.handle_connection(stream).await {
                Ok(Some(route)) => tracing::debug!("{} served {:?}", peer, route),
                Ok(None) => tracing::debug!("{} closed without a request", peer),
                Err(e) => tracing::warn!("{}: {}", peer, e),
            }
        }
    }

    /// serve exactly one request on `stream`, then close it
    pub async fn handle_connection(&self, mut stream: TcpStream) -> Result<Option<Route>, TransportError> {
        let mut buf = vec![0u8; self.request_buffer];
        let n = tokio::time::timeout(self.read_timeout, stream.read(&mut buf))
            .await
            .map_err(|_| TransportError::Timeout(self.read_timeout))?
            .map_err(TransportError::Read)?;
        if n == 0 {
            return Ok(None);
        }

        let route = route(&buf[..n], &self.data_marker);
        match route {
            Route::Data => self.respond_data(&mut stream).await?,
            Route::Page => self.respond_page(&mut stream).await?,
        }

        stream.shutdown().await.ok();
        Ok(Some(route))
    }

    async fn respond_data(&self, stream: &mut TcpStream) -> Result<(), TransportError> {
        let snapshot = self.store.read_snapshot().await;
        let payload = DataPayload::from(&snapshot);
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("failed to encode data payload: {}", e);
                b"{}".to_vec()
            }
        };

        stream.write_all(JSON_HEADER).await.map_err(TransportError::Write)?;
        stream.write_all(&body).await.map_err(TransportError::Write)?;
        Ok(())
    }

    async fn respond_page(&self, stream: &mut TcpStream) -> Result<(), TransportError> {
        stream.write_all(HTML_HEADER).await.map_err(TransportError::Write)?;
        for chunk in self.page.as_bytes().chunks(self.write_chunk) {
            stream.write_all(chunk).await.map_err(TransportError::Write)?;
        }
        Ok(())
    }
}
