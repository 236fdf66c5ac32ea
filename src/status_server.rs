use crate::prelude::*;

use {
    axum::{
        extract::State,
        http::header,
        response::IntoResponse,
        Json, Router,
    },
    std::net::SocketAddr,
    tokio::net::TcpListener,
    tokio::sync::watch,
};

/// Answers every request, whatever its path, with the latest snapshot as JSON
/// and closes the connection afterwards.
pub struct StatusServer {
    listener: TcpListener,
    snapshots: watch::Receiver<Snapshot>,
}

impl StatusServer {
    pub async fn bind(address: &str, port: u16, snapshots: watch::Receiver<Snapshot>) -> Result<Self> {
        let listener = TcpListener::bind((address, port))
            .await
            .map_err(|e| file_error_with_source!(e, "cannot listen on {}:{}", address, port))?;

        Ok(Self {
            listener,
            snapshots,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn router(snapshots: watch::Receiver<Snapshot>) -> Router {
        Router::new().fallback(latest_snapshot).with_state(snapshots)
    }

    /// Serves until the listener fails. Failed accepts are retried by axum.
    pub async fn run(self) -> Result<()> {
        info!("status server listening on {}", self.local_addr()?);

        let app = Self::router(self.snapshots);
        axum::serve(self.listener, app.into_make_service())
            .await
            .map_err(|e| file_error_with_source!(e, "status server failed"))?;

        Ok(())
    }
}

async fn latest_snapshot(State(snapshots): State<watch::Receiver<Snapshot>>) -> impl IntoResponse {
    let snapshot = snapshots.borrow().clone();
    ([(header::CONNECTION, "close")], Json(snapshot))
}
