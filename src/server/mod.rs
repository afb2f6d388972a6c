// SPDX-License-Identifier: MPL-2.0

//! HTTP front end on `tiny_http`.
//!
//! A fixed pool of worker threads pulls requests off one listening socket and
//! runs them through the shared [`Router`]. Each request is its own unit of
//! work; the store's transaction is the only coordination between workers.

mod auth;
mod error;
mod routes;
mod status_writer;

pub use auth::TokenIdentity;
pub use error::ApiError;
pub use routes::{ApiRequest, Router, Verb};
pub use status_writer::StatusWriter;

use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;
use tiny_http::{Header, Method, Request, Response};
use tracing::{debug, error, info, warn};

/// Request bodies beyond this are rejected
const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("listener has no IP address")]
    NoAddress,
}

/// A bound listener with its worker pool running
pub struct RunningServer {
    http: Arc<tiny_http::Server>,
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl RunningServer {
    /// Bind `addr` and start `workers` threads serving `router`
    pub fn start(addr: &str, router: Router, workers: usize) -> Result<Self, ServerError> {
        let http = tiny_http::Server::http(addr).map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        let bound = http.server_addr().to_ip().ok_or(ServerError::NoAddress)?;

        let http = Arc::new(http);
        let router = Arc::new(router);
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = (0..workers.max(1))
            .map(|index| {
                let http = Arc::clone(&http);
                let router = Arc::clone(&router);
                let shutdown = Arc::clone(&shutdown);
                std::thread::Builder::new()
                    .name(format!("ladder-http-{index}"))
                    .spawn(move || worker_loop(&http, &router, &shutdown))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServerError::Bind {
                addr: addr.to_string(),
                reason: format!("failed to spawn worker: {e}"),
            })?;

        info!(addr = %bound, workers = workers.len(), "listening");

        Ok(Self {
            http,
            addr: bound,
            shutdown,
            workers,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until every worker exits
    pub fn join(self) {
        for worker in self.workers {
            if worker.join().is_err() {
                error!("http worker panicked");
            }
        }
    }

    /// Stop accepting requests and wait for in-flight ones to finish
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Each unblock wakes exactly one waiting worker
        for _ in &self.workers {
            self.http.unblock();
        }
        self.join();
    }
}

fn worker_loop(http: &tiny_http::Server, router: &Router, shutdown: &AtomicBool) {
    loop {
        match http.recv() {
            Ok(request) => serve(router, request),
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "accept failed");
            }
        }
    }
}

fn serve(router: &Router, mut request: Request) {
    let started = Instant::now();
    let verb = match request.method() {
        Method::Get => Verb::Get,
        Method::Post => Verb::Post,
        Method::Delete => Verb::Delete,
        _ => Verb::Other,
    };
    let target = request.url().to_string();
    let authorization = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .map(|h| h.value.as_str().to_string());

    let mut body = String::new();
    let read = request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_string(&mut body);

    let outcome = match read {
        Err(e) => Err(ApiError::BadRequest(format!("unreadable body: {e}"))),
        Ok(n) if n as u64 > MAX_BODY_BYTES => Err(ApiError::BadRequest("body too large".into())),
        Ok(_) => router.handle(&ApiRequest::new(verb, &target, authorization, body)),
    };

    let (status, payload) = match outcome {
        Ok(reply) => (reply.status, reply.body),
        Err(err) => {
            if let ApiError::Internal(cause) = &err {
                error!(path = %target, error = %cause, "request failed");
            } else {
                debug!(path = %target, error = %err, "request rejected");
            }
            let payload = serde_json::to_string(&err.envelope()).unwrap_or_default();
            (err.status(), payload)
        }
    };

    debug!(
        method = ?verb,
        path = %target,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "handled"
    );

    if let Err(e) = request.respond(json_response(status, payload)) {
        warn!(error = %e, "failed to write response");
    }
}

fn json_response(status: u16, body: String) -> Response<Cursor<Vec<u8>>> {
    let response = Response::from_string(body).with_status_code(status);
    match Header::from_bytes("Content-Type", "application/json") {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ClientError, ErrorKind, LadderClient, ProblemStatus};
    use crate::store::problems::tests::seeded_db;
    use crate::store::{ProblemRepo, TokenRepo};

    fn start() -> (RunningServer, LadderClient, i64) {
        let db = seeded_db();
        let token = TokenRepo::new(&db).issue("alice").unwrap();
        let id_42 = ProblemRepo::new(&db).find_by_number(42).unwrap().unwrap().id;
        let router = Router::new(db.clone(), Box::new(TokenIdentity::new(db)));
        let server = RunningServer::start("127.0.0.1:0", router, 2).unwrap();
        let client = LadderClient::with_server(&format!("http://{}", server.addr()), Some(token));
        (server, client, id_42)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_end_to_end_over_http() {
        let (server, client, id_42) = start();

        let update = client
            .update_status(42, ProblemStatus::Attempting)
            .await
            .unwrap();
        assert_eq!(update.previous_status, ProblemStatus::Untouched);

        let again = client
            .update_status(42, ProblemStatus::Attempting)
            .await
            .unwrap();
        assert_eq!(again.previous_status, ProblemStatus::Attempting);

        client.update_status(42, ProblemStatus::Solved).await.unwrap();

        let history = client.history(10, 0).await.unwrap();
        assert_eq!(history.entries.len(), 2);
        assert_eq!(history.entries[0].to_status, ProblemStatus::Solved);
        assert_eq!(history.entries[1].from_status, None);

        let fav = client.add_favorite(id_42).await.unwrap();
        assert!(fav.favorited);
        assert_eq!(client.favorites().await.unwrap().len(), 1);
        client.remove_favorite(id_42).await.unwrap();
        assert!(client.favorites().await.unwrap().is_empty());

        let stats = client.stats().await.unwrap();
        assert_eq!(stats.solved, 1);
        assert_eq!(stats.total_problems, 3);

        server.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_errors_arrive_as_typed_kinds() {
        let (server, client, _) = start();

        let err = client
            .update_status(9_999, ProblemStatus::Solved)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Api {
                kind: ErrorKind::NotFound,
                status: 404,
                ..
            }
        ));

        let stranger = LadderClient::with_server(client.base_url(), Some("bogus".into()));
        let err = stranger.statuses().await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));

        server.shutdown();
    }

    #[test]
    fn test_bind_failure_reported() {
        let result = RunningServer::start("not-an-address", seeded_router(), 1);
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    fn seeded_router() -> Router {
        let db = seeded_db();
        Router::new(db.clone(), Box::new(TokenIdentity::new(db)))
    }
}
