//! Canned HTTP backend for client tests.

use axum::{
  extract::{Request, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Router,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as seen by the backend.
#[derive(Debug, Clone)]
pub struct Recorded {
  pub method: String,
  /// Path and query string
  pub uri: String,
  pub authorization: Option<String>,
}

#[derive(Clone, Default)]
struct Canned {
  responses: Arc<Mutex<VecDeque<(u16, String)>>>,
  requests: Arc<Mutex<Vec<Recorded>>>,
}

/// Running backend. Stops when dropped.
pub struct TestServer {
  pub url: String,
  requests: Arc<Mutex<Vec<Recorded>>>,
  handle: JoinHandle<()>,
}

impl TestServer {
  /// Requests received so far, oldest first.
  pub fn requests(&self) -> Vec<Recorded> {
    self.requests.lock().unwrap().clone()
  }
}

impl Drop for TestServer {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

/// Answer requests with `responses` in order, whatever the path.
///
/// Requests past the last canned response get 410 Gone.
pub async fn serve(responses: Vec<(u16, String)>) -> TestServer {
  let canned = Canned {
    responses: Arc::new(Mutex::new(responses.into())),
    requests: Arc::default(),
  };
  let requests = canned.requests.clone();

  let app = Router::new().fallback(respond).with_state(canned);
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let url = format!("http://{}/", listener.local_addr().unwrap());

  let handle = tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });

  TestServer {
    url,
    requests,
    handle,
  }
}

async fn respond(State(canned): State<Canned>, request: Request) -> Response {
  let recorded = Recorded {
    method: request.method().to_string(),
    uri: request.uri().to_string(),
    authorization: request
      .headers()
      .get(header::AUTHORIZATION)
      .and_then(|value| value.to_str().ok())
      .map(str::to_string),
  };
  canned.requests.lock().unwrap().push(recorded);

  let next = canned.responses.lock().unwrap().pop_front();
  match next {
    Some((status, body)) => {
      let status = StatusCode::from_u16(status).unwrap();
      (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
    None => StatusCode::GONE.into_response(),
  }
}
