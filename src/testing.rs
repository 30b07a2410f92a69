//! In-process stand-in for the remote analysis service, used by the tests.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
};

use axum::{
    Router,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;

use crate::common::remote::{TUNNEL_WARNING_HEADER, TUNNEL_WARNING_VALUE};

pub(crate) const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReceivedUpload {
    pub field: String,
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

struct FakeState {
    process_status: StatusCode,
    process_body: String,
    image_bytes: Vec<u8>,
    image_content_type: Option<String>,
    publish_after_polls: u32,
    process_requests: AtomicUsize,
    image_requests: AtomicU32,
    missing_tunnel_header: AtomicUsize,
    last_upload: Mutex<Option<ReceivedUpload>>,
}

impl FakeState {
    fn record_headers(&self, headers: &HeaderMap) {
        let bypassed = headers
            .get(TUNNEL_WARNING_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some(TUNNEL_WARNING_VALUE);
        if !bypassed {
            self.missing_tunnel_header.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub(crate) struct FakeRemoteBuilder {
    process_status: StatusCode,
    process_body: String,
    image_bytes: Vec<u8>,
    image_content_type: Option<String>,
    publish_after_polls: u32,
}

impl FakeRemoteBuilder {
    pub fn process_response(mut self, status: StatusCode, body: &str) -> Self {
        self.process_status = status;
        self.process_body = body.to_string();
        self
    }

    pub fn image(mut self, bytes: &[u8], content_type: Option<&str>) -> Self {
        self.image_bytes = bytes.to_vec();
        self.image_content_type = content_type.map(str::to_string);
        self
    }

    // The first `polls` image requests answer 404.
    pub fn publish_after_polls(mut self, polls: u32) -> Self {
        self.publish_after_polls = polls;
        self
    }

    pub async fn start(self) -> FakeRemote {
        let state = Arc::new(FakeState {
            process_status: self.process_status,
            process_body: self.process_body,
            image_bytes: self.image_bytes,
            image_content_type: self.image_content_type,
            publish_after_polls: self.publish_after_polls,
            process_requests: AtomicUsize::new(0),
            image_requests: AtomicU32::new(0),
            missing_tunnel_header: AtomicUsize::new(0),
            last_upload: Mutex::new(None),
        });
        let app = Router::new()
            .route("/process_image", post(process_image))
            .route("/image/:name", get(result_image))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake remote");
        let addr = listener.local_addr().expect("fake remote address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake remote server");
        });
        FakeRemote { addr, state }
    }
}

pub(crate) struct FakeRemote {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeRemote {
    pub fn builder() -> FakeRemoteBuilder {
        FakeRemoteBuilder {
            process_status: StatusCode::OK,
            process_body: "{}".to_string(),
            image_bytes: FAKE_JPEG.to_vec(),
            image_content_type: Some("image/jpeg".to_string()),
            publish_after_polls: 0,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn process_requests(&self) -> usize {
        self.state.process_requests.load(Ordering::SeqCst)
    }

    pub fn image_requests(&self) -> u32 {
        self.state.image_requests.load(Ordering::SeqCst)
    }

    pub fn all_requests_bypassed_tunnel_warning(&self) -> bool {
        self.state.missing_tunnel_header.load(Ordering::SeqCst) == 0
    }

    pub fn last_upload(&self) -> Option<ReceivedUpload> {
        self.state.last_upload.lock().unwrap().clone()
    }
}

async fn process_image(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    state.process_requests.fetch_add(1, Ordering::SeqCst);
    state.record_headers(&headers);
    while let Ok(Some(field)) = multipart.next_field().await {
        let upload = ReceivedUpload {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            bytes: field.bytes().await.map(|b| b.to_vec()).unwrap_or_default(),
        };
        *state.last_upload.lock().unwrap() = Some(upload);
    }
    (state.process_status, state.process_body.clone()).into_response()
}

async fn result_image(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    let seen = state.image_requests.fetch_add(1, Ordering::SeqCst);
    state.record_headers(&headers);
    if seen < state.publish_after_polls {
        return StatusCode::NOT_FOUND.into_response();
    }
    let mut response = state.image_bytes.clone().into_response();
    let headers = response.headers_mut();
    headers.remove(header::CONTENT_TYPE);
    if let Some(content_type) = &state.image_content_type {
        if let Ok(value) = content_type.parse() {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    response
}
