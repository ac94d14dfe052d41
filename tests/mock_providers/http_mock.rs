//! HTTP mock of the model workers
//!
//! Serves the synthesis worker routes (`/synthesize`, `/speakers`) and the
//! transcription worker route (`/transcribe`) on an ephemeral port.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, State},
    http::{Response, StatusCode},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use super::SPEAKERS;

/// Native rate of the mock model, different from the pipeline rate on purpose
pub const WORKER_SAMPLE_RATE: u32 = 22050;

#[derive(Debug, Default)]
pub struct MockStats {
    pub synthesize_requests: AtomicU64,
    pub speaker_requests: AtomicU64,
    pub transcribe_requests: AtomicU64,
}

impl MockStats {
    pub fn synthesize_requests(&self) -> u64 {
        self.synthesize_requests.load(Ordering::SeqCst)
    }

    pub fn speaker_requests(&self) -> u64 {
        self.speaker_requests.load(Ordering::SeqCst)
    }

    pub fn transcribe_requests(&self) -> u64 {
        self.transcribe_requests.load(Ordering::SeqCst)
    }
}

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// 400 ms of a quiet tone at the worker rate
fn mock_wav() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: WORKER_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let len = WORKER_SAMPLE_RATE as usize * 2 / 5;
        for i in 0..len {
            let sample = (0.25 * (i as f32 * 0.06).sin() * i16::MAX as f32) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

async fn synthesize_handler(
    State(stats): State<Arc<MockStats>>,
    Json(body): Json<Value>,
) -> Response<Body> {
    stats.synthesize_requests.fetch_add(1, Ordering::SeqCst);

    if let Some(speaker) = body.get("speaker_id").and_then(Value::as_str) {
        if !SPEAKERS.contains(&speaker) {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({
                    "error": {
                        "code": "invalid_speaker",
                        "message": format!("Unknown speaker: {speaker}"),
                        "valid_options": SPEAKERS,
                    }
                }),
            );
        }
    }

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "audio/wav")
        .body(Body::from(mock_wav()))
        .unwrap()
}

async fn speakers_handler(State(stats): State<Arc<MockStats>>) -> Response<Body> {
    stats.speaker_requests.fetch_add(1, Ordering::SeqCst);
    json_response(StatusCode::OK, json!({ "speakers": SPEAKERS }))
}

async fn transcribe_handler(
    State(stats): State<Arc<MockStats>>,
    mut multipart: Multipart,
) -> Response<Body> {
    stats.transcribe_requests.fetch_add(1, Ordering::SeqCst);

    let mut language = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("language") {
            language = field.text().await.ok();
        }
    }

    json_response(
        StatusCode::OK,
        json!({
            "text": "Mock transcript",
            "segments": [{
                "text": "Mock transcript",
                "start": 0.0,
                "end": 0.9,
                "words": [
                    { "word": "Mock", "start": 0.0, "end": 0.4, "score": 0.9 },
                    { "word": "transcript", "start": 0.45, "end": 0.9, "score": 0.88 }
                ]
            }],
            "language": language.unwrap_or_else(|| "en".to_string()),
            "duration": 0.9
        }),
    )
}

/// Running mock worker
pub struct MockWorker {
    pub base_url: String,
    pub stats: Arc<MockStats>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for MockWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start the mock worker on an ephemeral port
pub async fn spawn_mock_worker() -> MockWorker {
    let stats = Arc::new(MockStats::default());

    let app = Router::new()
        .route("/synthesize", post(synthesize_handler))
        .route("/speakers", get(speakers_handler))
        .route("/transcribe", post(transcribe_handler))
        .with_state(stats.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("Mock worker error: {}", e);
        }
    });

    MockWorker {
        base_url: format!("http://{}", address),
        stats,
        handle,
    }
}
