//! Speech client integration tests against an in-process HTTP server

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Json;

use companion::config::SpeechConfig;
use companion::speech::{AsrClient, Synthesizer, Transcriber, TtsClient};
use companion::voice::{decode, encode};
use companion::Error;

mod common;
use common::serve;

fn speech_config(addr: &str) -> SpeechConfig {
    SpeechConfig {
        asr_url: format!("http://{addr}/asr"),
        tts_url: format!("http://{addr}/tts"),
        appkey: "key".to_string(),
        token: "tok".to_string(),
        ..SpeechConfig::default()
    }
}

#[tokio::test]
async fn test_asr_posts_audio_with_credentials() {
    let seen: Arc<Mutex<Option<(HashMap<String, String>, usize)>>> = Arc::default();
    let recorder = Arc::clone(&seen);
    let app = Router::new().route(
        "/asr",
        post(move |Query(query): Query<HashMap<String, String>>, body: Bytes| {
            let recorder = Arc::clone(&recorder);
            async move {
                *recorder.lock().unwrap() = Some((query, body.len()));
                Json(serde_json::json!({ "result": "你好" }))
            }
        }),
    );
    let addr = serve(app).await;
    let wav = encode(&[0.0; 320], 1, 16000).unwrap();

    let text = AsrClient::new(&speech_config(&addr)).transcribe(wav.clone()).await;

    assert_eq!(text.as_deref(), Some("你好"));
    let (query, body_len) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(query["appkey"], "key");
    assert_eq!(query["token"], "tok");
    assert_eq!(query["format"], "wav");
    assert_eq!(query["sample_rate"], "16000");
    assert_eq!(body_len, wav.len());
}

#[tokio::test]
async fn test_asr_failure_is_unavailable() {
    let app = Router::new().route(
        "/asr",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let addr = serve(app).await;
    let client = AsrClient::new(&speech_config(&addr));

    assert!(matches!(client.try_transcribe(vec![0; 8]).await, Err(Error::Stt(_))));
    assert_eq!(client.transcribe(vec![0; 8]).await, None);
}

#[tokio::test]
async fn test_asr_malformed_body_is_unavailable() {
    let app = Router::new().route("/asr", post(|| async { "not json" }));
    let addr = serve(app).await;

    assert_eq!(AsrClient::new(&speech_config(&addr)).transcribe(vec![1]).await, None);
}

#[tokio::test]
async fn test_tts_returns_audio_and_sends_ssml() {
    let seen: Arc<Mutex<Option<serde_json::Value>>> = Arc::default();
    let recorder = Arc::clone(&seen);
    let app = Router::new().route(
        "/tts",
        post(move |Json(request): Json<serde_json::Value>| {
            let recorder = Arc::clone(&recorder);
            async move {
                *recorder.lock().unwrap() = Some(request);
                let wav = encode(&[0.5; 80], 1, 16000).unwrap();
                ([(header::CONTENT_TYPE, "audio/wav")], wav).into_response()
            }
        }),
    );
    let addr = serve(app).await;

    let audio = TtsClient::new(&speech_config(&addr))
        .synthesize("Hello".to_string(), "happy".to_string())
        .await
        .unwrap();

    assert_eq!(decode(&audio).unwrap().samples(), &[0.5; 80]);
    let request = seen.lock().unwrap().clone().unwrap();
    assert_eq!(request["appkey"], "key");
    assert_eq!(request["voice"], "zhibei_emo");
    assert_eq!(request["format"], "wav");
    assert_eq!(request["sample_rate"], 16000);
    let ssml = request["text"].as_str().unwrap();
    assert!(ssml.contains(r#"category="happy""#));
    assert!(ssml.contains("Hello"));
}

#[tokio::test]
async fn test_tts_non_audio_response_is_unavailable() {
    let app = Router::new().route(
        "/tts",
        post(|| async { Json(serde_json::json!({ "status": 40000001, "message": "bad token" })) }),
    );
    let addr = serve(app).await;
    let client = TtsClient::new(&speech_config(&addr));

    assert!(matches!(client.try_synthesize("Hi", "").await, Err(Error::Tts(_))));
    assert_eq!(client.synthesize("Hi".to_string(), String::new()).await, None);
}

#[tokio::test]
async fn test_unreachable_service_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    assert_eq!(AsrClient::new(&speech_config(&addr)).transcribe(vec![0]).await, None);
    assert_eq!(
        TtsClient::new(&speech_config(&addr))
            .synthesize("Hi".to_string(), String::new())
            .await,
        None
    );
}
