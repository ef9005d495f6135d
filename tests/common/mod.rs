#![allow(dead_code)]

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::web;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use photo_greeter::api::AppState;
use photo_greeter::detection::{FaceDetector, SimulatedDetector};
use photo_greeter::session::{SessionKeys, SESSION_COOKIE};
use photo_greeter::store::Store;
use photo_greeter::upload::UploadDir;

pub const BOUNDARY: &str = "----photogreeterboundary7MA4YWxk";

/// Everything a test app needs, rooted in a throwaway directory.
pub struct TestEnv {
    pub dir: TempDir,
    pub store: Arc<Store>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub state: web::Data<AppState>,
    pub keys: web::Data<SessionKeys>,
}

pub fn test_env_with(detector: Arc<dyn FaceDetector>, max_upload_bytes: usize) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::new(dir.path().join("data")).unwrap());
    let upload_dir = dir.path().join("uploads");
    let uploads = Arc::new(UploadDir::new(&upload_dir, max_upload_bytes).unwrap());

    let state = web::Data::new(AppState {
        store: store.clone(),
        uploads,
        detector,
    });
    let keys = web::Data::new(SessionKeys::new("test_secret", 1));

    TestEnv {
        dir,
        store,
        upload_dir,
        max_upload_bytes,
        state,
        keys,
    }
}

pub fn test_env() -> TestEnv {
    test_env_with(Arc::new(SimulatedDetector::new(1.0)), 16 * 1024 * 1024)
}

/// Build the application the same way `main` does, minus logging and assets.
macro_rules! init_app {
    ($env:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(photo_greeter::api::error_handlers())
                .app_data($env.state.clone())
                .app_data($env.keys.clone())
                .configure(photo_greeter::api::configure_limits($env.max_upload_bytes))
                .configure(photo_greeter::api::configure_routes)
                .default_service(actix_web::web::to(photo_greeter::api::not_found)),
        )
        .await
    };
}

/// Submit a name and return the session cookie that comes back.
macro_rules! login {
    ($app:expr, $name:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/save_name")
            .set_form([("name", $name)])
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FOUND);
        crate::common::session_cookie(&resp).expect("save_name should set a session cookie")
    }};
}

pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.into_owned())
}

pub fn location<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Names of the files currently in `dir`.
pub fn files_in(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
