#![allow(dead_code)]

use std::sync::Arc;

use actix_web::web;
use boardfinder::auth::{AuthContext, Role};
use boardfinder::config::AppConfig;
use boardfinder::models::{BoardingInput, BoardingType, Id, NewUser};
use boardfinder::repo::inmem::InMemRepo;
use boardfinder::repo::{BoardingRepo, UserRepo};
use boardfinder::routes::AppState;
use boardfinder::storage::FsImageStore;
use serde_json::{json, Value};
use tempfile::TempDir;

/// In-memory app state with uploads in a throwaway directory.
pub struct TestCtx {
    pub state: web::Data<AppState>,
    pub repo: InMemRepo,
    pub dir: TempDir,
}

pub async fn ctx() -> TestCtx {
    ctx_with(AppConfig { rate_limit_enabled: false, ..AppConfig::default() }).await
}

pub async fn ctx_with(config: AppConfig) -> TestCtx {
    let dir = tempfile::tempdir().unwrap();
    let store = FsImageStore::new(dir.path()).await.unwrap();
    let repo = InMemRepo::new();
    let config = AppConfig { upload_dir: dir.path().to_path_buf(), ..config };
    let state = web::Data::new(AppState::new(Arc::new(repo.clone()), Arc::new(store), config));
    TestCtx { state, repo, dir }
}

macro_rules! app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(boardfinder::SecurityHeaders::default())
                .app_data($ctx.state.clone())
                .configure(boardfinder::routes::config),
        )
        .await
    };
}

impl TestCtx {
    /// Inserts a user directly and opens a session for it. The stored hash is
    /// a placeholder, so these accounts cannot log in over HTTP.
    pub async fn user(&self, name: &str, role: Role) -> (Id, String) {
        let user = self
            .repo
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "unused".into(),
                role,
                phone: String::new(),
            })
            .await
            .unwrap();
        let token = self.state.sessions.open(AuthContext { user_id: user.id, role });
        (user.id, token)
    }

    pub async fn boarding(&self, owner_id: Id, price: f64, facilities: &[&str]) -> Id {
        let input = BoardingInput { price, facilities: facilities.iter().map(|f| f.to_string()).collect(), ..input() };
        self.repo.create_boarding(owner_id, input, true).await.unwrap().id
    }
}

pub fn input() -> BoardingInput {
    BoardingInput {
        title: "Room near campus".into(),
        description: "Quiet and clean".into(),
        kind: BoardingType::Room,
        university: "University of Moratuwa".into(),
        town: "Katubedda".into(),
        price: 8000.0,
        bedrooms: 1,
        bathrooms: 1,
        facilities: vec![],
        contact_phone: "0771234567".into(),
    }
}

pub fn boarding_json() -> Value {
    json!({
        "title": "Annex for two",
        "description": "Close to the main gate",
        "type": "shared",
        "university": "University of Moratuwa",
        "town": "Katubedda",
        "price": 15000,
        "bedrooms": 2,
        "bathrooms": 1,
        "facilities": ["WiFi", "Parking"],
        "contact_phone": "0771234567"
    })
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// Minimal 1x1 PNG.
pub fn sample_png() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', 0x00, 0x00,
        0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00,
        0x0A, b'I', b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D,
        0xB4, 0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

/// Returns (content-type header value, body).
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let boundary = "----boardfinder-test-boundary";
    let mut body = Vec::new();
    for part in parts {
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

pub async fn body_json<B: actix_web::body::MessageBody>(resp: actix_web::dev::ServiceResponse<B>) -> Value {
    let bytes = actix_web::test::read_body(resp).await;
    serde_json::from_slice(&bytes).unwrap()
}
