//! Server-rendered pages. Templates live in `templates/` and all extend
//! `base.html`, which needs the current `year` for its footer.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use askama::Template;
use chrono::{Datelike, Local};

use crate::error::AppError;

pub fn current_year() -> i32 {
    Local::now().year()
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub year: i32,
}

#[derive(Template)]
#[template(path = "welcome.html")]
pub struct WelcomePage {
    pub year: i32,
    pub username: String,
}

#[derive(Template)]
#[template(path = "upload.html")]
pub struct UploadPage {
    pub year: i32,
    pub username: String,
}

#[derive(Template)]
#[template(path = "camera.html")]
pub struct CameraPage {
    pub year: i32,
    pub username: String,
    pub description: String,
    pub image_url: Option<String>,
}

#[derive(Template)]
#[template(path = "privacy.html")]
pub struct PrivacyPage {
    pub year: i32,
}

#[derive(Template)]
#[template(path = "terms.html")]
pub struct TermsPage {
    pub year: i32,
}

#[derive(Template)]
#[template(path = "support.html")]
pub struct SupportPage {
    pub year: i32,
    pub success: bool,
}

#[derive(Template)]
#[template(path = "close.html")]
pub struct ClosePage {
    pub year: i32,
    pub username: String,
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundPage {
    pub year: i32,
}

#[derive(Template)]
#[template(path = "500.html")]
pub struct ServerErrorPage {
    pub year: i32,
}

pub fn render<T: Template>(page: &T) -> Result<HttpResponse, AppError> {
    render_status(StatusCode::OK, page)
}

pub fn render_status<T: Template>(status: StatusCode, page: &T) -> Result<HttpResponse, AppError> {
    let body = page.render()?;
    Ok(HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body))
}
