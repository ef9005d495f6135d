use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use askama::Template;
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use std::sync::Arc;

use crate::detection::FaceDetector;
use crate::error::AppError;
use crate::models::*;
use crate::pages::*;
use crate::session::{SessionKeys, SessionState, Visitor};
use crate::store::Store;
use crate::upload::{self, UploadDir};

pub struct AppState {
    pub store: Arc<Store>,
    pub uploads: Arc<UploadDir>,
    pub detector: Arc<dyn FaceDetector>,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: now(),
    })
}

// ==================== Name Entry ====================

pub async fn index(session: SessionState) -> Result<HttpResponse, AppError> {
    if session.username().is_some() {
        return Ok(redirect("/welcome"));
    }
    render(&IndexPage {
        year: current_year(),
    })
}

pub async fn save_name(
    state: web::Data<AppState>,
    keys: web::Data<SessionKeys>,
    form: web::Form<NameForm>,
) -> Result<HttpResponse, AppError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Ok(redirect("/welcome"));
    }

    state.store.record_user(name, now())?;
    log::info!("Visitor entered name: {}", name);

    let cookie = keys.cookie(&SessionState::named(name))?;
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/welcome"))
        .cookie(cookie)
        .finish())
}

pub async fn welcome(visitor: Visitor) -> Result<HttpResponse, AppError> {
    render(&WelcomePage {
        year: current_year(),
        username: visitor.username,
    })
}

// ==================== Upload ====================

pub async fn upload_form(visitor: Visitor) -> Result<HttpResponse, AppError> {
    render(&UploadPage {
        year: current_year(),
        username: visitor.username,
    })
}

pub async fn save_image(
    visitor: Visitor,
    state: web::Data<AppState>,
    keys: web::Data<SessionKeys>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = state.uploads.receive(payload).await?;
    let Some(staged) = form.image else {
        return Ok(redirect("/upload"));
    };

    let at = now();
    let filename = upload::upload_filename(&visitor.username, at, &staged.original_name);
    let size = staged.size;
    let path = state.uploads.persist(staged, &filename)?;

    let image_id = upload::image_id(&visitor.username, at);
    let record = ImageRecord {
        username: visitor.username.clone(),
        filename: filename.clone(),
        description: form.description,
        uploaded_at: at,
        filepath: path.display().to_string(),
    };
    if let Err(e) = state.store.create_image(&image_id, record) {
        if let Err(rm) = std::fs::remove_file(&path) {
            log::warn!("Failed to remove orphaned upload {}: {}", path.display(), rm);
        }
        return Err(e.into());
    }
    log::info!("Saved upload {} ({} bytes) as {}", filename, size, image_id);

    let cookie = keys.cookie(&visitor.session.with_image(image_id))?;
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/camera"))
        .cookie(cookie)
        .finish())
}

// ==================== Camera ====================

pub async fn camera(
    visitor: Visitor,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let image = visitor
        .session
        .current_image_id()
        .and_then(|id| state.store.image(id));

    render(&CameraPage {
        year: current_year(),
        username: visitor.username,
        description: image
            .as_ref()
            .map(|i| i.description.clone())
            .unwrap_or_default(),
        image_url: image.map(|i| format!("/uploads/{}", i.filename)),
    })
}

pub async fn process_frame(
    session: SessionState,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> impl Responder {
    if session.username().is_none() {
        return HttpResponse::Ok().json(FrameResponse::failure("No active session"));
    }

    // Unparsable bodies carry no frame; the detector decides what that means
    let frame = match serde_json::from_slice::<FrameRequest>(&body) {
        Ok(request) => request.image.unwrap_or_default(),
        Err(e) => {
            log::debug!("Frame request is not valid JSON: {}", e);
            String::new()
        }
    };

    let detector = state.detector.clone();
    let result = match web::block(move || detector.detect(&frame)).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(true) => {
            let description = session
                .current_image_id()
                .and_then(|id| state.store.image(id))
                .map(|i| i.description)
                .filter(|d| !d.is_empty());
            HttpResponse::Ok().json(FrameResponse::detected(description))
        }
        Ok(false) => HttpResponse::Ok().json(FrameResponse::searching()),
        Err(e) => {
            log::error!("Error processing frame: {}", e);
            HttpResponse::Ok().json(FrameResponse::failure(e))
        }
    }
}

pub async fn close(visitor: Visitor) -> Result<HttpResponse, AppError> {
    render(&ClosePage {
        year: current_year(),
        username: visitor.username,
    })
}

pub async fn logout() -> impl Responder {
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .cookie(SessionKeys::removal_cookie())
        .finish()
}

// ==================== Static Pages ====================

pub async fn privacy() -> Result<HttpResponse, AppError> {
    render(&PrivacyPage {
        year: current_year(),
    })
}

pub async fn terms() -> Result<HttpResponse, AppError> {
    render(&TermsPage {
        year: current_year(),
    })
}

pub async fn support_form() -> Result<HttpResponse, AppError> {
    render(&SupportPage {
        year: current_year(),
        success: false,
    })
}

pub async fn submit_support(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<SupportForm>,
) -> Result<HttpResponse, AppError> {
    let at = now();
    let request = SupportRequest {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        subject: form.subject.trim().to_string(),
        message: form.message.trim().to_string(),
        timestamp: at,
        ip_address: req.peer_addr().map(|addr| addr.ip().to_string()),
    };

    let id = format!("req_{}", at.format(KEY_TIMESTAMP_FORMAT));
    state.store.create_support_request(&id, request)?;
    log::info!("Stored support request {}", id);

    render(&SupportPage {
        year: current_year(),
        success: true,
    })
}

// ==================== Errors ====================

pub async fn not_found() -> Result<HttpResponse, AppError> {
    render_status(
        StatusCode::NOT_FOUND,
        &NotFoundPage {
            year: current_year(),
        },
    )
}

fn server_error_page<B: MessageBody + 'static>(
    res: ServiceResponse<B>,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let body = ServerErrorPage {
        year: current_year(),
    }
    .render()
    .unwrap_or_else(|e| {
        log::error!("Failed to render error page: {}", e);
        "Internal Server Error".to_string()
    });

    let (req, res) = res.into_parts();
    let mut res = res.set_body(body);
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    let res = ServiceResponse::new(req, res)
        .map_into_boxed_body()
        .map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}

/// Replace the body of every 500 response with the error page.
pub fn error_handlers<B: MessageBody + 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new().handler(StatusCode::INTERNAL_SERVER_ERROR, server_error_page)
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))

        // Name entry
        .route("/", web::get().to(index))
        .route("/save_name", web::post().to(save_name))
        .route("/welcome", web::get().to(welcome))

        // Upload and camera (session required)
        .route("/upload", web::get().to(upload_form))
        .route("/save_image", web::post().to(save_image))
        .route("/camera", web::get().to(camera))
        .route("/process_frame", web::post().to(process_frame))
        .route("/close", web::get().to(close))
        .route("/logout", web::get().to(logout))

        // Informational pages
        .route("/privacy", web::get().to(privacy))
        .route("/terms", web::get().to(terms))
        .route("/support", web::get().to(support_form))
        .route("/support", web::post().to(submit_support));
}

/// Body limits for the `Bytes` and `Form` extractors, raised to the upload cap
/// so large webcam frames reach `process_frame`.
pub fn configure_limits(max_bytes: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::PayloadConfig::new(max_bytes))
            .app_data(web::FormConfig::default().limit(max_bytes));
    }
}

/// Static assets and uploaded images.
pub fn configure_assets(
    static_dir: PathBuf,
    upload_dir: PathBuf,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.service(Files::new("/static", static_dir))
            .service(Files::new("/uploads", upload_dir));
    }
}
