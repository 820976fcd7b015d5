use actix_multipart::Multipart;
use actix_web::http::header::ContentDisposition;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::service::ResourceService;
use crate::storage::DEFAULT_CONTENT_TYPE;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(upload))
            .route(web::delete().to(delete_resources)),
    )
    .service(
        web::resource("/{id}")
            .route(web::get().to(get_resource))
            .route(web::head().to(head_resource)),
    );
}

#[derive(Deserialize)]
struct DeleteQuery {
    id: String,
}

struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

async fn upload(
    service: web::Data<ResourceService>,
    config: web::Data<AppConfig>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let mut uploaded = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(malformed)?;
        if field.name() != "file" || uploaded.is_some() {
            while let Some(chunk) = field.next().await {
                chunk.map_err(malformed)?;
            }
            continue;
        }

        let file_name = field
            .content_disposition()
            .get_filename()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::param_error("file name is required"))?;
        let content_type = field.content_type().map(|m| m.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(malformed)?;
            if data.len() + chunk.len() > config.max_upload_size {
                return Err(AppError::file_size_limit(config.max_upload_size));
            }
            data.extend_from_slice(&chunk);
        }

        uploaded = Some(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }

    let file = uploaded.ok_or_else(|| AppError::param_error("missing multipart field: file"))?;
    let content_type =
        detect_content_type(file.content_type.as_deref(), &file.file_name, &file.data);
    let record = service.create(file.data, &file.file_name, &content_type).await?;
    Ok(HttpResponse::Ok().json(record))
}

async fn get_resource(
    service: web::Data<ResourceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let download = service.fetch(path.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .content_type(download.content_type)
        .insert_header(ContentDisposition::attachment(download.file_name))
        .body(download.data))
}

async fn head_resource(
    service: web::Data<ResourceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    if service.exists(path.into_inner()).await? {
        Ok(HttpResponse::Ok().finish())
    } else {
        Err(AppError::not_found("Music not found"))
    }
}

async fn delete_resources(
    service: web::Data<ResourceService>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse, AppError> {
    let ids = parse_ids(&query.id)?;
    let res = service.delete(&ids).await?;
    Ok(HttpResponse::Ok().json(res))
}

fn malformed(e: actix_multipart::MultipartError) -> AppError {
    AppError::param_error(format!("malformed multipart body: {}", e))
}

fn parse_ids(raw: &str) -> Result<Vec<i64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::param_error(format!("invalid id: {}", s)))
        })
        .collect()
}

/// Declared part type first, then magic bytes, then the file extension.
fn detect_content_type(declared: Option<&str>, file_name: &str, data: &[u8]) -> String {
    if let Some(declared) = declared.filter(|ct| !ct.is_empty() && *ct != DEFAULT_CONTENT_TYPE) {
        return declared.to_string();
    }
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_memory;
    use crate::event::testing::{resource_topics, RecordingSink, QUEUE_CAPACITY};
    use crate::event::EventChannel;
    use crate::storage::memory::MemoryBlobStore;
    use crate::storage::BlobStore;
    use actix_web::http::{header, Method, StatusCode};
    use actix_web::{test, App};
    use std::sync::Arc;

    const BOUNDARY: &str = "----resource-test-boundary";

    async fn setup() -> (web::Data<ResourceService>, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::with_bucket("music-app"));
        let sink = Arc::new(RecordingSink::default());
        let (events, _dispatcher) = EventChannel::start(resource_topics(), sink, QUEUE_CAPACITY);
        let db = connect_memory().await;
        let service = ResourceService::new(db, blobs.clone(), events, "music-app");
        (web::Data::new(service), blobs)
    }

    fn multipart_body(
        field: &str,
        file_name: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Vec<u8> {
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            BOUNDARY, field, file_name
        )
        .into_bytes();
        if let Some(ct) = content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/v1/resources")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    fn head_request(uri: &str) -> test::TestRequest {
        test::TestRequest::default().method(Method::HEAD).uri(uri)
    }

    macro_rules! app {
        ($service:expr) => {
            test::init_service(
                App::new()
                    .app_data($service.clone())
                    .app_data(web::Data::new(AppConfig::for_tests()))
                    .configure(crate::routes::configure),
            )
            .await
        };
    }

    #[::core::prelude::v1::test]
    fn parse_ids_tolerates_spaces_and_empty_segments() {
        assert_eq!(parse_ids("1, 2,,3 ").unwrap(), vec![1, 2, 3]);
        assert!(parse_ids("").unwrap().is_empty());
        assert!(matches!(parse_ids("1,x"), Err(AppError::BadRequest(_))));
    }

    #[::core::prelude::v1::test]
    fn content_type_resolution_order() {
        let id3 = b"ID3\x03\x00\x00\x00\x00\x00\x00";
        assert_eq!(detect_content_type(Some("audio/wav"), "a.mp3", b"ID3"), "audio/wav");
        assert_eq!(
            detect_content_type(Some(DEFAULT_CONTENT_TYPE), "a.bin", id3),
            "audio/mpeg"
        );
        assert_eq!(detect_content_type(None, "a.mp3", b"not audio"), "audio/mpeg");
        assert_eq!(detect_content_type(None, "noext", b"plain"), DEFAULT_CONTENT_TYPE);
    }

    #[actix_web::test]
    async fn upload_download_delete_over_http() {
        let (service, _blobs) = setup().await;
        let app = app!(service);
        let data = b"fake audio bytes".to_vec();

        let body = multipart_body("file", "song.mp3", Some("audio/mpeg"), &data);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let created: serde_json::Value = test::read_body_json(resp).await;
        let id = created["id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/resources/{}", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "audio/mpeg");
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(disposition, "attachment; filename=\"song.mp3\"");
        assert_eq!(test::read_body(resp).await.to_vec(), data);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/resources?id={},999", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let deleted: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(deleted, serde_json::json!({ "ids": [id] }));
    }

    #[actix_web::test]
    async fn missing_record_is_404_with_message() {
        let (service, _blobs) = setup().await;
        let app = app!(service);

        let req = test::TestRequest::get().uri("/api/v1/resources/999").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({ "message": "Music not found" }));
    }

    #[actix_web::test]
    async fn missing_blob_on_delete_is_404() {
        let (service, blobs) = setup().await;
        let app = app!(service);
        let record = service.create(b"x".to_vec(), "x.mp3", "audio/mpeg").await.unwrap();
        blobs.remove("music-app", "x.mp3");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/resources?id={}", record.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({ "message": "File not found" }));
        assert!(!blobs.object_exists("music-app", "x.mp3").await.unwrap());
    }

    #[actix_web::test]
    async fn head_reports_presence() {
        let (service, _blobs) = setup().await;
        let app = app!(service);
        let record = service.create(b"x".to_vec(), "x.mp3", "audio/mpeg").await.unwrap();

        let uri = format!("/api/v1/resources/{}", record.id);
        let resp = test::call_service(&app, head_request(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = head_request("/api/v1/resources/4242").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn bad_ids_are_400() {
        let (service, _blobs) = setup().await;
        let app = app!(service);

        let req = test::TestRequest::delete().uri("/api/v1/resources?id=1,abc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete().uri("/api/v1/resources").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/v1/resources/abc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().starts_with("invalid path"));
    }

    #[actix_web::test]
    async fn upload_without_file_field_is_400() {
        let (service, blobs) = setup().await;
        let app = app!(service);

        let body = multipart_body("attachment", "song.mp3", Some("audio/mpeg"), b"abc");
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(blobs.object_count("music-app"), 0);
    }

    #[actix_web::test]
    async fn oversized_upload_is_rejected_before_any_write() {
        let (service, blobs) = setup().await;
        let app = app!(service);

        let data = vec![0u8; AppConfig::for_tests().max_upload_size + 1];
        let body = multipart_body("file", "big.mp3", Some("audio/mpeg"), &data);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(blobs.object_count("music-app"), 0);
        assert!(!service.exists(1).await.unwrap());
    }
}
