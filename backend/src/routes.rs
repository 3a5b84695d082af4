use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use serde_json::json;
use shared::{BoxplotSummary, DefectAnalysisResponse, RingCountResponse};

use crate::analysis::config::AnalysisConfig;
use crate::analysis::decode::{decode_gray, decode_rgb};
use crate::analysis::defect::analyze_defects;
use crate::analysis::render::{encode_png, Renderer};
use crate::analysis::ring::analyze_rings;
use crate::analysis::AnalysisError;
use crate::auth::middleware::AuthMiddleware;
use crate::chat::gemini::GeminiClient;
use crate::config::Settings;
use crate::detection::{DetectionError, RoboflowClient};
use crate::error::ApiError;
use crate::{auth, chat};

pub fn configure_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddleware) {
    cfg.route("/", web::get().to(health)).service(
        web::scope("/api/v1")
            .route("/analyze", web::post().to(analyze_defect))
            .route("/ring-count", web::post().to(analyze_ring_count))
            .service(chat::routes::scope::<GeminiClient>())
            .service(auth::routes::scope(auth_middleware)),
    );
}

async fn health(settings: web::Data<Settings>) -> HttpResponse {
    let name = settings.app_name.replace('-', "");
    HttpResponse::Ok().json(json!({ "Message": format!("Welcome To {}", name) }))
}

pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Reads the multipart field named `file`.
pub async fn read_upload(mut payload: Multipart) -> Result<Upload, ApiError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("upload")
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
            data.extend_from_slice(&chunk);
        }
        if data.is_empty() {
            return Err(ApiError::BadRequest("Empty image file".into()));
        }
        return Ok(Upload { file_name, data });
    }
    Err(ApiError::BadRequest("Missing image file".into()))
}

fn upstream_error(err: DetectionError) -> ApiError {
    error!("Detection request failed: {}", err);
    match err {
        DetectionError::Upstream { status, body } => ApiError::Upstream { status, body },
        other => ApiError::Upstream {
            status: 502,
            body: other.to_string(),
        },
    }
}

async fn analyze_defect(
    payload: Multipart,
    detector: web::Data<RoboflowClient>,
    settings: web::Data<Settings>,
    config: web::Data<AnalysisConfig>,
    renderer: web::Data<Renderer>,
) -> Result<HttpResponse, ApiError> {
    let upload = read_upload(payload).await?;
    info!(
        "Defect analysis for {} ({} bytes)",
        upload.file_name,
        upload.data.len()
    );

    let image = {
        let data = upload.data.clone();
        web::block(move || decode_rgb(&data)).await??
    };

    let (surface, defects) = futures::try_join!(
        detector.segment(&upload.data, &settings.surface_model_id),
        detector.segment(&upload.data, &settings.defect_model_id),
    )
    .map_err(upstream_error)?;

    let defect_config = config.defect.clone();
    let renderer = renderer.get_ref().clone();
    let response = web::block(move || -> Result<DefectAnalysisResponse, AnalysisError> {
        let analysis = analyze_defects(&image, &surface, &defects, &defect_config);
        let figure = renderer.defect_figure(&image, &analysis.overlay, analysis.defect_ratio)?;
        Ok(DefectAnalysisResponse {
            total_log_area: analysis.total_log_area,
            defect_area: analysis.defect_area,
            defect_ratio: analysis.rounded_ratio(),
            image_blob: encode_png(&figure)?,
        })
    })
    .await??;

    info!(
        "Defect ratio {:.2}% ({} / {} px)",
        response.defect_ratio, response.defect_area, response.total_log_area
    );
    Ok(HttpResponse::Ok().json(response))
}

async fn analyze_ring_count(
    payload: Multipart,
    detector: web::Data<RoboflowClient>,
    config: web::Data<AnalysisConfig>,
    renderer: web::Data<Renderer>,
) -> Result<HttpResponse, ApiError> {
    let upload = read_upload(payload).await?;
    info!(
        "Ring count for {} ({} bytes)",
        upload.file_name,
        upload.data.len()
    );

    let gray = {
        let data = upload.data.clone();
        web::block(move || decode_gray(&data)).await??
    };

    let predictions = detector
        .detect_pith(&upload.data, &upload.file_name)
        .await
        .map_err(|e| {
            error!("Pith detection failed: {}", e);
            ApiError::Internal("Roboflow API failed".into())
        })?;
    let pith = predictions
        .first()
        .ok_or_else(|| ApiError::NotFound("No pith detected".into()))?;
    let center = pith.center().to_pixel();
    info!("Pith detected at ({}, {})", center.0, center.1);

    let ring_config = config.ring.clone();
    let renderer = renderer.get_ref().clone();
    let response = web::block(move || -> Result<RingCountResponse, AnalysisError> {
        let scan = analyze_rings(&gray, center, &ring_config)?;
        let img_canny = encode_png(&renderer.edge_figure(&scan.edges)?)?;
        let img_polar = encode_png(&renderer.polar_figure(&scan.polar, &scan.scan_rows)?)?;
        let img_boxplot = encode_png(&renderer.boxplot_figure(&scan.counts, &scan.stats)?)?;
        let stats = scan.stats;
        Ok(RingCountResponse {
            pith_center: center,
            mean_ring_count: stats.mean,
            img_canny,
            img_polar,
            img_boxplot,
            boxplot_summary: BoxplotSummary {
                q1: stats.q1,
                median: stats.median,
                q3: stats.q3,
                iqr: stats.iqr,
                outliers: stats.outliers,
                q1_q3_range: stats.range,
            },
            ring_counts: scan.counts,
        })
    })
    .await??;

    info!(
        "Ring counts {:?}, mean {:.2}",
        response.ring_counts, response.mean_ring_count
    );
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App, HttpServer};

    const BOUNDARY: &str = "XTESTBOUNDARYX";

    fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn analysis_app() -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        analysis_app_with(Settings::for_tests())
    }

    fn analysis_app_with(settings: Settings) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(RoboflowClient::new(&settings)))
            .app_data(web::Data::new(settings))
            .app_data(web::Data::new(AnalysisConfig::default()))
            .app_data(web::Data::new(Renderer::default()))
            .route("/", web::get().to(health))
            .route("/analyze", web::post().to(analyze_defect))
            .route("/ring-count", web::post().to(analyze_ring_count))
    }

    fn upload_request(path: &str, field: &str, data: &[u8]) -> test::TestRequest {
        test::TestRequest::post()
            .uri(path)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(field, "log.jpg", data))
    }

    /// Serves `body` with `status` for every request, returning the base URL.
    fn detection_stub(status: u16, body: &'static str) -> String {
        let server = HttpServer::new(move || {
            App::new().default_service(web::to(move |_upload: web::Bytes| async move {
                HttpResponse::build(StatusCode::from_u16(status).unwrap())
                    .content_type("application/json")
                    .body(body)
            }))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    fn settings_against(base: &str) -> Settings {
        let mut settings = Settings::for_tests();
        settings.roboflow_segment_url = base.to_string();
        settings.roboflow_detect_url = base.to_string();
        settings
    }

    fn log_png() -> Vec<u8> {
        let img = image::RgbImage::from_fn(100, 80, |x, y| {
            let r = ((x as f64 - 50.0).powi(2) + (y as f64 - 40.0).powi(2)).sqrt();
            if (r / 6.0).fract() < 0.3 {
                image::Rgb([200, 160, 110])
            } else {
                image::Rgb([90, 60, 30])
            }
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[actix_web::test]
    async fn health_greets() {
        let app = test::init_service(analysis_app()).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["Message"], "Welcome To TimberGPT");
    }

    #[actix_web::test]
    async fn undecodable_upload_is_rejected_before_detection() {
        let app = test::init_service(analysis_app()).await;
        for path in ["/analyze", "/ring-count"] {
            let req = upload_request(path, "file", b"not an image at all").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", path);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["detail"], "Invalid image file");
        }
    }

    #[actix_web::test]
    async fn missing_file_field_is_rejected() {
        let app = test::init_service(analysis_app()).await;
        let req = upload_request("/analyze", "picture", b"irrelevant").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Missing image file");
    }

    #[actix_web::test]
    async fn ring_count_without_pith_is_not_found() {
        let base = detection_stub(200, r#"{"predictions": []}"#);
        let app = test::init_service(analysis_app_with(settings_against(&base))).await;
        let req = upload_request("/ring-count", "file", &log_png()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "No pith detected");
    }

    #[actix_web::test]
    async fn ring_count_hides_detection_failures() {
        let base = detection_stub(500, r#"{"message": "boom"}"#);
        let app = test::init_service(analysis_app_with(settings_against(&base))).await;
        let req = upload_request("/ring-count", "file", &log_png()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Roboflow API failed");
    }

    #[actix_web::test]
    async fn ring_count_centers_on_the_reported_pith() {
        let base = detection_stub(
            200,
            r#"{"predictions": [{"x": 50.0, "y": 40.0, "confidence": 0.9, "class": "pith",
                "points": [{"x": 45.0, "y": 30.0}, {"x": 70.0, "y": 32.0}, {"x": 66.0, "y": 44.0},
                           {"x": 52.0, "y": 45.0}, {"x": 41.0, "y": 41.0}]}]}"#,
        );
        let app = test::init_service(analysis_app_with(settings_against(&base))).await;
        let req = upload_request("/ring-count", "file", &log_png()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["pith_center"], serde_json::json!([50, 40]));
        assert_eq!(body["ring_counts"].as_array().map(Vec::len), Some(20));
    }

    #[actix_web::test]
    async fn analyze_passes_upstream_status_through() {
        let base = detection_stub(403, r#"{"message": "forbidden"}"#);
        let app = test::init_service(analysis_app_with(settings_against(&base))).await;
        let req = upload_request("/analyze", "file", &log_png()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], r#"{"message": "forbidden"}"#);
    }

    #[actix_web::test]
    async fn non_http_detection_failures_map_to_bad_gateway() {
        let err = upstream_error(DetectionError::Malformed(
            crate::detection::model::MalformedPrediction { index: 3 },
        ));
        assert!(matches!(err, ApiError::Upstream { status: 502, .. }));
        let err = upstream_error(DetectionError::Upstream {
            status: 401,
            body: "bad key".into(),
        });
        assert!(matches!(err, ApiError::Upstream { status: 401, .. }));
    }
}
