use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Result as ActixResult};
use photonest_core::{BoundingBox, ClusterParams, Error, Face, FaceClusterer};
use photonest_storage::{
    FaceScanner, FaceStatus, IdentityGraph, LibraryStore, MediaIndexer, ThumbnailCache,
    ThumbnailSize,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<LibraryStore>,
    pub identity: Arc<IdentityGraph>,
    pub scanner: Arc<FaceScanner>,
    pub indexer: Arc<MediaIndexer>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub image_root: PathBuf,
}

#[derive(Deserialize)]
struct ClusterQuery {
    threshold: Option<f32>,
    min_cluster_size: Option<usize>,
    unassigned_only: Option<bool>,
}

#[derive(Deserialize)]
struct FaceListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    status: Option<String>,
    person_id: Option<String>,
}

#[derive(Deserialize)]
struct CreatePersonRequest {
    label: String,
}

#[derive(Deserialize)]
struct RenamePersonRequest {
    label: String,
}

#[derive(Deserialize)]
struct FaceIdsRequest {
    face_ids: Vec<String>,
}

#[derive(Deserialize)]
struct MergeRequest {
    source_person_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ScanControlRequest {
    action: String,
}

#[derive(Serialize)]
struct FaceItem {
    id: String,
    image_id: String,
    relative_path: Option<String>,
    image_url: Option<String>,
    bbox: BoundingBox,
    confidence: f32,
    person_id: Option<String>,
}

#[derive(Serialize)]
struct FaceListResponse {
    total: usize,
    limit: usize,
    offset: usize,
    items: Vec<FaceItem>,
}

#[derive(Serialize)]
struct ClusterItem {
    cluster_id: u32,
    face_ids: Vec<String>,
    representative_face_id: String,
    faces: Vec<FaceItem>,
}

#[derive(Serialize)]
struct ClusterResponse {
    total_clusters: usize,
    clusters: Vec<ClusterItem>,
}

#[derive(Serialize)]
struct PersonItem {
    id: String,
    label: String,
    face_count: usize,
    cover_face_id: Option<String>,
    cover_image_url: Option<String>,
}

#[derive(Serialize)]
struct PersonListResponse {
    total: usize,
    items: Vec<PersonItem>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(ctx: ApiContext, port: u16) -> std::io::Result<()> {
        let image_root = ctx.image_root.clone();
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(ctx.clone()))
                .route("/faces", web::get().to(list_faces))
                .route("/faces/clusters", web::get().to(cluster_faces))
                .route("/persons", web::get().to(list_persons))
                .route("/persons", web::post().to(create_person))
                .route("/persons/{id}", web::patch().to(rename_person))
                .route("/persons/{id}", web::delete().to(delete_person))
                .route("/persons/{id}/assign", web::post().to(assign_faces))
                .route("/persons/{id}/unassign", web::post().to(unassign_faces))
                .route("/persons/{id}/merge", web::post().to(merge_persons))
                .route("/scan/status", web::get().to(scan_status))
                .route("/scan/control", web::post().to(scan_control))
                .route("/scan/sync-media", web::post().to(sync_media))
                .route("/thumbnails/{size}/{path:.*}", web::get().to(get_thumbnail))
                .service(Files::new("/media", image_root.clone()))
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

/// Map engine errors onto the HTTP taxonomy: bad input is 400, unknown ids
/// are 404, a busy scanner is 409, everything else is 500.
fn error_response(err: &Error) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });
    match err {
        Error::PersonNotFound(_) | Error::FaceNotFound(_) | Error::ImageNotFound(_) => {
            HttpResponse::NotFound().json(body)
        }
        Error::InvalidThreshold(_)
        | Error::InvalidArgument(_)
        | Error::InvalidDimension { .. }
        | Error::ZeroNormEmbedding(_) => HttpResponse::BadRequest().json(body),
        Error::ScanInProgress => HttpResponse::Conflict().json(body),
        Error::Detection(_) => HttpResponse::ServiceUnavailable().json(body),
        _ => {
            error!("internal error: {err}");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

fn image_url(relative_path: &str) -> String {
    format!("/media/{relative_path}")
}

fn face_item(face: &Face, images: &HashMap<String, String>) -> FaceItem {
    let relative_path = images.get(&face.image_id).cloned();
    FaceItem {
        id: face.id.clone(),
        image_id: face.image_id.clone(),
        image_url: relative_path.as_deref().map(image_url),
        relative_path,
        bbox: face.bbox,
        confidence: face.confidence,
        person_id: face.person_id.clone(),
    }
}

fn image_path_map(ctx: &ApiContext) -> Result<HashMap<String, String>, Error> {
    Ok(ctx
        .store
        .list_images()?
        .into_iter()
        .map(|i| (i.id, i.relative_path))
        .collect())
}

async fn cluster_faces(
    ctx: web::Data<ApiContext>,
    query: web::Query<ClusterQuery>,
) -> ActixResult<HttpResponse> {
    let params = ClusterParams {
        threshold: query.threshold.unwrap_or(0.6),
        min_cluster_size: query.min_cluster_size.unwrap_or(1),
    };
    let unassigned_only = query.unassigned_only.unwrap_or(true);

    let store = ctx.store.clone();
    let result = web::block(move || {
        let faces = store.faces_snapshot(unassigned_only)?;
        let clusters = FaceClusterer::new(params).cluster(&faces)?;
        Ok::<_, Error>((faces, clusters))
    })
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let (faces, clusters) = match result {
        Ok(pair) => pair,
        Err(e) => return Ok(error_response(&e)),
    };

    let images = match image_path_map(&ctx) {
        Ok(map) => map,
        Err(e) => return Ok(error_response(&e)),
    };
    let by_id: HashMap<&str, &Face> = faces.iter().map(|f| (f.id.as_str(), f)).collect();

    let items: Vec<ClusterItem> = clusters
        .into_iter()
        .map(|cluster| {
            let faces = cluster
                .face_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()))
                .map(|f| face_item(f, &images))
                .collect();
            ClusterItem {
                cluster_id: cluster.cluster_id,
                face_ids: cluster.face_ids,
                representative_face_id: cluster.representative_face_id,
                faces,
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(ClusterResponse {
        total_clusters: items.len(),
        clusters: items,
    }))
}

async fn list_faces(
    ctx: web::Data<ApiContext>,
    query: web::Query<FaceListQuery>,
) -> ActixResult<HttpResponse> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0);
    let status = match query.status.as_deref() {
        None | Some("any") => FaceStatus::Any,
        Some("assigned") => FaceStatus::Assigned,
        Some("unassigned") => FaceStatus::Unassigned,
        Some(other) => {
            return Ok(error_response(&Error::InvalidArgument(format!(
                "unknown face status: {other}"
            ))))
        }
    };

    let listing = ctx
        .store
        .list_faces(status, query.person_id.as_deref(), limit, offset);
    let (total, faces) = match listing {
        Ok(pair) => pair,
        Err(e) => return Ok(error_response(&e)),
    };
    let images = match image_path_map(&ctx) {
        Ok(map) => map,
        Err(e) => return Ok(error_response(&e)),
    };

    Ok(HttpResponse::Ok().json(FaceListResponse {
        total,
        limit,
        offset,
        items: faces.iter().map(|f| face_item(f, &images)).collect(),
    }))
}

fn person_item(ctx: &ApiContext, person: &photonest_core::Person, face_count: usize) -> PersonItem {
    let cover_image_url = person
        .cover_face_id
        .as_deref()
        .and_then(|cover| ctx.store.get_face(cover).ok().flatten())
        .and_then(|face| ctx.store.get_image(&face.image_id).ok().flatten())
        .map(|image| image_url(&image.relative_path));

    PersonItem {
        id: person.id.clone(),
        label: person.label.clone(),
        face_count,
        cover_face_id: person.cover_face_id.clone(),
        cover_image_url,
    }
}

async fn list_persons(ctx: web::Data<ApiContext>) -> ActixResult<HttpResponse> {
    match ctx.store.list_persons() {
        Ok(summaries) => {
            let items: Vec<PersonItem> = summaries
                .iter()
                .map(|s| person_item(&ctx, &s.person, s.face_count))
                .collect();
            Ok(HttpResponse::Ok().json(PersonListResponse {
                total: items.len(),
                items,
            }))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

async fn create_person(
    ctx: web::Data<ApiContext>,
    req: web::Json<CreatePersonRequest>,
) -> ActixResult<HttpResponse> {
    match ctx.identity.create_person(&req.label) {
        Ok(person) => Ok(HttpResponse::Created().json(person_item(&ctx, &person, 0))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn rename_person(
    ctx: web::Data<ApiContext>,
    path: web::Path<String>,
    req: web::Json<RenamePersonRequest>,
) -> ActixResult<HttpResponse> {
    let person_id = path.into_inner();
    match ctx.identity.rename_person(&person_id, &req.label) {
        Ok(person) => {
            let face_count = ctx
                .store
                .faces_for_person(&person.id)
                .map(|f| f.len())
                .unwrap_or(0);
            Ok(HttpResponse::Ok().json(person_item(&ctx, &person, face_count)))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

async fn delete_person(
    ctx: web::Data<ApiContext>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    match ctx.identity.delete_person(&path.into_inner()) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn assign_faces(
    ctx: web::Data<ApiContext>,
    path: web::Path<String>,
    req: web::Json<FaceIdsRequest>,
) -> ActixResult<HttpResponse> {
    match ctx.identity.assign_faces(&path.into_inner(), &req.face_ids) {
        Ok(count) => Ok(HttpResponse::Ok().json(serde_json::json!({ "count": count }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn unassign_faces(
    ctx: web::Data<ApiContext>,
    path: web::Path<String>,
    req: web::Json<FaceIdsRequest>,
) -> ActixResult<HttpResponse> {
    let person_id = path.into_inner();
    if req.face_ids.is_empty() {
        return Ok(error_response(&Error::InvalidArgument(
            "no face_ids provided".to_string(),
        )));
    }
    match ctx.identity.detach_faces(&person_id, &req.face_ids) {
        Ok(count) => Ok(HttpResponse::Ok().json(serde_json::json!({ "count": count }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn merge_persons(
    ctx: web::Data<ApiContext>,
    path: web::Path<String>,
    req: web::Json<MergeRequest>,
) -> ActixResult<HttpResponse> {
    match ctx
        .identity
        .merge_persons(&path.into_inner(), &req.source_person_ids)
    {
        Ok(summary) => Ok(HttpResponse::Ok().json(person_item(&ctx, &summary.person, summary.face_count))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn scan_status(ctx: web::Data<ApiContext>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(ctx.scanner.status()))
}

async fn scan_control(
    ctx: web::Data<ApiContext>,
    req: web::Json<ScanControlRequest>,
) -> ActixResult<HttpResponse> {
    match req.action.as_str() {
        "start" => match ctx.scanner.start() {
            Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
                "status": "started",
                "message": "face scanning started"
            }))),
            Err(e) => Ok(error_response(&e)),
        },
        "stop" => match ctx.scanner.request_stop() {
            Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
                "status": "stopping",
                "message": "face scanning will stop after the current image"
            }))),
            Err(e) => Ok(error_response(&e)),
        },
        other => Ok(error_response(&Error::InvalidArgument(format!(
            "invalid action: {other} (use 'start' or 'stop')"
        )))),
    }
}

async fn sync_media(ctx: web::Data<ApiContext>) -> ActixResult<HttpResponse> {
    let indexer = ctx.indexer.clone();
    let result = web::block(move || indexer.sync())
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    match result {
        Ok(report) => Ok(HttpResponse::Ok().json(report)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn get_thumbnail(
    ctx: web::Data<ApiContext>,
    path: web::Path<(String, String)>,
    req: HttpRequest,
) -> ActixResult<HttpResponse> {
    let (size_raw, relative_path) = path.into_inner();
    let size = match ThumbnailSize::parse(&size_raw) {
        Ok(size) => size,
        Err(e) => return Ok(error_response(&e)),
    };

    let thumbnails = ctx.thumbnails.clone();
    let rendered = web::block(move || thumbnails.get_or_create(&relative_path, size))
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    match rendered {
        Ok(path) => {
            let file = NamedFile::open(path)?;
            Ok(file.into_response(&req))
        }
        Err(e) => Ok(error_response(&e)),
    }
}
