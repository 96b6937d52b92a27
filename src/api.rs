//! Capa HTTP: router de axum y handlers de los endpoints REST del
//! servicio de evaluación (genealogía, biografías y valoraciones).

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    aggregate, anonymize::anonymize, app_state::AppState, export,
    models::{CategoryScore, GenealogyAssessment, ModelRating, Technique},
};

// --- Payloads de la API ---

#[derive(Deserialize)]
pub struct RatingPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub scientist_name: String,
    pub model: String,
    pub technique: Technique,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub response: String,
    pub ratings: Vec<CategoryScore>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct AssessmentPayload {
    #[serde(default)]
    pub id: String,
    pub person_name: String,
    #[serde(default)]
    pub supervisors: String,
    #[serde(default)]
    pub supervisees: String,
    #[serde(default)]
    pub supervisors_source_url: Option<String>,
    #[serde(default)]
    pub supervisees_source_url: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub notes: Option<String>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/genealogy/people", get(people_handler))
        .route("/api/genealogy/people/:id", get(person_handler))
        .route("/api/genealogy/reload", post(reload_handler))
        .route("/api/genealogy/lineage/:name", get(lineage_handler))
        .route("/api/genealogy/questions/:name", get(questions_handler))
        .route(
            "/api/genealogy/assessments",
            post(save_assessment_handler).get(list_assessments_handler),
        )
        .route("/api/biography/scientists", get(biography_scientists_handler))
        .route("/api/biography/models", get(models_handler))
        .route(
            "/api/biography/models/:model/scientists",
            get(scientists_by_model_handler),
        )
        .route("/api/biography/:name", get(biography_handler))
        .route("/api/biography/:name/:model", get(biography_by_model_handler))
        .route(
            "/api/ratings",
            post(save_rating_handler).get(list_ratings_handler),
        )
        .route("/api/ratings/summary", get(ratings_summary_handler))
        .route("/api/ratings/export", get(export_ratings_handler))
        .route("/api/health", get(health_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers de genealogía ---

#[axum::debug_handler]
async fn people_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let people = store.people();
    Json(json!({
        "success": true,
        "data": people,
        "count": people.len(),
    }))
}

#[axum::debug_handler]
async fn person_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let store = state.store.lock().unwrap();
    match store.person_by_id(id) {
        Some(person) => Ok(Json(json!({ "success": true, "data": person }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Persona no encontrada" })),
        )),
    }
}

#[axum::debug_handler]
async fn reload_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut store = state.store.lock().unwrap();
    match store.reload() {
        Ok(()) => Ok(Json(json!({
            "success": true,
            "message": "Datos recargados correctamente",
            "count": store.people().len(),
        }))),
        Err(e) => {
            error!("Error recargando los datos del Excel: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            ))
        }
    }
}

#[axum::debug_handler]
async fn lineage_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let store = state.store.lock().unwrap();
    match store.lineage_for(&name) {
        Some(lineage) => Ok(Json(json!({
            "success": true,
            "scientist": name,
            "lineage": lineage,
        }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": format!("No hay datos de linaje para el científico: {name}"),
            })),
        )),
    }
}

#[axum::debug_handler]
async fn questions_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let questions = store.questions_for(&name);
    Json(json!({
        "success": true,
        "scientist": name,
        "questions": questions,
        "count": questions.len(),
    }))
}

#[axum::debug_handler]
async fn save_assessment_handler(
    State(state): State<AppState>,
    Json(payload): Json<AssessmentPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let assessment = GenealogyAssessment {
        id: payload.id,
        person_name: payload.person_name,
        supervisors: payload.supervisors,
        supervisees: payload.supervisees,
        supervisors_source_url: payload.supervisors_source_url,
        supervisees_source_url: payload.supervisees_source_url,
        timestamp: payload.timestamp,
        notes: payload.notes,
    };

    let mut store = state.store.lock().unwrap();
    match store.save_assessment(assessment) {
        Ok(()) => {
            let saved = store.assessments().last();
            Ok(Json(json!({
                "success": true,
                "message": "Evaluación de genealogía guardada correctamente",
                "id": saved.map(|a| a.id.clone()),
            })))
        }
        Err(e) => {
            error!("Error guardando la evaluación de genealogía: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            ))
        }
    }
}

#[axum::debug_handler]
async fn list_assessments_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let assessments = store.assessments();
    Json(json!({
        "success": true,
        "assessments": assessments,
        "count": assessments.len(),
    }))
}

// --- Handlers de biografías ---

#[axum::debug_handler]
async fn biography_scientists_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let scientists = store.scientists();
    Json(json!({
        "success": true,
        "scientists": scientists,
        "count": scientists.len(),
    }))
}

#[axum::debug_handler]
async fn models_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let models = store.models();
    // Etiquetas anonimizadas para mostrar al evaluador sin revelar el
    // proveedor de cada modelo.
    let labels: Value = models
        .iter()
        .map(|m| (m.clone(), Value::String(anonymize(m).to_string())))
        .collect::<serde_json::Map<String, Value>>()
        .into();
    Json(json!({
        "success": true,
        "models": models,
        "labels": labels,
        "count": models.len(),
    }))
}

#[axum::debug_handler]
async fn scientists_by_model_handler(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let scientists: Vec<Value> = store
        .scientists_for_model(&model)
        .into_iter()
        .map(|record| {
            json!({
                "name": record.name,
                "type": record.scientist_type,
                "gender": record.gender,
                "model": record.model,
            })
        })
        .collect();
    Json(json!({
        "success": true,
        "model": model,
        "scientists": scientists,
        "count": scientists.len(),
    }))
}

#[axum::debug_handler]
async fn biography_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let store = state.store.lock().unwrap();
    match store.biographies_for(&name) {
        Some(records) => {
            // Mapa modelo → biografía para el científico pedido.
            let mut biography = serde_json::Map::new();
            for record in records {
                biography.insert(
                    record.model.clone(),
                    serde_json::to_value(record).unwrap_or(Value::Null),
                );
            }
            Ok(Json(json!({
                "success": true,
                "scientist": name,
                "biography": biography,
            })))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": format!("No hay datos de biografía para el científico: {name}"),
            })),
        )),
    }
}

#[axum::debug_handler]
async fn biography_by_model_handler(
    State(state): State<AppState>,
    Path((name, model)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let store = state.store.lock().unwrap();
    match store.biography_for_model(&name, &model) {
        Some(record) => Ok(Json(json!({
            "success": true,
            "scientist": name,
            "model": model,
            "biography": record,
        }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": format!(
                    "No hay datos de biografía para el científico: {name} con el modelo: {model}"
                ),
            })),
        )),
    }
}

// --- Handlers de valoraciones ---

#[axum::debug_handler]
async fn save_rating_handler(
    State(state): State<AppState>,
    Json(payload): Json<RatingPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // Si el cliente no indica el científico, se intenta extraer del
    // prefijo del prompt ("Nombre — ...").
    let scientist_name = if payload.scientist_name.is_empty() {
        payload
            .prompt
            .split(" — ")
            .next()
            .filter(|prefix| *prefix != payload.prompt)
            .unwrap_or("Unknown")
            .to_string()
    } else {
        payload.scientist_name
    };

    let rating = ModelRating {
        id: payload.id,
        scientist_name,
        model: payload.model,
        technique: payload.technique,
        prompt: payload.prompt,
        response: payload.response,
        ratings: payload.ratings,
        timestamp: payload.timestamp,
        notes: payload.notes,
    };

    let mut store = state.store.lock().unwrap();
    match store.save_rating(rating) {
        Ok(()) => {
            let saved = store.ratings().last();
            Ok(Json(json!({
                "success": true,
                "message": "Valoración guardada correctamente",
                "id": saved.map(|r| r.id.clone()),
            })))
        }
        Err(e) => {
            error!("Error guardando la valoración: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            ))
        }
    }
}

#[axum::debug_handler]
async fn list_ratings_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let ratings = store.ratings();
    Json(json!({
        "success": true,
        "ratings": ratings,
        "count": ratings.len(),
    }))
}

#[axum::debug_handler]
async fn ratings_summary_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let summary = aggregate::summarize(store.ratings());
    Json(json!({ "success": true, "summary": summary }))
}

#[axum::debug_handler]
async fn export_ratings_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().unwrap();
    let now = Utc::now();
    let document = export::export_document(store.ratings(), now);
    Json(json!({
        "success": true,
        "filename": export::export_filename(now),
        "document": document,
    }))
}

// --- Salud y apagado ---

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().unwrap();
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "genealogy-api",
        "people_count": store.people().len(),
    }))
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}
