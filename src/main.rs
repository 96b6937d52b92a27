use std::sync::{Arc, Mutex};

use axum::http::HeaderValue;
use axum::Router;
use tokio::sync::oneshot;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use genealogy_rating_webapp::{api, app_state::AppState, config::AppConfig, store::DataStore};

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().expect("Error al cargar la configuración");

    // 3. Cargar el libro Excel con los datos de referencia. Un fichero
    //    ausente deja la aplicación en estado de carga, no la tumba.
    let mut store = DataStore::new(&cfg);
    if let Err(err) = store.reload() {
        error!("No se pudieron cargar los datos de referencia: {err}");
    }
    info!(
        "Datos cargados: {} personas (linaje), {} científicos con biografías, {} modelos.",
        store.people().len(),
        store.scientists().len(),
        store.models().len()
    );

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        store: Arc::new(Mutex::new(store)),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(build_cors_layer(&cfg));

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .unwrap();
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .unwrap();

    info!("✅ Servidor cerrado correctamente.");
}

/// Capa CORS: los orígenes configurados en `CORS_ORIGINS`, o cualquiera
/// si no se ha definido la variable.
fn build_cors_layer(cfg: &AppConfig) -> CorsLayer {
    match &cfg.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}
