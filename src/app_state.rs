use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{config::AppConfig, store::DataStore};

/// Estado compartido de la aplicación. El candado sobre el almacén
/// serializa también las escrituras de los libros de salida: nunca hay
/// dos anexados concurrentes sobre el mismo fichero.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<Mutex<DataStore>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}
