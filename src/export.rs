//! Exportación de las valoraciones como documento JSON descargable con
//! nombre fechado, y reimportación del mismo documento.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ModelRating;

/// Documento de exportación: metadatos más la lista completa de
/// valoraciones tal cual se recogieron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingsExport {
    pub exported_at: String,
    pub count: usize,
    pub ratings: Vec<ModelRating>,
}

/// Nombre del fichero de descarga, fechado con el día de la exportación.
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("ai_model_ratings_{}.json", now.format("%Y-%m-%d"))
}

/// Construye el documento de exportación para el instante dado.
pub fn export_document(ratings: &[ModelRating], now: DateTime<Utc>) -> RatingsExport {
    RatingsExport {
        exported_at: now.to_rfc3339(),
        count: ratings.len(),
        ratings: ratings.to_vec(),
    }
}

/// Reimporta un documento exportado y devuelve las valoraciones que
/// contiene. El recuento declarado debe cuadrar con la lista.
pub fn import_document(raw: &str) -> Result<Vec<ModelRating>> {
    let document: RatingsExport =
        serde_json::from_str(raw).map_err(|e| anyhow!("Documento de exportación inválido: {e}"))?;
    if document.count != document.ratings.len() {
        return Err(anyhow!(
            "El recuento declarado ({}) no cuadra con las valoraciones ({})",
            document.count,
            document.ratings.len()
        ));
    }
    Ok(document.ratings)
}
