//! Carga y gestión de configuración de la aplicación (fichero Excel + servidor).

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use url::Url;

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Libro Excel con las pestañas de linaje y biografías.
    pub excel_path: PathBuf,
    /// Libro de salida con las valoraciones de modelos.
    pub ratings_file: PathBuf,
    /// Libro de salida con las evaluaciones de genealogía.
    pub assessments_file: PathBuf,
    pub server_addr: String,
    /// Orígenes CORS permitidos; `None` significa cualquiera.
    pub cors_origins: Option<Vec<String>>,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let excel_path = env::var("EXCEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("Prompts.xlsx"));
        let ratings_file = env::var("RATINGS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("ai_model_ratings.xlsx"));
        let assessments_file = env::var("ASSESSMENTS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("genealogy_assessments.xlsx"));

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:5001".to_string());

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => Some(parse_cors_origins(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            excel_path,
            ratings_file,
            assessments_file,
            server_addr,
            cors_origins,
        })
    }
}

/// Interpreta la lista de orígenes CORS separados por comas y valida que
/// cada uno sea una URL bien formada.
pub fn parse_cors_origins(raw: &str) -> Result<Vec<String>> {
    let mut origins = Vec::new();
    for origin in raw.split(',') {
        let origin = origin.trim();
        if origin.is_empty() {
            continue;
        }
        Url::parse(origin).map_err(|_| anyhow!("Origen CORS inválido: {origin}"))?;
        origins.push(origin.trim_end_matches('/').to_string());
    }
    if origins.is_empty() {
        return Err(anyhow!("CORS_ORIGINS está definido pero no contiene orígenes"));
    }
    Ok(origins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cors_origins_acepta_lista_valida() {
        let origins =
            parse_cors_origins("http://localhost:5173, http://localhost:5174").unwrap();
        assert_eq!(
            origins,
            vec!["http://localhost:5173", "http://localhost:5174"]
        );
    }

    #[test]
    fn parse_cors_origins_rechaza_basura() {
        assert!(parse_cors_origins("esto no es una url").is_err());
        assert!(parse_cors_origins("").is_err());
    }
}
