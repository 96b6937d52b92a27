//! Modelos de dominio del servicio de evaluación (linaje académico y
//! biografías generadas por modelos de IA).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Persona de la pestaña de linaje, con coordenadas de presentación
/// para el árbol genealógico del frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub level: i64,
    pub x: i64,
    pub y: i64,
}

/// Científico con datos de biografía (pestaña "people to test (bio)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scientist {
    pub name: String,
    #[serde(rename = "type")]
    pub scientist_type: String,
    pub gender: String,
}

/// Biografía generada por un modelo concreto para un científico.
/// La clave lógica es el par (científico, modelo).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiographyRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub scientist_type: String,
    pub gender: String,
    pub model: String,
    pub minimal_biography: String,
    pub comprehensive_biography: String,
}

/// Categoría de precisión que se puntúa en una biografía.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingCategory {
    Affiliation,
    Research,
    Gender,
    Supervision,
}

impl RatingCategory {
    /// Categorías obligatorias del flujo canónico de valoración.
    pub const REQUIRED: [RatingCategory; 3] = [
        RatingCategory::Affiliation,
        RatingCategory::Research,
        RatingCategory::Gender,
    ];

    /// Nombre de la categoría tal y como viaja por la API.
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingCategory::Affiliation => "affiliation",
            RatingCategory::Research => "research",
            RatingCategory::Gender => "gender",
            RatingCategory::Supervision => "supervision",
        }
    }
}

/// Ancla textual de la escala ordinal 1–5 usada en los libros de salida.
pub fn score_label(score: i64) -> &'static str {
    match score {
        1 => "Incorrect",
        2 => "Partially Correct",
        3 => "Not Applicable",
        4 => "I Don't Know",
        5 => "Correct",
        _ => "Unknown",
    }
}

/// Puntuación de una categoría dentro de una valoración.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: RatingCategory,
    pub score: i64,
}

/// Técnica de prompting con la que se generó la respuesta del modelo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technique {
    #[serde(rename = "zero-shot")]
    ZeroShot,
    #[serde(rename = "few-shot")]
    FewShot,
    #[serde(rename = "chain-of-thought")]
    ChainOfThought,
}

impl Technique {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::ZeroShot => "zero-shot",
            Technique::FewShot => "few-shot",
            Technique::ChainOfThought => "chain-of-thought",
        }
    }
}

impl std::fmt::Display for Technique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Valoración completa de la salida de un modelo para un científico.
/// Inmutable una vez enviada; la identidad es el `id` generado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRating {
    pub id: String,
    pub scientist_name: String,
    pub model: String,
    pub technique: Technique,
    pub prompt: String,
    pub response: String,
    /// Una entrada por categoría; las categorías no se repiten.
    pub ratings: Vec<CategoryScore>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ModelRating {
    /// Puntuación registrada para una categoría, si existe.
    pub fn score_for(&self, category: RatingCategory) -> Option<i64> {
        self.ratings
            .iter()
            .find(|r| r.category == category)
            .map(|r| r.score)
    }
}

/// Juicio de un evaluador sobre los supervisores y supervisados de un
/// científico. Puede editarse en el cliente antes del envío definitivo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenealogyAssessment {
    pub id: String,
    pub person_name: String,
    pub supervisors: String,
    pub supervisees: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisors_source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisees_source_url: Option<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Tipo de relación de supervisión respecto al científico evaluado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Supervises,
    SupervisedBy,
}

/// Pregunta precomputada sobre una relación de supervisión.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageQuestion {
    pub scientist: String,
    pub other_person: String,
    pub relationship_type: RelationshipType,
    pub institution: String,
    pub year: String,
    pub confidence: String,
    pub expected_answer: String,
}

/// Datos crudos de linaje de un científico, tal y como vienen en las
/// celdas JSON de la hoja de cálculo.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineageRecord {
    pub person_id: i64,
    pub direct_supervisor: Vec<Value>,
    pub direct_students: Vec<Value>,
    pub all_ancestors: Vec<Value>,
    pub all_descendants: Vec<Value>,
}

/// Clave estable de modelo para usar en mapas: minúsculas y cualquier
/// carácter no alfanumérico sustituido por `_`. Distinta del nombre crudo
/// y de la etiqueta anonimizada.
pub fn model_key(model: &str) -> String {
    model
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_key_normaliza_nombres() {
        assert_eq!(model_key("GPT-4 Turbo"), "gpt_4_turbo");
        assert_eq!(model_key("deepseek.v3"), "deepseek_v3");
        assert_eq!(model_key("claude"), "claude");
    }

    #[test]
    fn score_label_cubre_las_cinco_anclas() {
        assert_eq!(score_label(1), "Incorrect");
        assert_eq!(score_label(2), "Partially Correct");
        assert_eq!(score_label(3), "Not Applicable");
        assert_eq!(score_label(4), "I Don't Know");
        assert_eq!(score_label(5), "Correct");
        assert_eq!(score_label(0), "Unknown");
    }

    #[test]
    fn technique_serializa_con_guiones() {
        let json = serde_json::to_string(&Technique::ChainOfThought).unwrap();
        assert_eq!(json, "\"chain-of-thought\"");
        let back: Technique = serde_json::from_str("\"few-shot\"").unwrap();
        assert_eq!(back, Technique::FewShot);
    }

    #[test]
    fn rating_category_serializa_en_minusculas() {
        let json = serde_json::to_string(&RatingCategory::Affiliation).unwrap();
        assert_eq!(json, "\"affiliation\"");
    }
}
