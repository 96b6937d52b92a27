//! Acceso a los datos tabulares: lectura del libro Excel de prompts
//! (pestañas de linaje y de biografías) y escritura de los libros de
//! salida con valoraciones y evaluaciones.
//!
//! El almacén es el único recurso mutable compartido; las escrituras se
//! serializan con el candado de `AppState` que lo envuelve.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::Utc;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{
    score_label, BiographyRecord, GenealogyAssessment, LineageQuestion, LineageRecord,
    ModelRating, Person, RatingCategory, RelationshipType, Scientist,
};

pub const LINEAGE_SHEET: &str = "people to test (lineage)";
pub const BIOGRAPHY_SHEET: &str = "people to test (bio)";

const RATINGS_SHEET: &str = "AI Model Ratings";
const ASSESSMENTS_SHEET: &str = "Genealogy Assessments";

// Disposición del árbol genealógico en el frontend.
const TREE_X_START: i64 = 300;
const TREE_Y_START: i64 = 50;
const TREE_Y_SPACING: i64 = 120;

/// Almacén en memoria de los datos de referencia y de los registros
/// añadidos durante la sesión.
pub struct DataStore {
    excel_path: PathBuf,
    ratings_file: PathBuf,
    assessments_file: PathBuf,

    people: Vec<Person>,
    lineage: HashMap<String, LineageRecord>,

    /// Científicos con biografía, en orden de primera aparición en la hoja.
    scientists: Vec<Scientist>,
    biographies: HashMap<String, Vec<BiographyRecord>>,
    /// Modelos disponibles, en orden de primera aparición.
    models: Vec<String>,

    ratings: Vec<ModelRating>,
    assessments: Vec<GenealogyAssessment>,
}

impl DataStore {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            excel_path: cfg.excel_path.clone(),
            ratings_file: cfg.ratings_file.clone(),
            assessments_file: cfg.assessments_file.clone(),
            people: Vec::new(),
            lineage: HashMap::new(),
            scientists: Vec::new(),
            biographies: HashMap::new(),
            models: Vec::new(),
            ratings: Vec::new(),
            assessments: Vec::new(),
        }
    }

    /// Relee ambas pestañas del libro Excel. Un fichero ausente es un
    /// error recuperable: el almacén queda vacío y la aplicación sigue
    /// en estado de carga.
    pub fn reload(&mut self) -> Result<()> {
        if !self.excel_path.exists() {
            self.people.clear();
            self.lineage.clear();
            self.scientists.clear();
            self.biographies.clear();
            self.models.clear();
            return Err(anyhow!(
                "No se encontró el fichero Excel: {}",
                self.excel_path.display()
            ));
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.excel_path)
            .map_err(|e| anyhow!("No se pudo abrir {}: {e}", self.excel_path.display()))?;

        self.load_lineage(&mut workbook);
        self.load_biographies(&mut workbook);
        Ok(())
    }

    /// Carga la pestaña de linaje: una fila por científico a evaluar.
    fn load_lineage(&mut self, workbook: &mut Xlsx<std::io::BufReader<std::fs::File>>) {
        self.people.clear();
        self.lineage.clear();

        let range = match workbook.worksheet_range(LINEAGE_SHEET) {
            Ok(range) => range,
            Err(e) => {
                error!("No se pudo leer la pestaña '{LINEAGE_SHEET}': {e}");
                return;
            }
        };

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(row) => header_index(row),
            None => return,
        };

        let mut person_id: i64 = 1;
        for row in rows {
            let name = cell_text(row, headers.get("Name"));
            if name.is_empty() {
                continue;
            }
            if self.lineage.contains_key(&name) {
                // Filas duplicadas: se conserva la primera.
                continue;
            }

            let scientist_type = cell_text_or(row, headers.get("Type"), "Unknown");
            let gender = cell_text_or(row, headers.get("Gender"), "Unknown");

            self.people.push(Person {
                id: person_id,
                name: name.clone(),
                position: format!("{scientist_type} | {gender}"),
                level: 0,
                x: TREE_X_START,
                y: TREE_Y_START + self.people.len() as i64 * TREE_Y_SPACING,
            });

            self.lineage.insert(
                name,
                LineageRecord {
                    person_id,
                    direct_supervisor: parse_lineage_results(&cell_text(
                        row,
                        headers.get("1 up"),
                    )),
                    direct_students: parse_lineage_results(&cell_text(
                        row,
                        headers.get("1 down"),
                    )),
                    all_ancestors: parse_lineage_results(&cell_text(
                        row,
                        headers.get("all ancestors"),
                    )),
                    all_descendants: parse_lineage_results(&cell_text(
                        row,
                        headers.get("all descendants"),
                    )),
                },
            );

            person_id += 1;
        }

        info!(
            "Cargados {} científicos con datos de linaje desde '{LINEAGE_SHEET}'.",
            self.people.len()
        );
    }

    /// Carga la pestaña de biografías: una fila por (científico, modelo).
    fn load_biographies(&mut self, workbook: &mut Xlsx<std::io::BufReader<std::fs::File>>) {
        self.scientists.clear();
        self.biographies.clear();
        self.models.clear();

        let range = match workbook.worksheet_range(BIOGRAPHY_SHEET) {
            Ok(range) => range,
            Err(e) => {
                error!("No se pudo leer la pestaña '{BIOGRAPHY_SHEET}': {e}");
                return;
            }
        };

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(row) => header_index(row),
            None => return,
        };

        for row in rows {
            let name = cell_text(row, headers.get("Name"));
            if name.is_empty() {
                continue;
            }

            let model = cell_text_or(row, headers.get("Model"), "Unknown");
            let scientist_type = cell_text_or(row, headers.get("Type"), "Unknown");
            let gender = cell_text_or(row, headers.get("Gender"), "Unknown");

            let record = BiographyRecord {
                name: name.clone(),
                scientist_type: scientist_type.clone(),
                gender: gender.clone(),
                model: model.clone(),
                minimal_biography: cell_text(row, headers.get("Biography(Minimal)")),
                comprehensive_biography: cell_text(
                    row,
                    headers.get("Biography(Comprehensive)"),
                ),
            };

            if !self.biographies.contains_key(&name) {
                self.scientists.push(Scientist {
                    name: name.clone(),
                    scientist_type,
                    gender,
                });
            }
            if !self.models.contains(&model) {
                self.models.push(model.clone());
            }
            self.biographies.entry(name).or_default().push(record);
        }

        info!(
            "Cargadas biografías de {} científicos ({} modelos) desde '{BIOGRAPHY_SHEET}'.",
            self.scientists.len(),
            self.models.len()
        );
    }

    // -----------------------------------------------------------------
    // Lecturas
    // -----------------------------------------------------------------

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn person_by_id(&self, id: i64) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    pub fn lineage_for(&self, scientist: &str) -> Option<&LineageRecord> {
        self.lineage.get(scientist)
    }

    pub fn scientists(&self) -> &[Scientist] {
        &self.scientists
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Biografías de todos los modelos para un científico.
    pub fn biographies_for(&self, scientist: &str) -> Option<&[BiographyRecord]> {
        self.biographies.get(scientist).map(|v| v.as_slice())
    }

    /// Biografía de un científico para un modelo concreto; si el modelo no
    /// existe se devuelve la del primer modelo disponible.
    pub fn biography_for_model(
        &self,
        scientist: &str,
        model: &str,
    ) -> Option<&BiographyRecord> {
        let records = self.biographies.get(scientist)?;
        records
            .iter()
            .find(|r| r.model == model)
            .or_else(|| records.first())
    }

    /// Científicos que tienen biografía para un modelo concreto.
    pub fn scientists_for_model(&self, model: &str) -> Vec<&BiographyRecord> {
        self.scientists
            .iter()
            .filter_map(|s| {
                self.biographies
                    .get(&s.name)
                    .and_then(|records| records.iter().find(|r| r.model == model))
            })
            .collect()
    }

    /// Preguntas de supervisión precomputadas para un científico, derivadas
    /// de sus celdas de linaje. Las relaciones indirectas (donde el
    /// científico no aparece como supervisor ni como estudiante) se omiten.
    pub fn questions_for(&self, scientist: &str) -> Vec<LineageQuestion> {
        let Some(lineage) = self.lineage.get(scientist) else {
            return Vec::new();
        };

        let related = lineage
            .direct_supervisor
            .iter()
            .chain(lineage.direct_students.iter())
            .chain(lineage.all_ancestors.iter())
            .chain(lineage.all_descendants.iter());

        let mut questions = Vec::new();
        let mut used_names: HashSet<String> = HashSet::new();

        for entry in related {
            let supervisor = json_text(entry.get("Name_supervisor"));
            let student = json_text(entry.get("Name_student"));

            let (other_person, relationship_type) = if supervisor == scientist {
                (student, RelationshipType::Supervises)
            } else if student == scientist {
                (supervisor, RelationshipType::SupervisedBy)
            } else {
                continue;
            };

            if other_person.is_empty() || !used_names.insert(other_person.clone()) {
                continue;
            }

            let expected_answer = match relationship_type {
                RelationshipType::Supervises => "A_supervises_B",
                RelationshipType::SupervisedBy => "B_supervises_A",
            };

            questions.push(LineageQuestion {
                scientist: scientist.to_string(),
                other_person,
                relationship_type,
                institution: json_text(entry.get("Institution_student")),
                year: json_text(entry.get("Year_Dissertation_student")),
                confidence: json_text(entry.get("Confidence")),
                expected_answer: expected_answer.to_string(),
            });
        }

        questions
    }

    pub fn ratings(&self) -> &[ModelRating] {
        &self.ratings
    }

    pub fn assessments(&self) -> &[GenealogyAssessment] {
        &self.assessments
    }

    // -----------------------------------------------------------------
    // Escrituras (anexado + volcado del libro de salida)
    // -----------------------------------------------------------------

    /// Registra una valoración de modelo y vuelca el libro de salida.
    /// Cada envío es un anexado independiente: no hay updates ni deletes.
    pub fn save_rating(&mut self, mut rating: ModelRating) -> Result<()> {
        let mut seen = HashSet::new();
        for cs in &rating.ratings {
            if !seen.insert(cs.category) {
                return Err(anyhow!(
                    "Valoración con categoría duplicada: {}",
                    cs.category.as_str()
                ));
            }
        }

        if rating.id.is_empty() {
            rating.id = Uuid::new_v4().to_string();
        }
        if rating.timestamp.is_empty() {
            rating.timestamp = Utc::now().to_rfc3339();
        }

        let scientist = rating.scientist_name.clone();
        let model = rating.model.clone();
        self.ratings.push(rating);
        self.write_ratings_file()?;

        info!("Guardada valoración de {scientist} con el modelo {model}.");
        Ok(())
    }

    /// Registra una evaluación de genealogía y vuelca el libro de salida.
    pub fn save_assessment(&mut self, mut assessment: GenealogyAssessment) -> Result<()> {
        if assessment.person_name.is_empty() {
            return Err(anyhow!("La evaluación no indica el científico evaluado"));
        }
        if assessment.id.is_empty() {
            assessment.id = Uuid::new_v4().to_string();
        }
        if assessment.timestamp.is_empty() {
            assessment.timestamp = Utc::now().to_rfc3339();
        }

        let person = assessment.person_name.clone();
        self.assessments.push(assessment);
        self.write_assessments_file()?;

        info!("Guardada evaluación de genealogía de {person}.");
        Ok(())
    }

    fn write_ratings_file(&self) -> Result<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(RATINGS_SHEET)?;

        let headers = [
            "ID",
            "Scientist Name",
            "AI Model",
            "Technique",
            "Prompt",
            "Response",
            "Affiliation Score",
            "Research Score",
            "Gender Score",
            "Timestamp",
            "Notes",
        ];
        for (col, header) in headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }

        for (idx, rating) in self.ratings.iter().enumerate() {
            let row = idx as u32 + 1;
            worksheet.write_string(row, 0, rating.id.as_str())?;
            worksheet.write_string(row, 1, rating.scientist_name.as_str())?;
            worksheet.write_string(row, 2, rating.model.as_str())?;
            worksheet.write_string(row, 3, rating.technique.as_str())?;
            worksheet.write_string(row, 4, rating.prompt.as_str())?;
            worksheet.write_string(row, 5, rating.response.as_str())?;
            worksheet.write_string(row, 6, category_cell(rating, RatingCategory::Affiliation))?;
            worksheet.write_string(row, 7, category_cell(rating, RatingCategory::Research))?;
            worksheet.write_string(row, 8, category_cell(rating, RatingCategory::Gender))?;
            worksheet.write_string(row, 9, rating.timestamp.as_str())?;
            worksheet.write_string(row, 10, rating.notes.as_deref().unwrap_or(""))?;
        }

        workbook.save(&self.ratings_file).map_err(|e| {
            error!(
                "Error guardando valoraciones en {}: {e}",
                self.ratings_file.display()
            );
            anyhow!("No se pudo escribir el libro de valoraciones: {e}")
        })?;

        info!(
            "Guardadas {} valoraciones en {}.",
            self.ratings.len(),
            self.ratings_file.display()
        );
        Ok(())
    }

    fn write_assessments_file(&self) -> Result<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(ASSESSMENTS_SHEET)?;

        let headers = [
            "ID",
            "Person Name",
            "Supervisors",
            "Supervisees",
            "Supervisors Source URL",
            "Supervisees Source URL",
            "Timestamp",
            "Notes",
        ];
        for (col, header) in headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }

        for (idx, assessment) in self.assessments.iter().enumerate() {
            let row = idx as u32 + 1;
            worksheet.write_string(row, 0, assessment.id.as_str())?;
            worksheet.write_string(row, 1, assessment.person_name.as_str())?;
            worksheet.write_string(row, 2, assessment.supervisors.as_str())?;
            worksheet.write_string(row, 3, assessment.supervisees.as_str())?;
            worksheet.write_string(
                row,
                4,
                assessment.supervisors_source_url.as_deref().unwrap_or(""),
            )?;
            worksheet.write_string(
                row,
                5,
                assessment.supervisees_source_url.as_deref().unwrap_or(""),
            )?;
            worksheet.write_string(row, 6, assessment.timestamp.as_str())?;
            worksheet.write_string(row, 7, assessment.notes.as_deref().unwrap_or(""))?;
        }

        workbook.save(&self.assessments_file).map_err(|e| {
            error!(
                "Error guardando evaluaciones en {}: {e}",
                self.assessments_file.display()
            );
            anyhow!("No se pudo escribir el libro de evaluaciones: {e}")
        })?;

        info!(
            "Guardadas {} evaluaciones en {}.",
            self.assessments.len(),
            self.assessments_file.display()
        );
        Ok(())
    }
}

/// Etiqueta textual de la puntuación de una categoría; "Unknown" si la
/// valoración no la incluye (formato histórico del libro de salida).
fn category_cell(rating: &ModelRating, category: RatingCategory) -> &'static str {
    match rating.score_for(category) {
        Some(score) => score_label(score),
        None => score_label(0),
    }
}

/// Mapa nombre de columna → índice, a partir de la fila de cabeceras.
fn header_index(row: &[Data]) -> HashMap<String, usize> {
    row.iter()
        .enumerate()
        .map(|(idx, cell)| (cell_to_string(cell), idx))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn cell_text(row: &[Data], idx: Option<&usize>) -> String {
    idx.and_then(|i| row.get(*i))
        .map(cell_to_string)
        .unwrap_or_default()
}

fn cell_text_or(row: &[Data], idx: Option<&usize>, default: &str) -> String {
    let text = cell_text(row, idx);
    if text.is_empty() {
        default.to_string()
    } else {
        text
    }
}

/// Interpreta una celda JSON de linaje con la forma `{"results": [...]}`.
/// Un JSON malformado se registra (truncado) y se trata como vacío.
fn parse_lineage_results(raw: &str) -> Vec<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Err(e) => {
            let snippet: String = raw.chars().take(100).collect();
            warn!("No se pudo interpretar el JSON de linaje ({e}): {snippet}");
            Vec::new()
        }
    }
}

/// Texto de un campo JSON que puede venir como cadena, número o nulo.
fn json_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
