//! Controlador de la sesión de evaluación: la máquina de estados que guía
//! al evaluador por fases y elementos, comprueba la completitud de las
//! puntuaciones y envía los registros al backend uno a uno.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    model_key, CategoryScore, GenealogyAssessment, ModelRating, RatingCategory, Technique,
};
use crate::store::DataStore;

/// Fase de la sesión de biografías, recorrida siempre en este orden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Minimal,
    Comprehensive,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Minimal => Some(Phase::Comprehensive),
            Phase::Comprehensive => None,
        }
    }
}

/// Estado del controlador. El resultado del envío es un estado terminal
/// único con un indicador de éxito, no dos estados distintos.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    NotStarted,
    InProgress { phase: Phase, item_index: usize },
    Submitting,
    Completed { all_succeeded: bool },
}

/// Recuento del resultado de un envío en bloque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub submitted: usize,
    pub failed: usize,
}

impl SubmitOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Destino de los registros enviados. En producción es la API REST; en
/// los tests, un sumidero en memoria.
pub trait RatingSink {
    fn post_rating(
        &self,
        rating: &ModelRating,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn post_assessment(
        &self,
        assessment: &GenealogyAssessment,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Borrador de valoración para un par (científico, modelo) durante la
/// fase en curso.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRating {
    /// Nombre crudo del modelo (la clave del mapa es la normalizada).
    pub model: String,
    pub technique: Technique,
    pub prompt: String,
    pub response: String,
    /// Última puntuación por categoría: la sobrescritura gana.
    pub scores: HashMap<RatingCategory, i64>,
    pub notes: Option<String>,
}

impl PendingRating {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            technique: Technique::ZeroShot,
            prompt: String::new(),
            response: String::new(),
            scores: HashMap::new(),
            notes: None,
        }
    }
}

/// Sesión de valoración de biografías: fases `Minimal → Comprehensive`,
/// un conjunto de modelos y categorías obligatorias por elemento.
pub struct AssessmentSession {
    /// Científicos a evaluar, en orden.
    items: Vec<String>,
    /// Modelos requeridos, en orden.
    models: Vec<String>,
    state: SessionState,
    /// Mapa de dos niveles: científico → clave de modelo → borrador.
    /// Nunca se concatenan claves en una sola cadena.
    pending: HashMap<String, HashMap<String, PendingRating>>,
    /// Candado de envío en curso: nunca hay dos envíos simultáneos.
    submitting: bool,
}

impl AssessmentSession {
    pub fn new(items: Vec<String>, models: Vec<String>) -> Self {
        Self {
            items,
            models,
            state: SessionState::NotStarted,
            pending: HashMap::new(),
            submitting: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Arranca la sesión. Con la lista de elementos vacía no hay nada que
    /// evaluar: se permanece en `NotStarted` (estado de carga).
    pub fn start(&mut self) -> Result<()> {
        if self.items.is_empty() {
            return Err(anyhow!("No hay elementos que evaluar"));
        }
        if self.state != SessionState::NotStarted {
            return Err(anyhow!("La sesión ya está en curso"));
        }
        self.state = SessionState::InProgress {
            phase: Phase::Minimal,
            item_index: 0,
        };
        Ok(())
    }

    /// Registra una puntuación. Mutación pura de datos: no cambia el
    /// estado del controlador y la última puntuación por categoría gana.
    pub fn rate(&mut self, item: &str, model: &str, category: RatingCategory, score: i64) {
        let draft = self
            .pending
            .entry(item.to_string())
            .or_default()
            .entry(model_key(model))
            .or_insert_with(|| PendingRating::new(model));
        draft.scores.insert(category, score);
    }

    /// Completa el contexto del borrador (técnica, prompt y respuesta
    /// mostrada) para un par (científico, modelo).
    pub fn annotate(
        &mut self,
        item: &str,
        model: &str,
        technique: Technique,
        prompt: &str,
        response: &str,
    ) {
        let draft = self
            .pending
            .entry(item.to_string())
            .or_default()
            .entry(model_key(model))
            .or_insert_with(|| PendingRating::new(model));
        draft.technique = technique;
        draft.prompt = prompt.to_string();
        draft.response = response.to_string();
    }

    /// Puntuación pendiente de una categoría, si se ha registrado.
    pub fn pending_score(
        &self,
        item: &str,
        model: &str,
        category: RatingCategory,
    ) -> Option<i64> {
        self.pending
            .get(item)?
            .get(&model_key(model))?
            .scores
            .get(&category)
            .copied()
    }

    /// Un elemento está completo cuando todos los modelos tienen puntuadas
    /// todas las categorías obligatorias.
    pub fn is_item_complete(&self, item: &str) -> bool {
        let Some(drafts) = self.pending.get(item) else {
            return false;
        };
        self.models.iter().all(|model| {
            drafts
                .get(&model_key(model))
                .map(|draft| {
                    RatingCategory::REQUIRED
                        .iter()
                        .all(|category| draft.scores.contains_key(category))
                })
                .unwrap_or(false)
        })
    }

    /// Se puede avanzar de fase cuando al menos un elemento está completo.
    pub fn can_advance(&self) -> bool {
        self.items.iter().any(|item| self.is_item_complete(item))
    }

    /// Pasa a la fase siguiente y descarta los borradores: las
    /// puntuaciones no se trasladan entre fases porque valoran textos
    /// distintos.
    pub fn advance_phase(&mut self) -> Result<()> {
        let SessionState::InProgress { phase, .. } = self.state else {
            return Err(anyhow!("La sesión no está en curso"));
        };
        if !self.can_advance() {
            return Err(anyhow!(
                "Ningún elemento está valorado por completo en esta fase"
            ));
        }
        let next = phase
            .next()
            .ok_or_else(|| anyhow!("No hay más fases después de la actual"))?;

        self.pending.clear();
        self.state = SessionState::InProgress {
            phase: next,
            item_index: 0,
        };
        Ok(())
    }

    /// Avance lineal al siguiente elemento; sin restricción de completitud.
    pub fn next(&mut self) -> Result<()> {
        let SessionState::InProgress { phase, item_index } = self.state else {
            return Err(anyhow!("La sesión no está en curso"));
        };
        if item_index + 1 >= self.items.len() {
            return Err(anyhow!("Ya estás en el último elemento"));
        }
        self.state = SessionState::InProgress {
            phase,
            item_index: item_index + 1,
        };
        Ok(())
    }

    pub fn previous(&mut self) -> Result<()> {
        let SessionState::InProgress { phase, item_index } = self.state else {
            return Err(anyhow!("La sesión no está en curso"));
        };
        if item_index == 0 {
            return Err(anyhow!("Ya estás en el primer elemento"));
        }
        self.state = SessionState::InProgress {
            phase,
            item_index: item_index - 1,
        };
        Ok(())
    }

    /// Envía todas las valoraciones completas, una a una y en el orden de
    /// las listas de elementos y modelos. Los pares incompletos se omiten;
    /// los fallos individuales se contabilizan sin reintento. El estado
    /// terminal distingue éxito total de fallo parcial con un indicador.
    pub async fn submit_all<S: RatingSink>(&mut self, sink: &S) -> Result<SubmitOutcome> {
        if self.submitting {
            return Err(anyhow!("Ya hay un envío en curso"));
        }
        if !matches!(self.state, SessionState::InProgress { .. }) {
            return Err(anyhow!("La sesión no está en curso"));
        }

        self.submitting = true;
        self.state = SessionState::Submitting;

        let mut outcome = SubmitOutcome {
            submitted: 0,
            failed: 0,
        };

        for item in &self.items {
            let Some(drafts) = self.pending.get(item) else {
                continue;
            };
            for model in &self.models {
                let Some(draft) = drafts.get(&model_key(model)) else {
                    continue;
                };
                let complete = RatingCategory::REQUIRED
                    .iter()
                    .all(|category| draft.scores.contains_key(category));
                if !complete {
                    continue;
                }

                let rating = ModelRating {
                    id: Uuid::new_v4().to_string(),
                    scientist_name: item.clone(),
                    model: draft.model.clone(),
                    technique: draft.technique,
                    prompt: draft.prompt.clone(),
                    response: draft.response.clone(),
                    ratings: RatingCategory::REQUIRED
                        .iter()
                        .map(|category| CategoryScore {
                            category: *category,
                            score: draft.scores[category],
                        })
                        .collect(),
                    timestamp: Utc::now().to_rfc3339(),
                    notes: draft.notes.clone(),
                };

                match sink.post_rating(&rating).await {
                    Ok(()) => outcome.submitted += 1,
                    Err(err) => {
                        outcome.failed += 1;
                        warn!(
                            "Fallo al enviar la valoración de {item} ({}): {err}",
                            draft.model
                        );
                    }
                }
            }
        }

        self.submitting = false;
        self.state = SessionState::Completed {
            all_succeeded: outcome.all_succeeded(),
        };
        Ok(outcome)
    }

    /// Vuelve a `NotStarted` para una nueva sesión. El retardo de
    /// visualización previo al reinicio es cosa de la interfaz.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.submitting = false;
        self.state = SessionState::NotStarted;
    }
}

/// Sumidero que anexa directamente sobre el almacén de datos, para
/// sesiones que corren en el mismo proceso que el backend.
pub struct StoreSink {
    store: Arc<Mutex<DataStore>>,
}

impl StoreSink {
    pub fn new(store: Arc<Mutex<DataStore>>) -> Self {
        Self { store }
    }
}

impl RatingSink for StoreSink {
    async fn post_rating(&self, rating: &ModelRating) -> Result<()> {
        self.store.lock().unwrap().save_rating(rating.clone())
    }

    async fn post_assessment(&self, assessment: &GenealogyAssessment) -> Result<()> {
        self.store.lock().unwrap().save_assessment(assessment.clone())
    }
}

/// Estado de la sesión de genealogía (sin fases).
#[derive(Debug, Clone, PartialEq)]
pub enum GenealogyState {
    NotStarted,
    InProgress { item_index: usize },
    Submitting,
    Completed { all_succeeded: bool },
}

/// Sesión de evaluación de genealogía: recorrido lineal por la lista de
/// científicos con un borrador por persona, editable hasta el envío.
pub struct GenealogySession {
    people: Vec<String>,
    state: GenealogyState,
    drafts: HashMap<String, GenealogyAssessment>,
    submitting: bool,
}

impl GenealogySession {
    pub fn new(people: Vec<String>) -> Self {
        Self {
            people,
            state: GenealogyState::NotStarted,
            drafts: HashMap::new(),
            submitting: false,
        }
    }

    pub fn state(&self) -> &GenealogyState {
        &self.state
    }

    pub fn start(&mut self) -> Result<()> {
        if self.people.is_empty() {
            return Err(anyhow!("No hay científicos que evaluar"));
        }
        if self.state != GenealogyState::NotStarted {
            return Err(anyhow!("La sesión ya está en curso"));
        }
        self.state = GenealogyState::InProgress { item_index: 0 };
        Ok(())
    }

    pub fn next(&mut self) -> Result<()> {
        let GenealogyState::InProgress { item_index } = self.state else {
            return Err(anyhow!("La sesión no está en curso"));
        };
        if item_index + 1 >= self.people.len() {
            return Err(anyhow!("Ya estás en el último científico"));
        }
        self.state = GenealogyState::InProgress {
            item_index: item_index + 1,
        };
        Ok(())
    }

    pub fn previous(&mut self) -> Result<()> {
        let GenealogyState::InProgress { item_index } = self.state else {
            return Err(anyhow!("La sesión no está en curso"));
        };
        if item_index == 0 {
            return Err(anyhow!("Ya estás en el primer científico"));
        }
        self.state = GenealogyState::InProgress {
            item_index: item_index - 1,
        };
        Ok(())
    }

    /// Crea o actualiza en el sitio el borrador de un científico. El
    /// borrador puede revisarse tantas veces como se quiera antes del
    /// envío definitivo.
    pub fn assess(
        &mut self,
        person: &str,
        supervisors: &str,
        supervisees: &str,
        supervisors_source_url: Option<&str>,
        supervisees_source_url: Option<&str>,
        notes: Option<&str>,
    ) {
        let draft = self
            .drafts
            .entry(person.to_string())
            .or_insert_with(|| GenealogyAssessment {
                id: Uuid::new_v4().to_string(),
                person_name: person.to_string(),
                supervisors: String::new(),
                supervisees: String::new(),
                supervisors_source_url: None,
                supervisees_source_url: None,
                timestamp: String::new(),
                notes: None,
            });
        draft.supervisors = supervisors.to_string();
        draft.supervisees = supervisees.to_string();
        draft.supervisors_source_url = supervisors_source_url.map(str::to_string);
        draft.supervisees_source_url = supervisees_source_url.map(str::to_string);
        draft.notes = notes.map(str::to_string);
        draft.timestamp = Utc::now().to_rfc3339();
    }

    pub fn draft_for(&self, person: &str) -> Option<&GenealogyAssessment> {
        self.drafts.get(person)
    }

    /// Envía los borradores no vacíos en el orden de la lista de
    /// científicos; los fallos se contabilizan sin reintento.
    pub async fn submit_all<S: RatingSink>(&mut self, sink: &S) -> Result<SubmitOutcome> {
        if self.submitting {
            return Err(anyhow!("Ya hay un envío en curso"));
        }
        if !matches!(self.state, GenealogyState::InProgress { .. }) {
            return Err(anyhow!("La sesión no está en curso"));
        }

        self.submitting = true;
        self.state = GenealogyState::Submitting;

        let mut outcome = SubmitOutcome {
            submitted: 0,
            failed: 0,
        };

        for person in &self.people {
            let Some(draft) = self.drafts.get(person) else {
                continue;
            };
            if draft.supervisors.is_empty() && draft.supervisees.is_empty() {
                continue;
            }
            match sink.post_assessment(draft).await {
                Ok(()) => outcome.submitted += 1,
                Err(err) => {
                    outcome.failed += 1;
                    warn!("Fallo al enviar la evaluación de {person}: {err}");
                }
            }
        }

        self.submitting = false;
        self.state = GenealogyState::Completed {
            all_succeeded: outcome.all_succeeded(),
        };
        Ok(outcome)
    }

    pub fn reset(&mut self) {
        self.drafts.clear();
        self.submitting = false;
        self.state = GenealogyState::NotStarted;
    }
}
