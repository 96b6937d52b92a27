//! Estadísticas descriptivas sobre el conjunto de valoraciones recogidas.
//! Proyección de sólo-lectura: no muta nada y una lista vacía produce
//! agregados vacíos, nunca un error.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{model_key, ModelRating, RatingCategory, Technique};

/// Número de registros en la vista de actividad reciente.
pub const RECENT_LIMIT: usize = 10;

/// Resumen por modelo: recuento, media por categoría y media global,
/// redondeadas a un decimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model: String,
    pub count: usize,
    pub category_means: BTreeMap<RatingCategory, f64>,
    pub overall_mean: f64,
}

/// Resumen por técnica de prompting: recuento y media de las medias
/// por registro.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechniqueSummary {
    pub technique: Technique,
    pub count: usize,
    pub mean: f64,
}

/// Proyección completa para la vista de resumen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingsSummary {
    pub total: usize,
    /// Modelos ordenados por media global descendente; los empates
    /// conservan el orden de aparición (ordenación estable).
    pub models: Vec<ModelSummary>,
    pub techniques: Vec<TechniqueSummary>,
    /// Los `RECENT_LIMIT` registros más recientes, del más nuevo al más viejo.
    pub recent: Vec<ModelRating>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Default)]
struct ModelAccumulator {
    model: String,
    count: usize,
    sums: BTreeMap<RatingCategory, (i64, usize)>,
}

/// Calcula el resumen descriptivo de una lista de valoraciones.
pub fn summarize(ratings: &[ModelRating]) -> RatingsSummary {
    // Agrupación por clave normalizada de modelo; se muestra el primer
    // nombre crudo visto para cada clave.
    let mut model_order: Vec<String> = Vec::new();
    let mut by_model: BTreeMap<String, ModelAccumulator> = BTreeMap::new();

    let mut technique_order: Vec<Technique> = Vec::new();
    let mut by_technique: BTreeMap<&'static str, (Technique, usize, f64)> = BTreeMap::new();

    for rating in ratings {
        let key = model_key(&rating.model);
        if !by_model.contains_key(&key) {
            model_order.push(key.clone());
        }
        let acc = by_model.entry(key).or_default();
        if acc.model.is_empty() {
            acc.model = rating.model.clone();
        }
        acc.count += 1;
        for cs in &rating.ratings {
            let entry = acc.sums.entry(cs.category).or_insert((0, 0));
            entry.0 += cs.score;
            entry.1 += 1;
        }

        if !rating.ratings.is_empty() {
            let record_mean = rating.ratings.iter().map(|c| c.score).sum::<i64>() as f64
                / rating.ratings.len() as f64;
            let tkey = rating.technique.as_str();
            if !by_technique.contains_key(tkey) {
                technique_order.push(rating.technique);
            }
            let entry = by_technique.entry(tkey).or_insert((rating.technique, 0, 0.0));
            entry.1 += 1;
            entry.2 += record_mean;
        }
    }

    let mut models: Vec<ModelSummary> = model_order
        .iter()
        .map(|key| {
            let acc = &by_model[key];
            let mut category_means = BTreeMap::new();
            let mut total_sum = 0i64;
            let mut total_n = 0usize;
            for (category, (sum, n)) in &acc.sums {
                total_sum += sum;
                total_n += n;
                category_means.insert(*category, round1(*sum as f64 / *n as f64));
            }
            let overall_mean = if total_n == 0 {
                0.0
            } else {
                round1(total_sum as f64 / total_n as f64)
            };
            ModelSummary {
                model: acc.model.clone(),
                count: acc.count,
                category_means,
                overall_mean,
            }
        })
        .collect();

    // sort_by es estable: los empates mantienen el orden de aparición.
    models.sort_by(|a, b| {
        b.overall_mean
            .partial_cmp(&a.overall_mean)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let techniques: Vec<TechniqueSummary> = technique_order
        .iter()
        .map(|t| {
            let (technique, count, sum) = by_technique[t.as_str()];
            TechniqueSummary {
                technique,
                count,
                mean: if count == 0 {
                    0.0
                } else {
                    round1(sum / count as f64)
                },
            }
        })
        .collect();

    let mut recent: Vec<ModelRating> = ratings.to_vec();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent.truncate(RECENT_LIMIT);

    RatingsSummary {
        total: ratings.len(),
        models,
        techniques,
        recent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryScore;

    fn rating(model: &str, technique: Technique, scores: &[(RatingCategory, i64)]) -> ModelRating {
        ModelRating {
            id: format!("id-{model}-{}", scores.len()),
            scientist_name: "Marie Curie".to_string(),
            model: model.to_string(),
            technique,
            prompt: "p".to_string(),
            response: "r".to_string(),
            ratings: scores
                .iter()
                .map(|(category, score)| CategoryScore {
                    category: *category,
                    score: *score,
                })
                .collect(),
            timestamp: "2024-05-01T10:00:00Z".to_string(),
            notes: None,
        }
    }

    #[test]
    fn ejemplo_de_medias_por_modelo() {
        use RatingCategory::{Affiliation, Research};
        let ratings = vec![
            rating("x", Technique::ZeroShot, &[(Affiliation, 5), (Research, 5)]),
            rating("x", Technique::ZeroShot, &[(Affiliation, 1), (Research, 3)]),
        ];
        let summary = summarize(&ratings);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.models.len(), 1);
        let m = &summary.models[0];
        assert_eq!(m.count, 2);
        assert_eq!(m.category_means[&Affiliation], 3.0);
        assert_eq!(m.category_means[&Research], 4.0);
        assert_eq!(m.overall_mean, 3.5);
    }

    #[test]
    fn lista_vacia_produce_agregados_vacios() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert!(summary.models.is_empty());
        assert!(summary.techniques.is_empty());
        assert!(summary.recent.is_empty());
    }

    #[test]
    fn resumen_es_idempotente() {
        use RatingCategory::{Affiliation, Gender, Research};
        let ratings = vec![
            rating(
                "gpt-4",
                Technique::FewShot,
                &[(Affiliation, 4), (Research, 5), (Gender, 5)],
            ),
            rating(
                "claude-3",
                Technique::ChainOfThought,
                &[(Affiliation, 2), (Research, 3), (Gender, 5)],
            ),
        ];
        assert_eq!(summarize(&ratings), summarize(&ratings));
    }

    #[test]
    fn un_registro_nuevo_no_altera_los_demas_modelos() {
        use RatingCategory::{Affiliation, Research};
        let mut ratings = vec![
            rating("x", Technique::ZeroShot, &[(Affiliation, 5), (Research, 5)]),
            rating("y", Technique::ZeroShot, &[(Affiliation, 3), (Research, 3)]),
        ];
        let before = summarize(&ratings);
        let x_before = before.models.iter().find(|m| m.model == "x").unwrap();
        let x_json = serde_json::to_string(x_before).unwrap();

        ratings.push(rating("y", Technique::FewShot, &[(Affiliation, 1)]));
        let after = summarize(&ratings);
        let x_after = after.models.iter().find(|m| m.model == "x").unwrap();

        assert_eq!(x_json, serde_json::to_string(x_after).unwrap());
    }

    #[test]
    fn ranking_descendente_con_empates_estables() {
        use RatingCategory::Affiliation;
        let ratings = vec![
            rating("bajo", Technique::ZeroShot, &[(Affiliation, 1)]),
            rating("alto", Technique::ZeroShot, &[(Affiliation, 5)]),
            rating("empate-1", Technique::ZeroShot, &[(Affiliation, 3)]),
            rating("empate-2", Technique::ZeroShot, &[(Affiliation, 3)]),
        ];
        let summary = summarize(&ratings);
        let order: Vec<&str> = summary.models.iter().map(|m| m.model.as_str()).collect();
        assert_eq!(order, vec!["alto", "empate-1", "empate-2", "bajo"]);
    }

    #[test]
    fn media_por_tecnica_usa_la_media_de_cada_registro() {
        use RatingCategory::{Affiliation, Research};
        let ratings = vec![
            rating("x", Technique::FewShot, &[(Affiliation, 5), (Research, 3)]), // media 4.0
            rating("y", Technique::FewShot, &[(Affiliation, 2), (Research, 2)]), // media 2.0
        ];
        let summary = summarize(&ratings);
        assert_eq!(summary.techniques.len(), 1);
        assert_eq!(summary.techniques[0].count, 2);
        assert_eq!(summary.techniques[0].mean, 3.0);
    }

    #[test]
    fn actividad_reciente_en_orden_cronologico_inverso() {
        use RatingCategory::Affiliation;
        let mut ratings = Vec::new();
        for day in 1..=12 {
            let mut r = rating("x", Technique::ZeroShot, &[(Affiliation, 3)]);
            r.id = format!("id-{day}");
            r.timestamp = format!("2024-05-{day:02}T10:00:00Z");
            ratings.push(r);
        }
        let summary = summarize(&ratings);
        assert_eq!(summary.recent.len(), RECENT_LIMIT);
        assert_eq!(summary.recent[0].timestamp, "2024-05-12T10:00:00Z");
        assert_eq!(summary.recent[9].timestamp, "2024-05-03T10:00:00Z");
    }
}
