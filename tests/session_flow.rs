//! Recorrido completo: carga del libro Excel, sesión de valoración con
//! dos científicos y dos modelos, y envío en bloque sobre el almacén.

use std::sync::{Arc, Mutex};

use rust_xlsxwriter::Workbook;
use tokio_test::block_on;

use genealogy_rating_webapp::aggregate;
use genealogy_rating_webapp::config::AppConfig;
use genealogy_rating_webapp::models::{RatingCategory, Technique};
use genealogy_rating_webapp::session::{AssessmentSession, SessionState, StoreSink};
use genealogy_rating_webapp::store::{DataStore, BIOGRAPHY_SHEET, LINEAGE_SHEET};

/// Escribe un libro de prueba con dos científicos y dos modelos.
fn write_fixture_workbook(dir: &std::path::Path) -> AppConfig {
    let excel_path = dir.join("Prompts.xlsx");
    let mut workbook = Workbook::new();

    let lineage = workbook.add_worksheet();
    lineage.set_name(LINEAGE_SHEET).unwrap();
    for (col, header) in ["Name", "Type", "Gender", "1 up", "1 down", "all ancestors", "all descendants"]
        .iter()
        .enumerate()
    {
        lineage.write_string(0, col as u16, *header).unwrap();
    }
    for (idx, name) in ["Ada Lovelace", "Alan Turing"].iter().enumerate() {
        let row = idx as u32 + 1;
        lineage.write_string(row, 0, *name).unwrap();
        lineage.write_string(row, 1, "Mathematician").unwrap();
        lineage.write_string(row, 2, "Unknown").unwrap();
    }

    let bio = workbook.add_worksheet();
    bio.set_name(BIOGRAPHY_SHEET).unwrap();
    for (col, header) in [
        "Name",
        "Model",
        "Type",
        "Gender",
        "Biography(Minimal)",
        "Biography(Comprehensive)",
    ]
    .iter()
    .enumerate()
    {
        bio.write_string(0, col as u16, *header).unwrap();
    }
    let mut row = 1u32;
    for name in ["Ada Lovelace", "Alan Turing"] {
        for model in ["gpt-4", "claude-3"] {
            bio.write_string(row, 0, name).unwrap();
            bio.write_string(row, 1, model).unwrap();
            bio.write_string(row, 2, "Mathematician").unwrap();
            bio.write_string(row, 3, "Unknown").unwrap();
            bio.write_string(row, 4, format!("Bio mínima de {name} según {model}"))
                .unwrap();
            bio.write_string(row, 5, format!("Bio completa de {name} según {model}"))
                .unwrap();
            row += 1;
        }
    }

    workbook.save(&excel_path).unwrap();

    AppConfig {
        excel_path,
        ratings_file: dir.join("ai_model_ratings.xlsx"),
        assessments_file: dir.join("genealogy_assessments.xlsx"),
        server_addr: "127.0.0.1:0".to_string(),
        cors_origins: None,
    }
}

#[test]
fn sesion_completa_envia_solo_los_pares_completos() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_fixture_workbook(dir.path());

    let mut store = DataStore::new(&cfg);
    store.reload().unwrap();
    assert_eq!(store.scientists().len(), 2);
    assert_eq!(store.models().len(), 2);

    let items: Vec<String> = store.scientists().iter().map(|s| s.name.clone()).collect();
    let models = store.models().to_vec();
    let store = Arc::new(Mutex::new(store));

    let mut session = AssessmentSession::new(items, models.clone());
    session.start().unwrap();

    // Ada Lovelace queda completa para ambos modelos.
    for model in &models {
        session.annotate(
            "Ada Lovelace",
            model,
            Technique::ZeroShot,
            &format!("Ada Lovelace — biografía ({model})"),
            "texto mostrado al evaluador",
        );
        for category in RatingCategory::REQUIRED {
            session.rate("Ada Lovelace", model, category, 5);
        }
    }
    // Alan Turing sólo tiene 2 de 3 categorías para un modelo: la
    // interfaz no le deja enviar ese par y aquí se omite.
    session.rate("Alan Turing", "gpt-4", RatingCategory::Affiliation, 3);
    session.rate("Alan Turing", "gpt-4", RatingCategory::Research, 3);

    assert!(session.can_advance());

    let sink = StoreSink::new(store.clone());
    let outcome = block_on(session.submit_all(&sink)).unwrap();

    assert_eq!(outcome.submitted, 2);
    assert_eq!(outcome.failed, 0);
    assert_eq!(
        *session.state(),
        SessionState::Completed { all_succeeded: true }
    );

    let store = store.lock().unwrap();
    let ratings = store.ratings();
    assert_eq!(ratings.len(), 2);
    assert!(ratings.iter().all(|r| r.ratings.len() == 3));
    assert!(ratings.iter().all(|r| r.scientist_name == "Ada Lovelace"));
    // El libro de salida queda escrito en disco.
    assert!(cfg.ratings_file.exists());

    // La agregación sobre lo enviado refleja los dos modelos.
    let summary = aggregate::summarize(ratings);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.models.len(), 2);
    assert!(summary
        .models
        .iter()
        .all(|m| m.overall_mean == 5.0 && m.count == 1));
}

#[test]
fn una_nueva_sesion_tras_reset_parte_de_cero() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_fixture_workbook(dir.path());

    let mut store = DataStore::new(&cfg);
    store.reload().unwrap();
    let items: Vec<String> = store.scientists().iter().map(|s| s.name.clone()).collect();
    let models = store.models().to_vec();
    let store = Arc::new(Mutex::new(store));

    let mut session = AssessmentSession::new(items, models.clone());
    session.start().unwrap();
    for category in RatingCategory::REQUIRED {
        session.rate("Ada Lovelace", "gpt-4", category, 4);
        session.rate("Ada Lovelace", "claude-3", category, 4);
    }

    let sink = StoreSink::new(store.clone());
    block_on(session.submit_all(&sink)).unwrap();

    session.reset();
    assert_eq!(*session.state(), SessionState::NotStarted);
    session.start().unwrap();
    assert!(!session.can_advance());

    // Lo ya guardado en el almacén no se pierde con el reinicio local.
    assert_eq!(store.lock().unwrap().ratings().len(), 2);
}
