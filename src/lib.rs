//! Servicio de evaluación de investigación: backend REST sobre un libro
//! Excel (linaje académico y biografías generadas por IA) más la lógica
//! de sesión del evaluador (fases, anonimización y agregación).

pub mod aggregate;
pub mod anonymize;
pub mod api;
pub mod app_state;
pub mod config;
pub mod export;
pub mod models;
pub mod session;
pub mod store;
