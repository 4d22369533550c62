//! Resume and job documents: CRUD, PDF ingestion and embedding upkeep.

pub mod handlers;
pub mod pdf;
pub mod service;
