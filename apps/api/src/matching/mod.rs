//! Resume ↔ job matching: cosine scoring, ranking and the match endpoints.

pub mod engine;
pub mod handlers;
pub mod service;
pub mod similarity;
