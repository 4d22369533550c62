pub mod document;

pub use document::{
    embedding_text, Candidate, Document, DocumentKind, DocumentPatch, DocumentRow,
    EmbeddingStatus, EmbeddingUpdate, NewDocument,
};
