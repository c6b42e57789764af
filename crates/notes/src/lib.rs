//! `notas-notes`: owner-scoped notes, profiles and the favorites list.

pub mod model;
pub mod service;
pub mod store;

pub use model::{Note, NoteDraft, Profile};
pub use service::NoteService;
pub use store::{InMemoryNoteStore, NoteStore, NoteStoreError};
