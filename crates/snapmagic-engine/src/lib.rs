pub mod codec;
pub mod download;
pub mod editors;
pub mod error;
pub mod orchestrator;

pub use editors::{default_editor_registry, DryrunEditor, EditorRegistry, GeminiEditor, ImageEditor};
pub use error::EditError;
pub use orchestrator::{BatchOrchestrator, BatchReport, BatchRun, Settlement};
