use std::collections::BTreeMap;
use std::sync::Arc;

use snapmagic_contracts::photos::EditedImage;

use crate::codec::ImagePayload;
use crate::error::EditError;

mod dryrun;
mod gemini;

pub use dryrun::DryrunEditor;
pub use gemini::{GeminiEditor, DEFAULT_GEMINI_API_BASE, DEFAULT_IMAGE_MODEL};

/// One remote (or local) image edit: image plus instruction in, edited image
/// out. Implementations make at most one outbound call per `edit` and never
/// retry.
pub trait ImageEditor: Send + Sync {
    fn name(&self) -> &str;
    fn edit(&self, payload: &ImagePayload, prompt: &str) -> Result<EditedImage, EditError>;
}

#[derive(Default)]
pub struct EditorRegistry {
    editors: BTreeMap<String, Arc<dyn ImageEditor>>,
}

impl EditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: ImageEditor + 'static>(&mut self, editor: E) {
        self.editors
            .insert(editor.name().to_string(), Arc::new(editor));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageEditor>> {
        self.editors.get(name.trim()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.editors.keys().cloned().collect()
    }
}

pub fn default_editor_registry() -> EditorRegistry {
    let mut editors = EditorRegistry::new();
    editors.register(GeminiEditor::from_env());
    editors.register(DryrunEditor);
    editors
}

#[cfg(test)]
mod tests {
    use super::default_editor_registry;

    #[test]
    fn default_registry_lists_gemini_and_dryrun() {
        let registry = default_editor_registry();
        assert_eq!(registry.names(), vec!["dryrun", "gemini"]);
        assert_eq!(registry.get(" gemini ").map(|e| e.name().to_string()), Some("gemini".to_string()));
        assert!(registry.get("openai").is_none());
    }
}
