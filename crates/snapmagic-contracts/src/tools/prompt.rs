use super::catalog::Tool;

const ONE_TAP_PROMPT: &str = "Professionally enhance this photograph. Adjust lighting for optimal exposure, balance colors for a natural yet vibrant look, improve contrast for depth, and sharpen details subtly. Apply a modern, clean cinematic tone. Do not crop or change the aspect ratio.";

const CINEMATIC_PROMPT: &str = "Apply a strong cinematic color grade. Emphasize teal and orange tones, add a slight vignette, and increase contrast for a dramatic, film-like look.";

const VINTAGE_PROMPT: &str = "Give this photo a vintage, faded film look. Desaturate colors slightly, add a warm, yellowish tint, introduce subtle film grain, and soften the blacks.";

const VIBRANT_PROMPT: &str = "Make this photo pop with vibrant colors. Boost saturation and vibrance, enhance the contrast, and make the colors rich and lively without looking unnatural.";

const SOFT_GLOW_PROMPT: &str = "Apply a soft, dreamy glow effect. Reduce harsh shadows, slightly decrease clarity, and add a gentle, ethereal bloom to the highlights.";

const REMOVE_OBJECT_PREFIX: &str = "Remove the following from this photograph: ";
const REMOVE_OBJECT_SUFFIX: &str = ". Erase it completely and fill the area with background that matches the surrounding scene in texture, lighting, and perspective, so no trace of the removed subject remains. Do not change anything else in the image and do not crop or change the aspect ratio.";

/// Maps a tool (plus its free text, for text-driven tools) to the instruction
/// sent to the edit service.
///
/// Callers gate blank text before this point; see `ToolSelection::new`.
pub fn resolve_prompt(tool: Tool, free_text: Option<&str>) -> String {
    match tool {
        Tool::OneTap => ONE_TAP_PROMPT.to_string(),
        Tool::Cinematic => CINEMATIC_PROMPT.to_string(),
        Tool::Vintage => VINTAGE_PROMPT.to_string(),
        Tool::Vibrant => VIBRANT_PROMPT.to_string(),
        Tool::SoftGlow => SOFT_GLOW_PROMPT.to_string(),
        Tool::RemoveObject => format!(
            "{REMOVE_OBJECT_PREFIX}{}{REMOVE_OBJECT_SUFFIX}",
            free_text.unwrap_or_default()
        ),
        Tool::Custom => free_text.unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_prompt, CINEMATIC_PROMPT, ONE_TAP_PROMPT};
    use crate::tools::{Tool, TOOL_SPECS};

    #[test]
    fn presets_resolve_to_fixed_distinct_instructions() {
        let presets: Vec<String> = TOOL_SPECS
            .iter()
            .filter(|spec| !spec.requires_text)
            .map(|spec| resolve_prompt(spec.tool, None))
            .collect();
        assert_eq!(presets.len(), 5);
        for (idx, prompt) in presets.iter().enumerate() {
            assert!(!prompt.is_empty());
            assert!(!presets[idx + 1..].contains(prompt));
        }
        assert_eq!(resolve_prompt(Tool::OneTap, None), ONE_TAP_PROMPT);
        assert_eq!(
            resolve_prompt(Tool::Cinematic, Some("ignored")),
            CINEMATIC_PROMPT
        );
    }

    #[test]
    fn remove_object_wraps_text_in_inpaint_template() {
        let prompt = resolve_prompt(Tool::RemoveObject, Some("the red car"));
        assert!(prompt.starts_with("Remove the following from this photograph: the red car."));
        assert!(prompt.contains("fill the area with background"));
    }

    #[test]
    fn custom_passes_text_through() {
        assert_eq!(
            resolve_prompt(Tool::Custom, Some("turn the sky purple")),
            "turn the sky purple"
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        assert_eq!(
            resolve_prompt(Tool::RemoveObject, Some("a lamp post")),
            resolve_prompt(Tool::RemoveObject, Some("a lamp post"))
        );
    }
}
