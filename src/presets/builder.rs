//! Turns a preset and the user's text into the message list sent upstream.

use crate::cache::AUTO_LANGUAGE;
use crate::presets::{Preset, PresetCatalog};
use crate::upstream::ChatMessage;

/// Instruction appended to a system prompt when a language is forced.
///
/// Empty for [`AUTO_LANGUAGE`]: the model then answers in the input's language.
pub fn language_directive(language: &str) -> String {
    if language == AUTO_LANGUAGE {
        String::new()
    } else {
        format!("\n\nLANGUAGE: Respond in \"{}\" language.", language)
    }
}

/// Builds the conversation for one rewrite.
///
/// Layout: system prompt (shared prompt, preset instructions, language),
/// each example as a user/assistant pair, then the user's text.
pub fn build_messages(
    catalog: &PresetCatalog,
    preset: &Preset,
    text: &str,
    language: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n\n------------------------------------------------------------\nPRESET: {}\n------------------------------------------------------------\n{}{}",
        catalog.system_prompt(),
        preset.label,
        preset.behaviour,
        language_directive(language),
    );

    let mut messages = Vec::with_capacity(2 + preset.examples.len() * 2);
    messages.push(ChatMessage::system(system));
    for example in &preset.examples {
        messages.push(ChatMessage::user(example.input.as_str()));
        messages.push(ChatMessage::assistant(example.output.as_str()));
    }
    messages.push(ChatMessage::user(text));
    messages
}
