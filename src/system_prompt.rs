//! System instruction sent at the head of every chat request

use crate::directive::{END_DELIMITER, START_DELIMITER};
use crate::image::all_image_styles;
use std::fmt::Write;

/// Base prompt establishing the assistant's role
const BASE_PROMPT: &str = r"You are a helpful AI assistant. Be concise and friendly in your responses.

You can create images with the generate_image tool. Use it whenever the user asks you to draw, paint, render or otherwise create a picture.";

/// Build the system instruction, including the inline tool-call fallback
/// for models that cannot emit structured tool events.
pub fn build_system_prompt() -> String {
    let mut prompt = BASE_PROMPT.to_string();
    let _ = write!(
        prompt,
        "\n\nIf you cannot call the tool directly, write one short sentence for the user and then the call on its own, exactly like this:\n\
         {START_DELIMITER}{{\"name\": \"generate_image\", \"arguments\": {{\"prompt\": \"<detailed description>\", \"style\": \"<style>\"}}}}{END_DELIMITER}\n\
         Write nothing after the closing tag."
    );

    prompt.push_str("\n\nAvailable styles:");
    for style in all_image_styles() {
        let _ = write!(prompt, "\n- {} ({})", style.name, style.label);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::parse_inline;

    #[test]
    fn test_example_call_parses() {
        let prompt = build_system_prompt();
        let (_, rest) = prompt.split_once(START_DELIMITER).unwrap();
        let (payload, _) = rest.split_once(END_DELIMITER).unwrap();
        let descriptor = parse_inline(payload).unwrap();
        assert_eq!(descriptor.name, "generate_image");
        assert!(descriptor.str_arg("prompt").is_some());
    }

    #[test]
    fn test_lists_styles() {
        let prompt = build_system_prompt();
        assert!(prompt.contains("- watercolor (Watercolor)"));
    }
}
