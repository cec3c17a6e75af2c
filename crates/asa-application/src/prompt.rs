//! System instruction assembly and proactive message post-processing.
//!
//! The configured system prompt is rendered as a Jinja template with a
//! `page` variable (`url`, `title`, `content`) so operators can reference the
//! current page directly. A prompt that fails to render is used verbatim.

use asa_core::page::PageContext;
use minijinja::{Environment, context};

/// Maximum words kept in a proactive message.
pub const PROACTIVE_WORD_CAP: usize = 7;

const ELLIPSIS: &str = "...";

const PROACTIVE_INSTRUCTION_TEMPLATE: &str = "Generate an extremely short proactive message. \
It MUST be a single, insightful question of MAXIMUM 5-6 words. Do not use any greetings. \
Base the question directly on the provided page content. Page Title: {{ title }}.";

fn render(template: &str, ctx: minijinja::Value) -> Result<String, minijinja::Error> {
    let env = Environment::new();
    env.render_str(template, ctx)
}

/// Renders the operator's prompt, falling back to the raw text.
fn render_system_prompt(system_prompt: &str, page: &PageContext) -> String {
    if !system_prompt.contains("{{") && !system_prompt.contains("{%") {
        return system_prompt.to_string();
    }

    render(system_prompt, context! { page => page }).unwrap_or_else(|err| {
        tracing::warn!("[Prompt] System prompt template failed to render: {}", err);
        system_prompt.to_string()
    })
}

/// System instruction for a chat turn: the prompt followed by the page URL,
/// title and (truncated) content, each only when non-empty.
pub fn chat_system_instruction(system_prompt: &str, page: &PageContext) -> String {
    let page = page.clone().truncated();
    let mut instruction = render_system_prompt(system_prompt, &page);

    if !page.url.is_empty() {
        instruction.push_str("\n\nCurrent Page URL: ");
        instruction.push_str(&page.url);
    }
    if !page.title.is_empty() {
        instruction.push_str("\nCurrent Page Title: ");
        instruction.push_str(&page.title);
    }
    if !page.content.is_empty() {
        instruction.push_str("\n\nCurrent Page Content: ");
        instruction.push_str(&page.content);
    }

    instruction
}

/// System instruction for proactive generation: the prompt plus the
/// short-question constraint.
pub fn proactive_system_instruction(system_prompt: &str, page: &PageContext) -> String {
    let instruction = render(PROACTIVE_INSTRUCTION_TEMPLATE, context! { title => page.title.as_str() })
        .unwrap_or_else(|err| {
            tracing::error!("[Prompt] Proactive instruction failed to render: {}", err);
            PROACTIVE_INSTRUCTION_TEMPLATE.replace("{{ title }}", &page.title)
        });

    format!("{}\n\n{}", render_system_prompt(system_prompt, page), instruction)
}

/// User turn for proactive generation: the truncated page content, or the
/// title when the page has no extractable text.
pub fn proactive_user_turn(page: &PageContext) -> String {
    let page = page.clone().truncated();
    if page.content.trim().is_empty() {
        format!("Page Title: {}", page.title)
    } else {
        page.content
    }
}

/// Caps a proactive message at [`PROACTIVE_WORD_CAP`] space-separated words.
///
/// Longer messages keep their first words followed by `...`; anything within
/// the cap is returned unchanged.
pub fn cap_words(message: &str) -> String {
    let words: Vec<&str> = message.split(' ').collect();
    if words.len() <= PROACTIVE_WORD_CAP {
        return message.to_string();
    }
    format!("{}{ELLIPSIS}", words[..PROACTIVE_WORD_CAP].join(" "))
}
