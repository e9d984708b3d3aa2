use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::sync::Arc;
use log::info;

use crate::models::chat::Message;

/// Number of prior turns rendered into each prompt.
pub const PROMPT_HISTORY_LEN: usize = 8;

const DEFAULT_INSTRUCTION_TEMPLATE: &str = "You are BARQ AI - friendly assistant for BARQ Digital Marketing.

Reply in {lang}. Be natural, warm, use Egyptian dialect for Arabic. Use emojis 😊💪✨

RULES:
- Answer ANY topic (marketing, tech, life, casual talk)
- Be conversational, joke when appropriate
- NEVER mention specific prices
- Be helpful and positive
- If the user asks multiple questions, answer each one clearly
- Suggest BARQ solutions when relevant
- Always keep discussions collaborative. Share insights, brainstorm، ووضح خطوات عامة فقط. لا تقدّم خطة جاهزة أو استراتيجية تفصيلية أو منتج جاهز. شجّع العميل على التواصل مع فريق برق لاستلام التنفيذ الاحترافي.
- When referencing BARQ services or website sections, insert clickable HTML links. Examples:
   • <a href=\"pages/services.html#branding\">Branding</a>
   • <a href=\"pages/services.html#web-mobile\">Web & Mobile Development</a>
   • <a href=\"pages/services.html#media-buying\">Media Buying</a>
   • <a href=\"pages/services.html#social-media\">Social Media Management</a>
   • <a href=\"pages/services.html#business-dev\">Business Development</a>
   • <a href=\"pages/services.html#media-production\">Media Production</a>
   Use the same pattern for other site pages like <a href=\"pages/projects.html\">أعمالنا</a> أو <a href=\"pages/contact.html\">اتصل بنا</a>.
   - حافظ على الإملاء الصحيح خاصةً لاسم الشركة: BARQ بالإنجليزي، «برق» بالعربي. صحّح أي أخطاء كتابية ظاهرة قبل الإرسال.
- If topic is outside marketing, still answer helpfully then bridge back to BARQ

COMPANY: BARQ Digital Marketing | Since 2020 | Egypt
Services: Branding, Web/Mobile, Media Buying, Social Media, Business Dev, Production
Contact: +20 101 143 4111 | barqwork@gmail.com

Recent conversation:
{history}

User: {message}
You:";

const DEFAULT_EMPTY_HISTORY_LINE: &str = "Assistant: مرحباً! كيف أقدر أساعدك؟";

const DEFAULT_FALLBACK_MESSAGE: &str =
    "عذراً، حصلت مشكلة مؤقتة 😔\n\nتواصل معنا مباشرة:\n📱 +20 101 143 4111\n📧 barqwork@gmail.com";

const DEFAULT_WELCOME_MESSAGE: &str =
    "أهلاً بيك في برق! ⚡✨\n\nأنا هنا عشان أساعدك في أي حاجة - سواء عن خدماتنا، السوشيال ميديا، البرمجة، أو حتى لو عايز تهزر! 😄\n\nإزيك؟ عايز تعرف إيه؟";

const DEFAULT_RETURNING_WELCOME_MESSAGE: &str =
    "مرحباً بيك من جديد! 👋😊\nأنا هنا لمساعدتك. إزيك؟ عايز تعرف إيه عن برق؟";

#[derive(Debug)]
pub enum PromptError {
    PlaceholderMissing(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::PlaceholderMissing(key) =>
                write!(f, "Instruction template is missing the '{}' placeholder", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// Language the assistant is told to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLanguage {
    Arabic,
    English,
}

impl ResponseLanguage {
    /// Arabic when the text contains any code point in U+0600..=U+06FF. A heuristic only.
    pub fn detect(text: &str) -> Self {
        if text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
            ResponseLanguage::Arabic
        } else {
            ResponseLanguage::English
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseLanguage::Arabic => "Arabic",
            ResponseLanguage::English => "English",
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub instruction_template: String,
    pub empty_history_line: String,
    pub fallback_message: String,
    pub welcome_message: String,
    pub returning_welcome_message: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            instruction_template: DEFAULT_INSTRUCTION_TEMPLATE.to_string(),
            empty_history_line: DEFAULT_EMPTY_HISTORY_LINE.to_string(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            returning_welcome_message: DEFAULT_RETURNING_WELCOME_MESSAGE.to_string(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if !self.instruction_template.contains("{message}") {
            return Err(PromptError::PlaceholderMissing("{message}".to_string()));
        }
        Ok(())
    }

    /// Builds the outbound prompt from the trailing window of `history` and the new message.
    pub fn build_prompt(&self, history: &[Message], user_message: &str) -> String {
        let recent = format_recent_context(history, PROMPT_HISTORY_LEN);
        let context = if recent.is_empty() { self.empty_history_line.as_str() } else { recent.as_str() };
        let lang = ResponseLanguage::detect(user_message);

        fill_template(&self.instruction_template, &[
            ("{lang}", lang.name()),
            ("{history}", context),
            ("{message}", user_message),
        ])
    }
}

/// Substitutes placeholders in one left-to-right pass. Inserted values are never rescanned.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders the last `limit` messages, oldest first, as `Role: text` lines.
pub fn format_recent_context(history: &[Message], limit: usize) -> String {
    let start = history.len().saturating_sub(limit);
    history[start..]
        .iter()
        .map(|msg| format!("{}: {}", msg.role.display_name(), msg.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    info!("Loaded prompt configuration from '{}'", path);
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use std::io::Write;

    #[test]
    fn prompt_contains_history_then_new_message() {
        let config = PromptConfig::default();
        let history = vec![Message::new(Role::User, "hi")];
        let prompt = config.build_prompt(&history, "what services?");

        let history_at = prompt.find("User: hi").unwrap();
        let message_at = prompt.find("User: what services?").unwrap();
        assert!(history_at < message_at);
        assert!(prompt.contains("Reply in English."));
        assert!(!prompt.contains(DEFAULT_EMPTY_HISTORY_LINE));
    }

    #[test]
    fn placeholders_inside_history_are_kept_literally() {
        let config = PromptConfig::default();
        let history = vec![
            Message::new(Role::User, "what does {message} mean"),
            Message::new(Role::Assistant, "it is a {history} marker in {lang}"),
        ];
        let prompt = config.build_prompt(&history, "NEW {history}");

        assert!(prompt.contains("User: what does {message} mean\nAssistant: it is a {history} marker in {lang}"));
        assert!(prompt.contains("User: NEW {history}\nYou:"));
    }

    #[test]
    fn fill_template_leaves_unknown_braces() {
        let filled = fill_template("{a} {b} {{a}} {", &[("{a}", "x")]);
        assert_eq!(filled, "x {b} {x} {");
    }

    #[test]
    fn default_template_keeps_arabic_instructions() {
        let prompt = PromptConfig::default().build_prompt(&[], "hi");
        assert!(prompt.contains("<a href=\"pages/projects.html\">أعمالنا</a> أو <a href=\"pages/contact.html\">اتصل بنا</a>"));
        assert!(prompt.contains("BARQ بالإنجليزي، «برق» بالعربي"));
    }

    #[test]
    fn empty_history_uses_greeting_line() {
        let config = PromptConfig::default();
        let prompt = config.build_prompt(&[], "hello");
        assert!(prompt.contains(&format!("Recent conversation:\n{}\n", DEFAULT_EMPTY_HISTORY_LINE)));
    }

    #[test]
    fn only_last_eight_turns_are_rendered() {
        let history: Vec<Message> = (0..12)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                Message::new(role, format!("turn-{:02}", i))
            })
            .collect();
        let context = format_recent_context(&history, PROMPT_HISTORY_LEN);
        let lines: Vec<&str> = context.lines().collect();

        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "User: turn-04");
        assert_eq!(lines[7], "Assistant: turn-11");
    }

    #[test]
    fn arabic_script_selects_arabic() {
        assert_eq!(ResponseLanguage::detect("عايز أعرف الخدمات"), ResponseLanguage::Arabic);
        assert_eq!(ResponseLanguage::detect("services please"), ResponseLanguage::English);
        assert_eq!(ResponseLanguage::detect("hello مرحبا"), ResponseLanguage::Arabic);

        let prompt = PromptConfig::default().build_prompt(&[], "مرحبا");
        assert!(prompt.contains("Reply in Arabic."));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"instruction_template": "Say: {{message}} ({{lang}})"}}"#).unwrap();

        let config = load_prompts(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.build_prompt(&[], "hi"), "Say: hi (English)");
        assert_eq!(config.fallback_message, DEFAULT_FALLBACK_MESSAGE);
    }

    #[test]
    fn template_without_message_placeholder_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"instruction_template": "no placeholder"}}"#).unwrap();
        assert!(matches!(
            load_prompts(file.path().to_str().unwrap()),
            Err(PromptError::PlaceholderMissing(_))
        ));
    }
}
