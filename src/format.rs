//! Post-processing of completion text before display and storage.

use regex::{NoExpand, Regex};
use std::sync::LazyLock;

use crate::classify::{self, Intent};
use crate::llm::NO_RESPONSE;
use crate::util::{first_sentence, truncate_chars};

pub const INCOMPLETE_RESPONSE: &str =
    "Response incomplete due to unclosed code block. Please retry or refine your query.";
pub const MORE_DETAIL: &str = "Want more detail? Ask a follow-up question.";
pub const DEFAULT_MAX_LEN: usize = 3000;
pub const DEFAULT_MIN_LEN: usize = 20;

const FENCE: &str = "```";
const DEFAULT_EXAMPLE: &str =
    "**Code Example (Python):**\n```python\nprint(\"Hello, world!\")  # Default example\n```";

static LEAKED_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?s)\[INST\].*?\[/INST\]").expect("inst block"),
        Regex::new(r"(?s)<<SYS>>.*?<</SYS>>").expect("sys block"),
    ]
});

const LEAKED_TOKENS: &[&str] = &[
    "<s>", "</s>", "<|im_start|>", "<|im_end|>", "[INST]", "[/INST]", "<<SYS>>", "<</SYS>>",
];

static ASSISTANT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bthe assistant\b").expect("assistant regex"));

// Two or more blank lines (whitespace-only lines count as blank).
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank run regex"));

/// What to do when a response opens more code fences than it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FencePolicy {
    /// Append the missing closing fence.
    #[default]
    Repair,
    /// Replace the whole response with a "please retry" message.
    Refuse,
}

impl std::str::FromStr for FencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "repair" => Ok(FencePolicy::Repair),
            "refuse" => Ok(FencePolicy::Refuse),
            other => Err(format!("unknown fence policy: {other} (expected repair or refuse)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormatterConfig {
    pub persona_name: String,
    pub max_len: usize,
    pub min_len: usize,
    pub fence_policy: FencePolicy,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            persona_name: "AlgoAI".into(),
            max_len: DEFAULT_MAX_LEN,
            min_len: DEFAULT_MIN_LEN,
            fence_policy: FencePolicy::default(),
        }
    }
}

impl FormatterConfig {
    pub fn from_env(persona_name: &str) -> Self {
        let fence_policy = match std::env::var("ALGOAI_FENCE_POLICY") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to repair");
                FencePolicy::Repair
            }),
            Err(_) => FencePolicy::Repair,
        };
        let max_len = std::env::var("ALGOAI_MAX_RESPONSE_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_LEN);
        Self {
            persona_name: persona_name.to_string(),
            max_len,
            fence_policy,
            ..Self::default()
        }
    }
}

/// Label for a fence language tag, if it is one we recognize.
pub fn language_label(tag: &str) -> Option<&'static str> {
    Some(match tag.to_ascii_lowercase().as_str() {
        "python" | "py" => "Python",
        "java" => "Java",
        "cpp" | "c++" => "C++",
        "c" => "C",
        "csharp" | "cs" | "c#" => "C#",
        "javascript" | "js" => "JavaScript",
        "typescript" | "ts" => "TypeScript",
        "go" | "golang" => "Go",
        "rust" | "rs" => "Rust",
        "ruby" | "rb" => "Ruby",
        "sql" => "SQL",
        "bash" | "sh" | "shell" => "Bash",
        _ => return None,
    })
}

fn label_line(lang: &str) -> String {
    format!("**Code Example ({lang}):**")
}

fn fence_count(text: &str) -> usize {
    text.matches(FENCE).count()
}

fn has_open_fence(text: &str) -> bool {
    fence_count(text) % 2 == 1
}

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    cfg: FormatterConfig,
}

impl Formatter {
    pub fn new(cfg: FormatterConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.cfg
    }

    pub fn format(&self, raw: &str) -> String {
        let mut text = self.strip_leaked(raw);
        if text.is_empty() {
            return NO_RESPONSE.to_string();
        }

        if has_open_fence(&text) {
            match self.cfg.fence_policy {
                FencePolicy::Refuse => return INCOMPLETE_RESPONSE.to_string(),
                FencePolicy::Repair => text.push_str("\n```"),
            }
        }

        text = BLANK_RUN.replace_all(&text, "\n\n").into_owned();
        text = fences_on_own_line(&text);
        text = label_code_blocks(&text);

        if text.contains("Code Example") && !text.contains(FENCE) {
            text.push_str("\n\n");
            text.push_str(DEFAULT_EXAMPLE);
        }

        let first_line = text.lines().next().unwrap_or("");
        if !text.contains(FENCE) && classify::classify(first_line) == Intent::Greeting {
            let mut sentence = first_sentence(&text).to_string();
            if !sentence.ends_with('.') {
                sentence.push('.');
            }
            return sentence;
        }

        self.enforce_length(text)
    }

    fn strip_leaked(&self, raw: &str) -> String {
        let mut text = raw.to_string();
        for re in LEAKED_BLOCKS.iter() {
            text = re.replace_all(&text, "").into_owned();
        }
        for token in LEAKED_TOKENS {
            text = text.replace(token, "");
        }
        let text = ASSISTANT_NAME.replace_all(&text, NoExpand(self.cfg.persona_name.as_str()));
        text.trim().to_string()
    }

    fn enforce_length(&self, text: String) -> String {
        let len = text.chars().count();
        if len > self.cfg.max_len {
            let mut cut = truncate_chars(&text, self.cfg.max_len);
            if self.cfg.fence_policy == FencePolicy::Repair && has_open_fence(&cut) {
                cut.push_str("\n```");
            }
            cut
        } else if len < self.cfg.min_len {
            format!("{text}\n\n{MORE_DETAIL}")
        } else {
            text
        }
    }
}

/// Make every fence marker start a line.
fn fences_on_own_line(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;
    while let Some(pos) = rest.find(FENCE) {
        let (before, after) = rest.split_at(pos);
        out.push_str(before);
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(FENCE);
        rest = &after[FENCE.len()..];
    }
    out.push_str(rest);
    out
}

/// Put a bold "Code Example (Lang)" label above each opening fence with a
/// recognized language tag, unless one is already there.
fn label_code_blocks(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_block = false;
    for line in text.split('\n') {
        let trimmed = line.trim_start();
        if let Some(tag) = trimmed.strip_prefix(FENCE) {
            if !in_block {
                let tag = tag.trim();
                if let Some(lang) = language_label(tag) {
                    let label = label_line(lang);
                    let labeled = out
                        .iter()
                        .rev()
                        .find(|l| !l.trim().is_empty())
                        .is_some_and(|l| l.trim() == label);
                    if !labeled {
                        out.push(label);
                    }
                }
            }
            in_block = !in_block;
        }
        out.push(line.to_string());
    }
    out.join("\n")
}
