//! Prompt assembly: persona block, bounded history and a per-intent directive.
//!
//! Everything the completion endpoint sees is decided here. The directive
//! table maps each intent to its instructions and generation parameters.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{self, Intent};
use crate::db::{ChatDB, Turn};
use crate::util::truncate_chars;

pub const DEFAULT_HISTORY_LIMIT: usize = 12;

/// Returned instead of a remote call when a greeting arrives after the
/// welcome has already been shown in this conversation.
pub const WELCOME_BACK: &str = "Welcome back! What would you like to explore next?";

/// How much of the previous answer is quoted into a deep-dive directive.
const DEEP_DIVE_QUOTE_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub creators: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "AlgoAI".into(),
            creators: "Syed Rayan and Shaik Ayub".into(),
        }
    }
}

impl Persona {
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            name: std::env::var("ALGOAI_PERSONA_NAME").unwrap_or(base.name),
            creators: std::env::var("ALGOAI_PERSONA_CREATORS").unwrap_or(base.creators),
        }
    }

    pub fn system_block(&self) -> String {
        PERSONA_TEMPLATE
            .replace("{persona}", &self.name)
            .replace("{creators}", &self.creators)
    }
}

const PERSONA_TEMPLATE: &str = "You are {persona}, a structured, step-by-step programming mentor created by {creators}. \
You never mention any underlying AI provider, model, or architecture. \
Your core ideology is 'Teach First, Solve Smart, Adapt Always.' You guide, simplify, teach and adapt. \
Keep a structured flow: 1. Greet the user briefly, 2. Identify the intent clearly, 3. Break down the logic, \
4. Provide code if applicable, 5. Explain simply, 6. Add tips or next steps when relevant. \
Never break character or use phrases like 'As an AI language model'. \
Treat every message as part of an ongoing conversation.";

/// Instructions plus generation parameters for one intent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Directive {
    pub name: &'static str,
    pub template: &'static str,
    pub max_tokens: u32,
    pub temperature: f64,
    /// The directive only applies when the conversation has a previous answer.
    pub requires_history: bool,
    /// The template mentions `{language}` and needs a preferred language.
    pub announces_language: bool,
}

pub const GREETING: Directive = Directive {
    name: "greeting",
    template: "Mode: Greeting. Welcome the user warmly in two or three sentences, \
        describe your role as {persona}, a coding mentor, and invite a first question. \
        End with one suggested question the user could ask, e.g. about algorithms or a project idea.",
    max_tokens: 2000,
    temperature: 0.5,
    requires_history: false,
    announces_language: false,
};

pub const IDENTITY: Directive = Directive {
    name: "identity",
    template: "Mode: Identity. Answer confidently and briefly as {persona}, created by {creators}. \
        Describe yourself as a mentor for developers who want clarity over chaos. \
        Do not mention providers, models, or training details. Close with a suggested follow-up question.",
    max_tokens: 600,
    temperature: 0.3,
    requires_history: false,
    announces_language: false,
};

pub const TECH: Directive = Directive {
    name: "tech",
    template: "Mode: Technical. Structure the answer in numbered sections:\n\
        1. Problem understanding\n\
        2. Approach and theory\n\
        3. Code example in {language} inside a fenced block tagged with the language\n\
        4. Step-by-step explanation\n\
        5. Time and space complexity analysis\n\
        6. Optimization tips or alternatives\n\
        Finish with \"Suggested follow-up:\" and one question that deepens the topic.",
    max_tokens: 6500,
    temperature: 0.2,
    requires_history: false,
    announces_language: true,
};

pub const HYBRID_TECH: Directive = Directive {
    name: "hybrid_greeting_tech",
    template: "Mode: Greeting + Technical. Open with a single short welcoming sentence, then answer in numbered sections:\n\
        1. Problem understanding\n\
        2. Approach and theory\n\
        3. Code example in {language} inside a fenced block tagged with the language\n\
        4. Step-by-step explanation\n\
        5. Time and space complexity analysis\n\
        Finish with \"Suggested follow-up:\" and one question.",
    max_tokens: 6500,
    temperature: 0.2,
    requires_history: false,
    announces_language: true,
};

pub const DEBUGGING: Directive = Directive {
    name: "debugging",
    template: "Mode: Debugging. Structure the answer in numbered sections:\n\
        1. Symptoms: restate what fails and how\n\
        2. Likely root causes, most probable first\n\
        3. Debugging steps to confirm the cause\n\
        4. Fixed code in {language} inside a fenced block tagged with the language\n\
        5. How to prevent the issue in future\n\
        Finish with \"Suggested follow-up:\" and one question about the user's setup.",
    max_tokens: 6500,
    temperature: 0.2,
    requires_history: false,
    announces_language: true,
};

pub const HYBRID_DEBUGGING: Directive = Directive {
    name: "hybrid_greeting_debugging",
    template: "Mode: Greeting + Debugging. Open with a single short reassuring sentence, then:\n\
        1. Symptoms\n\
        2. Likely root causes\n\
        3. Debugging steps\n\
        4. Fixed code in {language} inside a fenced block tagged with the language\n\
        Finish with \"Suggested follow-up:\" and one question.",
    max_tokens: 6500,
    temperature: 0.2,
    requires_history: false,
    announces_language: true,
};

pub const GENERAL: Directive = Directive {
    name: "general",
    template: "Mode: General. Identify the intent, explain the concept logically with context \
        and a concrete example, and keep it concise. \
        Finish with \"Suggested follow-up:\" and one question for further exploration.",
    max_tokens: 4000,
    temperature: 0.3,
    requires_history: false,
    announces_language: false,
};

pub const DEEP_DIVE: Directive = Directive {
    name: "deep_dive",
    template: "Mode: Deep Dive. Do not answer from scratch. Build on your previous answer quoted below:\n\
        1. Critique it: gaps, edge cases, mistakes\n\
        2. Expand the key ideas in more depth\n\
        3. Improved or alternative code in {language} where relevant\n\
        4. Trade-offs between the alternatives\n\
        Finish with \"Suggested follow-up:\" and one question.\n\n\
        Previous answer:\n\"\"\"\n{previous}\n\"\"\"",
    max_tokens: 6500,
    temperature: 0.25,
    requires_history: true,
    announces_language: true,
};

pub fn directive_for(intent: Intent) -> &'static Directive {
    match intent {
        Intent::Greeting => &GREETING,
        Intent::Identity => &IDENTITY,
        Intent::Tech => &TECH,
        Intent::HybridGreetingTech => &HYBRID_TECH,
        Intent::Debugging => &DEBUGGING,
        Intent::HybridGreetingDebugging => &HYBRID_DEBUGGING,
        Intent::General => &GENERAL,
    }
}

/// Everything needed to call the completion endpoint once.
#[derive(Debug, Clone)]
pub struct PromptPlan {
    pub intent: Intent,
    pub directive: &'static str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub preferred_language: Option<String>,
}

impl PromptPlan {
    /// Total characters across all messages, for logging.
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

#[derive(Debug, Clone)]
pub enum Assembly {
    Call(PromptPlan),
    /// Answer without calling the endpoint.
    Reply { intent: Intent, text: String },
}

impl Assembly {
    pub fn intent(&self) -> Intent {
        match self {
            Assembly::Call(plan) => plan.intent,
            Assembly::Reply { intent, .. } => *intent,
        }
    }
}

/// What the store knows about a conversation before this turn.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub history: Vec<Turn>,
    pub welcome_shown: bool,
}

pub struct PromptAssembler {
    persona: Persona,
    history_limit: usize,
}

impl PromptAssembler {
    pub fn new(persona: Persona, history_limit: usize) -> Self {
        Self { persona, history_limit }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Read history and welcome state. A failing store means "no context".
    pub fn load_context(&self, db: &ChatDB, conversation_id: &str) -> PromptContext {
        let history = db
            .recent_turns(conversation_id, self.history_limit)
            .unwrap_or_else(|e| {
                warn!(error = %e, chat_id = conversation_id, "history lookup failed");
                vec![]
            });
        let welcome_shown = match db.get_conversation(conversation_id) {
            Ok(c) => c.is_some_and(|c| c.welcome_shown),
            Err(e) => {
                warn!(error = %e, chat_id = conversation_id, "conversation lookup failed");
                false
            }
        };
        PromptContext { history, welcome_shown }
    }

    pub fn assemble(
        &self,
        db: &ChatDB,
        conversation_id: &str,
        prompt: &str,
        deep_dive: bool,
    ) -> Assembly {
        let ctx = self.load_context(db, conversation_id);
        self.build(&ctx, prompt, deep_dive)
    }

    pub fn build(&self, ctx: &PromptContext, prompt: &str, deep_dive: bool) -> Assembly {
        let (intent, rule) = classify::explain(prompt);
        debug!(intent = %intent, rule = rule.unwrap_or("default"), "classified prompt");

        if intent == Intent::Greeting && ctx.welcome_shown {
            return Assembly::Reply { intent, text: WELCOME_BACK.to_string() };
        }

        let start = ctx.history.len().saturating_sub(self.history_limit);
        let history = &ctx.history[start..];

        let previous = history
            .iter()
            .rev()
            .filter(|t| !t.user_text.trim().is_empty())
            .map(|t| t.assistant_text.trim())
            .find(|t| !t.is_empty());

        let mut directive = if deep_dive { &DEEP_DIVE } else { directive_for(intent) };
        if directive.requires_history && previous.is_none() {
            directive = directive_for(intent);
        }

        let preferred_language = (directive.announces_language || intent.wants_code())
            .then(|| classify::preferred_language(prompt));

        let mut instructions = directive
            .template
            .replace("{persona}", &self.persona.name)
            .replace("{creators}", &self.persona.creators);
        if let Some(ref lang) = preferred_language {
            instructions = instructions.replace("{language}", lang);
        }
        if let Some(prev) = previous {
            instructions = instructions.replace("{previous}", &truncate_chars(prev, DEEP_DIVE_QUOTE_CHARS));
        }

        let mut messages = Vec::with_capacity(history.len() * 2 + 3);
        messages.push(ChatMessage::system(self.persona.system_block()));
        messages.push(ChatMessage::system(instructions));
        for turn in history {
            let user = turn.user_text.trim();
            if !user.is_empty() {
                messages.push(ChatMessage::user(user));
            }
            let assistant = turn.assistant_text.trim();
            if !assistant.is_empty() {
                messages.push(ChatMessage::assistant(assistant));
            }
        }
        messages.push(ChatMessage::user(prompt.trim()));

        Assembly::Call(PromptPlan {
            intent,
            directive: directive.name,
            messages,
            max_tokens: directive.max_tokens,
            temperature: directive.temperature,
            preferred_language,
        })
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(Persona::default(), DEFAULT_HISTORY_LIMIT)
    }
}
