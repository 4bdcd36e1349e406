//! Rule-based intent classification.
//!
//! A prompt is matched against an ordered rule table; the first rule whose
//! predicate fires decides the intent. No scoring, no state.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Identity,
    Debugging,
    Tech,
    HybridGreetingTech,
    HybridGreetingDebugging,
    General,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Identity => "identity",
            Intent::Debugging => "debugging",
            Intent::Tech => "tech",
            Intent::HybridGreetingTech => "hybrid_greeting_tech",
            Intent::HybridGreetingDebugging => "hybrid_greeting_debugging",
            Intent::General => "general",
        }
    }

    /// Intents whose answers normally carry code in a preferred language.
    pub fn wants_code(self) -> bool {
        matches!(
            self,
            Intent::Tech
                | Intent::HybridGreetingTech
                | Intent::Debugging
                | Intent::HybridGreetingDebugging
        )
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "yo", "howdy", "greetings", "salutations", "introduce",
];

pub const IDENTITY_PHRASES: &[&str] = &[
    "who built",
    "who made",
    "who created",
    "who developed",
    "your creator",
    "are you",
    "where does your knowledge",
];

/// Words after a leading greeting that still count as "just saying hi".
const MAX_GREETING_TAIL_WORDS: usize = 3;

static TECH_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:code|coding|python|java|javascript|js|typescript|ruby|php|go|golang|rust|",
        r"kotlin|swift|perl|scala|matlab|sql|nosql|algorithms?|recursion|data structures?|",
        r"machine learning|neural networks?|databases?|api|apis|backend|frontend|ai|",
        r"time complexity|space complexity|sorting|engineering|system design|software|",
        r"hardware|math|algebra|calculus|geometry|statistics|probability|optimization|",
        r"cloud|devops|docker|kubernetes|git|aws|azure|gcp|ci|cd|cybersecurity|game|",
        r"development|network|networking|arrays?|linked lists?|binary search|hash tables?|",
        r"graphs?|compilers?)\b",
    ))
    .expect("tech keyword regex")
});

// `\b` does not hold after `+`/`#`, so symbol-bearing names get their own pattern.
static TECH_SYMBOLS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\w])(?:c\+\+|c#|f#)(?:[^\w]|$)|\bO\([^)]*\)").expect("tech symbol regex")
});

static TECH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"how does .+ work",
        r"how to .+",
        r"what is the best way to .+",
        r"compare .+ (?:vs\.?|versus) .+",
        r"why is .+ better than .+",
        r"how can .+ be improved",
        r"\bbuild .+",
        r"\bcreate .+",
        r"\bimplement .+",
        r"\bdesign .+",
        r"\boptimi[sz]e .+",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("tech pattern"))
    .collect()
});

static DEBUG_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"why (?:does|do|did|is) .*(?:fail|crash|break|hang)",
        r"\bfix (?:this|my|the|it)\b",
        r"not working",
        r"(?:doesn'?t|does not|won'?t|can'?t|cannot) (?:work|run|compile|build|start)",
        r"\bthrows?\b",
        r"stack ?trace",
        r"traceback",
        r"exception",
        r"segfault|segmentation fault",
        r"\bbugs?\b",
        r"\berrors?\b",
        r"\bdebug(?:ging)?\b",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("debug pattern"))
    .collect()
});

static PREFERRED_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:in|using)\s+(python|java|c\+\+|javascript|typescript|go|rust|ruby|php|kotlin|swift)(?:[^\w+#]|$)",
    )
    .expect("language regex")
});

pub const DEFAULT_LANGUAGE: &str = "python";

/// Facts about a prompt computed once and shared by every rule.
struct Signals {
    lower: String,
    exact_greeting: bool,
    greeting_lead: bool,
    tail_words: usize,
    asks_question: bool,
}

impl Signals {
    fn new(prompt: &str) -> Self {
        let lower = prompt.trim().to_lowercase();
        let bare = lower.trim_end_matches(['!', '.', '?', ',']).trim();
        let exact_greeting = GREETING_WORDS.contains(&bare);

        let mut words = lower.split_whitespace();
        let greeting_lead = words
            .next()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .is_some_and(|w| GREETING_WORDS.contains(&w));
        let tail_words = words.count();

        Self {
            asks_question: lower.contains('?'),
            lower,
            exact_greeting,
            greeting_lead,
            tail_words,
        }
    }
}

struct Rule {
    name: &'static str,
    matches: fn(&Signals) -> bool,
    resolve: fn(&Signals) -> Intent,
}

fn is_exact_greeting(s: &Signals) -> bool {
    s.exact_greeting
}

fn is_identity(s: &Signals) -> bool {
    IDENTITY_PHRASES.iter().any(|p| s.lower.contains(p))
}

fn is_tech(s: &Signals) -> bool {
    is_technical(&s.lower)
}

fn is_debugging(s: &Signals) -> bool {
    DEBUG_PATTERNS.iter().any(|re| re.is_match(&s.lower))
}

fn is_short_greeting(s: &Signals) -> bool {
    s.greeting_lead && s.tail_words <= MAX_GREETING_TAIL_WORDS && !s.asks_question
}

fn greeting(_: &Signals) -> Intent {
    Intent::Greeting
}

fn identity(_: &Signals) -> Intent {
    Intent::Identity
}

fn tech(s: &Signals) -> Intent {
    if s.greeting_lead {
        Intent::HybridGreetingTech
    } else {
        Intent::Tech
    }
}

fn debugging(s: &Signals) -> Intent {
    if s.greeting_lead {
        Intent::HybridGreetingDebugging
    } else {
        Intent::Debugging
    }
}

static RULES: [Rule; 5] = [
    Rule { name: "exact_greeting", matches: is_exact_greeting, resolve: greeting },
    Rule { name: "identity", matches: is_identity, resolve: identity },
    Rule { name: "tech", matches: is_tech, resolve: tech },
    Rule { name: "debugging", matches: is_debugging, resolve: debugging },
    Rule { name: "short_greeting", matches: is_short_greeting, resolve: greeting },
];

/// True when text mentions a technical keyword or follows a technical phrasing.
pub fn is_technical(text: &str) -> bool {
    TECH_KEYWORDS.is_match(text)
        || TECH_SYMBOLS.is_match(text)
        || TECH_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Classify a prompt, also returning the name of the rule that fired
/// (`None` when nothing matched and the default applied).
pub fn explain(prompt: &str) -> (Intent, Option<&'static str>) {
    let signals = Signals::new(prompt);
    RULES
        .iter()
        .find(|rule| (rule.matches)(&signals))
        .map(|rule| ((rule.resolve)(&signals), Some(rule.name)))
        .unwrap_or((Intent::General, None))
}

pub fn classify(prompt: &str) -> Intent {
    explain(prompt).0
}

/// Language requested via "in <lang>" / "using <lang>", lowercased.
pub fn preferred_language(prompt: &str) -> String {
    PREFERRED_LANGUAGE
        .captures(prompt)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names_are_reported() {
        assert_eq!(explain("hello"), (Intent::Greeting, Some("exact_greeting")));
        assert_eq!(explain("tell me a story"), (Intent::General, None));
        assert_eq!(explain("who made you").1, Some("identity"));
    }

    #[test]
    fn symbol_languages_match() {
        assert!(is_technical("templates in c++ please"));
        assert!(is_technical("is c# managed"));
        assert!(is_technical("why is it O(n log n)"));
    }

    #[test]
    fn java_does_not_shadow_javascript() {
        assert_eq!(preferred_language("closures using JavaScript"), "javascript");
        assert_eq!(preferred_language("templates in C++"), "c++");
    }
}
