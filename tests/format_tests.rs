use algoai::format::{
    language_label, FencePolicy, Formatter, FormatterConfig, INCOMPLETE_RESPONSE, MORE_DETAIL,
};
use algoai::llm::NO_RESPONSE;

fn formatter() -> Formatter {
    Formatter::default()
}

fn refusing() -> Formatter {
    Formatter::new(FormatterConfig { fence_policy: FencePolicy::Refuse, ..FormatterConfig::default() })
}

const CLEAN: &str = "A stack is a last-in, first-out structure.\n\n\
**Code Example (Python):**\n```python\nstack = []\nstack.append(1)\n```\n\n\
Suggested follow-up: how would you build a queue from two stacks?";

#[test]
fn clean_text_is_a_fixed_point() {
    let f = formatter();
    assert_eq!(f.format(CLEAN), CLEAN);
    let once = f.format("Sorting puts items in order.\n\n\n\n```rust\nlet mut v = vec![3, 1];\nv.sort();\n```");
    assert_eq!(f.format(&once), once);
}

#[test]
fn empty_becomes_no_response() {
    assert_eq!(formatter().format("   \n "), NO_RESPONSE);
    assert_eq!(formatter().format("<s></s>"), NO_RESPONSE);
}

#[test]
fn leaked_tokens_are_stripped() {
    let out = formatter().format("<s>[INST] secret [/INST] Arrays store elements contiguously in memory.</s>");
    assert_eq!(out, "Arrays store elements contiguously in memory.");
}

#[test]
fn system_block_is_stripped() {
    let out = formatter().format("<<SYS>>be nice<</SYS>>Hash maps give average O(1) lookups.");
    assert_eq!(out, "Hash maps give average O(1) lookups.");
}

#[test]
fn assistant_is_renamed() {
    let out = formatter().format("The assistant recommends starting with arrays and loops.");
    assert_eq!(out, "AlgoAI recommends starting with arrays and loops.");
}

#[test]
fn unclosed_fence_is_repaired() {
    let out = formatter().format("Try this:\n```python\nprint('hi')");
    assert_eq!(out.matches("```").count() % 2, 0);
    assert!(out.ends_with("```"));
    assert!(out.contains("**Code Example (Python):**"));
}

#[test]
fn unclosed_fence_is_refused() {
    assert_eq!(refusing().format("Try this:\n```python\nprint('hi')"), INCOMPLETE_RESPONSE);
}

#[test]
fn balanced_fences_pass_refuse_policy() {
    let text = "Use a loop:\n```go\nfor i := 0; i < 3; i++ {}\n```";
    let out = refusing().format(text);
    assert!(out.contains("**Code Example (Go):**"));
}

#[test]
fn blank_runs_collapse() {
    let out = formatter().format("First paragraph here.\n\n\n\nSecond paragraph here.");
    assert_eq!(out, "First paragraph here.\n\nSecond paragraph here.");
}

#[test]
fn inline_fence_moves_to_own_line() {
    let out = formatter().format("Example below:```js\nconsole.log(1)```");
    assert!(out.contains("\n```js\n"));
    assert!(out.ends_with("\n```"));
}

#[test]
fn code_example_without_fence_gets_default() {
    let out = formatter().format("Code Example: see the explanation above for details.");
    assert!(out.contains("```python"));
    assert!(out.contains("Default example"));
}

#[test]
fn greeting_keeps_first_sentence() {
    let f = formatter();
    assert_eq!(f.format("Hi there, welcome!"), "Hi there, welcome!.");
    assert_eq!(f.format("Hello! Ask away."), "Hello!.");
    assert_eq!(f.format("Hello friend. Ask away."), "Hello friend.");
}

#[test]
fn greeting_collapse_is_idempotent() {
    let f = formatter();
    let once = f.format("Hello friend. Ask away.");
    assert_eq!(f.format(&once), once);
}

#[test]
fn long_text_is_truncated() {
    let out = formatter().format(&"a".repeat(4000));
    assert_eq!(out.chars().count(), 3001);
    assert!(out.ends_with('…'));
}

#[test]
fn truncation_recloses_fence() {
    let text = format!("Listing:\n```python\n{}\n```", "x = 1\n".repeat(1000));
    let out = formatter().format(&text);
    assert_eq!(out.matches("```").count() % 2, 0);
}

#[test]
fn short_text_gets_follow_up_hint() {
    let out = formatter().format("Use a heap.");
    assert_eq!(out, format!("Use a heap.\n\n{MORE_DETAIL}"));
}

#[test]
fn max_len_is_configurable() {
    let f = Formatter::new(FormatterConfig { max_len: 50, ..FormatterConfig::default() });
    let out = f.format(&"b".repeat(80));
    assert_eq!(out.chars().count(), 51);
}

#[test]
fn language_labels() {
    assert_eq!(language_label("py"), Some("Python"));
    assert_eq!(language_label("C++"), Some("C++"));
    assert_eq!(language_label("ts"), Some("TypeScript"));
    assert_eq!(language_label("yaml"), None);
}
