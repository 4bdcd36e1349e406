//! Suggested prompts and welcome lines.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

const EXPLORE: &[&str] = &[
    "What are the key differences between merge sort and quicksort?",
    "Explain the time complexity of binary search in detail.",
    "How does a hash table work under the hood?",
    "What is the best algorithm for graph traversal in a dense graph?",
    "Compare depth-first search and breadth-first search for tree traversal.",
];

const HOWTO: &[&str] = &[
    "How to implement a binary search tree in Python?",
    "How to create a REST API using Flask?",
    "How to optimize a SQL query for large datasets?",
    "How to set up a CI/CD pipeline with GitHub Actions?",
    "How to implement authentication in a Node.js app?",
];

const ANALYZE: &[&str] = &[
    "Analyze this code: def factorial(n): return 1 if n == 0 else n * factorial(n-1)",
    "Analyze the performance of a bubble sort implementation.",
    "Analyze this SQL query: SELECT * FROM users WHERE age > 30;",
    "Analyze the memory usage of a recursive Fibonacci function.",
    "Analyze the scalability of a microservices architecture.",
];

const CODE: &[&str] = &[
    "Write a Python function to reverse a linked list.",
    "Write a JavaScript function to debounce user input.",
    "Write a Java program to implement a stack using arrays.",
    "Write a Go program to handle concurrent HTTP requests.",
    "Write a Rust function to parse JSON data.",
];

const GENERAL: &[&str] = &[
    "What is the difference between TCP and UDP?",
    "How does Kubernetes manage container orchestration?",
    "What are the benefits of using a NoSQL database?",
    "Explain the SOLID principles in software design.",
    "How does a CDN improve web performance?",
];

const WELCOME_LINES: &[&str] = &[
    "Welcome, seeker of code! I'm {persona}, here to guide you through logic and programming with clarity. What would you like to explore?",
    "Greetings, coder! I'm {persona}, your mentor crafted to simplify and solve. What challenge can I help you conquer today?",
    "Hello, friend! As {persona}, I'm your companion in the art of algorithms. What's your first question?",
];

const RETURNING_LINE: &str =
    "Welcome back, explorer! I'm {persona}, ready to dive deeper into your coding journey. What's next?";

/// Pool name for a category as sent by the UI. Unknown categories map to "general".
pub fn pool_name(category: &str) -> &'static str {
    match category.trim().to_lowercase().as_str() {
        "explore algorithms about..." | "explore" => "explore",
        "how to implement..." | "howto" => "howto",
        "analyze this code:" | "analyze this code: " | "analyze" => "analyze",
        "write a..." | "code" => "code",
        _ => "general",
    }
}

fn pool(name: &str) -> &'static [&'static str] {
    match name {
        "explore" => EXPLORE,
        "howto" => HOWTO,
        "analyze" => ANALYZE,
        "code" => CODE,
        _ => GENERAL,
    }
}

/// Deterministic pick for a category and seed.
pub fn suggestion_for(category: &str, seed: u64) -> &'static str {
    let mut rng = StdRng::seed_from_u64(seed);
    pool(pool_name(category)).choose(&mut rng).copied().unwrap_or(GENERAL[0])
}

/// Suggestion that rotates with the current Unix second.
pub fn suggestion(category: &str) -> &'static str {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    suggestion_for(category, secs)
}

/// Opening line for a new conversation. Returning users always get the same line.
pub fn welcome_line(persona: &str, returning: bool) -> String {
    let line = if returning {
        RETURNING_LINE
    } else {
        WELCOME_LINES.choose(&mut rand::rng()).copied().unwrap_or(RETURNING_LINE)
    };
    line.replace("{persona}", persona)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_labels_map_to_pools() {
        assert_eq!(pool_name("How to implement..."), "howto");
        assert_eq!(pool_name("Analyze this code: "), "analyze");
        assert_eq!(pool_name("write a..."), "code");
        assert_eq!(pool_name("explore"), "explore");
        assert_eq!(pool_name("whatever"), "general");
    }

    #[test]
    fn same_seed_same_suggestion() {
        assert_eq!(suggestion_for("code", 42), suggestion_for("code", 42));
        assert!(CODE.contains(&suggestion_for("write a...", 7)));
    }

    #[test]
    fn returning_line_is_fixed() {
        let line = welcome_line("AlgoAI", true);
        assert!(line.starts_with("Welcome back, explorer!"));
        assert!(line.contains("AlgoAI"));
    }
}
