use algoai::db::ChatDB;

fn db() -> ChatDB {
    ChatDB::open(":memory:").unwrap()
}

#[test]
fn append_then_fetch_roundtrip() {
    let db = db();
    db.append_turn("c1", "  what is big-O?  ", "\nAn upper bound on growth.\n").unwrap();
    let turns = db.turns("c1").unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_text, "what is big-O?");
    assert_eq!(turns[0].assistant_text, "An upper bound on growth.");
    assert_eq!(turns[0].conversation_id, "c1");
}

#[test]
fn append_creates_conversation_and_title() {
    let db = db();
    let long = "x".repeat(80);
    db.append_turn("c1", &long, "a").unwrap();
    let c = db.get_conversation("c1").unwrap().unwrap();
    assert_eq!(c.title.chars().count(), 50);
    assert!(c.active);
    assert!(!c.welcome_shown);

    // later turns do not overwrite the title
    db.append_turn("c1", "something else", "b").unwrap();
    assert_eq!(db.get_conversation("c1").unwrap().unwrap().title, "x".repeat(50));
}

#[test]
fn turns_stay_in_insertion_order() {
    let db = db();
    for i in 0..5 {
        db.append_turn("c1", &format!("q{i}"), &format!("a{i}")).unwrap();
    }
    let users: Vec<String> = db.turns("c1").unwrap().into_iter().map(|t| t.user_text).collect();
    assert_eq!(users, ["q0", "q1", "q2", "q3", "q4"]);

    let recent: Vec<String> = db.recent_turns("c1", 2).unwrap().into_iter().map(|t| t.user_text).collect();
    assert_eq!(recent, ["q3", "q4"]);
}

#[test]
fn pages_are_one_based() {
    let db = db();
    for i in 0..7 {
        db.append_turn("c1", &format!("q{i}"), "a").unwrap();
    }
    assert_eq!(db.turns_page("c1", 1, 3).unwrap()[0].user_text, "q0");
    assert_eq!(db.turns_page("c1", 3, 3).unwrap().len(), 1);
    assert!(db.turns_page("c1", 4, 3).unwrap().is_empty());
    assert_eq!(db.turn_count("c1").unwrap(), 7);
}

#[test]
fn ensure_is_idempotent() {
    let db = db();
    let a = db.ensure_conversation("c1").unwrap();
    let b = db.ensure_conversation("c1").unwrap();
    assert_eq!(a.created_at, b.created_at);
    assert_eq!(db.stats().unwrap().conversations, 1);
}

#[test]
fn create_rejects_duplicate() {
    let db = db();
    db.create_conversation("c1", "first").unwrap();
    assert!(db.create_conversation("c1", "again").is_err());
}

#[test]
fn delete_cascades_to_turns() {
    let db = db();
    db.append_turn("c1", "q", "a").unwrap();
    db.append_turn("c1", "q2", "a2").unwrap();
    assert!(db.delete_conversation("c1").unwrap());
    assert!(db.turns("c1").unwrap().is_empty());
    assert_eq!(db.stats().unwrap().turns, 0);
    assert!(!db.delete_conversation("c1").unwrap());
}

#[test]
fn delete_all_clears_store() {
    let db = db();
    db.append_turn("c1", "q", "a").unwrap();
    db.append_turn("c2", "q", "a").unwrap();
    assert_eq!(db.delete_all().unwrap(), 2);
    let s = db.stats().unwrap();
    assert_eq!((s.conversations, s.turns), (0, 0));
}

#[test]
fn list_skips_empty_and_archived() {
    let db = db();
    db.append_turn("c1", "first", "a").unwrap();
    db.append_turn("c2", "second", "a").unwrap();
    db.ensure_conversation("empty").unwrap();
    assert_eq!(db.toggle_archived("c2").unwrap(), Some(false));

    let list = db.list_conversations().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].chat_id, "c1");

    assert_eq!(db.toggle_archived("c2").unwrap(), Some(true));
    assert_eq!(db.list_conversations().unwrap().len(), 2);
    assert_eq!(db.toggle_archived("ghost").unwrap(), None);
}

#[test]
fn list_orders_by_last_active() {
    let db = db();
    db.append_turn("old", "older chat", "a").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    db.append_turn("new", "newer chat", "a").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    db.append_turn("old", "bump", "a").unwrap();

    let ids: Vec<String> = db.list_conversations().unwrap().into_iter().map(|c| c.chat_id).collect();
    assert_eq!(ids, ["old", "new"]);
}

#[test]
fn title_falls_back_to_short_id() {
    let db = db();
    db.append_turn("abcdefghijkl", "", "welcome line").unwrap();
    let list = db.list_conversations().unwrap();
    assert_eq!(list[0].title, "Chat abcdefgh");

    db.append_turn("abcdefghijkl", "first real question", "a").unwrap();
    assert_eq!(db.list_conversations().unwrap()[0].title, "first real question");
}

#[test]
fn find_by_id_or_title() {
    let db = db();
    db.append_turn("c1", "sorting basics", "a").unwrap();
    assert_eq!(db.find_conversation("c1").unwrap().unwrap().id, "c1");
    assert_eq!(db.find_conversation("sorting basics").unwrap().unwrap().id, "c1");
    assert!(db.find_conversation("nothing").unwrap().is_none());
}

#[test]
fn rename_and_welcome_flag() {
    let db = db();
    db.append_turn("c1", "q", "a").unwrap();
    assert!(db.set_title("c1", "Renamed").unwrap());
    assert!(!db.set_title("missing", "x").unwrap());
    db.set_welcome_shown("c1").unwrap();
    let c = db.get_conversation("c1").unwrap().unwrap();
    assert_eq!(c.title, "Renamed");
    assert!(c.welcome_shown);
}

#[test]
fn usage_summary_groups_calls() {
    let db = db();
    db.log_llm_call("tech", "m1", 100, 50, 200).unwrap();
    db.log_llm_call("tech", "m1", 10, 5, 400).unwrap();
    db.log_llm_call("greeting", "m2", 1, 1, 0).unwrap();

    let s = db.llm_usage_summary().unwrap();
    assert_eq!(s.total_calls, 3);
    assert_eq!(s.total_prompt_tokens, 111);
    assert_eq!(s.total_completion_tokens, 56);
    assert_eq!(s.today_calls, 3);
    assert_eq!(s.avg_duration_ms, 200);
    assert_eq!(s.by_intent["tech"].calls, 2);
    assert_eq!(s.by_model["m2"].prompt_tokens, 1);
}

#[test]
fn file_database_persists() {
    let dir = std::env::temp_dir().join(format!("algoai-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("chat.db");
    let path = path.to_str().unwrap();
    {
        let db = ChatDB::open(path).unwrap();
        db.append_turn("c1", "kept", "yes").unwrap();
    }
    let db = ChatDB::open(path).unwrap();
    assert_eq!(db.turns("c1").unwrap()[0].user_text, "kept");
    drop(db);
    let _ = std::fs::remove_dir_all(&dir);
}
