//! End-to-end export tests against a real SQLite database.
//!
//! Each test creates a fresh database in a temp directory, seeds it with
//! plain SQL, and streams exports through [`SqliteSource`].

use datalab::config::Config;
use datalab::export::{stream_export, ExportPlan};
use datalab::options::{ContextMode, ExportOptions, ExportType, RoleStyle, SplitFilter};
use datalab::source::{RecordSource, SqliteSource};
use datalab::{db, migrate, ExportError};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqliteSource) {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("data").join("datalab.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    (tmp, SqliteSource::new(pool))
}

async fn insert_dataset(pool: &SqlitePool, name: &str, kind: &str) -> i64 {
    sqlx::query("INSERT INTO datasets (name, kind) VALUES (?, ?)")
        .bind(name)
        .bind(kind)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

struct Conv<'a> {
    dataset_id: i64,
    split: &'a str,
    status: &'a str,
    tags: &'a str,
    messages: &'a [(&'a str, &'a str)],
}

async fn insert_conversation(pool: &SqlitePool, conv: Conv<'_>) -> i64 {
    let id = sqlx::query(
        "INSERT INTO conversations (dataset_id, split, status, tags, source, notes) \
         VALUES (?, ?, ?, ?, 'seed', '')",
    )
    .bind(conv.dataset_id)
    .bind(conv.split)
    .bind(conv.status)
    .bind(conv.tags)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();

    // Insert in reverse to prove the export orders by idx, not rowid.
    for (idx, (role, content)) in conv.messages.iter().enumerate().rev() {
        sqlx::query(
            "INSERT INTO conversation_messages (conversation_id, idx, role, content) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(idx as i64)
        .bind(*role)
        .bind(*content)
        .execute(pool)
        .await
        .unwrap();
    }
    id
}

async fn insert_item(pool: &SqlitePool, dataset_id: i64, data: &str, source_ref: &str) -> i64 {
    sqlx::query("INSERT INTO dataset_items (dataset_id, data, source_ref) VALUES (?, ?, ?)")
        .bind(dataset_id)
        .bind(data)
        .bind(source_ref)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn export(source: &SqliteSource, options: &ExportOptions) -> Result<String, ExportError> {
    let mut out = Vec::new();
    stream_export(source, options, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

async fn seed_dialogues(pool: &SqlitePool) -> i64 {
    let ds = insert_dataset(pool, "dialogues", "conversations").await;
    insert_conversation(
        pool,
        Conv {
            dataset_id: ds,
            split: "train",
            status: "approved",
            tags: r#"["greeting"]"#,
            messages: &[
                ("system", "You are helpful"),
                ("user", "Hi"),
                ("assistant", "Hello"),
            ],
        },
    )
    .await;
    insert_conversation(
        pool,
        Conv {
            dataset_id: ds,
            split: "train",
            status: "approved",
            tags: "[]",
            messages: &[
                ("user", "Q1"),
                ("assistant", "A1"),
                ("user", "Q2"),
                ("assistant", "A2"),
                ("assistant", "A2b"),
            ],
        },
    )
    .await;
    insert_conversation(
        pool,
        Conv {
            dataset_id: ds,
            split: "test",
            status: "approved",
            tags: "not json",
            messages: &[("user", "T"), ("assistant", "held out")],
        },
    )
    .await;
    insert_conversation(
        pool,
        Conv {
            dataset_id: ds,
            split: "train",
            status: "pending",
            tags: "[]",
            messages: &[("user", "P"), ("assistant", "unreviewed")],
        },
    )
    .await;
    ds
}

#[tokio::test]
async fn test_window_context_scenario() {
    let (_tmp, source) = setup().await;
    let ds = insert_dataset(source.pool(), "hello", "conversations").await;
    insert_conversation(
        source.pool(),
        Conv {
            dataset_id: ds,
            split: "train",
            status: "approved",
            tags: "[]",
            messages: &[
                ("system", "You are helpful"),
                ("user", "Hi"),
                ("assistant", "Hello"),
            ],
        },
    )
    .await;

    let options = ExportOptions {
        context: ContextMode::Window,
        context_turns: 6,
        include_system: false,
        role_style: RoleStyle::Labels,
        ..ExportOptions::default()
    };
    let out = export(&source, &options).await.unwrap();
    assert_eq!(out, "{\"user\":\"User: Hi\",\"assistant\":\"Hello\"}\n");
}

#[tokio::test]
async fn test_pairs_respect_split_and_status() {
    let (_tmp, source) = setup().await;
    seed_dialogues(source.pool()).await;

    let out = export(&source, &ExportOptions::default()).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            r#"{"user":"Hi","assistant":"Hello"}"#,
            r#"{"user":"Q1","assistant":"A1"}"#,
            r#"{"user":"Q2","assistant":"A2"}"#,
            r#"{"user":"Q2","assistant":"A2b"}"#,
        ]
    );

    let options = ExportOptions {
        split: SplitFilter::All,
        ..ExportOptions::default()
    };
    let out = export(&source, &options).await.unwrap();
    assert!(out.contains("held out"));
    assert!(!out.contains("unreviewed"));
}

#[tokio::test]
async fn test_full_context_plain_with_system() {
    let (_tmp, source) = setup().await;
    seed_dialogues(source.pool()).await;

    let options = ExportOptions {
        context: ContextMode::Full,
        include_system: true,
        role_style: RoleStyle::Plain,
        ..ExportOptions::default()
    };
    let out = export(&source, &options).await.unwrap();
    let first: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
    assert_eq!(first["user"], "You are helpful\nHi");
    let last: serde_json::Value = serde_json::from_str(out.lines().last().unwrap()).unwrap();
    assert_eq!(last["user"], "Q1\nA1\nQ2");
    assert_eq!(last["assistant"], "A2b");
}

#[tokio::test]
async fn test_cap_is_stable_prefix_and_idempotent() {
    let (_tmp, source) = setup().await;
    seed_dialogues(source.pool()).await;

    let full = export(&source, &ExportOptions::default()).await.unwrap();
    assert_eq!(full, export(&source, &ExportOptions::default()).await.unwrap());

    let total = full.lines().count();
    for cap in 1..=total + 2 {
        let options = ExportOptions {
            max_examples: cap,
            ..ExportOptions::default()
        };
        let out = export(&source, &options).await.unwrap();
        let expected: Vec<&str> = full.lines().take(cap).collect();
        assert_eq!(out.lines().collect::<Vec<_>>(), expected, "cap {}", cap);
    }
}

#[tokio::test]
async fn test_conversations_verbatim() {
    let (_tmp, source) = setup().await;
    let ds = seed_dialogues(source.pool()).await;

    let options = ExportOptions {
        export_type: ExportType::Conversations,
        dataset_id: Some(ds),
        split: SplitFilter::All,
        ..ExportOptions::default()
    };
    let out = export(&source, &options).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        r#"{"id":1,"split":"train","status":"approved","tags":["greeting"],"source":"seed","notes":"","messages":[{"role":"system","content":"You are helpful"},{"role":"user","content":"Hi"},{"role":"assistant","content":"Hello"}]}"#
    );
    // Unparseable stored tags degrade to an empty list.
    let third: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(third["tags"], serde_json::json!([]));
    assert_eq!(third["split"], "test");
}

#[tokio::test]
async fn test_message_name_and_meta_round_trip() {
    let (_tmp, source) = setup().await;
    let pool = source.pool();
    let ds = insert_dataset(pool, "meta", "conversations").await;
    let conv = insert_conversation(
        pool,
        Conv {
            dataset_id: ds,
            split: "train",
            status: "approved",
            tags: "[]",
            messages: &[("user", "Hi")],
        },
    )
    .await;
    sqlx::query(
        "INSERT INTO conversation_messages (conversation_id, idx, role, name, content, meta) \
         VALUES (?, 1, 'assistant', 'bot', 'Hello', '{\"score\":0.9}')",
    )
    .bind(conv)
    .execute(pool)
    .await
    .unwrap();

    let options = ExportOptions {
        export_type: ExportType::Conversations,
        ..ExportOptions::default()
    };
    let out = export(&source, &options).await.unwrap();
    assert!(out.contains(r#"{"role":"assistant","content":"Hello","name":"bot","meta":{"score":0.9}}"#));
}

#[tokio::test]
async fn test_items_dataset_exports() {
    let (_tmp, source) = setup().await;
    let pool = source.pool();
    let ds = insert_dataset(pool, "items", "items").await;
    let other = insert_dataset(pool, "other items", "Items").await;
    insert_item(pool, ds, r#"{"user":" Hi ","assistant":"Hello"}"#, "a.jsonl:1").await;
    insert_item(pool, ds, r#"["not","an","object"]"#, "a.jsonl:2").await;
    insert_item(
        pool,
        ds,
        r#"{"messages": [{"role":"user","content":"Q"},{"role":"assistant","content":"A1"},{"role":"assistant","content":"A2"}]}"#,
        "a.jsonl:3",
    )
    .await;
    insert_item(pool, other, r#"{"user":"x","assistant":"y"}"#, "b.jsonl:1").await;

    let pairs = ExportOptions {
        dataset_id: Some(ds),
        ..ExportOptions::default()
    };
    assert_eq!(
        export(&source, &pairs).await.unwrap(),
        "{\"user\":\"Hi\",\"assistant\":\"Hello\"}\n\
         {\"user\":\"Q\",\"assistant\":\"A1\"}\n\
         {\"user\":\"Q\",\"assistant\":\"A2\"}\n"
    );

    let raw = ExportOptions {
        export_type: ExportType::Items,
        dataset_id: Some(ds),
        ..ExportOptions::default()
    };
    let out = export(&source, &raw).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], r#"{"user":" Hi ","assistant":"Hello"}"#);
    assert!(lines[2].starts_with(r#"{"messages": [{"role":"user""#));

    let meta = ExportOptions {
        export_type: ExportType::ItemsWithMeta,
        dataset_id: Some(ds),
        max_examples: 2,
        ..ExportOptions::default()
    };
    let out = export(&source, &meta).await.unwrap();
    assert_eq!(
        out,
        format!(
            "{{\"id\":1,\"dataset_id\":{ds},\"source_ref\":\"a.jsonl:1\",\"data\":{{\"user\":\" Hi \",\"assistant\":\"Hello\"}}}}\n\
             {{\"id\":2,\"dataset_id\":{ds},\"source_ref\":\"a.jsonl:2\",\"data\":[\"not\",\"an\",\"object\"]}}\n"
        )
    );
}

#[tokio::test]
async fn test_multiline_item_exports_as_one_record_per_line() {
    let (_tmp, source) = setup().await;
    let pool = source.pool();
    let ds = insert_dataset(pool, "pretty", "items").await;
    insert_item(
        pool,
        ds,
        "{\n  \"messages\": [\n    {\"role\": \"user\", \"content\": \"Q\"},\n    {\"role\": \"assistant\", \"content\": \"A\"}\n  ]\n}\n",
        "pretty.json",
    )
    .await;
    insert_item(pool, ds, "not json", "broken.txt").await;

    for export_type in [ExportType::Items, ExportType::ItemsWithMeta] {
        let options = ExportOptions {
            export_type,
            dataset_id: Some(ds),
            ..ExportOptions::default()
        };
        let out = export(&source, &options).await.unwrap();
        assert_eq!(out.lines().count(), 1, "{}: {:?}", export_type, out);
        let record: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert!(record.is_object());
    }

    let pairs = ExportOptions {
        dataset_id: Some(ds),
        ..ExportOptions::default()
    };
    assert_eq!(
        export(&source, &pairs).await.unwrap(),
        "{\"user\":\"Q\",\"assistant\":\"A\"}\n"
    );
}

#[tokio::test]
async fn test_configuration_errors() {
    let (_tmp, source) = setup().await;
    let pool = source.pool();
    let convs = seed_dialogues(pool).await;
    let items = insert_dataset(pool, "items", "items").await;

    let cases = [
        (ExportType::Conversations, Some(items)),
        (ExportType::Items, Some(convs)),
        (ExportType::ItemsWithMeta, None),
        (ExportType::Pairs, Some(404)),
    ];
    for (export_type, dataset_id) in cases {
        let options = ExportOptions {
            export_type,
            dataset_id,
            ..ExportOptions::default()
        };
        let mut out = Vec::new();
        let err = stream_export(&source, &options, &mut out)
            .await
            .unwrap_err();
        assert!(err.is_configuration(), "{} / {:?}: {}", export_type, dataset_id, err);
        assert!(out.is_empty());
    }
}

#[tokio::test]
async fn test_dataset_kind_lookup() {
    let (_tmp, source) = setup().await;
    let items = insert_dataset(source.pool(), "items", "ITEMS").await;
    assert_eq!(
        source.dataset_kind(items).await.unwrap(),
        Some(datalab::models::DatasetKind::Items)
    );
    assert_eq!(source.dataset_kind(9999).await.unwrap(), None);
}

#[tokio::test]
async fn test_early_stop_releases_cursor() {
    let (_tmp, source) = setup().await;
    let ds = insert_dataset(source.pool(), "many", "conversations").await;
    for i in 0..25 {
        let q = format!("Q{}", i);
        let messages = [("user", q.as_str()), ("assistant", "A")];
        insert_conversation(
            source.pool(),
            Conv {
                dataset_id: ds,
                split: "train",
                status: "approved",
                tags: "[]",
                messages: &messages,
            },
        )
        .await;
    }

    // More capped runs than pooled connections: each run must give its
    // cursor back when it stops early.
    for _ in 0..10 {
        let options = ExportOptions {
            max_examples: 1,
            ..ExportOptions::default()
        };
        let mut out = Vec::new();
        let summary = stream_export(&source, &options, &mut out).await.unwrap();
        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.plan, ExportPlan::ConversationPairs);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"user\":\"Q0\",\"assistant\":\"A\"}\n");
    }
}
