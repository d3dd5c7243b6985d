mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

use subject_tutor::app::Tutor;
use subject_tutor::cache::ResolveStatus;
use subject_tutor::chunk::load_and_chunk;
use subject_tutor::error::ErrorKind;
use subject_tutor::store::KnowledgeStore;
use subject_tutor_core::conversation::Role;
use subject_tutor_core::models::KbKey;
use subject_tutor_core::prompt::REFUSAL;

use common::{file_names, snapshot, test_config, write_docx, FakeChat, FakeEmbedder};

const PHOTOSYNTHESIS: &[&str] = &[
    "Photosynthesis is how green plants make food using sunlight, water and carbon dioxide.",
    "",
    "Chlorophyll in the leaves absorbs light energy.",
    "The products of photosynthesis are glucose and oxygen.",
];

fn tutor(tmp: &TempDir, embedder: Arc<FakeEmbedder>, chat: Arc<FakeChat>) -> Tutor {
    Tutor::with_providers(&test_config(tmp), embedder, chat)
}

fn science_doc(tmp: &TempDir) -> std::path::PathBuf {
    let path = tmp.path().join("documents/9th/Science.docx");
    write_docx(&path, PHOTOSYNTHESIS);
    path
}

#[tokio::test]
async fn test_new_key_is_created_then_served_from_memory() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let embedder = Arc::new(FakeEmbedder::new());
    let tutor = tutor(&tmp, embedder.clone(), Arc::new(FakeChat::replying("ok")));
    let key = KbKey::new("9th", "Science");

    let first = tutor.cache().resolve(&key).await.unwrap();
    assert_eq!(first.status, Some(ResolveStatus::Created));
    assert_eq!(embedder.calls(), 1);

    let second = tutor.cache().resolve(&key).await.unwrap();
    assert_eq!(second.status, None);
    assert!(Arc::ptr_eq(&first.index, &second.index));
    assert_eq!(embedder.calls(), 1);
}

#[tokio::test]
async fn test_persisted_key_is_loaded_without_touching_storage() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let key = KbKey::new("9th", "Science");

    // A previous process built the index.
    let builder_embedder = Arc::new(FakeEmbedder::new());
    tutor(&tmp, builder_embedder, Arc::new(FakeChat::replying("ok")))
        .cache()
        .resolve(&key)
        .await
        .unwrap();

    let dir = tmp.path().join("vectorstore/9th/Science");
    let before = snapshot(&dir);

    let embedder = Arc::new(FakeEmbedder::new());
    let fresh = tutor(&tmp, embedder.clone(), Arc::new(FakeChat::replying("ok")));
    let resolved = fresh.cache().resolve(&key).await.unwrap();

    assert_eq!(resolved.status, Some(ResolveStatus::Loaded));
    assert_eq!(embedder.calls(), 0);
    assert!(fresh.cache().get(&key).is_some());
    assert_eq!(snapshot(&dir), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_builds_once() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let embedder = Arc::new(FakeEmbedder::new());
    let tutor = tutor(&tmp, embedder.clone(), Arc::new(FakeChat::replying("ok")));
    let key = KbKey::new("9th", "Science");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = tutor.cache().clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            cache.resolve(&key).await.unwrap().status
        }));
    }

    let mut statuses = Vec::new();
    for h in handles {
        statuses.push(h.await.unwrap());
    }
    let created = statuses
        .iter()
        .filter(|s| **s == Some(ResolveStatus::Created))
        .count();
    let no_ops = statuses.iter().filter(|s| s.is_none()).count();

    assert_eq!(created, 1);
    assert_eq!(no_ops, 7);
    assert_eq!(embedder.calls(), 1);
    assert_eq!(file_names(&tmp.path().join("vectorstore/9th")), vec!["Science"]);
}

#[tokio::test]
async fn test_rebuild_replaces_segments_and_leaves_no_stale_files() {
    let tmp = TempDir::new().unwrap();
    let doc = science_doc(&tmp);
    let cfg = test_config(&tmp);
    let embedder = Arc::new(FakeEmbedder::new());
    let tutor = Tutor::with_providers(&cfg, embedder.clone(), Arc::new(FakeChat::replying("ok")));
    let key = KbKey::new("9th", "Science");

    tutor.cache().resolve(&key).await.unwrap();
    let dir = tmp.path().join("vectorstore/9th/Science");
    std::fs::write(dir.join("leftover.faiss"), b"old build artifact").unwrap();

    write_docx(
        &doc,
        &[
            "Cells are the basic unit of life.",
            "The nucleus controls the activities of the cell.",
        ],
    );
    let rebuilt = tutor.cache().rebuild(&key).await.unwrap();

    let expected = load_and_chunk(&doc, &cfg.chunking).unwrap();
    assert_eq!(rebuilt.segments(), expected.as_slice());

    let persisted: Vec<String> =
        serde_json::from_slice(&std::fs::read(dir.join("segments.json")).unwrap()).unwrap();
    assert_eq!(persisted, expected);
    assert_eq!(
        file_names(&dir),
        vec!["manifest.json", "segments.json", "vectors.bin"]
    );

    let cached = tutor.cache().get(&key).unwrap();
    assert!(Arc::ptr_eq(&cached, &rebuilt));
    assert_eq!(embedder.calls(), 2);
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let embedder = Arc::new(FakeEmbedder::new());
    let tutor = tutor(&tmp, embedder.clone(), Arc::new(FakeChat::replying("ok")));
    let key = KbKey::new("9th", "Science");

    let original = tutor.cache().resolve(&key).await.unwrap().index;
    let dir = tmp.path().join("vectorstore/9th/Science");
    let before = snapshot(&dir);

    embedder.fail.store(true, Ordering::SeqCst);
    let err = tutor.cache().rebuild(&key).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Build);
    assert!(err.to_string().contains("embedding quota exceeded"));

    assert_eq!(snapshot(&dir), before);
    assert!(Arc::ptr_eq(&tutor.cache().get(&key).unwrap(), &original));
}

#[tokio::test]
async fn test_unreadable_persisted_index_is_rebuilt() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let key = KbKey::new("9th", "Science");
    tutor(&tmp, Arc::new(FakeEmbedder::new()), Arc::new(FakeChat::replying("ok")))
        .cache()
        .resolve(&key)
        .await
        .unwrap();
    std::fs::write(
        tmp.path().join("vectorstore/9th/Science/manifest.json"),
        b"{ not json",
    )
    .unwrap();

    let embedder = Arc::new(FakeEmbedder::new());
    let fresh = tutor(&tmp, embedder.clone(), Arc::new(FakeChat::replying("ok")));
    let resolved = fresh.cache().resolve(&key).await.unwrap();

    assert_eq!(resolved.status, Some(ResolveStatus::Created));
    assert_eq!(embedder.calls(), 1);
    assert!(KnowledgeStore::new(tmp.path().join("vectorstore"))
        .load(&key, "fake-letters")
        .is_ok());
}

#[tokio::test]
async fn test_locator_fallback_to_top_level_document() {
    let tmp = TempDir::new().unwrap();
    write_docx(
        &tmp.path().join("documents/Mathematics_1.docx"),
        &["Algebra uses letters to stand for numbers."],
    );
    write_docx(
        &tmp.path().join("documents/axonichealth.docx"),
        &["Default reference material."],
    );
    let tutor = tutor(
        &tmp,
        Arc::new(FakeEmbedder::new()),
        Arc::new(FakeChat::replying("ok")),
    );

    let key = KbKey::new("9th", "Mathematics 1");
    let index = tutor.cache().resolve(&key).await.unwrap().index;
    assert_eq!(
        index.segments(),
        &["Algebra uses letters to stand for numbers.".to_string()]
    );

    let stored = KnowledgeStore::new(tmp.path().join("vectorstore"))
        .list()
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].manifest.source,
        tmp.path().join("documents/Mathematics_1.docx")
    );
}

#[tokio::test]
async fn test_empty_document_persists_nothing() {
    let tmp = TempDir::new().unwrap();
    write_docx(
        &tmp.path().join("documents/8th/English.docx"),
        &["", "   ", ""],
    );
    let embedder = Arc::new(FakeEmbedder::new());
    let tutor = tutor(&tmp, embedder.clone(), Arc::new(FakeChat::replying("ok")));

    let err = tutor
        .cache()
        .resolve(&KbKey::new("8th", "English"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyDocument);
    assert_eq!(embedder.calls(), 0);
    assert!(!tmp.path().join("vectorstore/8th/English").exists());
    assert!(tutor.cache().is_empty());
}

#[tokio::test]
async fn test_answer_uses_prompt_contract_and_retrieved_context() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let chat = Arc::new(FakeChat::replying("Plants make glucose and oxygen."));
    let tutor = tutor(&tmp, Arc::new(FakeEmbedder::new()), chat.clone());

    let answer = tutor
        .service()
        .ask(&KbKey::new("9th", "Science"), "What does photosynthesis produce?")
        .await
        .unwrap();

    assert_eq!(answer.text, "Plants make glucose and oxygen.");
    assert_eq!(answer.status, Some(ResolveStatus::Created));
    assert!(!answer.sources.is_empty());

    let prompt = chat.last_prompt().unwrap();
    assert!(prompt.starts_with("You are a helpful AI tutor for Science in Class 9th."));
    assert!(prompt.contains(REFUSAL));
    assert!(prompt.contains("glucose and oxygen"));
    assert!(prompt.ends_with("Question: What does photosynthesis produce?\nAnswer:"));
}

#[tokio::test]
async fn test_build_failure_is_reported_in_transcript() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let chat = Arc::new(FakeChat::replying("unused"));
    let tutor = tutor(&tmp, Arc::new(FakeEmbedder::failing()), chat.clone());
    let mut session = tutor.session();

    let err = session.select("9th", "Science").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Build);
    assert_eq!(session.current(), Some(&KbKey::new("9th", "Science")));

    let reply = session.ask("What is chlorophyll?").await.unwrap();
    assert!(reply.contains("Error"));

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, reply);
    assert!(chat.last_prompt().is_none());
}

#[tokio::test]
async fn test_generation_failure_is_reported_in_transcript() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let chat = Arc::new(FakeChat::replying("unused"));
    chat.fail.store(true, Ordering::SeqCst);
    let tutor = tutor(&tmp, Arc::new(FakeEmbedder::new()), chat);
    let mut session = tutor.session();

    session.select("9th", "Science").await.unwrap();
    let reply = session.ask("What is chlorophyll?").await.unwrap();
    assert_eq!(reply, "Error generating answer: model overloaded");
    assert_eq!(session.messages()[1].content, reply);
}

#[tokio::test]
async fn test_clear_only_affects_current_key() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    write_docx(
        &tmp.path().join("documents/9th/English.docx"),
        &["A noun is a naming word."],
    );
    let tutor = tutor(
        &tmp,
        Arc::new(FakeEmbedder::new()),
        Arc::new(FakeChat::replying("answer")),
    );
    let mut session = tutor.session();
    let science = KbKey::new("9th", "Science");
    let english = KbKey::new("9th", "English");

    session.select("9th", "Science").await.unwrap();
    session.ask("What is chlorophyll?").await.unwrap();
    session.select("9th", "English").await.unwrap();
    session.ask("What is a noun?").await.unwrap();
    session.ask("Give an example.").await.unwrap();

    session.clear();
    assert!(session.messages().is_empty());
    assert!(session.messages_for(&english).is_empty());
    assert_eq!(session.messages_for(&science).len(), 2);

    session.clear_key(&science);
    assert!(session.messages_for(&science).is_empty());
}

#[tokio::test]
async fn test_sessions_share_the_cache() {
    let tmp = TempDir::new().unwrap();
    science_doc(&tmp);
    let embedder = Arc::new(FakeEmbedder::new());
    let tutor = tutor(&tmp, embedder.clone(), Arc::new(FakeChat::replying("ok")));

    let mut first = tutor.session();
    let mut second = tutor.session();
    assert_eq!(
        first.select("9th", "Science").await.unwrap(),
        Some(ResolveStatus::Created)
    );
    assert_eq!(second.select("9th", "Science").await.unwrap(), None);
    assert_eq!(embedder.calls(), 1);

    first.ask("What is chlorophyll?").await.unwrap();
    assert!(second.messages().is_empty());
}

#[tokio::test]
async fn test_selection_outside_catalog_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(FakeEmbedder::new());
    let tutor = tutor(&tmp, embedder.clone(), Arc::new(FakeChat::replying("ok")));
    let mut session = tutor.session();

    let err = session.select("5th", "Chemistry").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownSelection);
    assert!(session.current().is_none());
    assert!(session.ask("Anything?").await.is_none());
    assert_eq!(embedder.calls(), 0);
}
