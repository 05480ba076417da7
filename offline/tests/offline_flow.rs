//! End-to-end flows over an on-disk store: hydrate from the remote, take the
//! test offline, push the results back.

use std::sync::Arc;

use exam_model::{
    Attempt, AttemptStatus, Difficulty, Question, QuestionKind, QuestionMetadata, SessionStatus,
    TestSession, TopicCount, UserAnswer,
};
use exam_offline::{
    Database, PushService, SessionEngine, SqliteQuestionRepository, SqliteTestSessionRepository,
    SyncOutcome, SyncService, TestSessionRepository, TopicCache, TopicSelection,
    QuestionRepository, DEFAULT_TOPIC_CACHE_TTL,
};
use exam_remote::{MockCall, MockRemoteStore};

fn question(id: &str, kind: QuestionKind) -> Question {
    Question {
        id: id.to_string(),
        year: 2022,
        question_number: 3,
        subject: "Operating Systems".to_string(),
        topic: Some("Paging".to_string()),
        question_text: format!("Question {id}"),
        difficulty: Difficulty::Hard,
        marks: 2,
        kind,
        tags: ["gate".to_string()].into_iter().collect(),
        source: Some("GATE CS 2022".to_string()),
        verified: true,
        explanation: Some("See the page table walk.".to_string()),
        metadata: QuestionMetadata {
            question_set: None,
            paper_type: Some("CS".to_string()),
            language: Some("en".to_string()),
        },
        created_at: 1_600_000_000,
        updated_at: 1_600_000_500,
    }
}

fn remote_fixture() -> (TestSession, Vec<Attempt>, Vec<Question>) {
    let options = vec!["4 KB".to_string(), "8 KB".to_string(), "16 KB".to_string()];
    let questions = vec![
        question(
            "q1",
            QuestionKind::MultipleChoice {
                options: options.clone(),
                correct_option: 0,
            },
        ),
        question("q2", QuestionKind::Numerical { correct_answer: 2.5 }),
        question(
            "q3",
            QuestionKind::MultipleSelect {
                options,
                correct_options: [1, 2].into_iter().collect(),
            },
        ),
    ];
    let attempts = ["q1", "q2", "q3"]
        .iter()
        .enumerate()
        .map(|(i, q)| Attempt::new("t1", q, i as u32))
        .collect();
    let session = TestSession {
        id: "t1".to_string(),
        user_id: "student-7".to_string(),
        topics: vec!["Paging".to_string()],
        status: SessionStatus::Created,
        time_remaining_secs: 900,
        total_questions: 3,
        total_marks: 6,
        score: None,
        accuracy: None,
        correct_count: None,
        attempted_count: None,
        created_at: 1_700_000_000,
        started_at: None,
        completed_at: None,
        updated_at: 1_700_000_000,
        is_synced: true,
    };
    (session, attempts, questions)
}

#[tokio::test]
async fn hydrate_take_and_push_a_test() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("offline.db")).await.unwrap();
    let sessions = SqliteTestSessionRepository::new(db.pool().clone());

    let (session, attempts, questions) = remote_fixture();
    let remote = Arc::new(MockRemoteStore::new().with_session(session, attempts, questions));

    let sync = SyncService::new(remote.clone(), sessions.clone());
    assert!(matches!(
        sync.pull("student-7").await.unwrap(),
        SyncOutcome::Hydrated { attempts: 3, questions: 3, .. }
    ));

    let mut engine = SessionEngine::load(sessions.clone(), "t1")
        .await
        .unwrap()
        .unwrap();
    engine.start().await.unwrap();
    engine.record_answer(UserAnswer::Option(0)).await.unwrap();
    engine.next().await.unwrap();
    engine.record_answer(UserAnswer::Numeric(3.0)).await.unwrap();
    let summary = engine.submit().await.unwrap();

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.unvisited, 1);
    assert_eq!(summary.accuracy, 50);
    assert_eq!(summary.score, 2.0);
    assert_eq!(engine.session().status, SessionStatus::Completed);
    assert_eq!(engine.session().attempted_count, Some(2));

    // the completed session no longer counts as resumable
    assert!(sessions.ongoing_sessions().await.unwrap().is_empty());

    let pending = db.stats().await.unwrap();
    assert_eq!(pending.pending_sessions, 1);
    assert_eq!(pending.pending_attempts, 3);

    remote.clear_calls();
    let report = PushService::new(remote.clone(), sessions.clone())
        .push_pending()
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.sessions_pushed, 1);
    assert_eq!(report.attempts_pushed, 3);
    assert_eq!(
        remote.get_calls(),
        vec![
            MockCall::UpsertSession {
                session_id: "t1".to_string()
            },
            MockCall::UpsertAttempts { count: 3 },
        ]
    );

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.pending_sessions, 0);
    assert_eq!(stats.pending_attempts, 0);

    let bundle = sessions.load_session("t1").await.unwrap().unwrap();
    assert_eq!(bundle.attempts[0].is_correct, Some(true));
    assert_eq!(bundle.attempts[1].status, AttemptStatus::Answered);
    assert_eq!(bundle.attempts[2].status, AttemptStatus::Unvisited);
}

#[tokio::test]
async fn missing_remote_session_leaves_store_empty() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("offline.db")).await.unwrap();
    let sessions = SqliteTestSessionRepository::new(db.pool().clone());
    let remote = Arc::new(MockRemoteStore::new().with_resumable_session_response(|_| Ok(None)));

    let outcome = SyncService::new(remote, sessions.clone())
        .pull("student-7")
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::NoRemoteSession);
    assert!(sessions.ongoing_sessions().await.unwrap().is_empty());
    assert_eq!(db.stats().await.unwrap().sessions, 0);
}

#[tokio::test]
async fn paused_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offline.db");
    let (session, attempts, questions) = remote_fixture();

    {
        let db = Database::open(&path).await.unwrap();
        let sessions = SqliteTestSessionRepository::new(db.pool().clone());
        sessions
            .initialize(&session, &attempts, &questions)
            .await
            .unwrap();
        let mut engine = SessionEngine::load(sessions, "t1").await.unwrap().unwrap();
        engine.start().await.unwrap();
        engine.go_to(2).await.unwrap();
        engine
            .record_answer(UserAnswer::Options(vec![2, 1]))
            .await
            .unwrap();
        engine.tick(100).await.unwrap();
        engine.pause().await.unwrap();
        db.pool().close().await;
    }

    let db = Database::open(&path).await.unwrap();
    let sessions = SqliteTestSessionRepository::new(db.pool().clone());
    let ongoing = sessions.ongoing_sessions().await.unwrap();
    assert_eq!(ongoing.len(), 1);
    assert_eq!(ongoing[0].status, SessionStatus::Paused);
    assert_eq!(ongoing[0].time_remaining_secs, 800);

    // a local resumable session means no remote round-trip
    let remote = Arc::new(MockRemoteStore::new());
    let outcome = SyncService::new(remote.clone(), sessions.clone())
        .pull("student-7")
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::LocalSessionPresent { .. }));
    assert!(remote.get_calls().is_empty());

    let mut engine = SessionEngine::load(sessions, "t1").await.unwrap().unwrap();
    engine.resume().await.unwrap();
    let summary = engine.submit().await.unwrap();
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.unvisited, 1);
}

#[tokio::test]
async fn topic_cache_feeds_selection() {
    let dir = tempfile::tempdir().unwrap();
    let cache = TopicCache::new(dir.path().join("topic_cache"), DEFAULT_TOPIC_CACHE_TTL);
    let remote = MockRemoteStore::new().with_topic_counts_response(|_| {
        Ok(vec![
            TopicCount::new("Paging", 30),
            TopicCount::new("Scheduling", 12),
        ])
    });

    let topics = cache
        .get_or_fetch("Operating Systems", &remote)
        .await
        .unwrap();
    let mut selection = TopicSelection::new(topics);
    selection.toggle("Scheduling");
    assert_eq!(selection.pool_size(), 12);
    assert!(!selection.can_generate(20));
    selection.select_all();
    assert!(selection.can_generate(20));

    // reopened cache serves from disk
    let reopened = TopicCache::new(dir.path().join("topic_cache"), DEFAULT_TOPIC_CACHE_TTL);
    reopened
        .get_or_fetch("Operating Systems", &remote)
        .await
        .unwrap();
    assert_eq!(remote.get_calls().len(), 1);
}

#[tokio::test]
async fn subject_sync_metadata_tracks_bulk_upserts() {
    let db = Database::new_in_memory().await.unwrap();
    let questions = SqliteQuestionRepository::new(db.pool().clone());
    let (_, _, fixture) = remote_fixture();

    questions.bulk_upsert(&fixture).await.unwrap();
    questions
        .update_sync_metadata("Operating Systems", Some(1_700_000_000))
        .await
        .unwrap();

    let meta = questions
        .sync_metadata("Operating Systems")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.last_fetched_at, 1_700_000_000);
    assert_eq!(
        questions
            .questions_by_topic("Operating Systems", "Paging")
            .await
            .unwrap()
            .len(),
        3
    );
    assert!(questions
        .update_sync_metadata("Compilers", None)
        .await
        .is_err());
}
