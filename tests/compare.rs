// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use tugdiff::{
    compare::progress::LoadingProgress,
    diff::{
        self,
        fields::{FieldDiffResult, FieldDiffer, Record},
        text::TextDiffer,
    },
    CompareError, Comparison, DiffFn, DiffOutcome, DiffResult, TotalCount,
};

use anyhow::anyhow;
use pretty_assertions::assert_eq;
use simple_test_case::test_case;
use std::{
    future::{pending, Future},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

type Engine = Comparison<u32, String, DiffResult<u32>>;

fn records(pairs: &[(u32, &str)]) -> Vec<(u32, String)> {
    pairs
        .iter()
        .map(|(key, value)| (*key, value.to_string()))
        .collect()
}

fn letters() -> Vec<(u32, String)> {
    records(&[(1, "A"), (2, "B"), (3, "C"), (4, "D"), (5, "E")])
}

fn page_keys(engine: &Engine) -> Vec<u32> {
    engine.page_items().iter().map(|item| item.key).collect()
}

async fn engine_over(
    page_size: usize,
    source: Vec<(u32, String)>,
    target: Vec<(u32, String)>,
) -> anyhow::Result<Engine> {
    let mut engine = Engine::new().with_page_size(page_size)?;
    engine
        .initialize(async { anyhow::Ok(source) }, async { anyhow::Ok(target) })
        .await?;

    Ok(engine)
}

#[test_case(&[1, 2, 3], &[4, 5], &[1, 2, 3, 4, 5]; "disjoint keys")]
#[test_case(&[1, 2, 3], &[2, 3, 4], &[1, 2, 3, 4]; "overlapping keys")]
#[test_case(&[7, 3], &[3, 7], &[3, 7]; "same keys")]
#[test_case(&[], &[9], &[9]; "empty source")]
#[tokio::test]
async fn initialize_unions_keys(source: &[u32], target: &[u32], expect: &[u32]) {
    let source = source.iter().map(|key| (*key, key.to_string())).collect();
    let target = target.iter().map(|key| (*key, key.to_string())).collect();
    let engine = engine_over(10, source, target).await.unwrap();

    let keys = engine.all_keys().iter().copied().collect::<Vec<_>>();
    pretty_assertions::assert_eq!(keys, expect.to_vec());
    pretty_assertions::assert_eq!(engine.total_count(), expect.len());
    pretty_assertions::assert_eq!(engine.progress().progress_value, 100);
    assert!(!engine.progress().is_loading);
}

#[tokio::test]
async fn identical_environments_second_page() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    engine.set_current_page(2);
    engine.get_page(&TextDiffer::new(), diff::all()).await?;

    assert_eq!(page_keys(&engine), vec![3, 4]);
    assert!(engine
        .page_items()
        .iter()
        .all(|item| !item.has_differences && item.formatted_diff.is_empty()));
    assert_eq!(engine.total_count(), 2);

    Ok(())
}

#[tokio::test]
async fn pages_follow_stable_key_order() -> anyhow::Result<()> {
    let shuffled = records(&[(5, "E"), (1, "A"), (4, "D"), (2, "B"), (3, "C")]);
    let mut engine = engine_over(2, shuffled, Vec::new()).await?;
    let differ = TextDiffer::new();

    let mut seen = Vec::new();
    for page in 1..=3 {
        engine.set_current_page(page);
        engine.get_page(&differ, diff::all()).await?;
        seen.extend(page_keys(&engine));
    }

    assert_eq!(seen, vec![1, 2, 3, 4, 5]);

    // Asking again yields the same slice.
    engine.set_current_page(2);
    engine.get_page(&differ, diff::all()).await?;
    assert_eq!(page_keys(&engine), vec![3, 4]);

    Ok(())
}

#[tokio::test]
async fn partial_last_page() -> anyhow::Result<()> {
    let mut engine = engine_over(3, records(&[(1, "a"), (2, "b"), (3, "c"), (4, "d")]), Vec::new()).await?;
    engine.set_current_page(2);
    engine.get_page(&TextDiffer::new(), diff::all()).await?;

    assert_eq!(page_keys(&engine), vec![4]);

    Ok(())
}

#[tokio::test]
async fn page_past_end_is_empty() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    engine.set_current_page(9);
    engine.get_page(&TextDiffer::new(), diff::all()).await?;

    assert!(engine.page_items().is_empty());
    assert_eq!(engine.total_count(), 0);
    assert_eq!(engine.progress().progress_value, 100);

    Ok(())
}

#[tokio::test]
async fn huge_page_number_is_empty() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    engine.set_current_page(usize::MAX);
    engine.get_page(&TextDiffer::new(), diff::all()).await?;
    assert!(engine.page_items().is_empty());

    engine.next_page();
    engine.get_page(&TextDiffer::new(), diff::all()).await?;
    assert!(engine.page_items().is_empty());

    Ok(())
}

#[tokio::test]
async fn page_size_change_resets_page() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    engine.set_current_page(2);
    engine.set_page_size(3)?;
    engine.get_page(&TextDiffer::new(), diff::all()).await?;

    assert_eq!(engine.current_page(), 1);
    assert_eq!(page_keys(&engine), vec![1, 2, 3]);

    Ok(())
}

#[tokio::test]
async fn reinitialize_resets_page() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    engine.set_current_page(3);
    engine
        .initialize(
            async { anyhow::Ok(records(&[(1, "A")])) },
            async { anyhow::Ok(records(&[(2, "B")])) },
        )
        .await?;

    assert_eq!(engine.current_page(), 1);
    assert_eq!(engine.all_keys().len(), 2);

    Ok(())
}

#[tokio::test]
async fn zero_page_size_is_rejected() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    let result = engine.set_page_size(0);

    assert!(matches!(result, Err(CompareError::PageSize(_))));
    assert_eq!(engine.page_size(), 2);

    Ok(())
}

#[tokio::test]
async fn filter_excludes_items_and_counts_page() -> anyhow::Result<()> {
    let target = records(&[(1, "A"), (2, "changed"), (3, "C"), (5, "E")]);
    let mut engine = engine_over(4, letters(), target).await?;
    engine
        .get_page(&TextDiffer::new(), diff::changed_only())
        .await?;

    // Keys 1 to 4 are on the page, only 2 and 4 differ.
    assert_eq!(page_keys(&engine), vec![2, 4]);
    assert_eq!(engine.total_count(), 2);

    Ok(())
}

#[tokio::test]
async fn absent_target_value_is_one_sided_delta() -> anyhow::Result<()> {
    let mut engine = engine_over(10, records(&[(1, "A"), (2, "B")]), records(&[(1, "A")])).await?;
    engine.get_page(&TextDiffer::new(), diff::all()).await?;

    let items = engine.page_items();
    assert!(!items[0].has_differences());
    assert!(items[1].has_differences());

    let hunk_lines = items[1]
        .formatted_diff()
        .lines()
        .skip(2)
        .filter(|line| !line.starts_with("@@"))
        .collect::<Vec<_>>();
    assert_eq!(hunk_lines, vec!["-B"]);

    Ok(())
}

#[tokio::test]
async fn progress_never_decreases() -> anyhow::Result<()> {
    let mut engine = engine_over(5, letters(), Vec::new()).await?;
    let progress = engine.subscribe_progress();
    let seen = Mutex::new(Vec::new());

    let recording = |key: &u32, source: Option<&String>, target: Option<&String>| {
        let current = progress.borrow().clone();
        assert!(current.is_loading);
        seen.lock().unwrap().push(current.progress_value);
        Ok::<_, anyhow::Error>(DiffResult {
            key: *key,
            formatted_diff: String::new(),
            has_differences: source != target,
        })
    };
    engine.get_page(&recording, diff::all()).await?;

    let mut seen = seen.into_inner().unwrap();
    seen.push(engine.progress().progress_value);
    assert_eq!(seen, vec![25, 40, 55, 70, 85, 100]);
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(!engine.progress().is_loading);

    Ok(())
}

/// Differ that finishes later keys first, recording progress as it goes.
struct Staggered {
    progress: watch::Receiver<LoadingProgress>,
    seen: Arc<Mutex<Vec<u8>>>,
    calls: Arc<AtomicUsize>,
}

impl DiffFn<u32, String> for Staggered {
    type Output = DiffResult<u32>;

    fn diff(
        &self,
        key: &u32,
        source: Option<&String>,
        target: Option<&String>,
    ) -> impl Future<Output = anyhow::Result<DiffResult<u32>>> {
        let key = *key;
        let has_differences = source != target;
        let progress = self.progress.clone();
        let seen = self.seen.clone();
        self.calls.fetch_add(1, Ordering::SeqCst);

        async move {
            seen.lock().unwrap().push(progress.borrow().progress_value);
            tokio::time::sleep(Duration::from_millis(5 * u64::from(10 - key))).await;
            seen.lock().unwrap().push(progress.borrow().progress_value);

            Ok(DiffResult {
                key,
                formatted_diff: String::new(),
                has_differences,
            })
        }
    }
}

#[tokio::test]
async fn concurrent_memoized_pages_keep_order_and_progress() -> anyhow::Result<()> {
    let source = records(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e"), (6, "f")]);
    let mut engine = Engine::new()
        .with_page_size(4)?
        .with_concurrency(3)
        .with_memoize(true);
    engine
        .initialize(async { anyhow::Ok(source) }, async { anyhow::Ok(Vec::new()) })
        .await?;

    let differ = Staggered {
        progress: engine.subscribe_progress(),
        seen: Arc::new(Mutex::new(Vec::new())),
        calls: Arc::new(AtomicUsize::new(0)),
    };

    let take_seen = || {
        let mut seen = std::mem::take(&mut *differ.seen.lock().unwrap());
        seen.push(100);
        seen
    };

    engine.get_page(&differ, diff::all()).await?;
    assert_eq!(page_keys(&engine), vec![1, 2, 3, 4]);
    let seen = take_seen();
    assert_eq!(seen.len(), 9);
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));

    engine.next_page();
    engine.get_page(&differ, diff::all()).await?;
    assert_eq!(page_keys(&engine), vec![5, 6]);
    let seen = take_seen();
    assert_eq!(seen.len(), 5);
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(engine.progress().progress_value, 100);

    // Revisiting page one is served from memo, still in key order.
    engine.previous_page();
    engine.get_page(&differ, diff::all()).await?;
    assert_eq!(page_keys(&engine), vec![1, 2, 3, 4]);
    assert_eq!(differ.calls.load(Ordering::SeqCst), 6);
    assert!(differ.seen.lock().unwrap().is_empty());
    assert_eq!(engine.progress().progress_value, 100);
    assert!(!engine.progress().is_loading);

    Ok(())
}

#[tokio::test]
async fn empty_environments() -> anyhow::Result<()> {
    let mut engine = engine_over(10, Vec::new(), Vec::new()).await?;
    assert!(engine.all_keys().is_empty());
    assert_eq!(engine.total_count(), 0);

    engine.get_page(&TextDiffer::new(), diff::all()).await?;
    assert!(engine.page_items().is_empty());
    assert_eq!(engine.progress().progress_value, 100);

    Ok(())
}

#[tokio::test]
async fn fetch_failure_clears_loading_flag() -> anyhow::Result<()> {
    let mut engine = Engine::new();
    let progress = engine.subscribe_progress();

    let result = engine
        .initialize(
            async {
                assert!(progress.borrow().is_loading);
                anyhow::Ok(letters())
            },
            async { Err::<Vec<(u32, String)>, _>(anyhow!("connection refused")) },
        )
        .await;

    assert!(matches!(result, Err(CompareError::FetchTarget(_))));
    assert!(!engine.progress().is_loading);

    // No rollback: source records fetched before the failure stay around.
    assert_eq!(engine.source_values().len(), 5);

    Ok(())
}

#[tokio::test]
async fn diff_failure_keeps_previous_page() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    engine.get_page(&TextDiffer::new(), diff::all()).await?;
    assert_eq!(page_keys(&engine), vec![1, 2]);

    let failing = |key: &u32, _: Option<&String>, _: Option<&String>| {
        if *key == 4 {
            return Err(anyhow!("ORA-00942: table or view does not exist"));
        }

        Ok(DiffResult::unchanged(*key))
    };
    engine.set_current_page(2);
    let result = engine.get_page(&failing, diff::all()).await;

    match result {
        Err(CompareError::Diff { key, .. }) => assert_eq!(key, "4"),
        other => panic!("expected diff failure, got {other:?}"),
    }
    assert_eq!(page_keys(&engine), vec![1, 2]);
    assert!(!engine.progress().is_loading);

    Ok(())
}

#[tokio::test]
async fn filter_failure_aborts_page() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    let filter = |_: &u32, _: Option<&String>, _: Option<&String>, _: &DiffResult<u32>| {
        Err::<bool, _>(anyhow!("bad search pattern"))
    };
    let result = engine.get_page(&TextDiffer::new(), filter).await;

    assert!(matches!(result, Err(CompareError::Filter { .. })));
    assert!(engine.page_items().is_empty());
    assert!(!engine.progress().is_loading);

    Ok(())
}

#[tokio::test]
async fn cancelled_token_stops_operations() -> anyhow::Result<()> {
    let mut engine = engine_over(2, letters(), letters()).await?;
    let token = CancellationToken::new();
    token.cancel();

    let result = engine
        .get_page_with(&token, &TextDiffer::new(), diff::all())
        .await;
    assert!(matches!(result, Err(CompareError::Cancelled)));
    assert!(!engine.progress().is_loading);

    let result = engine
        .initialize_with(
            &token,
            pending::<anyhow::Result<Vec<(u32, String)>>>(),
            async { anyhow::Ok(Vec::new()) },
        )
        .await;
    assert!(matches!(result, Err(CompareError::Cancelled)));
    assert!(!engine.progress().is_loading);

    Ok(())
}

#[tokio::test]
async fn dropped_initialize_clears_loading_flag() {
    let mut engine = Engine::new();
    let result = tokio::time::timeout(
        Duration::from_millis(20),
        engine.initialize(
            pending::<anyhow::Result<Vec<(u32, String)>>>(),
            async { anyhow::Ok(Vec::new()) },
        ),
    )
    .await;

    assert!(result.is_err());
    let expect = LoadingProgress {
        is_loading: false,
        progress_value: 0,
        progress_label: "Fetching source values".into(),
    };
    assert_eq!(engine.progress(), expect);
}

#[tokio::test]
async fn filtered_set_counts_whole_key_union() -> anyhow::Result<()> {
    let target = records(&[(1, "A"), (2, "x"), (3, "C"), (4, "x"), (5, "x")]);
    let mut engine = Engine::new()
        .with_page_size(2)?
        .with_total_count(TotalCount::FilteredSet);
    engine
        .initialize(async { anyhow::Ok(letters()) }, async { anyhow::Ok(target) })
        .await?;

    engine
        .get_page(&TextDiffer::new(), diff::changed_only())
        .await?;
    assert_eq!(page_keys(&engine), vec![2, 4]);
    assert_eq!(engine.total_count(), 3);
    assert_eq!(engine.page_count(), 2);
    assert_eq!(engine.memoized(), 5);

    engine.next_page();
    engine
        .get_page(&TextDiffer::new(), diff::changed_only())
        .await?;
    assert_eq!(page_keys(&engine), vec![5]);
    assert_eq!(engine.total_count(), 3);

    Ok(())
}

#[tokio::test]
async fn field_records_across_environments() -> anyhow::Result<()> {
    let message = |en: &str, fr: &str| -> Record {
        [("en", en), ("fr", fr)]
            .into_iter()
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect()
    };
    let source = vec![
        ("MSG_DELETE".to_string(), message("Delete", "Supprimer")),
        ("MSG_SAVE".to_string(), message("Save", "Enregistrer")),
    ];
    let target = vec![("MSG_SAVE".to_string(), message("Save", "Sauvegarder"))];

    let mut engine = Comparison::<String, Record, FieldDiffResult<String>>::new();
    engine
        .initialize(async { anyhow::Ok(source) }, async { anyhow::Ok(target) })
        .await?;
    engine
        .get_page(&FieldDiffer::new().with_labels("DEV", "QA"), diff::key_contains("save"))
        .await?;

    let items = engine.page_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].key, "MSG_SAVE");
    assert_eq!(items[0].changed_fields.len(), 1);
    assert_eq!(items[0].changed_fields[0].field, "fr");

    Ok(())
}
