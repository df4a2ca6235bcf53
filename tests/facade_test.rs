//! Facade behavior: element identity, cache clearing, selection semantics,
//! and the polling wait primitives.

mod common;

use common::sample_browser;
use std::sync::Arc;
use std::time::Duration;

use drover::backend::mock::{MockEngine, NodeSpec};
use drover::{Engine, Locator, NodeHandle};

#[tokio::test]
async fn test_same_handle_yields_same_wrapper() {
    let (_engine, browser) = sample_browser().await;

    let first = browser
        .select_elements(&Locator::attribute("name", "q"))
        .await
        .unwrap();
    let second = browser
        .select_elements(&Locator::attribute("name", "q"))
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert!(first[0].same(&second[0]));
}

#[tokio::test]
async fn test_identity_holds_across_lookup_paths() {
    let (_engine, browser) = sample_browser().await;

    // The same node reached through a search and through a parent walk
    // must be one wrapper.
    let main = browser
        .select_elements(&Locator::attribute("id", "main"))
        .await
        .unwrap();
    let input = browser
        .select_more_elements(&Locator::attribute("name", "q"))
        .await
        .unwrap();
    let input_parent = browser.parent(&input[0]).await.unwrap().unwrap();

    assert!(main[0].same(&input_parent));
}

#[tokio::test]
async fn test_load_clears_cache_and_resets_selection() {
    let (_engine, browser) = sample_browser().await;

    let before = browser
        .select_elements(&Locator::attribute("name", "q"))
        .await
        .unwrap();

    browser.load("https://example.com/next").await;

    let selection = browser.selection();
    assert_eq!(selection.len(), 1);
    assert_eq!(browser.tag_name(&selection[0]).await.unwrap(), "body");

    let after = browser
        .select_elements(&Locator::attribute("name", "q"))
        .await
        .unwrap();
    assert_eq!(before[0].handle(), after[0].handle());
    assert!(!before[0].same(&after[0]));
}

#[tokio::test]
async fn test_execute_script_is_a_snapshot_boundary() {
    let (engine, browser) = sample_browser().await;

    let before = browser
        .select_elements(&Locator::tag("a"))
        .await
        .unwrap();

    let result = browser.execute_script("document.title = 'x'").await;
    assert!(result.is_some());
    assert_eq!(engine.script_log(), vec!["document.title = 'x'".to_string()]);

    let after = browser.select_elements(&Locator::tag("a")).await.unwrap();
    assert!(!before[0].same(&after[0]));
    assert_eq!(browser.selection().len(), 2);
}

#[tokio::test]
async fn test_switch_frame_and_reload_reset_selection() {
    let (engine, browser) = sample_browser().await;

    browser
        .select_elements(&Locator::tag("a"))
        .await
        .unwrap();
    assert_eq!(browser.selection().len(), 2);

    browser.switch_frame(Some("content")).await;
    assert_eq!(engine.current_frame().as_deref(), Some("content"));
    let selection = browser.selection();
    assert_eq!(selection.len(), 1);
    assert_eq!(browser.tag_name(&selection[0]).await.unwrap(), "body");

    browser
        .select_elements(&Locator::tag("a"))
        .await
        .unwrap();
    browser.reload().await;
    assert_eq!(browser.selection().len(), 1);
}

#[tokio::test]
async fn test_select_elements_searches_from_body() {
    let (_engine, browser) = sample_browser().await;

    // Narrow down to the sidebar first...
    browser
        .select_elements(&Locator::attribute("id", "sidebar"))
        .await
        .unwrap();

    // ...then a fresh select must still see the whole document.
    let anchors = browser.select_elements(&Locator::tag("a")).await.unwrap();
    assert_eq!(anchors.len(), 2);
}

#[tokio::test]
async fn test_select_more_narrows_to_subtrees() {
    let (_engine, browser) = sample_browser().await;

    let main = browser
        .select_elements(&Locator::attribute("id", "main"))
        .await
        .unwrap();
    assert_eq!(main.len(), 1);

    // Four locator kinds, all confined to the prior selection's subtree.
    for locator in [
        Locator::attribute("type", "text"),
        Locator::tag("a"),
        Locator::css("a"),
        Locator::xpath("//a"),
    ] {
        browser
            .select_elements(&Locator::attribute("id", "main"))
            .await
            .unwrap();
        let narrowed = browser.select_more_elements(&locator).await.unwrap();
        assert_eq!(narrowed.len(), 1, "locator {} escaped the subtree", locator);

        let parent = browser.parent(&narrowed[0]).await.unwrap().unwrap();
        assert!(
            parent.same(&main[0]) || {
                // select options live one level deeper; walk up once more
                let grandparent = browser.parent(&parent).await.unwrap().unwrap();
                grandparent.same(&main[0])
            },
            "locator {} produced a node outside #main",
            locator
        );
    }
}

#[tokio::test]
async fn test_selection_replaced_not_extended() {
    let (_engine, browser) = sample_browser().await;

    browser
        .select_elements(&Locator::attribute("id", "main"))
        .await
        .unwrap();
    let narrowed = browser
        .select_more_elements(&Locator::tag("input"))
        .await
        .unwrap();

    // The previous selection (#main) is gone; only the matches remain.
    assert_eq!(narrowed.len(), 1);
    let selection = browser.selection();
    assert_eq!(selection.len(), 1);
    assert_eq!(browser.tag_name(&selection[0]).await.unwrap(), "input");
}

#[tokio::test]
async fn test_all_elements_materializes_descendants() {
    let (_engine, browser) = sample_browser().await;

    let everything = browser.all_elements(None).await;
    // 2 divs + 2 inputs + 2 anchors + select + 2 options
    assert_eq!(everything.len(), 9);

    let main = browser
        .select_elements(&Locator::attribute("id", "main"))
        .await
        .unwrap();
    let under_main = browser.all_elements(Some(&main[0])).await;
    assert_eq!(under_main.len(), 5);
}

#[tokio::test]
async fn test_all_elements_partial_on_failure() {
    let (engine, browser) = sample_browser().await;

    let main = browser
        .select_elements(&Locator::attribute("id", "main"))
        .await
        .unwrap();
    engine.fail_children_of(main[0].handle()).unwrap();

    let collected = browser.all_elements(None).await;
    // Traversal stops at the injected failure but keeps what it had.
    assert!(!collected.is_empty());
    assert!(collected.len() < 9);
}

#[tokio::test]
async fn test_element_operations_roundtrip() {
    let (_engine, browser) = sample_browser().await;

    let input = browser
        .select_elements(&Locator::attribute("name", "q"))
        .await
        .unwrap();
    browser.set_text(&input[0], "rust browser").await.unwrap();
    assert_eq!(browser.text(&input[0]).await.unwrap(), "rust browser");

    browser
        .set_attribute(&input[0], "placeholder", "query")
        .await
        .unwrap();
    assert_eq!(
        browser.attribute(&input[0], "placeholder").await.unwrap(),
        Some("query".to_string())
    );
    assert_eq!(browser.attribute(&input[0], "missing").await.unwrap(), None);

    browser.focus(&input[0]).await.unwrap();
    browser.click(&input[0]).await.unwrap();

    let select = browser
        .select_elements(&Locator::attribute("name", "color"))
        .await
        .unwrap();
    assert_eq!(
        browser.selected_values(&select[0]).await.unwrap(),
        vec!["blue".to_string()]
    );
    browser
        .set_option_selected(&select[0], "red", true)
        .await
        .unwrap();
    browser
        .set_option_selected(&select[0], "blue", false)
        .await
        .unwrap();
    assert_eq!(
        browser.selected_values(&select[0]).await.unwrap(),
        vec!["red".to_string()]
    );
}

#[test]
fn test_upload_file_reaches_the_input() {
    tokio_test::block_on(async {
        let (_engine, browser) = sample_browser().await;

        let input = browser
            .select_elements(&Locator::attribute("name", "q"))
            .await
            .unwrap();
        browser
            .upload_file(&input[0], std::path::Path::new("/tmp/report.pdf"))
            .await
            .unwrap();
        assert_eq!(
            browser.attribute(&input[0], "value").await.unwrap(),
            Some("/tmp/report.pdf".to_string())
        );
    });
}

#[tokio::test]
async fn test_whole_session_ops_degrade_after_close() {
    let (_engine, browser) = sample_browser().await;

    browser.close().await;
    assert!(browser.is_closed());

    // Degrade to None/no-op, never panic or propagate.
    assert_eq!(browser.title().await, None);
    assert_eq!(browser.source().await, None);
    assert_eq!(browser.current_url().await, None);
    assert_eq!(browser.execute_script("1 + 1").await, None);
    browser.load("https://example.com").await;

    // Per-element paths still report the failure to their caller.
    assert!(browser.select_elements(&Locator::tag("a")).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_found_returns_when_condition_appears() {
    let (engine, browser) = sample_browser().await;

    let mutator = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let body = body_handle(&engine).await;
            engine
                .add_node(&body, NodeSpec::new("div").attr("id", "late"))
                .unwrap();
        })
    };

    let started = tokio::time::Instant::now();
    browser
        .wait_for_found(&Locator::attribute("id", "late"), 5)
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2), "returned too early");
    assert!(elapsed < Duration::from_secs(4), "kept polling after found");
    mutator.await.unwrap();

    // The caller re-checks the condition after the wait.
    let found = browser
        .select_elements(&Locator::attribute("id", "late"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_found_gives_up_at_deadline() {
    let (_engine, browser) = sample_browser().await;

    let started = tokio::time::Instant::now();
    browser
        .wait_for_found(&Locator::attribute("id", "never"), 2)
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_lost_returns_immediately_when_already_gone() {
    let (_engine, browser) = sample_browser().await;

    let started = tokio::time::Instant::now();
    browser
        .wait_for_lost(&Locator::attribute("id", "never-existed"), 1)
        .await;

    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_lost_tracks_removal() {
    let (engine, browser) = sample_browser().await;

    let anchors = browser
        .select_elements(&Locator::tag_with_text("a", "next"))
        .await
        .unwrap();
    let doomed = anchors[0].handle().clone();

    let mutator = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            engine.remove_node(&doomed).unwrap();
        })
    };

    let started = tokio::time::Instant::now();
    browser
        .wait_for_lost(&Locator::tag_with_text("a", "next"), 5)
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(4));
    mutator.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_wait_aborts_when_engine_closes() {
    let (engine, browser) = sample_browser().await;

    let closer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            engine.close().await.unwrap();
        })
    };

    let started = tokio::time::Instant::now();
    browser
        .wait_for_found(&Locator::attribute("id", "never"), 30)
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(3), "wait outlived the session");
    closer.await.unwrap();
}

// The mock's body handle without going through a facade.
async fn body_handle(engine: &MockEngine) -> NodeHandle {
    engine.body().await.unwrap()
}
