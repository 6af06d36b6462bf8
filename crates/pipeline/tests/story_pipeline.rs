mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::*;
use slidecast_pipeline::{Orchestrator, RunEvent, Stage};

#[tokio::test]
async fn three_blocks_render_concat_and_mux_in_order() {
    let fixture = Fixture::new();
    fixture.story_session("s1", THREE_BLOCKS, &["10.png", "2.png", "1.png"]);
    let engine = engine_arc(FakeEngine::new());
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let handle = orchestrator.start_story("s1").unwrap();
    let (events, result) = run_to_end(handle).await;
    let artifact = result.unwrap();

    assert_eq!(
        stage_sequence(&events),
        vec![
            Stage::Initializing,
            Stage::Parsing,
            Stage::Synthesizing,
            Stage::Concatenating,
            Stage::Muxing,
            Stage::Cleanup,
            Stage::Done,
        ]
    );
    let messages = messages(&events);
    let scene_starts: Vec<&String> = messages
        .iter()
        .filter(|m| m.starts_with("Synthesizing scene"))
        .collect();
    assert_eq!(scene_starts.first().unwrap().as_str(), "Synthesizing scene 1/3");
    assert!(messages.iter().any(|m| m == "Synthesizing scene 2/3"));
    assert_eq!(scene_starts.last().unwrap().as_str(), "Synthesizing scene 3/3");

    let percents = status_percents(&events);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(*percents.last().unwrap(), 100.0);

    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(
        terminal[0],
        &RunEvent::Finished {
            url: format!("/outputs/{}", artifact.filename),
            filename: artifact.filename.clone(),
        }
    );
    assert!(matches!(events.last(), Some(RunEvent::Finished { .. })));

    assert!(artifact.filename.starts_with("video_s1_"));
    assert!(artifact.filename.ends_with(".mp4"));
    assert_eq!(artifact.path, fixture.config.output_dir.join(&artifact.filename));
    assert!(artifact.path.is_file());
    assert_eq!(fixture.work_entries(), 0);
    assert!(orchestrator.registry().is_empty());

    let segments = engine.segments();
    assert_eq!(segments.len(), 3);
    let images: Vec<PathBuf> = segments.iter().map(|s| s.image.clone()).collect();
    let images_dir = fixture.session_dir("s1").join("images");
    assert_eq!(
        images,
        vec![
            images_dir.join("1.png"),
            images_dir.join("2.png"),
            images_dir.join("10.png"),
        ]
    );
    let durations: Vec<f64> = segments.iter().map(|s| s.duration_secs).collect();
    assert_eq!(durations, vec![2.0, 2.5, 2.5]);
    assert!(!segments[0].fade.has_fade_in());
    assert!(segments[0].fade.has_fade_out());
    assert!(segments[1].fade.has_fade_in() && segments[1].fade.has_fade_out());
    assert!(!segments[2].fade.has_fade_out());
    assert!((segments[1].zoom.end - 1.05).abs() < 1e-9);

    let concat = engine
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Concat(r) => Some(r),
            _ => None,
        })
        .unwrap();
    let clip_names: Vec<String> = concat
        .clips
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(clip_names, vec!["clip_0000.mp4", "clip_0001.mp4", "clip_0002.mp4"]);
    assert!((concat.expected_secs - 7.0).abs() < 1e-9);

    let mux = engine
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Mux(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert!(mux.audio.ends_with("audio/voice.mp3"));
    assert!(mux.video.ends_with("joined.mp4"));
}

#[tokio::test]
async fn unparsable_subtitles_fail_before_any_engine_call() {
    let fixture = Fixture::new();
    fixture.story_session("s1", "no timing here\n\nnor here\n", &["1.png"]);
    let engine = engine_arc(FakeEngine::new());
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let (events, result) = run_to_end(orchestrator.start_story("s1").unwrap()).await;

    assert_eq!(result.unwrap_err().kind(), "parse_empty");
    assert!(engine.calls().is_empty());
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert!(matches!(terminal[0], RunEvent::Error { message } if message.contains("No renderable scenes")));
    assert_eq!(fixture.work_entries(), 0);
    assert_eq!(fixture.output_entries(), 0);
}

#[tokio::test]
async fn overflowing_timestamps_are_skipped_not_fatal() {
    let fixture = Fixture::new();
    let subtitles = "1\n99999999999999:00:00,000 --> 99999999999999:00:01,000\nHuge\n\n\
                     2\n00:00:00,000 --> 00:00:01,000\nok\n";
    fixture.story_session("s1", subtitles, &["1.png"]);
    let engine = engine_arc(FakeEngine::new());
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let (events, result) = run_to_end(orchestrator.start_story("s1").unwrap()).await;

    result.unwrap();
    assert_eq!(engine.segments().len(), 1);
    assert_eq!(engine.segments()[0].duration_secs, 1.0);
    assert_eq!(terminal_events(&events).len(), 1);
}

#[tokio::test]
async fn fewer_images_than_scenes_reuses_last_image() {
    let fixture = Fixture::new();
    fixture.story_session("s1", THREE_BLOCKS, &["1.png", "2.png"]);
    let engine = engine_arc(FakeEngine::new());
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let (_, result) = run_to_end(orchestrator.start_story("s1").unwrap()).await;
    result.unwrap();

    let images: Vec<String> = engine
        .segments()
        .iter()
        .map(|s| s.image.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(images, vec!["1.png", "2.png", "2.png"]);
}

#[tokio::test]
async fn strict_image_count_rejects_mismatch() {
    let mut fixture = Fixture::new();
    fixture.config.plan.strict_image_count = true;
    fixture.story_session("s1", THREE_BLOCKS, &["1.png"]);
    let engine = engine_arc(FakeEngine::new());
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let (_, result) = run_to_end(orchestrator.start_story("s1").unwrap()).await;
    assert_eq!(result.unwrap_err().kind(), "input_missing");
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn missing_narration_is_fatal() {
    let fixture = Fixture::new();
    fixture.write("s1", "subtitles/story.srt", THREE_BLOCKS.as_bytes());
    fixture.write("s1", "images/1.png", b"image");
    let engine = engine_arc(FakeEngine::new());
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let (events, result) = run_to_end(orchestrator.start_story("s1").unwrap()).await;
    assert_eq!(result.unwrap_err().kind(), "input_missing");
    assert_eq!(terminal_events(&events).len(), 1);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn engine_failure_cleans_up_and_reports_once() {
    let fixture = Fixture::new();
    fixture.story_session("s1", THREE_BLOCKS, &["1.png", "2.png", "3.png"]);
    let engine = engine_arc(FakeEngine::new().failing_on("concat"));
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let (events, result) = run_to_end(orchestrator.start_story("s1").unwrap()).await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), "engine_failure");

    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(
        terminal[0],
        &RunEvent::Error {
            message: err.to_string()
        }
    );
    assert!(!stage_sequence(&events).contains(&Stage::Muxing));
    assert_eq!(engine.segments().len(), 3);
    assert_eq!(fixture.work_entries(), 0);
    assert_eq!(fixture.output_entries(), 0);
    assert!(orchestrator.registry().is_empty());
}

#[tokio::test]
async fn missing_image_mid_plan_is_asset_not_found() {
    let fixture = Fixture::new();
    fixture.story_session("s1", THREE_BLOCKS, &["1.png", "2.png", "3.png"]);
    let engine = engine_arc(FakeEngine::new().with_segment_delay(Duration::from_millis(200)));
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let handle = orchestrator.start_story("s1").unwrap();
    // Wait until the plan is fixed and scene 1 is rendering.
    tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator
            .registry()
            .active()
            .first()
            .map(|run| run.stage != Stage::Synthesizing)
            .unwrap_or(true)
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    std::fs::remove_file(fixture.session_dir("s1").join("images/3.png")).unwrap();

    let (_, result) = run_to_end(handle).await;
    assert_eq!(result.unwrap_err().kind(), "asset_not_found");
    assert_eq!(fixture.work_entries(), 0);
}

#[tokio::test]
async fn parallel_synthesis_keeps_scene_order() {
    let mut fixture = Fixture::new();
    fixture.config.limits.synthesis_workers = 3;
    fixture.story_session("s1", THREE_BLOCKS, &["1.png", "2.png", "3.png"]);
    let engine = engine_arc(FakeEngine::new().with_segment_delay(Duration::from_millis(20)));
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let (events, result) = run_to_end(orchestrator.start_story("s1").unwrap()).await;
    result.unwrap();

    let percents = status_percents(&events);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    let concat = engine
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Concat(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert!(concat.clips[0].ends_with("clip_0000.mp4"));
    assert!(concat.clips[2].ends_with("clip_0002.mp4"));
}

#[tokio::test]
async fn stage_timeout_fails_the_run() {
    let mut fixture = Fixture::new();
    fixture.config.limits.stage_timeout_secs = 1;
    fixture.story_session("s1", THREE_BLOCKS, &["1.png"]);
    let engine = engine_arc(FakeEngine::new().with_segment_delay(Duration::from_secs(5)));
    let orchestrator = Orchestrator::new(fixture.config.clone(), engine.clone());

    let (events, result) = run_to_end(orchestrator.start_story("s1").unwrap()).await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), "stage_timeout");
    assert!(err.to_string().contains("synthesizing"));
    assert_eq!(terminal_events(&events).len(), 1);
    assert_eq!(fixture.work_entries(), 0);
}
