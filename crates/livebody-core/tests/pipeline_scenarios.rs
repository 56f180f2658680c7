use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use livebody_core::scripted::ScriptedFrame;
use livebody_core::{
    nv21_len, DetectionPipeline, DetectionResult, DirAssets, EngineError, FaceBox, Frame,
    FrameDispatcher, FrameOutcome, Orientation, Script, ScriptedEngine, ScreenMapping, Submission,
    ThresholdCell, CONFIG_PATH,
};

const M1: &str = r#"[{"name":"m1","width":96,"height":96,"scale":1.0,"shift_x":0,"shift_y":0,"org_resize":false}]"#;

fn asset_dir(config: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("live")).unwrap();
    fs::write(dir.path().join(CONFIG_PATH), config).unwrap();
    dir
}

fn one_face(face: FaceBox, score: f32) -> Script {
    Script {
        frames: vec![ScriptedFrame {
            faces: vec![face],
            score,
        }],
        ..Script::default()
    }
}

#[test]
fn vga_frame_with_one_face_yields_scored_result() {
    let dir = asset_dir(M1);
    let engine = ScriptedEngine::new(one_face(FaceBox::new(100, 100, 300, 300, 0.99), 0.95));
    let mut pipeline =
        DetectionPipeline::init(engine.detector(), engine.liveness(), &DirAssets::new(dir.path()))
            .unwrap();

    let yuv = vec![16u8; 460_800];
    assert_eq!(Some(yuv.len()), nv21_len(640, 480));
    let result = pipeline.process(&yuv, 640, 480, Orientation::TRANSVERSE).unwrap();

    assert_eq!(
        (result.left, result.top, result.right, result.bottom),
        (100, 100, 300, 300)
    );
    assert_eq!(result.confidence, 0.95);
    assert!(result.has_face);

    let forwarded = engine.loaded_configs();
    assert_eq!(forwarded.len(), 1);
    assert_eq!((forwarded[0].width, forwarded[0].height), (96, 96));

    pipeline.destroy();
    assert_eq!(engine.counts().deallocations, 2);
}

#[test]
fn malformed_config_line_fails_startup_without_native_load() {
    let dir = asset_dir("[{\"name\":\"m1\",");
    let engine = ScriptedEngine::new(Script::default());
    let err = DetectionPipeline::init(engine.detector(), engine.liveness(), &DirAssets::new(dir.path()))
        .err()
        .unwrap();

    assert!(matches!(err, EngineError::Config(_)));
    assert!(!err.is_frame_local());
    let counts = engine.counts();
    assert_eq!(counts.detector_loads, 1);
    assert_eq!(counts.liveness_loads, 0);
    assert_eq!(counts.deallocations, counts.allocations);
}

#[test]
fn concurrent_producers_never_overlap_frames() {
    let dir = asset_dir(M1);
    let mut script = one_face(FaceBox::new(10, 10, 50, 50, 0.9), 0.8);
    script.detect_delay_ms = 15;
    script.score_delay_ms = 5;
    let engine = ScriptedEngine::new(script);
    let pipeline =
        DetectionPipeline::init(engine.detector(), engine.liveness(), &DirAssets::new(dir.path()))
            .unwrap();
    let (dispatcher, mut outcomes) =
        FrameDispatcher::spawn(pipeline, ThresholdCell::default()).unwrap();
    let dispatcher = Arc::new(dispatcher);

    let accepted = Arc::new(AtomicUsize::new(0));
    let busy = Arc::new(AtomicUsize::new(0));
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let accepted = accepted.clone();
            let busy = busy.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    match dispatcher.submit(Frame::blank(64, 48, Orientation::NONE)) {
                        Submission::Accepted => accepted.fetch_add(1, Ordering::SeqCst),
                        Submission::Busy(_) => busy.fetch_add(1, Ordering::SeqCst),
                        Submission::Closed(_) => panic!("dispatcher closed early"),
                    };
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let dispatcher = Arc::try_unwrap(dispatcher).ok().unwrap();
    let counts = dispatcher.counts();
    dispatcher.shutdown().unwrap().destroy();

    let mut published = 0;
    while let Ok(outcome) = outcomes.try_recv() {
        assert!(matches!(outcome, FrameOutcome::Detected(r) if r.has_face));
        published += 1;
    }

    let accepted = accepted.load(Ordering::SeqCst);
    assert!(accepted >= 1);
    assert!(busy.load(Ordering::SeqCst) > 0, "some frames should have been dropped");
    assert_eq!(published, accepted, "one outcome per accepted frame");
    assert_eq!(counts.accepted as usize, accepted);
    assert_eq!(engine.counts().max_in_flight, 1);
    assert_eq!(engine.counts().detector_calls, accepted);
}

#[test]
fn results_map_to_screen_after_dispatch() {
    let dir = asset_dir(M1);
    let engine = ScriptedEngine::new(one_face(FaceBox::new(100, 100, 300, 300, 0.99), 0.95));
    let pipeline =
        DetectionPipeline::init(engine.detector(), engine.liveness(), &DirAssets::new(dir.path()))
            .unwrap();
    let (dispatcher, mut outcomes) =
        FrameDispatcher::spawn(pipeline, ThresholdCell::default()).unwrap();

    assert!(dispatcher
        .submit(Frame::blank(640, 480, Orientation::TRANSVERSE))
        .is_accepted());
    let mut result: DetectionResult = match outcomes.blocking_recv() {
        Some(FrameOutcome::Detected(r)) => r,
        other => panic!("unexpected outcome {other:?}"),
    };

    let mapping = ScreenMapping::for_preview(960, 1280, 640, 480, true).unwrap();
    mapping.apply(&mut result);
    assert_eq!(
        (result.left, result.top, result.right, result.bottom),
        (200, 200, 600, 600)
    );
    assert!(result.is_live());
}
