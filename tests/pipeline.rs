use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};
use tempfile::tempdir;

use tomato_stage::{
    image::{ImagePreprocessor, PreprocessedTensor, Preprocessor},
    models::{ModelManager, StageClassifier},
    stage::ImageRejection,
    ClassLabel, ClassifyOutcome, LabelCatalog, StageError, StagePipeline,
};

/// Wraps the real preprocessor and records every tensor it hands out.
#[derive(Default)]
struct RecordingPreprocessor {
    inner: ImagePreprocessor,
    calls: AtomicUsize,
    shapes: Mutex<Vec<(usize, usize, usize, usize)>>,
    ranges: Mutex<Vec<(f32, f32)>>,
}

impl Preprocessor for RecordingPreprocessor {
    fn preprocess(&self, path: &Path) -> tomato_stage::Result<PreprocessedTensor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tensor = self.inner.preprocess(path)?;
        let view = tensor.view();
        let min = view.iter().copied().fold(f32::INFINITY, f32::min);
        let max = view.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        self.shapes.lock().unwrap().push(tensor.shape());
        self.ranges.lock().unwrap().push((min, max));
        Ok(tensor)
    }
}

/// Returns a fixed probability vector.
struct FixedClassifier {
    output: Vec<f32>,
    calls: AtomicUsize,
}

impl FixedClassifier {
    fn new(output: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            output,
            calls: AtomicUsize::new(0),
        })
    }
}

impl StageClassifier for FixedClassifier {
    fn infer(&self, _tensor: PreprocessedTensor) -> tomato_stage::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Maps the dominant color channel to a stage: green -> 0, red -> 2, blue -> 3.
struct DominantColorClassifier;

impl StageClassifier for DominantColorClassifier {
    fn infer(&self, tensor: PreprocessedTensor) -> tomato_stage::Result<Vec<f32>> {
        let view = tensor.view();
        let mut sums = [0.0f32; 3];
        for ((_, _, _, c), v) in view.indexed_iter() {
            sums[c] += *v;
        }
        let dominant = if sums[0] >= sums[1] && sums[0] >= sums[2] {
            2
        } else if sums[1] >= sums[2] {
            0
        } else {
            3
        };
        let mut probs = vec![0.05; 4];
        probs[dominant] = 0.85;
        Ok(probs)
    }
}

struct FailingClassifier;

impl StageClassifier for FailingClassifier {
    fn infer(&self, _tensor: PreprocessedTensor) -> tomato_stage::Result<Vec<f32>> {
        Err(StageError::Inference("session run failed".to_string()))
    }
}

fn pipeline_with(
    models: ModelManager,
    preprocessor: Arc<RecordingPreprocessor>,
) -> StagePipeline {
    StagePipeline::new(
        Arc::new(models),
        preprocessor,
        Arc::new(LabelCatalog::tomato_stages()),
    )
}

fn write_image(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 3]) -> std::path::PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(&path)
        .expect("save fixture");
    path
}

#[test]
fn no_input_skips_preprocessing_and_inference() {
    let pre = Arc::new(RecordingPreprocessor::default());
    let classifier = FixedClassifier::new(vec![0.25; 4]);
    let pipeline = pipeline_with(ModelManager::with_classifier(classifier.clone()), pre.clone());

    let outcome = pipeline.classify(None).expect("outcome");
    assert!(matches!(outcome, ClassifyOutcome::NoInput));
    assert_eq!(pre.calls.load(Ordering::SeqCst), 0);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_file_is_rejected_before_inference() {
    let dir = tempdir().expect("tempdir");
    let pre = Arc::new(RecordingPreprocessor::default());
    let classifier = FixedClassifier::new(vec![0.25; 4]);
    let pipeline = pipeline_with(ModelManager::with_classifier(classifier.clone()), pre.clone());

    let outcome = pipeline
        .classify(Some(&dir.path().join("missing.jpg")))
        .expect("outcome");
    match outcome {
        ClassifyOutcome::ImageRejected { reason, message } => {
            assert_eq!(reason, ImageRejection::NotFound);
            assert!(message.contains("missing.jpg"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(pre.calls.load(Ordering::SeqCst), 1);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn corrupt_file_is_rejected_as_unsupported() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"\x89PNG truncated").expect("write");

    let classifier = FixedClassifier::new(vec![0.25; 4]);
    let pipeline = pipeline_with(
        ModelManager::with_classifier(classifier.clone()),
        Arc::new(RecordingPreprocessor::default()),
    );

    match pipeline.classify(Some(&path)).expect("outcome") {
        ClassifyOutcome::ImageRejected { reason, .. } => {
            assert_eq!(reason, ImageRejection::Unsupported)
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn arbitrary_resolution_becomes_fixed_unit_range_tensor() {
    let dir = tempdir().expect("tempdir");
    let pre = Arc::new(RecordingPreprocessor::default());
    let classifier = FixedClassifier::new(vec![0.1, 0.2, 0.3, 0.4]);
    let pipeline = pipeline_with(ModelManager::with_classifier(classifier), pre.clone());

    for (i, (w, h)) in [(1024u32, 37u32), (13, 700), (224, 224)].into_iter().enumerate() {
        let path = write_image(dir.path(), &format!("plant{}.png", i), w, h, [255, 128, 0]);
        let outcome = pipeline.classify(Some(&path)).expect("outcome");
        assert!(outcome.prediction().is_some());
    }

    let shapes = pre.shapes.lock().unwrap();
    assert_eq!(shapes.len(), 3);
    assert!(shapes.iter().all(|s| *s == (1, 224, 224, 3)));

    let ranges = pre.ranges.lock().unwrap();
    assert!(ranges.iter().all(|(min, max)| *min >= 0.0 && *max <= 1.0));
}

#[test]
fn unavailable_model_short_circuits_every_call() {
    let dir = tempdir().expect("tempdir");
    let valid = write_image(dir.path(), "plant.png", 64, 64, [0, 200, 0]);
    let pre = Arc::new(RecordingPreprocessor::default());
    let pipeline = pipeline_with(ModelManager::unavailable("model file missing"), pre.clone());

    let inputs = [None, Some(dir.path().join("missing.jpg")), Some(valid)];
    for input in &inputs {
        match pipeline.classify(input.as_deref()).expect("outcome") {
            ClassifyOutcome::ModelUnavailable { reason } => {
                assert!(reason.contains("model file missing"))
            }
            other => panic!("expected model unavailable, got {:?}", other),
        }
    }
    assert_eq!(pre.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn red_fixture_maps_to_fruiting_stage_with_matching_care() {
    let dir = tempdir().expect("tempdir");
    let path = write_image(dir.path(), "ripe.jpg", 320, 240, [220, 30, 20]);
    let pipeline = pipeline_with(
        ModelManager::with_classifier(Arc::new(DominantColorClassifier)),
        Arc::new(RecordingPreprocessor::default()),
    );

    let outcome = pipeline.classify(Some(&path)).expect("outcome");
    let result = outcome.prediction().expect("prediction");

    assert_eq!(result.predicted_label.index(), 2);
    assert_eq!(result.predicted_label, ClassLabel::FruitingAndRipening);
    let catalog = LabelCatalog::tomato_stages();
    assert_eq!(result.care.title, catalog.lookup(2).expect("entry").care.title);
    assert!((result.confidence - 0.85).abs() < 1e-6);
}

#[test]
fn per_class_confidences_cover_every_label_and_sum_to_one() {
    let dir = tempdir().expect("tempdir");
    let path = write_image(dir.path(), "plant.png", 50, 80, [10, 240, 10]);
    let pipeline = pipeline_with(
        ModelManager::with_classifier(FixedClassifier::new(vec![0.61, 0.19, 0.15, 0.05])),
        Arc::new(RecordingPreprocessor::default()),
    );

    let outcome = pipeline.classify(Some(&path)).expect("outcome");
    let result = outcome.prediction().expect("prediction");

    let labels: Vec<ClassLabel> = result.per_class_confidences.iter().map(|c| c.label).collect();
    assert_eq!(labels, ClassLabel::ALL.to_vec());
    assert!((result.confidence_sum() - 1.0).abs() < 1e-4);
    assert!(result
        .per_class_confidences
        .iter()
        .all(|c| (0.0..=1.0).contains(&c.confidence)));
    assert_eq!(result.predicted_label, ClassLabel::EarlyVegetative);
}

#[test]
fn ties_resolve_to_lowest_index() {
    let dir = tempdir().expect("tempdir");
    let path = write_image(dir.path(), "plant.png", 30, 30, [90, 90, 90]);
    let pipeline = pipeline_with(
        ModelManager::with_classifier(FixedClassifier::new(vec![0.1, 0.4, 0.4, 0.1])),
        Arc::new(RecordingPreprocessor::default()),
    );

    let outcome = pipeline.classify(Some(&path)).expect("outcome");
    let result = outcome.prediction().expect("prediction");
    assert_eq!(result.predicted_label, ClassLabel::FloweringInitiation);
    assert!((result.confidence - 0.4).abs() < 1e-6);
}

#[test]
fn extra_class_in_model_output_escalates() {
    let dir = tempdir().expect("tempdir");
    let path = write_image(dir.path(), "plant.png", 30, 30, [90, 90, 90]);
    let pipeline = pipeline_with(
        ModelManager::with_classifier(FixedClassifier::new(vec![0.1, 0.1, 0.1, 0.1, 0.6])),
        Arc::new(RecordingPreprocessor::default()),
    );

    match pipeline.classify(Some(&path)) {
        Err(StageError::CatalogMismatch { expected, actual }) => {
            assert_eq!(expected, 4);
            assert_eq!(actual, 5);
        }
        other => panic!("expected catalog mismatch, got {:?}", other),
    }
}

#[test]
fn malformed_probabilities_are_reported() {
    let dir = tempdir().expect("tempdir");
    let path = write_image(dir.path(), "plant.png", 30, 30, [90, 90, 90]);
    let pipeline = pipeline_with(
        ModelManager::with_classifier(FixedClassifier::new(vec![3.2, -1.5, 0.7, 0.1])),
        Arc::new(RecordingPreprocessor::default()),
    );

    assert!(matches!(
        pipeline.classify(Some(&path)).expect("outcome"),
        ClassifyOutcome::InferenceFailed { .. }
    ));
}

#[test]
fn classifier_errors_are_reported_not_propagated() {
    let dir = tempdir().expect("tempdir");
    let path = write_image(dir.path(), "plant.png", 30, 30, [90, 90, 90]);
    let pipeline = pipeline_with(
        ModelManager::with_classifier(Arc::new(FailingClassifier)),
        Arc::new(RecordingPreprocessor::default()),
    );

    match pipeline.classify(Some(&path)).expect("outcome") {
        ClassifyOutcome::InferenceFailed { message } => assert!(message.contains("session run failed")),
        other => panic!("expected inference failure, got {:?}", other),
    }
}

#[test]
fn probabilities_slightly_off_one_are_reported() {
    let dir = tempdir().expect("tempdir");
    let path = write_image(dir.path(), "plant.png", 30, 30, [90, 90, 90]);
    let pipeline = pipeline_with(
        ModelManager::with_classifier(FixedClassifier::new(vec![0.7009, 0.1, 0.1, 0.1])),
        Arc::new(RecordingPreprocessor::default()),
    );

    match pipeline.classify(Some(&path)).expect("outcome") {
        ClassifyOutcome::InferenceFailed { message } => assert!(message.contains("sum")),
        other => panic!("expected inference failure, got {:?}", other),
    }
}
