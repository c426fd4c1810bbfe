use super::*;
use crate::config::WastebinConfig;
use crate::events::{EventBus, PipelineEvent};
use crate::frame::{Frame, FRAME_HEIGHT, FRAME_WIDTH};
use crate::frame_slot::{ReadinessSignal, SharedFrameSlot};
use image::Rgb;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Returns the same prediction every time and counts calls
struct FixedClassifier {
    prediction: Prediction,
    calls: AtomicUsize,
}

impl FixedClassifier {
    fn new(label: &str, confidence: f64, is_wet: bool) -> Arc<Self> {
        Arc::new(Self {
            prediction: Prediction::new(label, confidence, is_wet),
            calls: AtomicUsize::new(0),
        })
    }
}

impl Classifier for FixedClassifier {
    fn name(&self) -> &str {
        "fixed"
    }

    fn classify(&self, _image: &RgbImage) -> Result<Prediction, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.prediction.clone())
    }
}

struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    fn classify(&self, _image: &RgbImage) -> Result<Prediction, InferenceError> {
        Err(InferenceError::Prediction {
            details: "tensor shape mismatch".to_string(),
        })
    }
}

fn is_known_label(label: &str) -> bool {
    label == "dry/recyclable" || label == "organic/wet"
}

fn black_frame(id: u64) -> Frame {
    Frame::new(
        id,
        SystemTime::now(),
        RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb([0, 0, 0])),
    )
}

fn build_loop(
    adapter: ClassifierAdapter,
    slot: Arc<SharedFrameSlot>,
) -> (ClassificationLoop, Arc<ClassificationState>, Arc<EventBus>) {
    let config = WastebinConfig::default().classifier;
    let state = Arc::new(ClassificationState::new(config.interval()));
    let event_bus = Arc::new(EventBus::new(16));
    let worker = ClassificationLoop::new(
        &config,
        adapter,
        slot,
        Arc::new(ReadinessSignal::new()),
        Arc::clone(&state),
        Arc::clone(&event_bus),
    );
    (worker, state, event_bus)
}

#[test]
fn test_class_labels_follow_output_order() {
    assert_eq!(WasteClass::from_index(0), Some(WasteClass::DryRecyclable));
    assert_eq!(WasteClass::from_index(1), Some(WasteClass::OrganicWet));
    assert_eq!(WasteClass::from_index(2), None);
    assert_eq!(WasteClass::OrganicWet.label(), "organic/wet");
    assert!(!WasteClass::DryRecyclable.is_wet());
}

#[test]
fn test_prediction_from_class_scores() {
    let prediction = prediction_from_scores(&[0.2, 0.8]).unwrap();
    assert_eq!(prediction.label, "organic/wet");
    assert!(prediction.is_wet);
    assert!((prediction.confidence - 0.8).abs() < 1e-6);

    let prediction = prediction_from_scores(&[0.9, 0.1]).unwrap();
    assert_eq!(prediction.label, "dry/recyclable");
    assert!(!prediction.is_wet);
}

#[test]
fn test_prediction_from_sigmoid_score() {
    let wet = prediction_from_scores(&[0.75]).unwrap();
    assert_eq!(wet.label, "organic/wet");
    assert!((wet.confidence - 0.75).abs() < 1e-6);

    let dry = prediction_from_scores(&[0.25]).unwrap();
    assert_eq!(dry.label, "dry/recyclable");
    assert!((dry.confidence - 0.75).abs() < 1e-6);
}

#[test]
fn test_prediction_from_bad_scores() {
    assert!(prediction_from_scores(&[]).is_err());
    assert!(prediction_from_scores(&[0.1, 0.1, 0.8]).is_err());
}

#[test]
fn test_mock_predictions_stay_in_range() {
    for _ in 0..500 {
        let prediction = MockClassifier::predict();

        assert!(is_known_label(&prediction.label));
        assert_eq!(prediction.is_wet, prediction.label == "organic/wet");
        assert!((0.6..=0.95).contains(&prediction.confidence));
        let cents = prediction.confidence * 100.0;
        assert!((cents - cents.round()).abs() < 1e-9);
    }
}

#[test]
fn test_alert_threshold_is_strict() {
    assert!(Prediction::new("organic/wet", 0.85, true).triggers_alert());
    assert!(!Prediction::new("organic/wet", 0.70, true).triggers_alert());
    assert!(!Prediction::new("dry/recyclable", 0.9, false).triggers_alert());
}

#[test]
fn test_adapter_without_backend_uses_mock() {
    let adapter = ClassifierAdapter::mock();
    let image = black_frame(1).to_image();

    assert!(!adapter.model_loaded());
    assert_eq!(adapter.backend_name(), "mock");
    assert!(is_known_label(&adapter.classify(Some(&image)).label));
}

#[test]
fn test_adapter_uses_backend_for_frames_only() {
    let fixed = FixedClassifier::new("organic/wet", 0.85, true);
    let adapter = ClassifierAdapter::with_backend(fixed.clone());
    let image = black_frame(1).to_image();

    assert!(adapter.model_loaded());
    assert_eq!(
        adapter.classify(Some(&image)),
        Prediction::new("organic/wet", 0.85, true)
    );
    assert_eq!(fixed.calls.load(Ordering::SeqCst), 1);

    let prediction = adapter.classify(None);
    assert!(is_known_label(&prediction.label));
    assert_eq!(fixed.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_adapter_falls_back_when_inference_fails() {
    let adapter = ClassifierAdapter::with_backend(Arc::new(FailingClassifier));
    let image = black_frame(1).to_image();

    let prediction = adapter.classify(Some(&image));

    assert!(is_known_label(&prediction.label));
    assert!((0.6..=0.95).contains(&prediction.confidence));
}

#[test]
fn test_adapter_from_config_with_missing_model() {
    let mut config = WastebinConfig::default().classifier;
    config.model_path = "/nonexistent/waste_detection_model.onnx".to_string();

    assert!(!ClassifierAdapter::from_config(&config).model_loaded());

    config.model_path = String::new();
    assert!(!ClassifierAdapter::from_config(&config).model_loaded());
}

#[test]
fn test_initial_result() {
    let result = ClassificationResult::initial();

    assert_eq!(result.label, "No detection yet");
    assert_eq!(result.confidence, 0.0);
    assert!(!result.is_wet);
    assert!(result.produced_at.is_none());
    assert!(!result.triggers_alert());
}

#[test]
fn test_confidence_percent_rounding() {
    let result = ClassificationResult::from_prediction(
        Prediction::new("organic/wet", 0.85, true),
        chrono::Utc::now(),
    );
    assert_eq!(result.confidence_percent(), 85.0);

    let result = ClassificationResult::from_prediction(
        Prediction::new("dry/recyclable", 0.85678, false),
        chrono::Utc::now(),
    );
    assert_eq!(result.confidence_percent(), 85.68);
}

#[tokio::test(start_paused = true)]
async fn test_state_countdown() {
    let state = ClassificationState::new(Duration::from_secs(5));
    assert!(state.is_due());
    assert_eq!(state.time_until_next(), Duration::ZERO);

    state.publish(ClassificationResult::initial(), Instant::now());
    assert!(!state.is_due());
    assert_eq!(state.time_until_next(), Duration::from_secs(5));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(state.snapshot().time_until_next, Duration::from_secs(3));

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(state.time_until_next(), Duration::ZERO);
    assert!(state.is_due());
}

#[tokio::test]
async fn test_tick_publishes_wet_alert() {
    let slot = Arc::new(SharedFrameSlot::new());
    slot.publish(black_frame(7));
    let adapter =
        ClassifierAdapter::with_backend(FixedClassifier::new("organic/wet", 0.85, true));
    let (worker, state, event_bus) = build_loop(adapter, slot);
    let mut events = event_bus.subscribe();

    let result = worker.tick().await;

    assert_eq!(result.label, "organic/wet");
    assert_eq!(state.latest(), result);
    assert!(state.latest().produced_at.is_some());
    assert_eq!(state.snapshot().result.confidence_percent(), 85.0);

    let completed = events.try_recv().unwrap();
    assert_eq!(completed.event_type(), "classification_completed");
    assert!(matches!(
        events.try_recv().unwrap(),
        PipelineEvent::WetWasteDetected { confidence, .. } if (confidence - 0.85).abs() < 1e-9
    ));
}

#[tokio::test]
async fn test_tick_without_alert_for_dry_waste() {
    let slot = Arc::new(SharedFrameSlot::new());
    slot.publish(black_frame(1));
    let adapter =
        ClassifierAdapter::with_backend(FixedClassifier::new("dry/recyclable", 0.9, false));
    let (worker, _state, event_bus) = build_loop(adapter, slot);
    let mut events = event_bus.subscribe();

    worker.tick().await;

    assert_eq!(
        events.try_recv().unwrap().event_type(),
        "classification_completed"
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_tick_without_frame_uses_mock() {
    let fixed = FixedClassifier::new("organic/wet", 0.85, true);
    let adapter = ClassifierAdapter::with_backend(fixed.clone());
    let (worker, state, _event_bus) = build_loop(adapter, Arc::new(SharedFrameSlot::new()));

    let result = worker.tick().await;

    assert!(is_known_label(&result.label));
    assert_eq!(fixed.calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.latest(), result);
}

#[tokio::test(start_paused = true)]
async fn test_loop_proceeds_after_readiness_timeout() {
    let fixed = FixedClassifier::new("dry/recyclable", 0.9, false);
    let adapter = ClassifierAdapter::with_backend(fixed.clone());
    let (worker, state, _event_bus) = build_loop(adapter, Arc::new(SharedFrameSlot::new()));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(state.is_running());
    assert!(state.latest().produced_at.is_none());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(state.latest().produced_at.is_some());

    cancel.cancel();
    handle.await.unwrap();
    assert!(!state.is_running());
}
