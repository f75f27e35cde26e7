use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use ndarray::Array4;

use crate::detection::domain::detection::DetectionCandidate;
use crate::detection::domain::face_detector::{DetectionThresholds, FaceDetector};
use crate::emotion::domain::emotion_classifier::{EmotionClassifier, EmotionResult};
use crate::pipeline::pipeline_error::BoxError;
use crate::shared::pixel_array::PixelArray;

const DEFAULT_QUEUE_CAPACITY: usize = 32;

type Reply<T> = Sender<Result<T, BoxError>>;

enum InferenceJob {
    Detect {
        input: Array4<f32>,
        thresholds: DetectionThresholds,
        reply: Reply<Vec<DetectionCandidate>>,
    },
    Classify {
        crops: Vec<PixelArray>,
        show_conf: bool,
        reply: Reply<Vec<EmotionResult>>,
    },
}

/// Single serialization point for model inference.
///
/// Owns the detector and classifier on a dedicated thread and runs jobs
/// one at a time in arrival order. Callers block until their job's reply
/// arrives; everything outside inference stays on the caller's thread.
pub struct InferenceDispatcher {
    jobs: Option<Sender<InferenceJob>>,
    worker: Option<JoinHandle<()>>,
}

impl InferenceDispatcher {
    pub fn spawn(detector: Box<dyn FaceDetector>, classifier: Box<dyn EmotionClassifier>) -> Self {
        Self::with_capacity(detector, classifier, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        mut detector: Box<dyn FaceDetector>,
        mut classifier: Box<dyn EmotionClassifier>,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = bounded::<InferenceJob>(capacity);
        let worker = thread::Builder::new()
            .name("inference".into())
            .spawn(move || {
                for job in rx {
                    match job {
                        InferenceJob::Detect {
                            input,
                            thresholds,
                            reply,
                        } => {
                            let result = guarded("detector", || detector.detect(&input, thresholds));
                            let _ = reply.send(result);
                        }
                        InferenceJob::Classify {
                            crops,
                            show_conf,
                            reply,
                        } => {
                            let result =
                                guarded("classifier", || classifier.classify(&crops, show_conf));
                            let _ = reply.send(result);
                        }
                    }
                }
                log::debug!("Inference worker stopped");
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn inference worker: {e}");
                None
            }
        };

        Self {
            jobs: Some(tx),
            worker,
        }
    }

    pub fn detect(
        &self,
        input: Array4<f32>,
        thresholds: DetectionThresholds,
    ) -> Result<Vec<DetectionCandidate>, BoxError> {
        self.submit(|reply| InferenceJob::Detect {
            input,
            thresholds,
            reply,
        })
    }

    pub fn classify(
        &self,
        crops: Vec<PixelArray>,
        show_conf: bool,
    ) -> Result<Vec<EmotionResult>, BoxError> {
        self.submit(|reply| InferenceJob::Classify {
            crops,
            show_conf,
            reply,
        })
    }

    fn submit<T>(&self, make_job: impl FnOnce(Reply<T>) -> InferenceJob) -> Result<T, BoxError> {
        let jobs = self.jobs.as_ref().ok_or("inference worker is shut down")?;
        let (reply_tx, reply_rx) = bounded(1);
        jobs.send(make_job(reply_tx))
            .map_err(|_| "inference worker is not running")?;
        reply_rx
            .recv()
            .map_err(|_| "inference worker dropped the request")?
    }
}

impl Drop for InferenceDispatcher {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Runs one capability call, converting a panic into an error so one bad
/// input cannot take the worker down.
fn guarded<T>(
    name: &str,
    f: impl FnOnce() -> Result<T, BoxError>,
) -> Result<T, BoxError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("{name} panicked during inference");
        Err(format!("{name} panicked").into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingDetector {
        calls: Arc<AtomicUsize>,
    }

    impl FaceDetector for CountingDetector {
        fn detect(
            &mut self,
            input: &Array4<f32>,
            _thresholds: DetectionThresholds,
        ) -> Result<Vec<DetectionCandidate>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let size = input.shape()[2] as f64;
            Ok(vec![DetectionCandidate::new([0.0, 0.0, size, size], 0.9)])
        }
    }

    struct PanickingDetector;

    impl FaceDetector for PanickingDetector {
        fn detect(
            &mut self,
            _input: &Array4<f32>,
            _thresholds: DetectionThresholds,
        ) -> Result<Vec<DetectionCandidate>, BoxError> {
            panic!("boom");
        }
    }

    struct EchoClassifier;

    impl EmotionClassifier for EchoClassifier {
        fn classify(
            &mut self,
            crops: &[PixelArray],
            show_conf: bool,
        ) -> Result<Vec<EmotionResult>, BoxError> {
            Ok(crops
                .iter()
                .map(|c| EmotionResult::from_prediction(c.width() as usize % 8, 0.5, show_conf))
                .collect())
        }
    }

    fn thresholds() -> DetectionThresholds {
        DetectionThresholds {
            conf_thres: 0.5,
            iou_thres: 0.45,
        }
    }

    #[test]
    fn test_detect_round_trips_through_worker() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = InferenceDispatcher::spawn(
            Box::new(CountingDetector {
                calls: calls.clone(),
            }),
            Box::new(EchoClassifier),
        );

        let result = dispatcher
            .detect(Array4::zeros((1, 3, 64, 64)), thresholds())
            .unwrap();

        assert_eq!(result[0].bbox, [0.0, 0.0, 64.0, 64.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classify_preserves_order() {
        let dispatcher =
            InferenceDispatcher::spawn(Box::new(PanickingDetector), Box::new(EchoClassifier));
        let crops = vec![
            PixelArray::filled(1, 1, [0, 0, 0]),
            PixelArray::filled(4, 1, [0, 0, 0]),
            PixelArray::filled(6, 1, [0, 0, 0]),
        ];

        let results = dispatcher.classify(crops, false).unwrap();

        let ids: Vec<u32> = results.iter().map(|r| r.class_id).collect();
        assert_eq!(ids, vec![1, 4, 6]);
    }

    #[test]
    fn test_panic_becomes_error_and_worker_survives() {
        let dispatcher =
            InferenceDispatcher::spawn(Box::new(PanickingDetector), Box::new(EchoClassifier));

        let err = dispatcher
            .detect(Array4::zeros((1, 3, 8, 8)), thresholds())
            .unwrap_err();
        assert!(err.to_string().contains("panicked"));

        let results = dispatcher
            .classify(vec![PixelArray::filled(2, 2, [0, 0, 0])], true)
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_concurrent_callers_are_all_served() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(InferenceDispatcher::with_capacity(
            Box::new(CountingDetector {
                calls: calls.clone(),
            }),
            Box::new(EchoClassifier),
            2,
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = dispatcher.clone();
                thread::spawn(move || d.detect(Array4::zeros((1, 3, 4, 4)), thresholds()).unwrap().len())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(total, 8);
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }
}
