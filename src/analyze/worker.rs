//! Analysis worker thread.
//!
//! Face detection and classification for one frame run as a single request
//! on a dedicated thread owning both backends. The session side waits with
//! a timeout, so a slow or wedged backend call costs the loop at most one
//! timeout per frame instead of blocking cancellation indefinitely.

use anyhow::{anyhow, Result};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::analyze::backend::{EmotionClassifier, FaceDetector};
use crate::analyze::result::EmotionScores;
use crate::frame::Frame;

/// Result of analyzing one frame.
#[derive(Clone, Debug)]
pub(crate) enum Analysis {
    /// Face gate negative; classification skipped.
    NoFace,
    /// Classification scores for the frame.
    Scores(EmotionScores),
    /// Face detector or classifier call failed (recoverable).
    Failed(String),
}

/// Outcome of one `analyze` call from the session side.
#[derive(Clone, Debug)]
pub(crate) enum AnalyzeOutcome {
    Done(Analysis),
    /// No response within the timeout; the request stays pending.
    TimedOut,
    /// A timed-out request is still pending; this frame was dropped.
    Busy,
}

struct Request {
    seq: u64,
    frame: Frame,
}

struct Response {
    seq: u64,
    analysis: Analysis,
}

/// Owns the worker thread and the request/response channels.
///
/// At most one request is outstanding at a time. After a timeout the
/// request stays `pending` until its late response is drained; until then
/// `analyze` reports `Busy` without submitting new work.
pub(crate) struct AnalysisWorker {
    req_tx: Option<mpsc::Sender<Request>>,
    resp_rx: mpsc::Receiver<Response>,
    join: Option<JoinHandle<()>>,
    next_seq: u64,
    pending: Option<u64>,
    timeout: Duration,
}

impl AnalysisWorker {
    pub(crate) fn spawn(
        mut face: Box<dyn FaceDetector>,
        mut classifier: Box<dyn EmotionClassifier>,
        timeout: Duration,
    ) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (resp_tx, resp_rx) = mpsc::channel::<Response>();

        let join = std::thread::spawn(move || {
            for request in req_rx {
                let analysis = run_analysis(face.as_mut(), classifier.as_mut(), &request.frame);
                let response = Response {
                    seq: request.seq,
                    analysis,
                };
                if resp_tx.send(response).is_err() {
                    break;
                }
            }
        });

        Self {
            req_tx: Some(req_tx),
            resp_rx,
            join: Some(join),
            next_seq: 0,
            pending: None,
            timeout,
        }
    }

    /// Drain the late response of a request that previously timed out.
    fn drain_stale(&mut self) {
        while let Some(pending) = self.pending {
            match self.resp_rx.try_recv() {
                Ok(response) => {
                    if response.seq == pending {
                        self.pending = None;
                    }
                }
                Err(mpsc::TryRecvError::Empty) | Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }
    }

    pub(crate) fn analyze(&mut self, frame: Frame) -> Result<AnalyzeOutcome> {
        self.drain_stale();
        if self.pending.is_some() {
            return Ok(AnalyzeOutcome::Busy);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let sender = self
            .req_tx
            .as_ref()
            .ok_or_else(|| anyhow!("analysis worker shut down"))?;
        sender
            .send(Request { seq, frame })
            .map_err(|_| anyhow!("analysis worker exited unexpectedly"))?;
        self.pending = Some(seq);

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.resp_rx.recv_timeout(remaining) {
                Ok(response) if response.seq == seq => {
                    self.pending = None;
                    return Ok(AnalyzeOutcome::Done(response.analysis));
                }
                Ok(_) => continue,
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(AnalyzeOutcome::TimedOut),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("analysis worker exited unexpectedly"))
                }
            }
        }
    }

    /// Stop the worker. Joins only when idle; a worker stuck inside a
    /// backend call is detached so shutdown never blocks.
    pub(crate) fn shutdown(mut self) {
        self.req_tx.take();
        self.drain_stale();
        match self.join.take() {
            Some(join) if self.pending.is_none() => {
                let _ = join.join();
            }
            Some(join) => {
                log::warn!("analysis worker still busy at shutdown; detaching");
                drop(join);
            }
            None => {}
        }
    }
}

fn run_analysis(
    face: &mut dyn FaceDetector,
    classifier: &mut dyn EmotionClassifier,
    frame: &Frame,
) -> Analysis {
    match face.detect(frame.pixels(), frame.width, frame.height) {
        Ok(false) => return Analysis::NoFace,
        Ok(true) => {}
        Err(e) => return Analysis::Failed(format!("face detection: {e:#}")),
    }
    match classifier.classify(frame.pixels(), frame.width, frame.height) {
        Ok(scores) => Analysis::Scores(scores),
        Err(e) => Analysis::Failed(format!("classification: {e:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::backends::{StubEmotionClassifier, StubFaceDetector, StubStep};
    use crate::EmotionLabel;
    use std::collections::VecDeque;

    fn test_frame() -> Frame {
        Frame::new(vec![0u8; 12], 2, 2)
    }

    /// Classifier that sleeps for scripted delays before answering.
    struct SlowClassifier {
        delays: VecDeque<Duration>,
    }

    impl EmotionClassifier for SlowClassifier {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn classify(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<EmotionScores> {
            if let Some(delay) = self.delays.pop_front() {
                std::thread::sleep(delay);
            }
            Ok([(EmotionLabel::Happy, 0.9)].into_iter().collect())
        }
    }

    #[test]
    fn worker_reports_scores() -> Result<()> {
        let mut worker = AnalysisWorker::spawn(
            Box::new(StubFaceDetector::always(true)),
            Box::new(StubEmotionClassifier::fixed(EmotionLabel::Surprise)),
            Duration::from_secs(1),
        );

        match worker.analyze(test_frame())? {
            AnalyzeOutcome::Done(Analysis::Scores(scores)) => {
                assert_eq!(scores.dominant().unwrap().label, EmotionLabel::Surprise);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        worker.shutdown();
        Ok(())
    }

    #[test]
    fn worker_reports_no_face_without_classifying() -> Result<()> {
        let mut worker = AnalysisWorker::spawn(
            Box::new(StubFaceDetector::always(false)),
            Box::new(StubEmotionClassifier::scripted(
                vec![StubStep::Fail],
                EmotionLabel::Neutral,
            )),
            Duration::from_secs(1),
        );

        // The scripted failure is never reached because the gate is negative.
        match worker.analyze(test_frame())? {
            AnalyzeOutcome::Done(Analysis::NoFace) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }

        worker.shutdown();
        Ok(())
    }

    #[test]
    fn worker_reports_backend_failures() -> Result<()> {
        let mut worker = AnalysisWorker::spawn(
            Box::new(StubFaceDetector::always(true)),
            Box::new(StubEmotionClassifier::scripted(
                vec![StubStep::Fail],
                EmotionLabel::Neutral,
            )),
            Duration::from_secs(1),
        );

        match worker.analyze(test_frame())? {
            AnalyzeOutcome::Done(Analysis::Failed(message)) => {
                assert!(message.contains("classification"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        worker.shutdown();
        Ok(())
    }

    #[test]
    fn worker_times_out_then_recovers() -> Result<()> {
        let classifier = SlowClassifier {
            delays: [Duration::from_millis(200)].into_iter().collect(),
        };
        let mut worker = AnalysisWorker::spawn(
            Box::new(StubFaceDetector::always(true)),
            Box::new(classifier),
            Duration::from_millis(25),
        );

        assert!(matches!(
            worker.analyze(test_frame())?,
            AnalyzeOutcome::TimedOut
        ));

        // Still inside the slow call: new frames are dropped, not queued.
        assert!(matches!(worker.analyze(test_frame())?, AnalyzeOutcome::Busy));

        // Let the late response land, then the worker is usable again.
        std::thread::sleep(Duration::from_millis(400));
        match worker.analyze(test_frame())? {
            AnalyzeOutcome::Done(Analysis::Scores(_)) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }

        worker.shutdown();
        Ok(())
    }
}
