//! Recognition thread: owns the ONNX engine and the gallery, serves one
//! frame at a time.

use rollcall_core::engine::EngineError;
use rollcall_core::{match_embedding, FaceBox, FaceEngine, Gallery};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// A face found in a processed frame, with its resolved identity.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub face: FaceBox,
    /// Matched gallery name; `None` for an unfamiliar face.
    pub name: Option<String>,
}

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("recognition thread exited")]
    ChannelClosed,
}

struct Request {
    gray: Vec<u8>,
    width: u32,
    height: u32,
    reply: oneshot::Sender<Result<Vec<Sighting>, EngineError>>,
}

/// Handle to the recognition thread.
#[derive(Clone)]
pub struct RecognizerHandle {
    tx: mpsc::Sender<Request>,
}

impl RecognizerHandle {
    /// Hand one grayscale frame to the recognition thread and block until
    /// its sightings come back. The capture loop never has more than one
    /// frame in flight, so frames stay in strict capture order.
    pub fn recognize(
        &self,
        gray: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<Vec<Sighting>, RecognitionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .blocking_send(Request { gray, width, height, reply: reply_tx })
            .map_err(|_| RecognitionError::ChannelClosed)?;
        reply_rx
            .blocking_recv()
            .map_err(|_| RecognitionError::ChannelClosed)?
            .map_err(RecognitionError::Engine)
    }
}

/// Move the engine and the gallery onto a dedicated thread and return a
/// handle. The thread exits when the last handle is dropped.
pub fn spawn<E>(mut engine: E, gallery: Gallery, threshold: f32) -> RecognizerHandle
where
    E: FaceEngine + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Request>(1);

    std::thread::Builder::new()
        .name("rollcall-recognizer".into())
        .spawn(move || {
            tracing::debug!("recognition thread started");
            while let Some(request) = rx.blocking_recv() {
                let result = recognize_frame(
                    &mut engine,
                    &gallery,
                    threshold,
                    &request.gray,
                    request.width,
                    request.height,
                );
                let _ = request.reply.send(result);
            }
            tracing::debug!("recognition thread exiting");
        })
        .expect("failed to spawn recognition thread");

    RecognizerHandle { tx }
}

/// Detect every face in the frame, embed each one, and resolve it against
/// the gallery.
fn recognize_frame(
    engine: &mut dyn FaceEngine,
    gallery: &Gallery,
    threshold: f32,
    gray: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<Sighting>, EngineError> {
    let faces = engine.detect(gray, width, height)?;

    let mut sightings = Vec::with_capacity(faces.len());
    for face in faces {
        let embedding = engine.embed(gray, width, height, &face)?;
        let outcome = match_embedding(&embedding, gallery.entries(), threshold);
        sightings.push(Sighting { face, name: outcome.name });
    }
    Ok(sightings)
}
