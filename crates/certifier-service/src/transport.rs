//! Framed TCP transport
//!
//! One request per connection: the client writes a frame holding a JSON
//! `TrustRequest`, the service answers with a frame holding a JSON
//! `TrustResponse` and closes. A frame is a 4-byte big-endian length
//! followed by that many payload bytes.

use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::api::handlers::AppState;
use crate::core::evaluate_request;
use crate::protocol::{TrustRequest, TrustResponse};

/// Maximum frame payload (1 MiB)
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame too large: {0} bytes (max {max})", max = MAX_FRAME_SIZE)]
    FrameTooLarge(usize),

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Invalid JSON record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write one length-prefixed frame
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or(TransportError::FrameTooLarge(payload.len()))?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);

    if len == 0 {
        return Err(TransportError::EmptyFrame);
    }
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge(len as usize));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Accept framed connections until the listener fails
///
/// Each connection is served on its own task.
pub async fn serve_framed(listener: TcpListener, state: Arc<AppState>) -> Result<(), TransportError> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Framed transport listening");
    }

    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &state).await {
                warn!(peer = %peer, error = %e, "Framed connection dropped");
            }
        });
    }
}

/// Serve a single request on an accepted connection
pub async fn handle_connection(mut stream: TcpStream, state: &AppState) -> Result<(), TransportError> {
    let payload = read_frame(&mut stream).await?;
    let request: TrustRequest = serde_json::from_slice(&payload)?;
    debug!(
        requesting = %request.requesting_enclave_tag,
        evidence_type = %request.submitted_evidence_type,
        bytes = payload.len(),
        "Framed request received"
    );

    let response = evaluate_request(state, &request).await;
    write_frame(&mut stream, &serde_json::to_vec(&response)?).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Send a request over the framed transport and wait for the response
pub async fn request_framed<A: ToSocketAddrs>(
    addr: A,
    request: &TrustRequest,
) -> Result<TrustResponse, TransportError> {
    let mut stream = TcpStream::connect(addr).await?;
    write_frame(&mut stream, &serde_json::to_vec(request)?).await?;
    let payload = read_frame(&mut stream).await?;
    Ok(serde_json::from_slice(&payload)?)
}
