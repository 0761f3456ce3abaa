use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::auth::AuthClient;
use crate::error::FrameError;

/// Upper bound on a single disk write; the body is never buffered whole.
const WRITE_CHUNK_BYTES: usize = 512;

/// Streams `uri` to `dest`. No internal retry: the auth-specific retry lives
/// in [`AuthClient`], everything else is the caller's decision.
pub async fn download(client: &AuthClient, uri: &str, dest: &Path) -> Result<(), FrameError> {
    debug!(%uri, dest = %dest.display(), "downloading image");
    let mut response = client.get(uri, &[]).await?;
    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = response.chunk().await? {
        // Keep-alive artifacts arrive as empty chunks.
        if chunk.is_empty() {
            continue;
        }
        for piece in chunk.chunks(WRITE_CHUNK_BYTES) {
            file.write_all(piece).await?;
        }
    }
    file.flush().await?;
    debug!(dest = %dest.display(), "download complete");
    Ok(())
}
