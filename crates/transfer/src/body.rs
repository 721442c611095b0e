use std::time::Instant;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::progress::{ProgressCallback, ProgressMeter};

/// Wraps a reader as a request-body stream that reports progress.
///
/// A snapshot is emitted each time the HTTP client pulls a chunk, so the
/// cadence is whatever the transport naturally delivers. The last chunk
/// reports `loaded == total` once.
pub fn progress_body<R>(
    reader: R,
    total: u64,
    chunk_size: usize,
    on_progress: ProgressCallback,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static
where
    R: AsyncRead + Send + Sync + 'static,
{
    let mut meter = ProgressMeter::new(total, Instant::now());
    let mut loaded: u64 = 0;

    ReaderStream::with_capacity(reader, chunk_size.max(1)).map(move |chunk| {
        if let Ok(bytes) = &chunk
            && !bytes.is_empty()
        {
            loaded += bytes.len() as u64;
            on_progress(meter.record(loaded, Instant::now()));
        }
        chunk
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use artifactdrop_protocol::ProgressSnapshot;

    fn collecting() -> (ProgressCallback, Arc<Mutex<Vec<ProgressSnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let cb: ProgressCallback = Box::new(move |p| s.lock().unwrap().push(p));
        (cb, seen)
    }

    #[tokio::test]
    async fn yields_all_bytes_in_chunks() {
        let data = b"AABBCCDDEE".to_vec();
        let (cb, seen) = collecting();
        let stream = progress_body(Cursor::new(data.clone()), 10, 4, cb);

        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.to_vec()).collect();
        assert_eq!(joined, data);

        let loaded: Vec<u64> = seen.lock().unwrap().iter().map(|p| p.loaded).collect();
        assert_eq!(loaded.len(), chunks.len());
        assert!(loaded.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(loaded.last(), Some(&10));
    }

    #[tokio::test]
    async fn final_snapshot_complete_exactly_once() {
        for (size, chunk) in [(1usize, 1usize), (7, 3), (4096, 1000), (5000, 5000)] {
            let (cb, seen) = collecting();
            let stream = progress_body(Cursor::new(vec![1u8; size]), size as u64, chunk, cb);
            let _: Vec<_> = stream.collect().await;

            let snaps = seen.lock().unwrap();
            let last = snaps.last().unwrap();
            assert_eq!(last.loaded, size as u64);
            assert_eq!(last.total, size as u64);
            assert_eq!(
                snaps.iter().filter(|p| p.percentage == 100).count(),
                1,
                "size {size} chunk {chunk}"
            );
            assert!(snaps.iter().all(|p| p.speed >= 0.0));
        }
    }
}
