//! Reading events from a line-oriented input.
//!
//! Each non-blank line is `<type> <data>`: the type is everything up to the
//! first whitespace, the data is the rest with leading whitespace removed.
//! Data may be empty or contain further spaces.

use std::future::Future;

use beacon_core::{Batcher, Store, Transport};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// Split a line into an event type and its data.
///
/// Returns `None` for blank lines and `#` comments.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((event_type, data)) => Some((event_type, data.trim_start())),
        None => Some((line, "")),
    }
}

/// Track every line of `reader` until EOF, a read error, or `shutdown`.
///
/// A line that is not valid UTF-8 is skipped. A read error ends input the
/// same way EOF does, so the caller always gets to close the batcher.
/// Returns the number of events tracked.
pub async fn track_lines<R, S, T, F>(mut reader: R, batcher: &Batcher<S, T>, shutdown: F) -> usize
where
    R: AsyncBufRead + Unpin,
    S: Store,
    T: Transport,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    let mut buf = Vec::new();
    let mut tracked: usize = 0;

    loop {
        buf.clear();
        tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => {
                    info!("input closed");
                    break;
                }
                Ok(_) => match std::str::from_utf8(&buf) {
                    Ok(line) => {
                        if let Some((event_type, data)) = parse_line(line) {
                            batcher.track(event_type, data);
                            tracked = tracked.saturating_add(1);
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping line that is not valid UTF-8"),
                },
                Err(e) => {
                    warn!(error = %e, "failed to read input, shutting down");
                    break;
                }
            },
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for interrupt, shutting down");
                } else {
                    info!("interrupt received");
                }
                break;
            }
        }
    }

    tracked
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use beacon_core::{BatcherConfig, MemoryStore, TransportError};
    use tokio::io::{AsyncRead, BufReader, ReadBuf};

    use super::*;

    const KEY: &str = "pendingEvents";

    /// Transport for tests that close before any cooldown fires.
    struct NeverTransport;

    impl Transport for NeverTransport {
        async fn submit(&self, _payload: Vec<u8>) -> Result<(), TransportError> {
            Err(TransportError::Request("unused".to_owned()))
        }
    }

    /// Yields `data` once, then fails every read.
    struct FailAfter {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for FailAfter {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(std::io::Error::other("input went away"))),
            }
        }
    }

    fn open(store: &Arc<MemoryStore>) -> Batcher<Arc<MemoryStore>, NeverTransport> {
        Batcher::open(BatcherConfig::default(), Arc::clone(store), NeverTransport).unwrap()
    }

    #[test]
    fn splits_at_first_whitespace() {
        assert_eq!(parse_line("click btn1"), Some(("click", "btn1")));
        assert_eq!(
            parse_line("search  red shoes size 9"),
            Some(("search", "red shoes size 9"))
        );
        assert_eq!(parse_line("purchase\t{\"sku\":7}"), Some(("purchase", "{\"sku\":7}")));
    }

    #[test]
    fn type_only_line_has_empty_data() {
        assert_eq!(parse_line("app_start"), Some(("app_start", "")));
        assert_eq!(parse_line("  app_start  \n"), Some(("app_start", "")));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   \t"), None);
        assert_eq!(parse_line("# replayed from yesterday"), None);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_skipped_and_later_lines_still_tracked() {
        let store = Arc::new(MemoryStore::new());
        let batcher = open(&store);
        let input: &[u8] = b"click a\n\xff\xfe\nclick b\n";

        let tracked = track_lines(input, &batcher, std::future::pending()).await;
        assert_eq!(tracked, 2);

        assert_eq!(batcher.close().unwrap(), 2);
        assert_eq!(
            store.get_string(KEY).as_deref(),
            Some(r#"{"events":[{"type":"click","data":"a"},{"type":"click","data":"b"}]}"#)
        );
    }

    #[tokio::test]
    async fn read_error_ends_input_and_events_survive_close() {
        let store = Arc::new(MemoryStore::new());
        let batcher = open(&store);
        let input = BufReader::new(FailAfter {
            data: Some(b"click a\nclick b\n"),
        });

        let tracked = track_lines(input, &batcher, std::future::pending()).await;
        assert_eq!(tracked, 2);

        assert_eq!(batcher.close().unwrap(), 2);
        assert_eq!(
            store.get_string(KEY).as_deref(),
            Some(r#"{"events":[{"type":"click","data":"a"},{"type":"click","data":"b"}]}"#)
        );
    }

    #[tokio::test]
    async fn shutdown_signal_stops_reading() {
        let store = Arc::new(MemoryStore::new());
        let batcher = open(&store);
        let (_writer, reader) = tokio::io::duplex(64);

        let tracked = track_lines(BufReader::new(reader), &batcher, async { Ok(()) }).await;
        assert_eq!(tracked, 0);
        assert_eq!(batcher.close().unwrap(), 0);
    }
}
