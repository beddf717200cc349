//! Minimal server-sent-events reader for the command stream. Each event's
//! data payload is one verbatim text chunk; `<br/>` sequences decode to
//! newlines (legacy backend encoding).

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::StreamEvent;

/// Drive one stream request to completion, forwarding decoded chunks.
/// Cancellation drops the connection; no further events are sent.
pub(crate) async fn run_stream(
    request: reqwest::RequestBuilder,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let resp = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            let _ = tx.send(StreamEvent::Failed(e.to_string())).await;
            return;
        }
    };
    if !resp.status().is_success() {
        let _ = tx
            .send(StreamEvent::Failed(format!("stream status {}", resp.status())))
            .await;
        return;
    }

    let mut body = resp.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("stream cancelled");
                return;
            }
            chunk = body.next() => chunk,
        };
        match chunk {
            Some(Ok(bytes)) => {
                buffer.extend_from_slice(&bytes);
                for data in drain_events(&mut buffer) {
                    if tx.send(StreamEvent::Chunk(data)).await.is_err() {
                        return; // receiver gone; session closed
                    }
                }
            }
            Some(Err(e)) => {
                let _ = tx.send(StreamEvent::Failed(e.to_string())).await;
                return;
            }
            None => {
                let _ = tx.send(StreamEvent::Closed).await;
                return;
            }
        }
    }
}

/// Drain all complete events (terminated by a blank line) from `buffer`,
/// returning their decoded data payloads. Incomplete trailing input stays
/// buffered as raw bytes: transport reads split at arbitrary byte
/// boundaries, so a multibyte codepoint may be incomplete until the next
/// read and must not be decoded early.
pub(crate) fn drain_events(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut events = Vec::new();
    while let Some(end) = buffer.windows(2).position(|w| w == b"\n\n") {
        let raw: Vec<u8> = buffer.drain(..end + 2).collect();
        // The terminator is ASCII, so a complete event is whole UTF-8.
        if let Some(data) = parse_event(&String::from_utf8_lossy(&raw)) {
            events.push(data);
        }
    }
    events
}

/// Extract the data payload of one raw event. Multiple `data:` lines join
/// with a newline, per the SSE spec; one leading space after the colon is
/// stripped. Events without data (comments, keepalives) yield None.
fn parse_event(raw: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(decode_chunk(&data_lines.join("\n")))
}

/// The backend escapes newlines inside a chunk as `<br/>`.
fn decode_chunk(data: &str) -> String {
    data.replace("<br/>", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn single_event_parses() {
        let mut buffer = buf("data: hello worl\n\n");
        assert_eq!(drain_events(&mut buffer), ["hello worl"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn incomplete_event_stays_buffered() {
        let mut buffer = buf("data: partial");
        assert!(drain_events(&mut buffer).is_empty());
        assert_eq!(buffer, b"data: partial");

        buffer.extend_from_slice(b" chunk\n\n");
        assert_eq!(drain_events(&mut buffer), ["partial chunk"]);
    }

    #[test]
    fn multiple_events_in_one_read() {
        let mut buffer = buf("data: one\n\ndata: two\n\ndata: thr");
        assert_eq!(drain_events(&mut buffer), ["one", "two"]);
        assert_eq!(buffer, b"data: thr");
    }

    #[test]
    fn only_one_leading_space_stripped() {
        // Chunk boundaries are arbitrary; interior spaces are data.
        let mut buffer = buf("data:  leading space kept\n\n");
        assert_eq!(drain_events(&mut buffer), [" leading space kept"]);
    }

    #[test]
    fn br_decodes_to_newline() {
        let mut buffer = buf("data: line one<br/>line two\n\n");
        assert_eq!(drain_events(&mut buffer), ["line one\nline two"]);
    }

    #[test]
    fn multiline_data_joins_with_newline() {
        let mut buffer = buf("data: first\ndata: second\n\n");
        assert_eq!(drain_events(&mut buffer), ["first\nsecond"]);
    }

    #[test]
    fn comment_events_skipped() {
        let mut buffer = buf(": keepalive\n\ndata: real\n\n");
        assert_eq!(drain_events(&mut buffer), ["real"]);
    }

    #[test]
    fn multibyte_codepoint_split_across_reads() {
        // "é" is 0xC3 0xA9; the transport may split between the two bytes.
        let mut buffer = buf("data: caf");
        buffer.push(0xC3);
        assert!(drain_events(&mut buffer).is_empty());

        buffer.push(0xA9);
        buffer.extend_from_slice(b"\n\n");
        assert_eq!(drain_events(&mut buffer), ["café"]);
    }

    #[test]
    fn marker_split_across_events_survives() {
        // The client does not interpret the marker; it must pass split
        // fragments through verbatim for the accumulated-buffer scan.
        let mut buffer = buf("data: request [AWAIT\n\ndata: ING_APPROVAL] now\n\n");
        let events = drain_events(&mut buffer);
        assert_eq!(events.concat(), "request [AWAITING_APPROVAL] now");
    }
}
