use federation::Result;
use futures::{Stream, stream};
use log::debug;
use tokio::{sync::mpsc, task::JoinHandle};

/// How a log line is written to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One line per message.
    Plain,
    /// Server-Sent Events, `data: <message>` followed by a blank line.
    Sse,
}

impl Framing {
    pub fn frame(&self, line: &str) -> String {
        match self {
            Self::Plain => format!("{line}\n"),
            Self::Sse => format!("data: {line}\n\n"),
        }
    }
}

/// Drives `lines` on the blocking pool, forwarding every item through a bounded channel.
///
/// The producer stops after forwarding an error, or as soon as the receiver is dropped.
///
/// # Arguments
/// * `lines` - A lazy, potentially long running, sequence of log lines.
/// * `capacity` - How many lines may be buffered before the producer waits for the consumer.
///
/// # Returns
/// The receiving end of the channel and the producer's join handle.
pub fn spawn_producer<I>(lines: I, capacity: usize) -> (mpsc::Receiver<Result<String>>, JoinHandle<()>)
where
    I: Iterator<Item = Result<String>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        for line in lines {
            let failed = line.is_err();

            if tx.blocking_send(line).is_err() {
                debug!("log consumer went away, stopping the producer");
                return;
            }

            if failed {
                return;
            }
        }
    });

    (rx, handle)
}

/// Adapts the receiving end of a producer into a `Stream` of lines.
pub fn line_stream(rx: mpsc::Receiver<Result<String>>) -> impl Stream<Item = Result<String>> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|line| (line, rx)) })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use federation::FedErr;
    use futures::StreamExt;

    use super::*;

    #[test]
    fn test_sse_framing() {
        assert_eq!(Framing::Sse.frame("hello"), "data: hello\n\n");
        assert_eq!(Framing::Plain.frame("hello"), "hello\n");
    }

    #[tokio::test]
    async fn test_lines_arrive_in_order() {
        let lines = (0..5).map(|i| Ok(format!("line {i}")));
        let (rx, handle) = spawn_producer(lines, 2);

        let received: Vec<_> = line_stream(rx).map(|line| line.unwrap()).collect().await;
        handle.await.unwrap();

        assert_eq!(received, ["line 0", "line 1", "line 2", "line 3", "line 4"]);
    }

    #[tokio::test]
    async fn test_producer_stops_after_an_error() {
        let lines = vec![
            Ok("before".to_string()),
            Err(FedErr::EmptyAggregation),
            Ok("after".to_string()),
        ];
        let (rx, handle) = spawn_producer(lines.into_iter(), 4);

        let received: Vec<_> = line_stream(rx).collect().await;
        handle.await.unwrap();

        assert_eq!(received.len(), 2);
        assert!(matches!(received[1], Err(FedErr::EmptyAggregation)));
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_the_producer() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let lines = (0..).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("line {i}"))
        });

        let (mut rx, handle) = spawn_producer(lines, 1);
        rx.recv().await.unwrap().unwrap();
        drop(rx);
        handle.await.unwrap();

        assert!(pulled.load(Ordering::SeqCst) < 10);
    }
}
