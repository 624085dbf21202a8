//! 자식 프로세스 I/O 태스크
//!
//! - [`read_lines`]: stdout/stderr 를 줄 단위로 디코딩해 파서 채널로 전달
//! - [`LineTail`]: 크래시 진단용 stderr 최근 라인 버퍼
//! - [`StdinWriter`]: stdin 을 소유하는 단일 writer 태스크의 핸들

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use warden_core::types::{OutputLine, StreamKind};

/// 스트림을 EOF 까지 읽어 라인 단위로 전달합니다.
///
/// 종결자가 없는 조각은 다음 `\n`이 올 때까지 버퍼에 남고,
/// EOF 시점에 남은 조각은 마지막 라인으로 전달됩니다.
/// 수신측이 닫혀도 자식 프로세스가 파이프에서 막히지 않도록 EOF 까지 계속 읽습니다.
///
/// 전달한 라인 수를 반환합니다.
pub(crate) async fn read_lines<R>(
    reader: R,
    stream: StreamKind,
    line_tx: mpsc::Sender<OutputLine>,
    tail: Option<Arc<LineTail>>,
) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut forwarded = 0u64;
    let mut receiver_open = true;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = decode_line(&buf);
                if let Some(tail) = &tail {
                    tail.push(&text);
                }
                if receiver_open {
                    if line_tx.send(OutputLine::new(stream, text)).await.is_ok() {
                        forwarded += 1;
                    } else {
                        tracing::warn!(%stream, "line receiver dropped, discarding further output");
                        receiver_open = false;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%stream, error = %e, "failed to read server output");
                break;
            }
        }
    }

    tracing::debug!(%stream, lines = forwarded, "output reader finished");
    forwarded
}

/// 줄 끝 문자를 제거하고 UTF-8 로 디코딩합니다. 잘못된 바이트는 U+FFFD 로 치환됩니다.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// 고정 용량 라인 버퍼 (오래된 라인부터 제거)
#[derive(Debug)]
pub struct LineTail {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LineTail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, line: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.to_owned());
    }

    /// 보관 중인 라인 (오래된 순)
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

struct WriteRequest {
    text: String,
    done: oneshot::Sender<io::Result<()>>,
}

/// stdin writer 태스크 핸들
///
/// 요청은 도착 순서대로 기록되며, `write_line`은 기록과 flush 가 끝난 뒤 반환합니다.
/// 쓰기가 한 번 실패하면 태스크는 종료되고 이후 요청은 `BrokenPipe`로 실패합니다.
#[derive(Clone)]
pub(crate) struct StdinWriter {
    tx: mpsc::Sender<WriteRequest>,
}

impl StdinWriter {
    pub(crate) fn spawn<W>(mut writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<WriteRequest>(64);
        let task = tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let result = write_line(&mut writer, &req.text).await;
                let failed = result.is_err();
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "stdin write failed, closing writer");
                }
                let _ = req.done.send(result);
                if failed {
                    break;
                }
            }
        });
        (Self { tx }, task)
    }

    pub(crate) async fn write_line(&self, text: &str) -> io::Result<()> {
        let (done, result) = oneshot::channel();
        self.tx
            .send(WriteRequest {
                text: text.to_owned(),
                done,
            })
            .await
            .map_err(|_| closed())?;
        result.await.map_err(|_| closed())?
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stdin writer is closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn collect(input: &'static [u8], tail: Option<Arc<LineTail>>) -> Vec<String> {
        let (tx, mut rx) = mpsc::channel(16);
        let count = read_lines(input, StreamKind::Stdout, tx, tail).await;
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(line.text);
        }
        assert_eq!(count as usize, out.len());
        out
    }

    #[tokio::test]
    async fn splits_lines_and_strips_terminators() {
        let lines = collect(b"first\nsecond\r\nthird\n", None).await;
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn trailing_partial_line_is_flushed_at_eof() {
        let lines = collect(b"done\npartial", None).await;
        assert_eq!(lines, vec!["done", "partial"]);
    }

    #[tokio::test]
    async fn empty_lines_are_kept() {
        let lines = collect(b"a\n\nb\n", None).await;
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let lines = collect(b"caf\xff\n", None).await;
        assert_eq!(lines, vec!["caf\u{fffd}"]);
    }

    #[tokio::test]
    async fn partial_line_is_held_until_terminator() {
        let (mut server, client) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::channel(16);
        let reader = tokio::spawn(read_lines(client, StreamKind::Stderr, tx, None));

        server.write_all(b"hel").await.unwrap();
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        server.write_all(b"lo\n").await.unwrap();
        let line = rx.recv().await.unwrap();
        assert_eq!(line.text, "hello");
        assert_eq!(line.stream, StreamKind::Stderr);

        drop(server);
        assert_eq!(reader.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reader_keeps_draining_after_receiver_drop() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let tail = Arc::new(LineTail::new(10));
        let count = read_lines(
            &b"a\nb\nc\n"[..],
            StreamKind::Stderr,
            tx,
            Some(Arc::clone(&tail)),
        )
        .await;
        assert_eq!(count, 0);
        assert_eq!(tail.snapshot(), vec!["a", "b", "c"]);
    }

    #[test]
    fn line_tail_evicts_oldest() {
        let tail = LineTail::new(2);
        tail.push("one");
        tail.push("two");
        tail.push("three");
        assert_eq!(tail.snapshot(), vec!["two", "three"]);
        tail.clear();
        assert!(tail.snapshot().is_empty());
    }

    #[tokio::test]
    async fn stdin_writer_appends_newline_in_order() {
        let (client, mut server) = tokio::io::duplex(256);
        let (writer, task) = StdinWriter::spawn(client);

        writer.write_line("list").await.unwrap();
        writer.write_line("say hi").await.unwrap();
        drop(writer);
        task.await.unwrap();

        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "list\nsay hi\n");
    }

    #[tokio::test]
    async fn stdin_writer_reports_broken_pipe() {
        let (client, server) = tokio::io::duplex(16);
        drop(server);
        let (writer, task) = StdinWriter::spawn(client);

        let err = writer.write_line("stop").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        task.await.unwrap();
        let err = writer.write_line("again").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
