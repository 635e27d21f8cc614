use crate::dom::Document;
use crate::page::{Page, PageStats};
use crate::protocol::{Command, CommandChannel, Response};
use crate::store::PersistedState;
use crate::{EngineConfig, Error, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

type Mutation = Box<dyn FnOnce(&mut Document) + Send>;

enum Request {
    Command(Command, oneshot::Sender<Response>),
    Mutate(Mutation, oneshot::Sender<()>),
    Settle(oneshot::Sender<usize>),
    Snapshot(oneshot::Sender<String>),
    Stats(oneshot::Sender<PageStats>),
    Shutdown(oneshot::Sender<()>),
}

/// A page running on a dedicated worker thread.
///
/// The worker owns the [`Page`] and maps wall-clock time onto its virtual
/// clock, so debounced passes fire in real time. Handles are cheap to clone;
/// once the worker stops, every call fails with [`Error::Unreachable`].
#[derive(Clone)]
pub struct PageWorker {
    req_tx: Sender<Request>,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn catch_up(page: &mut Page, start: Instant) {
    let now = elapsed_ms(start);
    page.advance(now.saturating_sub(page.now()));
}

impl PageWorker {
    /// Parse `html`, start the engine with `persisted`, and hand the page to
    /// a background thread. Construction errors are reported here.
    pub fn spawn(html: String, config: EngineConfig, persisted: PersistedState) -> Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (init_tx, init_rx) = mpsc::channel::<Result<()>>();

        thread::spawn(move || {
            let mut page = match Page::from_html(&html, config, persisted) {
                Ok(p) => p,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));
            let start = Instant::now();

            loop {
                catch_up(&mut page, start);
                let request = match page.next_deadline() {
                    Some(deadline) => {
                        let wait = deadline.saturating_sub(page.now());
                        match req_rx.recv_timeout(Duration::from_millis(wait)) {
                            Ok(r) => r,
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    None => match req_rx.recv() {
                        Ok(r) => r,
                        Err(_) => break,
                    },
                };
                catch_up(&mut page, start);

                match request {
                    Request::Command(cmd, resp) => {
                        let _ = resp.send(page.dispatch(cmd));
                    }
                    Request::Mutate(f, resp) => {
                        f(page.document_mut());
                        page.flush();
                        let _ = resp.send(());
                    }
                    Request::Settle(resp) => {
                        let _ = resp.send(page.run_until_idle());
                    }
                    Request::Snapshot(resp) => {
                        let doc = page.document();
                        let _ = resp.send(doc.to_html(doc.root()));
                    }
                    Request::Stats(resp) => {
                        let _ = resp.send(page.stats().clone());
                    }
                    Request::Shutdown(resp) => {
                        let _ = resp.send(());
                        break;
                    }
                }
            }
            log::debug!("page worker stopped");
        });

        match init_rx.recv() {
            Ok(res) => res?,
            Err(e) => return Err(Error::Unreachable(format!("worker init canceled: {}", e))),
        }

        Ok(Self { req_tx })
    }

    fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<oneshot::Receiver<T>> {
        let (tx, rx) = oneshot::channel();
        self.req_tx
            .send(build(tx))
            .map_err(|_| Error::Unreachable("page worker stopped".to_string()))?;
        Ok(rx)
    }

    async fn call<T>(&self, what: &str, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        self.request(build)?
            .await
            .map_err(|e| Error::Unreachable(format!("{} canceled: {}", what, e)))
    }

    /// Deliver a command and wait for the page's answer
    pub async fn send(&self, command: Command) -> Result<Response> {
        let name = command.name();
        self.call(name, |tx| Request::Command(command, tx)).await
    }

    /// Same as [`send`](Self::send) for synchronous callers.
    ///
    /// Blocks the current thread; do not call from inside an async runtime.
    pub fn send_blocking(&self, command: Command) -> Result<Response> {
        let name = command.name();
        self.request(|tx| Request::Command(command, tx))?
            .blocking_recv()
            .map_err(|e| Error::Unreachable(format!("{} canceled: {}", name, e)))
    }

    /// Edit the document as the host application would
    pub async fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Document) + Send + 'static,
    {
        self.call("mutate", |tx| Request::Mutate(Box::new(f), tx)).await
    }

    /// Run pending debounced passes now instead of waiting for the timer.
    /// Returns how many passes ran.
    pub async fn settle(&self) -> Result<usize> {
        self.call("settle", Request::Settle).await
    }

    pub async fn snapshot_html(&self) -> Result<String> {
        self.call("snapshot", Request::Snapshot).await
    }

    pub async fn stats(&self) -> Result<PageStats> {
        self.call("stats", Request::Stats).await
    }

    /// Stop the worker thread. Other handles become unreachable.
    pub async fn shutdown(self) -> Result<()> {
        self.call("shutdown", Request::Shutdown).await
    }
}

impl CommandChannel for PageWorker {
    fn deliver(&mut self, command: Command) -> Result<Response> {
        self.send_blocking(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const PAGE: &str = r#"<html><head></head><body>
<d2l-card href="/d2l/home/10"><d2l-organization-name><template shadowrootmode="open">Geology</template></d2l-organization-name></d2l-card>
</body></html>"#;

    fn names(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_worker_relabels_late_cards() {
        let worker = PageWorker::spawn(PAGE.to_string(), EngineConfig::default(), PersistedState::default()).unwrap();
        let resp = worker
            .send(Command::ApplyNames {
                names: names(&[("10", "GEO 110"), ("11", "GEO 210")]),
            })
            .await
            .unwrap();
        assert!(resp.is_ok());

        worker
            .mutate(|doc| {
                let body = doc.first_by_tag(doc.root(), "body").unwrap();
                doc.insert_html(
                    body,
                    r#"<d2l-card href="/d2l/home/11"><d2l-organization-name><template shadowrootmode="open">Petrology</template></d2l-organization-name></d2l-card>"#,
                );
            })
            .await
            .unwrap();
        worker.settle().await.unwrap();

        let html = worker.snapshot_html().await.unwrap();
        assert!(html.contains("GEO 110"));
        assert!(html.contains("GEO 210"));
        assert!(!html.contains(">Petrology<"));
        assert!(worker.stats().await.unwrap().debounced_passes >= 1);
        assert_eq!(worker.settle().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stopped_worker_is_unreachable() {
        let worker = PageWorker::spawn(PAGE.to_string(), EngineConfig::default(), PersistedState::default()).unwrap();
        let other = worker.clone();
        worker.shutdown().await.unwrap();
        let err = other.send(Command::GetItems).await.unwrap_err();
        assert!(err.is_soft());
    }

    #[test]
    fn test_blocking_delivery() {
        let mut worker =
            PageWorker::spawn(PAGE.to_string(), EngineConfig::default(), PersistedState::default()).unwrap();
        match worker.deliver(Command::GetItems).unwrap() {
            Response::Items { items } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].original_label, "Geology");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
