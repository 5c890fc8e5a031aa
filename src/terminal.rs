//! Interactive shell sessions inside workloads, bridged to the client
//! message channel.
//!
//! Per terminal id: one tty exec channel, spawned reader loops pushing raw
//! output chunks to the session's destination, and a lock-guarded writer path
//! for input and resize. The session table is the only shared state; entries
//! are removed when the exec channel itself closes — there is no
//! client-initiated close message.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::api::{AttachParams, TerminalSize};
use kube::{Api, Client};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::bus::MessageBus;
use crate::error::Result;

// ── registry ──────────────────────────────────────────────────────────────────

/// Client-facing entry point: connect / input / resize per terminal id.
pub struct TerminalRegistry {
    client: Client,
    namespace: String,
    workspace_root: String,
    table: SessionTable,
}

impl TerminalRegistry {
    pub fn new(
        client: Client,
        namespace: impl Into<String>,
        workspace_root: impl Into<String>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            workspace_root: workspace_root.into(),
            table: SessionTable::new(bus),
        }
    }

    /// Opens a tty login shell in the workload's running pod and registers
    /// the session. Output flows to `destination` until the channel closes.
    /// Failure to open publishes a diagnostic there and leaves no entry.
    pub async fn connect(
        &self,
        workload: &str,
        terminal_id: &str,
        destination: &str,
    ) -> Result<()> {
        let attach = async {
            let pod_name =
                crate::cluster::running_pod(&self.client, &self.namespace, workload).await?;
            let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);

            let shell = format!(
                "cd {} && TERM=xterm-256color; export TERM; [ -x /bin/bash ] && /bin/bash || /bin/sh",
                shell_words::quote(&self.workspace_root)
            );

            pods.exec(
                &pod_name,
                vec!["sh", "-c", shell.as_str()],
                &AttachParams::interactive_tty(),
            )
            .await
            .map_err(crate::error::Error::from)
        };

        let mut attached = match attach.await {
            Ok(attached) => attached,
            Err(e) => {
                log::warn!("terminal: connect {terminal_id} failed: {e}");
                self.table
                    .bus
                    .publish(destination, &format!("Connection failed: {e}"))
                    .await;
                return Err(e);
            }
        };

        let stdin: Box<dyn AsyncWrite + Send + Unpin> = match attached.stdin() {
            Some(stdin) => Box::new(stdin),
            None => Box::new(tokio::io::sink()),
        };
        // kube hands back a futures-channel sender; bridge it to the tokio
        // sender the session table stores.
        let resize = attached.terminal_size().map(|mut upstream| {
            let (tx, mut rx) = mpsc::channel::<TerminalSize>(4);
            tokio::spawn(async move {
                while let Some(size) = rx.recv().await {
                    if std::future::poll_fn(|cx| upstream.poll_ready(cx))
                        .await
                        .is_err()
                        || upstream.start_send(size).is_err()
                    {
                        break;
                    }
                }
            });
            tx
        });

        self.table
            .register(terminal_id, destination, stdin, resize)
            .await;

        if let Some(stdout) = attached.stdout() {
            self.table.spawn_reader(stdout, "OUTPUT", destination);
        }
        // With a tty the server merges stderr into stdout and this stream is
        // absent; it exists only on non-tty channels.
        if let Some(stderr) = attached.stderr() {
            self.table.spawn_reader(stderr, "ERROR", destination);
        }

        self.table.watch_close(terminal_id, async move {
            let _ = attached.join().await;
        });

        log::info!("terminal: session {terminal_id} connected to {workload}");
        Ok(())
    }

    pub async fn input(&self, terminal_id: &str, data: &str) {
        self.table.input(terminal_id, data).await;
    }

    pub async fn resize(&self, terminal_id: &str, cols: u16, rows: u16) {
        self.table.resize(terminal_id, cols, rows).await;
    }

    pub async fn contains(&self, terminal_id: &str) -> bool {
        self.table.contains(terminal_id).await
    }
}

// ── session table ─────────────────────────────────────────────────────────────

/// Terminal id → live session. Insert/lookup/remove happen from arbitrary
/// worker tasks; the outer lock is held only for map access, never across IO.
struct SessionTable {
    bus: Arc<dyn MessageBus>,
    sessions: Arc<RwLock<HashMap<String, Arc<TerminalSession>>>>,
}

struct TerminalSession {
    destination: String,
    /// Guards input writes and resize signals; concurrent senders serialize
    /// here. Output delivery is unordered relative to them.
    io: Mutex<SessionIo>,
}

struct SessionIo {
    stdin: Box<dyn AsyncWrite + Send + Unpin>,
    resize: Option<mpsc::Sender<TerminalSize>>,
}

impl SessionTable {
    fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn register(
        &self,
        terminal_id: &str,
        destination: &str,
        stdin: Box<dyn AsyncWrite + Send + Unpin>,
        resize: Option<mpsc::Sender<TerminalSize>>,
    ) {
        let session = Arc::new(TerminalSession {
            destination: destination.to_string(),
            io: Mutex::new(SessionIo { stdin, resize }),
        });
        self.sessions
            .write()
            .await
            .insert(terminal_id.to_string(), session);
    }

    async fn contains(&self, terminal_id: &str) -> bool {
        self.sessions.read().await.contains_key(terminal_id)
    }

    async fn get(&self, terminal_id: &str) -> Option<Arc<TerminalSession>> {
        self.sessions.read().await.get(terminal_id).cloned()
    }

    /// Unknown terminal ids are dropped silently; a write failure becomes a
    /// diagnostic line on the session's own output destination.
    async fn input(&self, terminal_id: &str, data: &str) {
        let Some(session) = self.get(terminal_id).await else {
            return;
        };

        let mut io = session.io.lock().await;
        let write = async {
            io.stdin.write_all(data.as_bytes()).await?;
            io.stdin.flush().await
        };
        if let Err(e) = write.await {
            self.bus
                .publish(&session.destination, &format!("\n[INPUT WRITE ERROR] {e}"))
                .await;
        }
    }

    async fn resize(&self, terminal_id: &str, cols: u16, rows: u16) {
        let Some(session) = self.get(terminal_id).await else {
            return;
        };

        let io = session.io.lock().await;
        let sent = match &io.resize {
            Some(tx) => tx
                .send(TerminalSize {
                    width: cols,
                    height: rows,
                })
                .await
                .map_err(|e| e.to_string()),
            None => Err("channel has no tty".to_string()),
        };
        drop(io);

        if let Err(e) = sent {
            self.bus
                .publish(&session.destination, &format!("\n[RESIZE ERROR] {e}"))
                .await;
        }
    }

    /// Forwards raw output chunks until end-of-stream. A read error puts a
    /// diagnostic on the destination; either way the loop just ends — only
    /// the close watcher removes the table entry.
    fn spawn_reader(
        &self,
        stream: impl AsyncRead + Send + Unpin + 'static,
        label: &'static str,
        destination: &str,
    ) {
        let bus = self.bus.clone();
        let destination = destination.to_string();

        tokio::spawn(async move {
            let mut stream = stream;
            let mut buf = [0u8; 1024];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        bus.publish(&destination, &String::from_utf8_lossy(&buf[..n]))
                            .await;
                    }
                    Err(e) => {
                        bus.publish(&destination, &format!("\n[{label} READ ERROR] {e}"))
                            .await;
                        break;
                    }
                }
            }
        });
    }

    /// Removes the session once the exec channel reports close/failure.
    fn watch_close(&self, terminal_id: &str, closed: impl Future<Output = ()> + Send + 'static) {
        let sessions = self.sessions.clone();
        let terminal_id = terminal_id.to_string();

        tokio::spawn(async move {
            closed.await;
            log::info!("terminal: session {terminal_id} closed");
            sessions.write().await.remove(&terminal_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncReadExt};
    use tokio::sync::oneshot;

    use crate::bus::testing::RecordingBus;

    use super::*;

    const DEST: &str = "/sub/groups/1/projects/2/terminal/t-1";

    fn table(bus: Arc<RecordingBus>) -> SessionTable {
        SessionTable::new(bus)
    }

    async fn register_duplex(
        table: &SessionTable,
        id: &str,
    ) -> (tokio::io::DuplexStream, mpsc::Receiver<TerminalSize>) {
        let (ours, theirs) = duplex(256);
        let (resize_tx, resize_rx) = mpsc::channel(4);
        table
            .register(id, DEST, Box::new(ours), Some(resize_tx))
            .await;
        (theirs, resize_rx)
    }

    #[tokio::test]
    async fn register_then_close_removes_entry() {
        let t = table(Arc::new(RecordingBus::default()));
        let _io = register_duplex(&t, "t-1").await;
        assert!(t.contains("t-1").await);

        let (done_tx, done_rx) = oneshot::channel::<()>();
        t.watch_close("t-1", async move {
            let _ = done_rx.await;
        });
        assert!(t.contains("t-1").await);

        done_tx.send(()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!t.contains("t-1").await);
    }

    #[tokio::test]
    async fn input_reaches_session_stdin() {
        let t = table(Arc::new(RecordingBus::default()));
        let (mut remote, _resize) = register_duplex(&t, "t-1").await;

        t.input("t-1", "ls -al\n").await;

        let mut buf = [0u8; 16];
        let n = remote.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ls -al\n");
    }

    #[tokio::test]
    async fn input_on_absent_id_is_a_noop() {
        let bus = Arc::new(RecordingBus::default());
        let t = table(bus.clone());

        t.input("ghost", "whoami\n").await;
        assert!(bus.messages().is_empty());
    }

    #[tokio::test]
    async fn resize_forwards_dimensions() {
        let t = table(Arc::new(RecordingBus::default()));
        let (_remote, mut resize_rx) = register_duplex(&t, "t-1").await;

        t.resize("t-1", 120, 40).await;

        let size = resize_rx.recv().await.unwrap();
        assert_eq!(size.width, 120);
        assert_eq!(size.height, 40);
    }

    #[tokio::test]
    async fn resize_on_absent_id_is_a_noop() {
        let bus = Arc::new(RecordingBus::default());
        let t = table(bus.clone());

        t.resize("ghost", 80, 24).await;
        assert!(bus.messages().is_empty());
    }

    #[tokio::test]
    async fn resize_failure_publishes_diagnostic() {
        let bus = Arc::new(RecordingBus::default());
        let t = table(bus.clone());

        let (ours, _theirs) = duplex(64);
        let (resize_tx, resize_rx) = mpsc::channel(1);
        drop(resize_rx); // remote side gone
        t.register("t-1", DEST, Box::new(ours), Some(resize_tx))
            .await;

        t.resize("t-1", 80, 24).await;

        let messages = bus.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, DEST);
        assert!(messages[0].1.contains("[RESIZE ERROR]"));
    }

    #[tokio::test]
    async fn reader_publishes_chunks_then_stops_at_eof() {
        let bus = Arc::new(RecordingBus::default());
        let t = table(bus.clone());

        let (mut ours, theirs) = duplex(256);
        t.spawn_reader(theirs, "OUTPUT", DEST);

        use tokio::io::AsyncWriteExt;
        ours.write_all(b"hello$ ").await.unwrap();
        drop(ours);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let messages = bus.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], (DEST.to_string(), "hello$ ".to_string()));
    }
}
