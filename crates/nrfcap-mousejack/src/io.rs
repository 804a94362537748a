//! Session IO task: the single owner of an open dongle's transport.
//!
//! All USB transfers for a session -- control commands, their responses,
//! and frame polls -- run on this task, which serializes them by
//! construction. Control requests arrive over an `mpsc` channel and are
//! prioritized ahead of the idle frame poll, so a channel change queued
//! while a poll is mid-read applies before the next read. Shutdown is a
//! `CancellationToken` observed cooperatively between transfers; an
//! in-flight transfer completes or times out first.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use nrfcap_core::channel::Channel;
use nrfcap_core::error::{Error, Result};
use nrfcap_core::source::CapturedFrame;

use crate::protocol::CommandEngine;

/// Pause between empty frame polls, so an idle dongle does not pin a
/// blocking thread.
pub(crate) const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Read deadline for one frame poll. Short relative to the command
/// timeout so shutdown and queued commands stay responsive.
pub(crate) const FRAME_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A control request sent from session methods to the IO task.
pub(crate) enum Request {
    SetChannel {
        channel: Channel,
        reply: oneshot::Sender<Result<()>>,
    },
    EnterPromiscuous {
        prefix: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    EnterSniffer {
        address: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to the IO task. Stored inside [`Session`](crate::session::Session).
#[derive(Debug)]
pub(crate) struct SessionIo {
    pub cmd_tx: mpsc::Sender<Request>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl SessionIo {
    /// Send a control request and await its outcome.
    ///
    /// The safety-net timeout covers channel overhead on top of the
    /// transport-level deadline the IO task enforces internally.
    pub async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<()>>) -> Request,
        timeout: Duration,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::NotConnected)?;

        match tokio::time::timeout(timeout + Duration::from_millis(500), reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::Timeout),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the IO task for a configured engine.
///
/// The task owns the engine (and through it the transport) exclusively
/// until cancellation, then closes the transport and exits.
pub(crate) fn spawn_io_task(
    engine: CommandEngine,
    frame_tx: mpsc::Sender<CapturedFrame>,
    cancel: CancellationToken,
    poll_interval: Duration,
    read_timeout: Duration,
) -> SessionIo {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(32);
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(
        engine,
        cmd_rx,
        frame_tx,
        cancel_clone,
        poll_interval,
        read_timeout,
    ));

    SessionIo {
        cmd_tx,
        cancel,
        task,
    }
}

/// The capture loop. Runs as a spawned Tokio task.
///
/// `select! { biased; }` prioritizes:
/// 1. Cancellation (observed between transfers, never mid-transfer)
/// 2. Queued control requests
/// 3. The idle frame poll
///
/// Transfers execute in the arm bodies, not the polled futures, so a
/// transfer that has started always runs to completion or timeout.
async fn io_loop(
    mut engine: CommandEngine,
    mut cmd_rx: mpsc::Receiver<Request>,
    frame_tx: mpsc::Sender<CapturedFrame>,
    cancel: CancellationToken,
    poll_interval: Duration,
    read_timeout: Duration,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("capture session cancelled");
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(request) => dispatch(&mut engine, request).await,
                    None => {
                        debug!("all session handles dropped, exiting capture loop");
                        break;
                    }
                }
            }

            _ = tokio::time::sleep(poll_interval) => {
                match engine.receive_payload(read_timeout).await {
                    Ok(Some(bytes)) => {
                        if frame_tx.send(CapturedFrame { bytes }).await.is_err() {
                            debug!("frame receiver dropped, exiting capture loop");
                            break;
                        }
                    }
                    Ok(None) => {}
                    // A failed poll aborts that poll only; the session
                    // stays up and the next iteration tries again.
                    Err(e) => {
                        warn!(error = %e, "frame poll failed");
                    }
                }
            }
        }
    }

    if let Err(e) = engine.close().await {
        warn!(error = %e, "failed to close transport on shutdown");
    }
}

/// Execute one control request against the engine and reply.
async fn dispatch(engine: &mut CommandEngine, request: Request) {
    match request {
        Request::SetChannel { channel, reply } => {
            let result = engine.set_channel(channel).await;
            if let Err(ref e) = result {
                warn!(channel = %channel, error = %e, "set channel failed");
            }
            let _ = reply.send(result);
        }
        Request::EnterPromiscuous { prefix, reply } => {
            let result = engine.enter_promiscuous_mode(&prefix).await;
            let _ = reply.send(result);
        }
        Request::EnterSniffer { address, reply } => {
            let result = engine.enter_sniffer_mode(&address).await;
            let _ = reply.send(result);
        }
    }
}
