//! The editing session, driven on a current-thread runtime. The editor lives on the driving
//! task, disk writes happen on the blocking pool.

use cardsmith_core::editor::{write_autosave, AutosavePayload};
use cardsmith_core::Editor;

use crate::global::SharedStore;

/// Write autosaves as they arrive. Only the newest queued payload is written, older ones are
/// stale by then. Failures are logged and otherwise ignored, the next write may succeed.
pub async fn autosave_worker(
    store: SharedStore,
    mut recv: tokio::sync::mpsc::Receiver<AutosavePayload>,
) {
    while let Some(mut payload) = recv.recv().await {
        while let Ok(newer) = recv.try_recv() {
            payload = newer;
        }
        let store = store.clone();
        let result =
            tokio::task::spawn_blocking(move || write_autosave(&*store, &payload)).await;
        match result {
            Ok(Ok(())) => log::trace!("Autosaved"),
            Ok(Err(e)) => log::warn!("Autosave failed: {e}"),
            Err(e) => log::error!("Autosave task died: {e}"),
        }
    }
}

/// Write every autosave the editor schedules, until nothing is pending.
pub async fn settle(
    editor: &mut Editor,
    send: &tokio::sync::mpsc::Sender<AutosavePayload>,
) -> anyhow::Result<()> {
    while let Some(deadline) = editor.autosave_deadline() {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        if let Some(payload) = editor.poll_autosave(std::time::Instant::now()) {
            send.send(payload)
                .await
                .map_err(|_| anyhow::anyhow!("Autosave worker exited"))?;
        }
    }
    Ok(())
}

/// Force out anything still pending, for shutdown.
pub async fn flush(
    editor: &mut Editor,
    send: &tokio::sync::mpsc::Sender<AutosavePayload>,
) -> anyhow::Result<()> {
    if let Some(payload) = editor.flush_now() {
        send.send(payload)
            .await
            .map_err(|_| anyhow::anyhow!("Autosave worker exited"))?;
    }
    Ok(())
}
