//! Input file polling.
//!
//! There is no inotify dependency on the deployment substrate, so the
//! watcher polls the declarative input files and turns content changes
//! into [`Event`]s. A periodic [`Event::UpdateStatus`] keeps the reported
//! status fresh even when nothing changes.

use crate::controller::Event;
use crate::error::ControllerError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How many poll ticks between status refreshes.
const STATUS_EVERY_TICKS: u32 = 12;

/// Polls the input files and feeds the controller's event channel.
#[derive(Debug)]
pub struct InputWatcher {
    config_file: PathBuf,
    sources_file: PathBuf,
    peer_file: PathBuf,
    interval: Duration,
    events: mpsc::Sender<Event>,
    config_digest: Option<[u8; 32]>,
    sources_digest: Option<[u8; 32]>,
    peer_digest: Option<[u8; 32]>,
}

impl InputWatcher {
    /// Create a watcher over the three input files.
    ///
    /// Baseline digests are taken here, synchronously, so a change made
    /// after construction is observed even if the polling task has not
    /// started running yet.
    pub fn new(
        config_file: PathBuf,
        sources_file: PathBuf,
        peer_file: PathBuf,
        interval: Duration,
        events: mpsc::Sender<Event>,
    ) -> Self {
        let config_digest = file_digest(&config_file);
        let sources_digest = file_digest(&sources_file);
        let peer_digest = file_digest(&peer_file);
        Self {
            config_file,
            sources_file,
            peer_file,
            interval,
            events,
            config_digest,
            sources_digest,
            peer_digest,
        }
    }

    /// Runs until the receiving side of the event channel is dropped.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!(
            "Watching {} and {} every {:?}",
            self.config_file.display(),
            self.sources_file.display(),
            self.interval
        );
        let mut ticks: u32 = 0;

        loop {
            tokio::time::sleep(self.interval).await;
            ticks = ticks.wrapping_add(1);

            for (path, seen, event) in [
                (&self.config_file, &mut self.config_digest, Event::ConfigChanged),
                (&self.sources_file, &mut self.sources_digest, Event::SourcesChanged),
                (&self.peer_file, &mut self.peer_digest, Event::PeerChanged),
            ] {
                let current = file_digest(path);
                if current != *seen {
                    debug!("{} changed, emitting {event:?}", path.display());
                    *seen = current;
                    if self.events.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }

            if ticks % STATUS_EVERY_TICKS == 0
                && self.events.send(Event::UpdateStatus).await.is_err()
            {
                return Ok(());
            }
        }
    }
}

/// Content digest of a file, `None` when absent or unreadable. A file that
/// briefly cannot be read registers as a change twice, which only costs a
/// redundant reconciliation pass.
fn file_digest(path: &Path) -> Option<[u8; 32]> {
    let bytes = std::fs::read(path).ok()?;
    Some(Sha256::digest(&bytes).into())
}
