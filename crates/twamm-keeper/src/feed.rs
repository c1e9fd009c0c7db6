//! Line-delimited JSON action feed for a running keeper.
//!
//! Each non-empty line is one [`Action`]. Malformed lines are logged and
//! skipped; the feed ends at end of input or once the keeper stops receiving.
//! Reading happens on a plain thread, so a pending read never holds up the
//! async runtime's shutdown.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::error::KeeperResult;

/// Pending actions buffered between the feed and the keeper loop
pub const ACTION_QUEUE_DEPTH: usize = 64;

/// Parse actions from `reader` into `sender`; returns how many were forwarded.
///
/// Blocks the calling thread; never call it from inside the runtime.
pub fn forward_actions<R: BufRead>(reader: R, sender: &mpsc::Sender<Action>) -> KeeperResult<usize> {
    let mut forwarded = 0;

    for raw in reader.lines() {
        let raw = raw?;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Action>(line) {
            Ok(action) => {
                debug!(action = action.name(), "action received");
                if sender.blocking_send(action).is_err() {
                    debug!("keeper stopped receiving actions");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!(error = %e, line, "skipping malformed action"),
        }
    }

    info!(forwarded, "action feed closed");
    Ok(forwarded)
}

/// Forward actions read from standard input on a dedicated thread
pub fn spawn_stdin_feed(sender: mpsc::Sender<Action>) -> JoinHandle<KeeperResult<usize>> {
    thread::spawn(move || forward_actions(std::io::stdin().lock(), &sender))
}
