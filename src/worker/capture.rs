//! The worker's main loop: exec the remote command, then drain stdout to a file and stderr to
//! the log until the stop flag is set or the remote side hangs up.
//!
//! `russh`'s `Channel::wait()` already resolves only when there is something to act on, so it
//! plays the role the source's `epoll` registration played; wrapping each wait in a bounded
//! timeout gives the same "wake on data or hangup, with a bounded timeout" contract (spec §9)
//! without needing a raw descriptor and a separate readiness object.

use russh::ChannelMsg;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::CaptureKind;
use crate::config::WORKER_POLL_INTERVAL;
use crate::error::DumperError;
use crate::model::Host;
use crate::pool::ConnectionPool;

/// What happened as a result of processing one channel event.
enum Outcome {
    Continue,
    Hangup,
}

pub(super) async fn run(
    worker_name: String,
    kind: CaptureKind,
    pool: Arc<ConnectionPool>,
    host: Host,
    output_file: PathBuf,
    mut stop_rx: watch::Receiver<bool>,
    last_error: Arc<parking_lot::Mutex<Option<DumperError>>>,
) {
    let guard = match pool
        .scoped(&host.ssh_address, host.ssh_port, &host.username, &host.password)
        .await
    {
        Ok(guard) => guard,
        Err(err) => {
            error!(worker = %worker_name, "failed to acquire SSH lease: {err}");
            *last_error.lock() = Some(DumperError::from(err));
            return;
        }
    };

    let mut file = match File::create(&output_file).await {
        Ok(file) => file,
        Err(err) => {
            error!(worker = %worker_name, "failed to open output file {:?}: {err}", output_file);
            *last_error.lock() = Some(DumperError::FileOpenFailed(err.to_string()));
            guard.release().await;
            return;
        }
    };

    let command = kind.remote_command();
    let mut channel = match guard.transport().exec(&command).await {
        Ok(channel) => channel,
        Err(err) => {
            error!(worker = %worker_name, "exec failed for {:?}: {err}", command);
            *last_error.lock() = Some(DumperError::TransportError(err.to_string()));
            let _ = file.flush().await;
            guard.release().await;
            return;
        }
    };

    info!(worker = %worker_name, "started: {}", command);

    // If the remote command exits before we ever get to poll, that's an early termination
    // rather than an ordinary hangup — surface it distinctly, then stop.
    match tokio::time::timeout(WORKER_POLL_INTERVAL, channel.wait()).await {
        Ok(Some(ChannelMsg::ExitStatus { exit_status })) => {
            error!(worker = %worker_name, "remote command exited immediately with status {exit_status}");
            *last_error.lock() = Some(DumperError::EarlyTermination(exit_status));
            let _ = file.flush().await;
            guard.release().await;
            return;
        }
        Ok(Some(msg)) => {
            if let Outcome::Hangup =
                handle_message(msg, &mut file, &worker_name, &last_error).await
            {
                let _ = file.flush().await;
                guard.release().await;
                return;
            }
        }
        Ok(None) => {
            let _ = file.flush().await;
            guard.release().await;
            return;
        }
        Err(_) => {
            // No event within the first poll window; proceed into the regular loop.
        }
    }

    loop {
        if *stop_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            waited = tokio::time::timeout(WORKER_POLL_INTERVAL, channel.wait()) => {
                match waited {
                    Ok(Some(msg)) => {
                        if let Outcome::Hangup =
                            handle_message(msg, &mut file, &worker_name, &last_error).await
                        {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        // Poll timed out with no event; loop back around to re-check the stop flag.
                    }
                }
            }
        }
    }

    info!(worker = %worker_name, "stopped");
    // Ensure the final buffered chunk(s) reach disk before the file handle is dropped, and
    // surface a late write error instead of letting it pass silently (teacher does the same
    // after its own download loop, sftp/session.rs).
    if let Err(err) = file.flush().await {
        error!(worker = %worker_name, "failed to flush output file on exit: {err}");
        *last_error.lock() = Some(DumperError::TransportError(err.to_string()));
    }
    guard.release().await;
}

async fn handle_message(
    msg: ChannelMsg,
    file: &mut File,
    worker_name: &str,
    last_error: &Arc<parking_lot::Mutex<Option<DumperError>>>,
) -> Outcome {
    match msg {
        ChannelMsg::Data { data } => {
            if let Err(err) = file.write_all(&data).await {
                error!(worker = %worker_name, "failed writing to output file: {err}");
                *last_error.lock() = Some(DumperError::TransportError(err.to_string()));
                return Outcome::Hangup;
            }
            Outcome::Continue
        }
        ChannelMsg::ExtendedData { data, ext } if ext == 1 => {
            match std::str::from_utf8(&data) {
                Ok(text) => error!(worker = %worker_name, "{}", text.trim_end_matches(['\r', '\n'])),
                Err(_) => error!(worker = %worker_name, "{:?}", data.as_ref()),
            }
            Outcome::Continue
        }
        ChannelMsg::Eof | ChannelMsg::Close => {
            debug!(worker = %worker_name, "end of stream");
            Outcome::Hangup
        }
        _ => {
            debug!(worker = %worker_name, "ignoring unrelated channel event");
            Outcome::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcap_command_matches_spec_bit_exactly() {
        let kind = CaptureKind::Pcap {
            dumped_interface: "any".to_string(),
        };
        assert_eq!(
            kind.remote_command(),
            "tcpdump -i any -U -w - -f not tcp port 22"
        );
    }

    #[test]
    fn log_command_matches_spec_bit_exactly() {
        let kind = CaptureKind::Log {
            dumped_file: "/var/log/syslog".to_string(),
        };
        assert_eq!(
            kind.remote_command(),
            "tail --follow=name --retry --lines=1 /var/log/syslog"
        );
    }
}
