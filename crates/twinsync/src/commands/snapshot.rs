//! `twinsync snapshot`: wait for feature data, print it once, exit.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::ProgressBar;

use twinsync_core::{Connector, Snapshot};

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: &SnapshotArgs,
    connector: &Connector,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut snapshots = connector.store().subscribe();
    connector.start();

    let spinner = if global.quiet || !std::io::stderr().is_terminal() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_message(format!("waiting for {}", connector.config().root_id));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };

    let arrived =
        tokio::time::timeout(args.wait, snapshots.wait_for(Snapshot::has_features)).await;
    spinner.finish_and_clear();

    let snapshot = match arrived {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => snapshots.latest(),
        Err(_) if args.strict => {
            connector.stop().await;
            return Err(CliError::Timeout {
                seconds: args.wait.as_secs(),
            });
        }
        Err(_) => {
            tracing::warn!(
                state = %connector.state(),
                wait = %humantime::format_duration(args.wait),
                "no feature data before the deadline, printing what arrived"
            );
            snapshots.latest()
        }
    };
    connector.stop().await;

    let out = output::render_snapshot(global.output, &snapshot)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
