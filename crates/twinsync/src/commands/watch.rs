//! `twinsync watch`: print every published snapshot until interrupted.

use twinsync_core::Connector;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: &WatchArgs,
    connector: &Connector,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut snapshots = connector.store().subscribe();
    let mut states = connector.connection_state();

    connector.start();

    let result = loop {
        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "cannot listen for ctrl-c");
                }
                tracing::info!("interrupted, stopping");
                break Ok(());
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *states.borrow_and_update();
                if args.states && !global.quiet {
                    eprintln!("{}", output::render_state(state, color));
                }
            }
            snapshot = snapshots.changed() => {
                let Some(snapshot) = snapshot else {
                    break Ok(());
                };
                if args.skip_empty && snapshot.is_empty() {
                    continue;
                }
                match output::render_snapshot(global.output, &snapshot) {
                    Ok(out) => output::print_output(&out, global.quiet),
                    Err(e) => break Err(e),
                }
            }
        }
    };

    connector.stop().await;
    result
}
