use signal_hook::{
    consts::{SIGCONT, SIGHUP, SIGINT, SIGTERM, SIGTSTP},
    iterator::{Handle, Signals},
};

use std::io;
use std::thread;

use super::{Lifecycle, Notifier, RunnerMsg};

fn lifecycle_for(signal: i32) -> Option<Lifecycle> {
    match signal {
        SIGINT => Some(Lifecycle::Interrupt),
        SIGTERM => Some(Lifecycle::Terminate),
        SIGTSTP => Some(Lifecycle::Suspend),
        SIGCONT => Some(Lifecycle::Resume),
        SIGHUP => Some(Lifecycle::Reload),
        _ => None,
    }
}

/// Deliver INT, TERM, TSTP, CONT and HUP to the runner as lifecycle notifications.
///
/// Close the returned handle to stop the forwarding thread.
pub fn forward_signals(notifier: Notifier) -> io::Result<Handle> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGTSTP, SIGCONT, SIGHUP])?;
    let handle = signals.handle();
    thread::Builder::new()
        .name("fnkeyd-signals".into())
        .spawn(move || {
            for signal in &mut signals {
                let Some(lifecycle) = lifecycle_for(signal) else {
                    continue;
                };
                log::debug!("received signal {signal}: {lifecycle:?}");
                if notifier.send(RunnerMsg::Lifecycle(lifecycle)).is_err() {
                    break;
                }
            }
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_map_to_lifecycle() {
        assert_eq!(lifecycle_for(SIGINT), Some(Lifecycle::Interrupt));
        assert_eq!(lifecycle_for(SIGTERM), Some(Lifecycle::Terminate));
        assert_eq!(lifecycle_for(SIGTSTP), Some(Lifecycle::Suspend));
        assert_eq!(lifecycle_for(SIGCONT), Some(Lifecycle::Resume));
        assert_eq!(lifecycle_for(SIGHUP), Some(Lifecycle::Reload));
        assert_eq!(lifecycle_for(signal_hook::consts::SIGUSR1), None);
    }
}
