pub mod install;
pub mod network;

pub use install::{
    ConsolePrompt, DeferredPrompt, InstallFlow, InstallOutcome, InstallResponder, PendingInstall,
    QueuedPrompt,
};
pub use network::{probe, ConnectivityEvent, NetworkMonitor, NetworkStatus};
