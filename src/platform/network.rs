use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{select, Receiver, Sender};

use crate::config::NetworkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

#[derive(Debug, Clone)]
pub struct NetworkStatus {
    online: Arc<AtomicBool>,
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn apply(&self, event: ConnectivityEvent) -> bool {
        let online = event == ConnectivityEvent::Online;
        self.online.swap(online, Ordering::SeqCst) != online
    }
}

pub fn probe(addr: &str, timeout: Duration) -> bool {
    let addrs: Vec<SocketAddr> = match addr.to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(err) => {
            tracing::debug!(%addr, ?err, "connectivity probe could not resolve address");
            return false;
        }
    };
    addrs
        .iter()
        .any(|target| TcpStream::connect_timeout(target, timeout).is_ok())
}

pub struct NetworkMonitor {
    events: Receiver<ConnectivityEvent>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl NetworkMonitor {
    pub fn spawn(status: NetworkStatus, config: &NetworkConfig) -> Result<Self> {
        let addr = config.probe_addr.clone();
        let timeout = config.timeout();
        Self::spawn_with(status, config.probe_interval, move || probe(&addr, timeout))
    }

    pub fn spawn_with<F>(status: NetworkStatus, interval: Duration, check: F) -> Result<Self>
    where
        F: Fn() -> bool + Send + 'static,
    {
        let (event_tx, events) = crossbeam_channel::unbounded();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let ticker = crossbeam_channel::tick(interval);
        let handle = thread::Builder::new()
            .name("network-monitor".into())
            .spawn(move || {
                let publish = |online: bool| {
                    let event = if online {
                        ConnectivityEvent::Online
                    } else {
                        ConnectivityEvent::Offline
                    };
                    if status.apply(event) {
                        tracing::info!(?event, "connectivity changed");
                        let _ = event_tx.send(event);
                    }
                };
                publish(check());
                loop {
                    select! {
                        recv(ticker) -> _ => publish(check()),
                        recv(stop_rx) -> _ => break,
                    }
                }
            })
            .context("spawning network monitor thread")?;
        Ok(Self {
            events,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn events(&self) -> &Receiver<ConnectivityEvent> {
        &self.events
    }

    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("network monitor thread panicked");
            }
        }
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn apply_reports_only_transitions() {
        let status = NetworkStatus::new(true);
        assert!(!status.apply(ConnectivityEvent::Online));
        assert!(status.apply(ConnectivityEvent::Offline));
        assert!(!status.is_online());
        assert!(status.clone().apply(ConnectivityEvent::Online));
        assert!(status.is_online());
    }

    #[test]
    fn probe_reaches_local_listener() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?.to_string();
        assert!(probe(&addr, Duration::from_millis(500)));
        assert!(!probe("not an address", Duration::from_millis(50)));
        Ok(())
    }

    #[test]
    fn monitor_publishes_connectivity_changes() -> anyhow::Result<()> {
        let reachable = Arc::new(AtomicBool::new(false));
        let flag = reachable.clone();
        let status = NetworkStatus::new(true);
        let mut monitor = NetworkMonitor::spawn_with(
            status.clone(),
            Duration::from_millis(10),
            move || flag.load(Ordering::SeqCst),
        )?;

        let first = monitor.events().recv_timeout(Duration::from_secs(2))?;
        assert_eq!(first, ConnectivityEvent::Offline);
        assert!(!status.is_online());

        reachable.store(true, Ordering::SeqCst);
        let second = monitor.events().recv_timeout(Duration::from_secs(2))?;
        assert_eq!(second, ConnectivityEvent::Online);
        assert!(status.is_online());

        monitor.stop();
        Ok(())
    }
}
