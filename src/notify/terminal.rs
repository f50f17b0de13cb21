use std::io::{self, Write};

use crossbeam_channel::{Receiver, Sender};

use super::{
    Notification, NotificationOptions, Notifier, Permission, PermissionOutcome, PermissionRequest,
};

enum Sink {
    Stderr,
    Queue(Sender<Notification>),
}

pub struct TerminalNotifier {
    sink: Sink,
}

impl TerminalNotifier {
    pub fn stderr() -> Self {
        Self { sink: Sink::Stderr }
    }

    pub fn queued() -> (Self, Receiver<Notification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                sink: Sink::Queue(tx),
            },
            rx,
        )
    }
}

impl Notifier for TerminalNotifier {
    fn permission(&self) -> Permission {
        let stream = match self.sink {
            Sink::Stderr => atty::Stream::Stderr,
            Sink::Queue(_) => atty::Stream::Stdout,
        };
        if atty::is(stream) {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    fn request_permission(&self) -> PermissionRequest {
        let outcome = match self.permission() {
            Permission::Granted => PermissionOutcome::Granted,
            Permission::Default | Permission::Denied => PermissionOutcome::Denied,
        };
        PermissionRequest::resolved(outcome)
    }

    fn notify(&self, title: &str, options: &NotificationOptions) {
        tracing::info!(title, body = %options.body, icon = %options.icon, "notification");
        match &self.sink {
            Sink::Stderr => {
                let mut stderr = io::stderr().lock();
                let _ = writeln!(stderr, "\x07[{title}] {}", options.body);
            }
            Sink::Queue(tx) => {
                let _ = tx.send(Notification {
                    title: title.to_string(),
                    options: options.clone(),
                });
            }
        }
    }
}
