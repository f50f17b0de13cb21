use std::io::{self, BufRead, Write};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

pub trait DeferredPrompt {
    fn prompt(&mut self) -> Receiver<InstallOutcome>;
}

pub struct PendingInstall {
    rx: Receiver<InstallOutcome>,
}

impl PendingInstall {
    /// A prompt that goes away without answering counts as dismissed.
    pub fn wait(self) -> InstallOutcome {
        self.rx.recv().unwrap_or(InstallOutcome::Dismissed)
    }

    pub fn try_outcome(&self) -> Option<InstallOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(InstallOutcome::Dismissed),
        }
    }
}

#[derive(Default)]
pub struct InstallFlow {
    deferred: Option<Box<dyn DeferredPrompt>>,
}

impl InstallFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, prompt: Box<dyn DeferredPrompt>) {
        self.deferred = Some(prompt);
    }

    pub fn can_install(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn click(&mut self) -> Option<PendingInstall> {
        let prompt = self.deferred.as_mut()?;
        Some(PendingInstall {
            rx: prompt.prompt(),
        })
    }

    pub fn complete(&mut self, outcome: InstallOutcome) {
        if outcome == InstallOutcome::Accepted {
            self.deferred = None;
        }
    }

    pub fn click_and_wait(&mut self) -> Option<InstallOutcome> {
        let outcome = self.click()?.wait();
        self.complete(outcome);
        Some(outcome)
    }
}

pub struct ConsolePrompt {
    question: String,
}

impl ConsolePrompt {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

impl DeferredPrompt for ConsolePrompt {
    fn prompt(&mut self) -> Receiver<InstallOutcome> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let outcome = match ask(&self.question) {
            Ok(answer) => parse_answer(&answer),
            Err(err) => {
                tracing::warn!(?err, "install prompt failed");
                InstallOutcome::Dismissed
            }
        };
        let _ = tx.send(outcome);
        rx
    }
}

fn ask(question: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{question} [y/N] ")?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input)
}

fn parse_answer(answer: &str) -> InstallOutcome {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => InstallOutcome::Accepted,
        _ => InstallOutcome::Dismissed,
    }
}

pub struct InstallResponder {
    tx: Sender<InstallOutcome>,
}

impl InstallResponder {
    pub fn resolve(self, outcome: InstallOutcome) {
        let _ = self.tx.send(outcome);
    }
}

pub struct QueuedPrompt {
    requests: Sender<InstallResponder>,
}

impl QueuedPrompt {
    pub fn new() -> (Self, Receiver<InstallResponder>) {
        let (requests, rx) = crossbeam_channel::unbounded();
        (Self { requests }, rx)
    }
}

impl DeferredPrompt for QueuedPrompt {
    fn prompt(&mut self) -> Receiver<InstallOutcome> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        if self.requests.send(InstallResponder { tx }).is_err() {
            tracing::debug!("install prompt requested with nobody listening");
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(InstallOutcome);

    impl DeferredPrompt for Scripted {
        fn prompt(&mut self) -> Receiver<InstallOutcome> {
            let (tx, rx) = crossbeam_channel::bounded(1);
            tx.send(self.0).expect("send scripted outcome");
            rx
        }
    }

    #[test]
    fn no_offer_means_no_install_button() {
        let mut flow = InstallFlow::new();
        assert!(!flow.can_install());
        assert_eq!(flow.click_and_wait(), None);
    }

    #[test]
    fn dismissal_keeps_offer_and_acceptance_retires_it() {
        let mut flow = InstallFlow::new();
        flow.capture(Box::new(Scripted(InstallOutcome::Dismissed)));
        assert_eq!(flow.click_and_wait(), Some(InstallOutcome::Dismissed));
        assert!(flow.can_install());

        flow.capture(Box::new(Scripted(InstallOutcome::Accepted)));
        assert_eq!(flow.click_and_wait(), Some(InstallOutcome::Accepted));
        assert!(!flow.can_install());
    }

    #[test]
    fn queued_prompt_resolves_asynchronously() {
        let (prompt, requests) = QueuedPrompt::new();
        let mut flow = InstallFlow::new();
        flow.capture(Box::new(prompt));

        let pending = flow.click().expect("offer available");
        assert_eq!(pending.try_outcome(), None);

        let responder = requests.try_recv().expect("prompt request queued");
        responder.resolve(InstallOutcome::Accepted);

        let outcome = pending.try_outcome().expect("decided");
        flow.complete(outcome);
        assert!(!flow.can_install());
    }

    #[test]
    fn answers_parse_leniently() {
        assert_eq!(parse_answer("Y\n"), InstallOutcome::Accepted);
        assert_eq!(parse_answer(" yes "), InstallOutcome::Accepted);
        assert_eq!(parse_answer(""), InstallOutcome::Dismissed);
        assert_eq!(parse_answer("nope"), InstallOutcome::Dismissed);
    }
}
