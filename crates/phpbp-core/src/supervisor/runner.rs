use tokio::sync::mpsc;

use super::process::{ProcessExit, ProcessSpec};
use crate::{BuildpackError, Result};

/// Exit status reported when a supervised process ends
pub const FATAL_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Exited(String),
    Fatal { name: String, code: i32 },
}

type Rendezvous = (mpsc::Sender<ProcessExit>, mpsc::Receiver<ProcessExit>);

/// Runs two daemons and returns as soon as either one ends.
///
/// Each process posts to a single-slot rendezvous when it terminates. Posts
/// never block and are dropped once the slot is taken, so exactly one name
/// ends the run. The surviving process is left alone.
pub struct Supervisor {
    state: SupervisorState,
    history: Vec<SupervisorState>,
    pids: Vec<(String, u32)>,
    rendezvous: Option<Rendezvous>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            history: vec![SupervisorState::Idle],
            pids: Vec::new(),
            rendezvous: None,
        }
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Every state entered so far, oldest first
    pub fn history(&self) -> &[SupervisorState] {
        &self.history
    }

    /// Processes started, with their OS pids
    pub fn pids(&self) -> &[(String, u32)] {
        &self.pids
    }

    fn transition(&mut self, next: SupervisorState) {
        log::debug!("Supervisor {:?} -> {:?}", self.state, next);
        self.state = next.clone();
        self.history.push(next);
    }

    /// Idle → Starting
    pub fn begin(&mut self) -> Result<()> {
        if self.state != SupervisorState::Idle {
            return Err(BuildpackError::Supervisor(format!(
                "cannot start from {:?}",
                self.state
            )));
        }

        self.rendezvous = Some(mpsc::channel(1));
        self.transition(SupervisorState::Starting);
        Ok(())
    }

    /// Start both processes and wait for the first one to end
    pub async fn run(&mut self, first: ProcessSpec, second: ProcessSpec) -> Result<ProcessExit> {
        if self.state == SupervisorState::Idle {
            self.begin()?;
        }

        let (tx, mut rx) = match (&self.state, self.rendezvous.take()) {
            (SupervisorState::Starting, Some(rendezvous)) => rendezvous,
            _ => {
                return Err(BuildpackError::Supervisor(format!(
                    "cannot run from {:?}",
                    self.state
                )))
            }
        };

        self.launch(first, tx.clone());
        self.launch(second, tx);
        self.transition(SupervisorState::Running);

        let exit = rx
            .recv()
            .await
            .ok_or_else(|| BuildpackError::Supervisor("no process reported an exit".to_string()))?;

        log::debug!("First exit: {}", exit);
        self.transition(SupervisorState::Exited(exit.name.clone()));
        self.transition(SupervisorState::Fatal {
            name: exit.name.clone(),
            code: FATAL_EXIT_CODE,
        });

        Ok(exit)
    }

    fn launch(&mut self, spec: ProcessSpec, tx: mpsc::Sender<ProcessExit>) {
        let name = spec.name.clone();

        let mut child = match spec.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                log::error!("Failed to start {}: {}", name, e);
                let _ = tx.try_send(ProcessExit { name, status: None });
                return;
            }
        };

        if let Some(pid) = child.id() {
            log::info!("Started {} (pid {})", name, pid);
            self.pids.push((name.clone(), pid));
        }

        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(status) => Some(status),
                Err(e) => {
                    log::warn!("Lost track of {}: {}", name, e);
                    None
                }
            };

            if tx.try_send(ProcessExit { name, status }).is_err() {
                log::debug!("Rendezvous already taken");
            }
        });
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(name: &str, script: &str) -> ProcessSpec {
        ProcessSpec::new(name, "/bin/sh").arg("-c").arg(script)
    }

    fn is_alive(pid: u32) -> bool {
        std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn kill(pid: u32) {
        let _ = std::process::Command::new("kill").arg(pid.to_string()).status();
    }

    fn pid_of(supervisor: &Supervisor, name: &str) -> u32 {
        supervisor
            .pids()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, pid)| *pid)
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_exit_is_fatal_and_sibling_survives() {
        let mut supervisor = Supervisor::new();
        let exit = supervisor
            .run(sh("A", "exit 1"), sh("B", "sleep 30"))
            .await
            .unwrap();

        assert_eq!(exit.name, "A");
        assert_eq!(exit.status.and_then(|s| s.code()), Some(1));
        assert_eq!(
            supervisor.state(),
            &SupervisorState::Fatal { name: "A".to_string(), code: 1 }
        );
        assert_eq!(
            supervisor.history(),
            &[
                SupervisorState::Idle,
                SupervisorState::Starting,
                SupervisorState::Running,
                SupervisorState::Exited("A".to_string()),
                SupervisorState::Fatal { name: "A".to_string(), code: 1 },
            ]
        );

        let b = pid_of(&supervisor, "B");
        assert!(is_alive(b));
        kill(b);
    }

    #[tokio::test]
    async fn test_delayed_exit_of_second_process() {
        let mut supervisor = Supervisor::new();
        let exit = supervisor
            .run(sh("A", "sleep 5"), sh("B", "sleep 0.2; exit 0"))
            .await
            .unwrap();

        assert_eq!(exit.name, "B");
        assert_eq!(supervisor.state(), &SupervisorState::Fatal { name: "B".to_string(), code: 1 });
        kill(pid_of(&supervisor, "A"));
    }

    #[tokio::test]
    async fn test_simultaneous_exit_reports_exactly_one() {
        let mut supervisor = Supervisor::new();
        let exit = supervisor
            .run(sh("A", "exit 0"), sh("B", "exit 0"))
            .await
            .unwrap();

        assert!(exit.name == "A" || exit.name == "B");
        let exits = supervisor
            .history()
            .iter()
            .filter(|s| matches!(s, SupervisorState::Exited(_)))
            .count();
        assert_eq!(exits, 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_counts_as_exit() {
        let mut supervisor = Supervisor::new();
        let exit = supervisor
            .run(ProcessSpec::new("nginx", "/nonexistent/sbin/nginx"), sh("php-fpm", "sleep 30"))
            .await
            .unwrap();

        assert_eq!(exit.name, "nginx");
        assert!(exit.status.is_none());
        kill(pid_of(&supervisor, "php-fpm"));
    }

    #[tokio::test]
    async fn test_cannot_run_twice() {
        let mut supervisor = Supervisor::new();
        supervisor.run(sh("A", "exit 0"), sh("B", "exit 0")).await.unwrap();

        let err = supervisor.run(sh("A", "exit 0"), sh("B", "exit 0")).await.unwrap_err();
        assert!(matches!(err, BuildpackError::Supervisor(_)));
        assert!(supervisor.begin().is_err());
    }
}
