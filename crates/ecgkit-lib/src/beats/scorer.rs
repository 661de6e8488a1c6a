use crate::{
    beats::classify::BeatScorer,
    error::{AnalysisError, Result},
};
use log::{debug, error, info, warn};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

/// Scorer backed by an external program speaking line-delimited JSON.
///
/// Each beat is written to the child's stdin as one JSON array of samples per
/// line; stdin is then closed. The child must answer with one JSON array of class
/// probabilities per line on stdout, in the same order, and exit successfully.
///
/// With a timeout set, a scorer still running at the deadline is killed together
/// with anything it spawned. The process is also killed on every error path.
#[derive(Debug, Clone)]
pub struct CommandScorer {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl CommandScorer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn unavailable(&self, what: impl std::fmt::Display) -> AnalysisError {
        AnalysisError::ClassifierUnavailable(format!("{}: {}", self.program.display(), what))
    }

    fn timed_out(&self) -> AnalysisError {
        let secs = self.timeout.map_or(0.0, |t| t.as_secs_f64());
        self.unavailable(format!("scorer timed out after {secs:.1} s"))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }
}

/// Owns the running scorer; kills and reaps it unless it exited on its own.
struct ScorerProcess {
    child: Child,
    reaped: bool,
}

impl ScorerProcess {
    /// Wait for exit, giving up at `deadline`.
    fn wait_until(&mut self, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
        let Some(deadline) = deadline else {
            let status = self.child.wait()?;
            self.reaped = true;
            return Ok(Some(status));
        };
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.reaped = true;
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        kill_process_group(self.child.id());
        if let Err(e) = self.child.kill() {
            debug!("scorer {} already gone: {}", self.child.id(), e);
        }
        match self.child.wait() {
            Ok(status) => debug!("scorer {} stopped: {}", self.child.id(), status),
            Err(e) => warn!("could not reap scorer {}: {}", self.child.id(), e),
        }
        self.reaped = true;
    }
}

impl Drop for ScorerProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// The scorer leads its own process group, so this reaches its children too.
#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let status = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pgid}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        warn!("could not signal scorer group {}: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

impl BeatScorer for CommandScorer {
    fn score(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let mut payload = Vec::new();
        for beat in batch {
            serde_json::to_writer(&mut payload, beat)?;
            payload.push(b'\n');
        }

        info!(
            "scoring {} beats with {}",
            batch.len(),
            self.program.display()
        );
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let child = self
            .command()
            .spawn()
            .map_err(|e| self.unavailable(format!("failed to start: {e}")))?;
        let mut process = ScorerProcess {
            child,
            reaped: false,
        };

        let mut stdin = process
            .child
            .stdin
            .take()
            .ok_or_else(|| self.unavailable("stdin not captured"))?;
        let stdout = process
            .child
            .stdout
            .take()
            .ok_or_else(|| self.unavailable("stdout not captured"))?;
        let writer = thread::spawn(move || stdin.write_all(&payload));
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut scores = Vec::with_capacity(batch.len());
        let mut lineno = 0;
        loop {
            let next = match deadline {
                Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected),
            };
            let line = match next {
                Ok(line) => line.map_err(|e| self.unavailable(format!("read failed: {e}")))?,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => return Err(self.timed_out()),
            };
            lineno += 1;
            if line.trim().is_empty() {
                continue;
            }
            let probs: Vec<f64> = serde_json::from_str(&line).map_err(|e| {
                error!("unparseable scorer output line {}: {}", lineno, e);
                self.unavailable(format!("bad output on line {lineno}: {e}"))
            })?;
            scores.push(probs);
        }

        let status = process
            .wait_until(deadline)
            .map_err(|e| self.unavailable(format!("wait failed: {e}")))?
            .ok_or_else(|| self.timed_out())?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("scorer closed stdin early: {}", e),
            Err(_) => return Err(self.unavailable("stdin writer panicked")),
        }
        if !status.success() {
            return Err(self.unavailable(format!("exited with {status}")));
        }
        Ok(scores)
    }
}

/// Bounds how long any scorer may take.
///
/// The inner scorer runs on a worker thread; on timeout the call returns
/// `ClassifierUnavailable` and the worker is abandoned. An in-process scorer
/// cannot be interrupted, so external programs should rely on
/// [`CommandScorer::with_timeout`], which kills the process instead.
pub struct TimeoutScorer<S> {
    inner: Arc<S>,
    timeout: Duration,
}

impl<S> TimeoutScorer<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }
}

impl<S> BeatScorer for TimeoutScorer<S>
where
    S: BeatScorer + Send + Sync + 'static,
{
    fn score(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let batch = batch.to_vec();
        thread::spawn(move || {
            // The receiver may be gone after a timeout.
            let _ = tx.send(inner.score(&batch));
        });
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(AnalysisError::ClassifierUnavailable(
                format!("scorer timed out after {:.1} s", self.timeout.as_secs_f64()),
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(
                AnalysisError::ClassifierUnavailable("scorer worker panicked".into()),
            ),
        }
    }
}
