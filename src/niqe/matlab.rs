use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use super::engine::{EngineError, EngineSession, FitRequest, QualityEngine};

const OK_SENTINEL: &str = "__OODLAB_OK__";
const ERR_SENTINEL: &str = "__OODLAB_ERR__";

/// MATLAB driven as a child process over stdin/stdout.
#[derive(Debug, Clone)]
pub struct MatlabEngine {
    program: PathBuf,
    args: Vec<String>,
}

impl MatlabEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: ["-nodesktop", "-nosplash", "-nodisplay"].map(String::from).to_vec(),
        }
    }

    /// Replace the default command-line flags.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl QualityEngine for MatlabEngine {
    type Session = MatlabSession;

    fn open(&self) -> Result<MatlabSession, EngineError> {
        let program = self.program.display().to_string();
        log::info!("Starting {program}");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Disconnected { command: program });
        };

        Ok(MatlabSession {
            child: Some(child),
            stdin,
            stdout: BufReader::new(stdout),
            list_file: None,
        })
    }
}

/// A running MATLAB process. Dropping an unclosed session kills it.
pub struct MatlabSession {
    child: Option<Child>,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    list_file: Option<tempfile::NamedTempFile>,
}

/// Single-quoted MATLAB char literal.
fn matlab_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Wrap `command` so exactly one sentinel line is printed when it finishes.
fn wrap_command(command: &str) -> String {
    format!(
        "try; {command} fprintf('{OK_SENTINEL}\\n'); catch err; fprintf('{ERR_SENTINEL} %s\\n', err.message); end"
    )
}

/// Strip the interactive `>>` prompts MATLAB prefixes to output lines.
fn strip_prompt(line: &str) -> &str {
    let mut text = line.trim();
    while let Some(rest) = text.strip_prefix(">>") {
        text = rest.trim_start();
    }
    text
}

/// Consume output until a line that is exactly a sentinel (after any prompt);
/// other lines are engine chatter and are logged.
fn read_reply<R: BufRead>(reader: &mut R, command: &str) -> Result<(), EngineError> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(EngineError::Disconnected {
                command: command.to_string(),
            });
        }
        let text = strip_prompt(&line);
        if text == OK_SENTINEL {
            return Ok(());
        }
        if let Some(message) = text.strip_prefix(ERR_SENTINEL) {
            return Err(EngineError::Command {
                command: command.to_string(),
                message: message.trim().to_string(),
            });
        }
        if !text.is_empty() {
            log::debug!("matlab: {text}");
        }
    }
}

impl MatlabSession {
    fn eval(&mut self, command: &str) -> Result<(), EngineError> {
        log::debug!("matlab <- {command}");
        writeln!(self.stdin, "{}", wrap_command(command))?;
        self.stdin.flush()?;
        read_reply(&mut self.stdout, command)
    }
}

impl EngineSession for MatlabSession {
    fn build_collection(&mut self, paths: &[PathBuf]) -> Result<(), EngineError> {
        let mut list = tempfile::Builder::new()
            .prefix("oodlab_paths_")
            .suffix(".txt")
            .tempfile()?;
        for p in paths {
            writeln!(list, "{}", p.display())?;
        }
        list.flush()?;

        let command = format!(
            "filePaths = strtrim(splitlines(fileread({}))); \
             filePaths = filePaths(~cellfun('isempty', filePaths)); \
             imds = imageDatastore(filePaths);",
            matlab_str(&list.path().display().to_string())
        );
        self.list_file = Some(list);
        self.eval(&command)
    }

    fn fit(&mut self, request: &FitRequest) -> Result<(), EngineError> {
        let b = request.block_size;
        self.eval(&format!(
            "model = fitniqe(imds, 'BlockSize', [{b} {b}], 'SharpnessThreshold', {});",
            request.sharpness_threshold
        ))
    }

    fn save_model(&mut self, path: &Path) -> Result<(), EngineError> {
        self.eval(&format!("save({}, 'model');", matlab_str(&path.display().to_string())))
    }

    fn close(mut self) -> Result<(), EngineError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        // stdin may already be gone if the process died
        let _ = writeln!(self.stdin, "exit").and_then(|_| self.stdin.flush());
        let status = child.wait()?;
        log::info!("MATLAB session closed");
        if status.success() {
            Ok(())
        } else {
            Err(EngineError::ExitStatus(status))
        }
    }
}

impl Drop for MatlabSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            log::warn!("Killing unclosed MATLAB session");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
