//! External command processor.
//!
//! The document is written to the command's stdin as one JSON object. The
//! command answers with zero or more JSON documents on stdout (one per line,
//! or simply concatenated). Arguments may use `{url}` and `{content_type}`
//! placeholders.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::models::Document;
use crate::pipeline::{DocumentProcessor, ProcessorError, Reporter};

use super::mimetype_matches;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Command to execute.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Content types sent to the command (supports wildcards like "text/*").
    /// Other documents pass through untouched. Empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_types: Vec<String>,
    /// Timeout in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    300
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            name: None,
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            content_types: Vec::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Bridges documents through an external analyzer process.
pub struct CommandProcessor {
    name: String,
    config: CommandConfig,
}

impl CommandProcessor {
    pub fn new(name: String, config: CommandConfig) -> Result<Self, ConfigError> {
        if config.command.trim().is_empty() {
            return Err(ConfigError::Processor {
                name,
                message: "command must not be empty".to_string(),
            });
        }
        Ok(Self { name, config })
    }

    fn applies_to(&self, doc: &Document) -> bool {
        if self.config.content_types.is_empty() {
            return true;
        }
        let mime = doc.content_type.as_deref().unwrap_or("");
        self.config
            .content_types
            .iter()
            .any(|pattern| mimetype_matches(pattern, mime))
    }

    /// Replace placeholders in an argument.
    fn expand_arg(&self, arg: &str, doc: &Document) -> String {
        arg.replace("{url}", &doc.url)
            .replace("{content_type}", doc.content_type.as_deref().unwrap_or(""))
    }

    fn build_args(&self, doc: &Document) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| self.expand_arg(arg, doc))
            .collect()
    }

    fn run(&self, doc: &Document) -> Result<Vec<u8>, ProcessorError> {
        let input = serde_json::to_vec(doc)?;

        let mut child = Command::new(&self.config.command)
            .args(self.build_args(doc))
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ProcessorError::CommandFailed(format!(
                    "failed to run {}: {}",
                    self.config.command, e
                ))
            })?;

        // Feed stdin and drain the output pipes on their own threads so a
        // chatty command cannot block on a full pipe.
        let stdin = child.stdin.take();
        let writer = thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input)?;
            }
            Ok(())
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_seconds);
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessorError::Timeout(self.config.timeout_seconds));
            }
            thread::sleep(Duration::from_millis(10));
        };

        match writer.join() {
            Ok(Ok(())) => {}
            // The command may exit without reading its input.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ProcessorError::CommandFailed(
                    "stdin writer panicked".to_string(),
                ))
            }
        }
        let stdout = join_output(stdout)?;
        let stderr = join_output(stderr)?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(ProcessorError::CommandFailed(format!(
                "{} failed (exit code {:?}): {}",
                self.config.command,
                status.code(),
                stderr.lines().take(5).collect::<Vec<_>>().join("\n")
            )));
        }

        Ok(stdout)
    }
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> thread::JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_output(
    handle: thread::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, ProcessorError> {
    handle
        .join()
        .map_err(|_| ProcessorError::CommandFailed("output reader panicked".to_string()))?
        .map_err(ProcessorError::from)
}

impl DocumentProcessor for CommandProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &mut self,
        doc: Document,
        reporter: &dyn Reporter,
    ) -> Result<Vec<Document>, ProcessorError> {
        if !self.applies_to(&doc) {
            return Ok(vec![doc]);
        }

        let start = Instant::now();
        let output = self.run(&doc)?;
        let docs = serde_json::Deserializer::from_slice(&output)
            .into_iter::<Document>()
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            "{} returned {} document(s) for {} in {}ms",
            self.name,
            docs.len(),
            doc.url,
            start.elapsed().as_millis()
        );
        reporter.incr(&format!("{}.calls", self.name), 1);
        Ok(docs)
    }
}
