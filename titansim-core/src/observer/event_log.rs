//! Event log observer recording every applied action as JSONL.
//!
//! One line per action, numbered from 1 in the order the game applied them:
//!
//! ```json
//! {"seq":1,"action":{"JoinGame":{"game_name":"g","playername":"p0"}}}
//! ```
//!
//! Ephemeral actions are logged too; they are part of what happened even
//! though the history drops them.

use super::{GameObserver, ObserverError};
use crate::action::Action;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

#[derive(Serialize)]
struct LogLine<'a> {
    seq: u64,
    action: &'a Action,
}

struct LogState {
    writer: Box<dyn Write + Send>,
    seq: u64,
}

/// Observer that logs actions as JSONL to any `Write` destination.
///
/// # Example
///
/// ```ignore
/// let observer = EventLogObserver::file("game.jsonl")?;
/// game.register_observer(Box::new(observer));
/// ```
pub struct EventLogObserver {
    state: Mutex<LogState>,
}

impl EventLogObserver {
    /// Buffered stdout, for piping to `jq` and friends.
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(std::io::stdout())))
    }

    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            state: Mutex::new(LogState { writer, seq: 0 }),
        }
    }
}

impl GameObserver for EventLogObserver {
    fn on_action(&self, action: &Action) -> Result<(), ObserverError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ObserverError::Lock("EventLogObserver writer lock poisoned".into()))?;
        state.seq += 1;
        let line = LogLine {
            seq: state.seq,
            action,
        };
        serde_json::to_writer(&mut state.writer, &line)?;
        writeln!(state.writer)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "EventLogObserver"
    }

    fn on_shutdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    fn capture_output() -> Arc<Mutex<Cursor<Vec<u8>>>> {
        Arc::new(Mutex::new(Cursor::new(Vec::new())))
    }

    /// Helper struct to capture output through Arc<Mutex<Cursor>>
    struct OutputCapture(Arc<Mutex<Cursor<Vec<u8>>>>);

    impl Write for OutputCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.lock().unwrap().flush()
        }
    }

    fn output_lines(output: &Arc<Mutex<Cursor<Vec<u8>>>>) -> Vec<String> {
        let bytes = output.lock().unwrap().get_ref().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_actions_logged_in_order() {
        let output = capture_output();
        let observer = EventLogObserver::new(Box::new(OutputCapture(output.clone())));

        let join = Action::JoinGame {
            game_name: "g".into(),
            playername: "p0".into(),
        };
        let chat = Action::Chat {
            game_name: "g".into(),
            playername: "p0".into(),
            message: "hello".into(),
        };
        observer.on_action(&join).unwrap();
        observer.on_action(&chat).unwrap();
        observer.on_shutdown();

        let lines = output_lines(&output);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"seq":1,"action":{"JoinGame":"#));
        assert!(lines[1].contains(r#""seq":2"#));
        assert!(lines[1].contains(r#""message":"hello""#));
    }

    #[test]
    fn test_lines_parse_back() {
        let output = capture_output();
        let observer = EventLogObserver::new(Box::new(OutputCapture(output.clone())));
        let recruit = Action::RecruitCreature {
            game_name: "g".into(),
            playername: "p0".into(),
            markerid: "Rd02".into(),
            creature_name: "Troll".into(),
            recruiter_names: vec!["Ogre".into(), "Ogre".into()],
        };
        observer.on_action(&recruit).unwrap();

        let lines = output_lines(&output);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        let parsed: Action = serde_json::from_value(value["action"].clone()).unwrap();
        assert_eq!(parsed, recruit);
    }

    #[test]
    fn test_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let observer = EventLogObserver::file(&path).unwrap();
        observer
            .on_action(&Action::Withdraw {
                game_name: "g".into(),
                playername: "p1".into(),
            })
            .unwrap();
        observer.on_shutdown();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("Withdraw"));
    }
}
