//! Wire formats exchanged with the system under test
//!
//! Data payloads are line-oriented text with a configurable field separator:
//!
//! - training: `<header><sep><header>` then `<index><sep><row>` per row
//! - task: `<sep><header>` then `<task id><sep><row without target>`
//! - answer: `<task id><sep><predicted value>`
//!
//! Commands travel on a separate fanout exchange as
//! `[u32 BE session length][session][command byte][data...]`.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Errors raised while decoding payloads and commands
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// Payload bytes are not UTF-8
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// Answer has no separator between id and value
    #[error("missing separator in {0:?}")]
    MissingSeparator(String),

    /// Task id is not a non-negative integer
    #[error("invalid task id {0:?}")]
    InvalidTaskId(String),

    /// Predicted value is not a number
    #[error("invalid predicted value {0:?}")]
    InvalidValue(String),

    /// Command frame shorter than its declared layout
    #[error("truncated command frame: {0}")]
    TruncatedCommand(String),
}

/// A unit of test work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Index of the row within the test partition
    pub id: usize,
    /// Test row with its target column removed
    pub row: String,
}

/// A decoded answer message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Answer {
    /// Task the system is answering
    pub task_id: usize,
    /// Predicted target value
    pub value: f64,
}

/// Remove the target (last) column of a dataset row
///
/// Returns `None` when the row has no file separator, i.e. no recoverable
/// target column. Remaining separators are rewritten to the message
/// separator when the two differ.
pub fn strip_target(row: &str, file_sep: char, message_sep: char) -> Option<String> {
    let pos = row.rfind(file_sep)?;
    let features = &row[..pos];
    if file_sep == message_sep {
        Some(features.to_string())
    } else {
        Some(features.replace(file_sep, &message_sep.to_string()))
    }
}

/// Read the expected target value of a dataset row
///
/// Returns `None` when the row has no separator, an empty target, or a
/// target that is not a number.
pub fn expected_value(row: &str, file_sep: char) -> Option<f64> {
    let pos = row.rfind(file_sep)?;
    let target = row[pos + file_sep.len_utf8()..].trim();
    if target.is_empty() {
        return None;
    }
    target.parse().ok()
}

/// Build the training payload
pub fn encode_training(header: &str, rows: &[String], sep: char) -> String {
    let mut payload = String::with_capacity(
        header.len() * 2 + rows.iter().map(|r| r.len() + 8).sum::<usize>(),
    );
    payload.push_str(header);
    payload.push(sep);
    payload.push_str(header);
    for (index, row) in rows.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = write!(payload, "\n{}{}{}", index, sep, row);
    }
    payload
}

/// Build a task payload
pub fn encode_task(header: &str, task: &Task, sep: char) -> String {
    format!("{sep}{header}\n{}{sep}{}", task.id, task.row)
}

/// Decode an answer payload
///
/// Surrounding whitespace is ignored. Fields after the value are ignored.
pub fn parse_answer(payload: &[u8], sep: char) -> Result<Answer, ProtocolError> {
    let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
    let text = text.trim();

    let mut fields = text.split(sep);
    let id_field = fields.next().unwrap_or_default().trim();
    let value_field = fields
        .next()
        .ok_or_else(|| ProtocolError::MissingSeparator(text.to_string()))?
        .trim();

    let task_id = id_field
        .parse::<usize>()
        .map_err(|_| ProtocolError::InvalidTaskId(id_field.to_string()))?;
    let value = value_field
        .parse::<f64>()
        .map_err(|_| ProtocolError::InvalidValue(value_field.to_string()))?;

    Ok(Answer { task_id, value })
}

/// Encode an answer payload
pub fn encode_answer(task_id: usize, value: f64, sep: char) -> String {
    format!("{}{}{}", task_id, sep, value)
}

/// Commands exchanged on the control exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// The system is connected and ready
    SystemReady,
    /// The controller is connected and ready
    BenchmarkReady,
    /// Task generation may start
    TaskGeneratorStart,
    /// The controller finished; data carries the result model
    BenchmarkFinished,
    /// No further tasks will be sent
    TaskGenerationFinished,
    /// The platform asks the controller to begin
    StartBenchmark,
    /// A component reports a fatal error
    ReportError,
    /// The system finished its learning phase
    LearningFinished,
    /// Any other command byte
    Other(u8),
}

impl Command {
    /// Wire value of the command
    pub fn id(self) -> u8 {
        match self {
            Command::SystemReady => 1,
            Command::BenchmarkReady => 2,
            Command::TaskGeneratorStart => 8,
            Command::BenchmarkFinished => 11,
            Command::TaskGenerationFinished => 15,
            Command::StartBenchmark => 17,
            Command::ReportError => 19,
            Command::LearningFinished => 101,
            Command::Other(id) => id,
        }
    }
}

impl From<u8> for Command {
    fn from(id: u8) -> Self {
        match id {
            1 => Command::SystemReady,
            2 => Command::BenchmarkReady,
            8 => Command::TaskGeneratorStart,
            11 => Command::BenchmarkFinished,
            15 => Command::TaskGenerationFinished,
            17 => Command::StartBenchmark,
            19 => Command::ReportError,
            101 => Command::LearningFinished,
            other => Command::Other(other),
        }
    }
}

/// A decoded command frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    /// Session the command belongs to
    pub session_id: String,
    /// The command
    pub command: Command,
    /// Trailing payload
    pub data: Vec<u8>,
}

/// Encode a command frame
pub fn encode_command(session_id: &str, command: Command, data: &[u8]) -> Vec<u8> {
    let session = session_id.as_bytes();
    let mut frame = Vec::with_capacity(4 + session.len() + 1 + data.len());
    frame.extend_from_slice(&(session.len() as u32).to_be_bytes());
    frame.extend_from_slice(session);
    frame.push(command.id());
    frame.extend_from_slice(data);
    frame
}

/// Decode a command frame
pub fn decode_command(frame: &[u8]) -> Result<CommandMessage, ProtocolError> {
    let (len_bytes, rest) = frame
        .split_first_chunk::<4>()
        .ok_or_else(|| ProtocolError::TruncatedCommand(format!("{} bytes", frame.len())))?;
    let session_len = u32::from_be_bytes(*len_bytes) as usize;

    if rest.len() < session_len + 1 {
        return Err(ProtocolError::TruncatedCommand(format!(
            "session id length {} exceeds frame",
            session_len
        )));
    }

    let (session, rest) = rest.split_at(session_len);
    let session_id = std::str::from_utf8(session)
        .map_err(|_| ProtocolError::InvalidUtf8)?
        .to_string();

    Ok(CommandMessage {
        session_id,
        command: Command::from(rest[0]),
        data: rest[1..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_target() {
        assert_eq!(strip_target("7.4;0.7;5", ';', ';').as_deref(), Some("7.4;0.7"));
        assert_eq!(strip_target("7.4,0.7,5", ',', ';').as_deref(), Some("7.4;0.7"));
        assert_eq!(strip_target("no-separator", ';', ';'), None);
    }

    #[test]
    fn test_expected_value() {
        assert_eq!(expected_value("7.4;0.7;5", ';'), Some(5.0));
        assert_eq!(expected_value("7.4;0.7; 6.5 ", ';'), Some(6.5));
        assert_eq!(expected_value("7.4;0.7;", ';'), None);
        assert_eq!(expected_value("7.4;0.7;abc", ';'), None);
        assert_eq!(expected_value("7.4", ';'), None);
    }

    #[test]
    fn test_encode_training() {
        let rows = vec!["1;2;5".to_string(), "3;4;6".to_string()];
        let payload = encode_training("a;b;q", &rows, ';');
        assert_eq!(payload, "a;b;q;a;b;q\n0;1;2;5\n1;3;4;6");
    }

    #[test]
    fn test_encode_training_without_rows() {
        assert_eq!(encode_training("a;q", &[], ';'), "a;q;a;q");
    }

    #[test]
    fn test_encode_task() {
        let task = Task {
            id: 3,
            row: "7.4;0.7".to_string(),
        };
        assert_eq!(encode_task("a;b;q", &task, ';'), ";a;b;q\n3;7.4;0.7");
    }

    #[test]
    fn test_parse_answer() {
        let answer = parse_answer(b"12;5.25\n", ';').unwrap();
        assert_eq!(answer.task_id, 12);
        assert_eq!(answer.value, 5.25);

        let answer = parse_answer(encode_answer(4, 6.0, ';').as_bytes(), ';').unwrap();
        assert_eq!(answer, Answer { task_id: 4, value: 6.0 });
    }

    #[test]
    fn test_parse_answer_rejects_malformed() {
        assert!(matches!(
            parse_answer(b"12", ';'),
            Err(ProtocolError::MissingSeparator(_))
        ));
        assert!(matches!(
            parse_answer(b"x;1.0", ';'),
            Err(ProtocolError::InvalidTaskId(_))
        ));
        assert!(matches!(
            parse_answer(b"-1;1.0", ';'),
            Err(ProtocolError::InvalidTaskId(_))
        ));
        assert!(matches!(
            parse_answer(b"1;abc", ';'),
            Err(ProtocolError::InvalidValue(_))
        ));
        assert_eq!(parse_answer(&[0xff, 0xfe], ';'), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_command_frame() {
        let frame = encode_command("session-1", Command::LearningFinished, &[]);
        assert_eq!(&frame[..4], &[0, 0, 0, 9]);
        assert_eq!(frame[13], 101);

        let decoded = decode_command(&frame).unwrap();
        assert_eq!(decoded.session_id, "session-1");
        assert_eq!(decoded.command, Command::LearningFinished);
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn test_command_frame_with_data() {
        let frame = encode_command("s", Command::BenchmarkFinished, b"{}");
        let decoded = decode_command(&frame).unwrap();
        assert_eq!(decoded.command, Command::BenchmarkFinished);
        assert_eq!(decoded.data, b"{}");
    }

    #[test]
    fn test_decode_truncated_command() {
        assert!(decode_command(&[0, 0]).is_err());
        // declares a 10 byte session id but carries 2
        assert!(decode_command(&[0, 0, 0, 10, b'a', b'b']).is_err());
        // session id present but command byte missing
        assert!(decode_command(&[0, 0, 0, 1, b'a']).is_err());
    }

    #[test]
    fn test_unknown_command_round_trips_id() {
        assert_eq!(Command::from(42), Command::Other(42));
        assert_eq!(Command::Other(42).id(), 42);
    }
}
