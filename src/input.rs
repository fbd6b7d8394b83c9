//! Initial-State Input
//!
//! Reads whitespace-separated Cartesian states (six values per record,
//! records may span or share lines) from any [`BufRead`] source. The
//! caller opens the file or buffer; this module never touches the
//! filesystem itself.

use std::io::BufRead;

use thiserror::Error;

use crate::orbit::Orbit;

/// Failures while reading initial states.
#[derive(Debug, Error)]
pub enum InputError {
    /// Underlying reader failed
    #[error("failed to read initial states: {0}")]
    Io(#[from] std::io::Error),
    /// A token did not parse as a floating-point number
    #[error("line {line}: {token:?} is not a valid number")]
    Parse {
        /// 1-based source line
        line: usize,
        /// Offending token
        token: String,
    },
    /// The value stream ended partway through a record
    #[error("input ends mid-record: {leftover} trailing value(s) after {complete} complete state(s)")]
    Partial {
        /// Complete six-value records read
        complete: usize,
        /// Values left over (1..=5)
        leftover: usize,
    },
}

/// Read all states from the source.
///
/// Lines whose first non-blank character is `#` are skipped. A record
/// does not need to coincide with a line: six values are consumed
/// wherever they fall. A trailing partial record is an error, not a
/// silent truncation.
pub fn read_states<R: BufRead>(reader: R) -> Result<Vec<[f64; 6]>, InputError> {
    let mut values = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        for token in trimmed.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| InputError::Parse {
                line: idx + 1,
                token: token.to_string(),
            })?;
            values.push(value);
        }
    }

    let leftover = values.len() % 6;
    if leftover != 0 {
        return Err(InputError::Partial {
            complete: values.len() / 6,
            leftover,
        });
    }

    Ok(values
        .chunks_exact(6)
        .map(|c| [c[0], c[1], c[2], c[3], c[4], c[5]])
        .collect())
}

/// Read states and wrap each in an [`Orbit`] named `{prefix}-{index}`.
pub fn read_orbits<R: BufRead>(reader: R, prefix: &str) -> Result<Vec<Orbit>, InputError> {
    let states = read_states(reader)?;
    Ok(states
        .into_iter()
        .enumerate()
        .map(|(i, state)| Orbit::new(format!("{}-{}", prefix, i), state))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_one_record_per_line() {
        let input = "0.5 0.0 0.0 0.0 0.8 0.0\n0.6 0.1 0.0 0.0 0.7 0.0\n";
        let states = read_states(Cursor::new(input)).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], [0.5, 0.0, 0.0, 0.0, 0.8, 0.0]);
        assert_eq!(states[1][4], 0.7);
    }

    #[test]
    fn test_record_spanning_lines() {
        let input = "0.5 0.0 0.0\n0.0 0.8 0.0";
        let states = read_states(Cursor::new(input)).unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0], [0.5, 0.0, 0.0, 0.0, 0.8, 0.0]);
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let input = "# initial conditions\n\n  # indented comment\n1 2 3 4 5 6\n";
        let states = read_states(Cursor::new(input)).unwrap();
        assert_eq!(states, vec![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_scientific_notation() {
        let input = "1e-3 -2.5E2 0.0 3.14 -0.0 6e0";
        let states = read_states(Cursor::new(input)).unwrap();
        assert_eq!(states[0][1], -250.0);
    }

    #[test]
    fn test_bad_token_rejected_with_line() {
        let input = "1 2 3 4 5 6\n7 8 oops 10 11 12";
        match read_states(Cursor::new(input)) {
            Err(InputError::Parse { line, token }) => {
                assert_eq!(line, 2);
                assert_eq!(token, "oops");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_record_rejected() {
        let input = "1 2 3 4 5 6\n7 8 9";
        match read_states(Cursor::new(input)) {
            Err(InputError::Partial { complete, leftover }) => {
                assert_eq!(complete, 1);
                assert_eq!(leftover, 3);
            }
            other => panic!("expected partial-record error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_is_empty_batch() {
        let states = read_states(Cursor::new("")).unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn test_read_orbits_names() {
        let input = "1 2 3 4 5 6\n6 5 4 3 2 1";
        let orbits = read_orbits(Cursor::new(input), "asteroid").unwrap();
        assert_eq!(orbits.len(), 2);
        assert_eq!(orbits[0].name(), "asteroid-0");
        assert_eq!(orbits[1].name(), "asteroid-1");
        assert_eq!(orbits[1].position(), [6.0, 5.0, 4.0]);
    }
}
