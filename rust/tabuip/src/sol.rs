use crate::NamedSolution;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SolFileError {
    #[error("Malformed line {line} in {path}: expected `name value`")]
    InvalidLine { path: String, line: usize },

    #[error("Invalid value {token} on line {line} in {path}")]
    InvalidValue {
        path: String,
        line: usize,
        token: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn data_lines(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = (usize, String)>, SolFileError> {
    let file = std::fs::File::open(path.as_ref())?;
    let reader = std::io::BufReader::new(file);
    Ok(reader
        .lines()
        .map_while(|line| line.ok())
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#') && !trimmed.starts_with('*')
        }))
}

/// Read a plain-text solution file: one `name value` pair per non-blank,
/// non-comment line. Values round by `floor(v + 0.5)`.
pub fn read_solution_file(
    path: impl AsRef<Path>,
) -> Result<Vec<(String, i64)>, SolFileError> {
    let display = path.as_ref().display().to_string();
    let mut pairs = Vec::new();
    for (line, content) in data_lines(&path)? {
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(SolFileError::InvalidLine {
                path: display,
                line,
            });
        }
        let value: f64 = fields[1].parse().map_err(|_| SolFileError::InvalidValue {
            path: display.clone(),
            line,
            token: fields[1].to_string(),
        })?;
        pairs.push((fields[0].to_string(), (value + 0.5).floor() as i64));
    }
    Ok(pairs)
}

/// Read a list file of whitespace-separated names (mutable-variable,
/// fixed-variable, and selection-constraint files share this layout).
pub fn read_name_list_file(path: impl AsRef<Path>) -> Result<Vec<String>, SolFileError> {
    let mut names = Vec::new();
    for (_, content) in data_lines(&path)? {
        names.extend(content.split_whitespace().map(|s| s.to_string()));
    }
    Ok(names)
}

/// Read a file of name pairs, one pair per line, for flippable variable
/// registration.
pub fn read_name_pair_file(
    path: impl AsRef<Path>,
) -> Result<Vec<(String, String)>, SolFileError> {
    let display = path.as_ref().display().to_string();
    let mut pairs = Vec::new();
    for (line, content) in data_lines(&path)? {
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(SolFileError::InvalidLine {
                path: display,
                line,
            });
        }
        pairs.push((fields[0].to_string(), fields[1].to_string()));
    }
    Ok(pairs)
}

/// Write a solution as `name value` lines.
pub fn write_solution_file(
    solution: &NamedSolution,
    path: impl AsRef<Path>,
) -> Result<(), SolFileError> {
    let file = std::fs::File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    for (name, value) in &solution.variables {
        writeln!(writer, "{name} {value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(content: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "tabuip-sol-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn reads_pairs_and_rounds() {
        let path = write_temp("# comment\nx 1.2\ny 1.5\n\n* another comment\nz -0.4\n");
        let pairs = read_solution_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(
            pairs,
            vec![
                ("x".to_string(), 1),
                ("y".to_string(), 2),
                ("z".to_string(), 0),
            ]
        );
    }

    #[test]
    fn malformed_line_is_an_error() {
        let path = write_temp("x 1 extra\n");
        let result = read_solution_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(SolFileError::InvalidLine { .. })));
    }

    #[test]
    fn write_then_read_round_trips() {
        let solution = NamedSolution {
            name: "p".to_string(),
            objective: 1.0,
            total_violation: 0.0,
            is_feasible: true,
            variables: vec![("a".to_string(), 3), ("b".to_string(), -2)],
        };
        let path = write_temp("");
        write_solution_file(&solution, &path).unwrap();
        let pairs = read_solution_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(pairs, solution.variables);
    }
}
