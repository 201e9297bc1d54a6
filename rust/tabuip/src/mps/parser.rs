use super::{is_gzipped, MpsParseError};
use indexmap::{IndexMap, IndexSet};
use std::{
    collections::{HashMap, HashSet},
    fs,
    io::{self, BufRead, Read},
    path::Path,
    str::FromStr,
};

type Result<T> = std::result::Result<T, MpsParseError>;

/// A linear integer optimization problem loaded from MPS format: the
/// sparse representation of
///
/// `optimize c^T x  subject to  A x (=, <=, >=) b,  l <= x <= u`
///
/// with rows and columns addressed by name. Insertion order of columns and
/// rows is preserved so that the built model is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mps {
    /// The name of the problem
    pub name: String,
    pub obj_sense: MpsObjSense,
    /// The name of the row holding the objective function
    pub objective_name: String,
    /// All columns, in file order
    pub vars: IndexSet<String>,
    /// Objective coefficients, `c`
    pub c: HashMap<String, f64>,
    /// Constraint matrix, `A`, row-major in file order
    pub a: IndexMap<String, HashMap<String, f64>>,
    /// Right hand sides, `b`
    pub b: HashMap<String, f64>,
    /// Lower bounds, `l`
    pub l: HashMap<String, f64>,
    /// Upper bounds, `u`
    pub u: HashMap<String, f64>,
    /// Columns marked integer
    pub integer: HashSet<String>,
    /// Columns marked binary
    pub binary: HashSet<String>,
    /// Columns with no integrality marking
    pub real: HashSet<String>,
    /// Equality rows
    pub eq: HashSet<String>,
    /// `>=` rows
    pub ge: HashSet<String>,
    /// `<=` rows
    pub le: HashSet<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MpsObjSense {
    #[default]
    Min,
    Max,
}

impl MpsObjSense {
    fn parse_token(token: &str, line: usize) -> Result<Self> {
        match token.to_ascii_uppercase().as_str() {
            "MIN" | "MINIMIZE" | "MINIMIZATION" => Ok(Self::Min),
            "MAX" | "MAXIMIZE" | "MAXIMIZATION" => Ok(Self::Max),
            _ => Err(MpsParseError::InvalidObjSense {
                token: token.to_string(),
                line,
            }),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    #[default]
    Name,
    Rows,
    Columns,
    Rhs,
    Ranges,
    Bounds,
    End,
}

impl FromStr for Cursor {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "ROWS" => Ok(Self::Rows),
            "COLUMNS" => Ok(Self::Columns),
            "RHS" => Ok(Self::Rhs),
            "RANGES" => Ok(Self::Ranges),
            "BOUNDS" => Ok(Self::Bounds),
            "ENDATA" => Ok(Self::End),
            _ => Err(()),
        }
    }
}

/// State machine for parsing MPS format
#[derive(Debug, Default)]
struct State {
    cursor: Cursor,
    is_integer_section: bool,
    is_waiting_objsense: bool,
    is_waiting_objname: bool,
    mps: Mps,
}

fn parse_number(token: &str, line: usize) -> Result<f64> {
    token.parse().map_err(|_| MpsParseError::InvalidNumber {
        token: token.to_string(),
        line,
    })
}

impl State {
    fn read_header(&mut self, line: &str, number: usize) -> Result<()> {
        if let Some(name) = line.strip_prefix("NAME") {
            self.mps.name = name.trim().to_string();
        } else if let Some(sense) = line.strip_prefix("OBJSENSE") {
            if sense.trim().is_empty() {
                self.is_waiting_objsense = true;
                return Ok(());
            }
            self.mps.obj_sense = MpsObjSense::parse_token(sense.trim(), number)?;
        } else if let Some(name) = line.strip_prefix("OBJNAME") {
            if name.trim().is_empty() {
                self.is_waiting_objname = true;
                return Ok(());
            }
            self.mps.objective_name = name.trim().to_string();
        } else {
            self.cursor =
                line.trim()
                    .parse()
                    .map_err(|_| MpsParseError::InvalidHeader {
                        content: line.to_string(),
                        line: number,
                    })?;
        }
        Ok(())
    }

    //           ROWS
    //            type     name
    fn read_row_field(&mut self, fields: &[&str], line: usize) -> Result<()> {
        if fields.len() != 2 {
            return Err(MpsParseError::InvalidFields { line });
        }
        let row_name = fields[1].to_string();
        if fields[0] != "N"
            && (self.mps.a.contains_key(&row_name) || row_name == self.mps.objective_name)
        {
            return Err(MpsParseError::DuplicateRowName {
                name: row_name,
                line,
            });
        }
        match fields[0] {
            "N" => {
                // When OBJNAME named a row, other N rows are ignored.
                if self.mps.objective_name.is_empty() {
                    self.mps.objective_name = row_name;
                }
                return Ok(());
            }
            "E" => {
                self.mps.eq.insert(row_name.clone());
            }
            "G" => {
                self.mps.ge.insert(row_name.clone());
            }
            "L" => {
                self.mps.le.insert(row_name.clone());
            }
            _ => {
                return Err(MpsParseError::InvalidRowType {
                    token: fields[0].to_string(),
                    line,
                });
            }
        }
        self.mps.a.insert(row_name, HashMap::new());
        Ok(())
    }

    //           COLUMNS
    //                    column       row       value     row      value
    fn read_column_field(&mut self, fields: &[&str], line: usize) -> Result<()> {
        // Marker lines delimit the integer sections:
        //   <name> 'MARKER' 'INTORG' / <name> 'MARKER' 'INTEND'
        if fields.len() >= 3 && fields[1] == "'MARKER'" {
            match fields[2] {
                "'INTORG'" => self.is_integer_section = true,
                "'INTEND'" => self.is_integer_section = false,
                _ => {
                    return Err(MpsParseError::InvalidMarker {
                        token: fields[2].to_string(),
                        line,
                    })
                }
            }
            return Ok(());
        }
        if fields.len() != 3 && fields.len() != 5 {
            return Err(MpsParseError::InvalidFields { line });
        }

        let column = fields[0].to_string();
        self.mps.vars.insert(column.clone());
        if self.is_integer_section {
            self.mps.integer.insert(column.clone());
        } else if !self.mps.integer.contains(&column) && !self.mps.binary.contains(&column) {
            self.mps.real.insert(column.clone());
        }

        for chunk in fields[1..].chunks(2) {
            let row = chunk[0].to_string();
            let coefficient = parse_number(chunk[1], line)?;
            if row == self.mps.objective_name {
                self.mps.c.insert(column.clone(), coefficient);
            } else {
                self.mps
                    .a
                    .get_mut(&row)
                    .ok_or(MpsParseError::UnknownRowName { name: row, line })?
                    .insert(column.clone(), coefficient);
            }
        }
        Ok(())
    }

    //           RHS
    //                     rhs         row       value     row      value
    fn read_rhs_field(&mut self, fields: &[&str], line: usize) -> Result<()> {
        if fields.len() != 3 && fields.len() != 5 {
            return Err(MpsParseError::InvalidFields { line });
        }
        for chunk in fields[1..].chunks(2) {
            let row = chunk[0].to_string();
            let value = parse_number(chunk[1], line)?;
            if row != self.mps.objective_name && !self.mps.a.contains_key(&row) {
                return Err(MpsParseError::UnknownRowName { name: row, line });
            }
            self.mps.b.insert(row, value);
        }
        Ok(())
    }

    //           RANGES
    //                     range       row       value     row      value
    //
    // Each range splits a row into two bounded rows:
    //    row type   sign of r      lower        upper
    //    ------------------------------------------------
    //       G        + or -          b          b + |r|
    //       L        + or -        b - |r|        b
    //       E          +             b          b + |r|
    //       E          -           b - |r|        b
    fn read_range_field(&mut self, fields: &[&str], line: usize) -> Result<()> {
        if fields.len() != 3 && fields.len() != 5 {
            return Err(MpsParseError::InvalidFields { line });
        }
        for chunk in fields[1..].chunks(2) {
            let row = chunk[0].to_string();
            let range = parse_number(chunk[1], line)?;
            if range == 0.0 {
                return Err(MpsParseError::InvalidNumber {
                    token: chunk[1].to_string(),
                    line,
                });
            }
            let mut twin_candidate = format!("{row}_");
            let twin = loop {
                if !self.mps.a.contains_key(&twin_candidate) {
                    break twin_candidate;
                }
                twin_candidate = format!("{twin_candidate}_");
            };
            let coefficients = self
                .mps
                .a
                .get(&row)
                .ok_or(MpsParseError::UnknownRowName {
                    name: row.clone(),
                    line,
                })?
                .clone();
            self.mps.a.insert(twin.clone(), coefficients);
            let b = self.mps.b.get(&row).copied().unwrap_or(0.0);
            let twin_b = if self.mps.eq.remove(&row) {
                if range > 0.0 {
                    self.mps.ge.insert(row.clone());
                    self.mps.le.insert(twin.clone());
                    b + range.abs()
                } else {
                    self.mps.le.insert(row.clone());
                    self.mps.ge.insert(twin.clone());
                    b - range.abs()
                }
            } else if self.mps.ge.contains(&row) {
                self.mps.le.insert(twin.clone());
                b + range.abs()
            } else if self.mps.le.contains(&row) {
                self.mps.ge.insert(twin.clone());
                b - range.abs()
            } else {
                self.mps.a.shift_remove(&twin);
                continue;
            };
            self.mps.b.insert(twin, twin_b);
        }
        Ok(())
    }

    //           BOUNDS
    //            type     bound       column     value
    fn read_bound_field(&mut self, fields: &[&str], line: usize) -> Result<()> {
        if fields.len() < 3 {
            return Err(MpsParseError::InvalidFields { line });
        }
        let column = fields[2].to_string();
        let value = |index: usize| -> Result<f64> {
            let token = fields.get(index).ok_or(MpsParseError::InvalidFields { line })?;
            parse_number(token, line)
        };
        match fields[0] {
            //   LO    lower bound        b <= x
            "LO" => {
                self.mps.l.insert(column, value(3)?);
            }
            //   UP    upper bound        x <= b
            "UP" => {
                self.mps.u.insert(column, value(3)?);
            }
            //   FX    fixed variable     x = b
            "FX" => {
                let v = value(3)?;
                self.mps.l.insert(column.clone(), v);
                self.mps.u.insert(column, v);
            }
            //   MI    lower bound -inf
            "MI" => {
                self.mps.l.insert(column, f64::NEG_INFINITY);
            }
            //   FR    free variable, PL: plus-infinity upper bound
            "FR" | "PL" => {}
            //   BV    binary variable    x in {0, 1}
            "BV" => {
                self.mps.integer.remove(&column);
                self.mps.real.remove(&column);
                self.mps.binary.insert(column);
            }
            //   UI    integer upper bound
            "UI" => {
                let v = value(3)?;
                self.mps.real.remove(&column);
                self.mps.integer.insert(column.clone());
                self.mps.u.insert(column, v);
            }
            //   LI    integer lower bound
            "LI" => {
                let v = value(3)?;
                self.mps.real.remove(&column);
                self.mps.integer.insert(column.clone());
                self.mps.l.insert(column, v);
            }
            _ => {
                return Err(MpsParseError::InvalidBoundType {
                    token: fields[0].to_string(),
                    line,
                });
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Mps {
        // An integer column bounded to [0, 1] is a binary column.
        for (name, u) in &self.mps.u {
            if *u == 1.0 {
                if let Some(l) = self.mps.l.get(name) {
                    if *l != 0.0 {
                        continue;
                    }
                }
                if let Some(name) = self.mps.integer.take(name) {
                    self.mps.binary.insert(name);
                }
            }
        }
        self.mps
    }
}

impl Mps {
    /// Read an MPS file from the given path, decompressing gzip
    /// transparently.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let f = fs::File::open(&path)?;
        Self::parse(f)
    }

    pub fn parse(reader: impl Read) -> Result<Self> {
        let mut reader = io::BufReader::new(reader);
        let head = reader.fill_buf()?;
        if is_gzipped(head) {
            let decoder = flate2::read::GzDecoder::new(reader);
            let buffered = io::BufReader::new(decoder);
            Self::from_lines(buffered.lines().map_while(|x| x.ok()))
        } else {
            Self::from_lines(reader.lines().map_while(|x| x.ok()))
        }
    }

    pub fn from_lines(lines: impl Iterator<Item = String>) -> Result<Self> {
        let mut state = State::default();
        for (index, line) in lines.enumerate() {
            let number = index + 1;
            if line.trim().is_empty() {
                continue;
            }
            // A leading `*` marks a comment line.
            if line.trim_start().starts_with('*') {
                continue;
            }
            if !line.starts_with(' ') && !line.starts_with('\t') {
                state.read_header(&line, number)?;
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if state.is_waiting_objsense {
                state.mps.obj_sense = MpsObjSense::parse_token(fields[0], number)?;
                state.is_waiting_objsense = false;
                continue;
            }
            if state.is_waiting_objname {
                state.mps.objective_name = fields[0].to_string();
                state.is_waiting_objname = false;
                continue;
            }

            match state.cursor {
                Cursor::Rows => state.read_row_field(&fields, number)?,
                Cursor::Columns => state.read_column_field(&fields, number)?,
                Cursor::Rhs => state.read_rhs_field(&fields, number)?,
                Cursor::Ranges => state.read_range_field(&fields, number)?,
                Cursor::Bounds => state.read_bound_field(&fields, number)?,
                Cursor::Name => {
                    return Err(MpsParseError::InvalidHeader {
                        content: line,
                        line: number,
                    })
                }
                Cursor::End => break,
            }
        }
        Ok(state.finish())
    }
}
