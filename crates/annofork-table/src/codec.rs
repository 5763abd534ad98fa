//! CSV codec
//!
//! Comma-delimited, double-quote quoting, `\n` line endings, mandatory header
//! row. Parsing is tolerant: `\r\n` is accepted, fully empty lines are
//! skipped, and malformed records become [`RowDiagnostic`]s instead of
//! failing the whole file. Serialization always round-trips through
//! [`parse`].

use crate::error::{DiagnosticKind, ParseError, RowDiagnostic};
use crate::table::Table;
use crate::value::Value;
use indexmap::IndexSet;
use std::iter::Peekable;
use std::str::Chars;

const DELIMITER: char = ',';
const QUOTE: char = '"';
const BOM: char = '\u{feff}';

/// How raw fields become [`Value`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParseMode {
    /// Every cell stays verbatim text (notes, anything written back)
    #[default]
    Literal,
    /// Numeric- and boolean-looking cells are coerced (metrics, sorting)
    Typed,
}

/// Result of a tolerant parse
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// Rows that parsed cleanly, in input order
    pub table: Table,
    /// Findings for rows that were renamed or dropped
    pub diagnostics: Vec<RowDiagnostic>,
}

impl Parsed {
    /// True when no diagnostics were reported
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Reject any diagnostic
    ///
    /// # Errors
    /// Returns [`ParseError::Diagnostics`] if the parse was not clean
    pub fn into_strict(self) -> Result<Table, ParseError> {
        if self.diagnostics.is_empty() {
            Ok(self.table)
        } else {
            Err(ParseError::Diagnostics(self.diagnostics))
        }
    }
}

/// Parse CSV text into a table
///
/// The first non-empty record is the header. Empty input yields an empty
/// table with no fields.
///
/// # Errors
/// Returns [`ParseError::MalformedHeader`] if the header record itself is
/// broken; every later problem is reported through [`Parsed::diagnostics`].
pub fn parse(text: &str, mode: ParseMode) -> Result<Parsed, ParseError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut records = Tokenizer::new(text).filter(|r| !r.blank);
    let mut diagnostics = Vec::new();

    let Some(header) = records.next() else {
        return Ok(Parsed {
            table: Table::default(),
            diagnostics,
        });
    };
    if let Some(kind) = header.problem {
        return Err(ParseError::MalformedHeader(format!(
            "line {}: {kind}",
            header.line
        )));
    }

    let mut fields = IndexSet::with_capacity(header.fields.len());
    for name in header.fields {
        if fields.contains(&name) {
            let renamed = unique_name(&fields, &name);
            diagnostics.push(RowDiagnostic::new(
                header.line,
                DiagnosticKind::DuplicateHeader,
                format!("'{name}' renamed to '{renamed}'"),
            ));
            fields.insert(renamed);
        } else {
            fields.insert(name);
        }
    }

    let width = fields.len();
    let mut rows = Vec::new();
    for record in records {
        if let Some(kind) = record.problem {
            diagnostics.push(RowDiagnostic::new(record.line, kind, "record dropped"));
            continue;
        }
        if record.fields.len() != width {
            let kind = if record.fields.len() < width {
                DiagnosticKind::TooFewFields
            } else {
                DiagnosticKind::TooManyFields
            };
            diagnostics.push(RowDiagnostic::new(
                record.line,
                kind,
                format!("expected {width} fields, found {}", record.fields.len()),
            ));
            continue;
        }
        rows.push(
            record
                .fields
                .into_iter()
                .map(|raw| match mode {
                    ParseMode::Literal => Value::Text(raw),
                    ParseMode::Typed => Value::coerce(&raw),
                })
                .collect(),
        );
    }

    Ok(Parsed {
        table: Table::from_parts(fields, rows),
        diagnostics,
    })
}

/// Serialize a table to CSV text
///
/// Records are joined with `\n` and there is no trailing newline.
#[must_use]
pub fn serialize(table: &Table) -> String {
    let single = table.field_count() == 1;
    let mut out = String::new();
    write_record(&mut out, table.fields(), single);
    for row in table.raw_rows() {
        out.push('\n');
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        write_record(&mut out, cells.iter().map(String::as_str), single);
    }
    out
}

fn write_record<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, single: bool) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        if needs_quotes(cell, single) {
            out.push(QUOTE);
            for c in cell.chars() {
                if c == QUOTE {
                    out.push(QUOTE);
                }
                out.push(c);
            }
            out.push(QUOTE);
        } else {
            out.push_str(cell);
        }
    }
}

/// A lone empty cell would otherwise serialize as a blank line and be skipped
fn needs_quotes(cell: &str, single: bool) -> bool {
    (single && cell.is_empty())
        || cell.starts_with([' ', '\t', BOM])
        || cell.ends_with([' ', '\t'])
        || cell.contains([DELIMITER, QUOTE, '\n', '\r'])
}

fn unique_name(taken: &IndexSet<String>, base: &str) -> String {
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// One physical record before header alignment
struct RawRecord {
    line: usize,
    fields: Vec<String>,
    blank: bool,
    problem: Option<DiagnosticKind>,
}

struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    /// Consume a record terminator if one is next
    fn eat_newline(&mut self) -> bool {
        match self.chars.peek().copied() {
            Some('\n') => {
                self.chars.next();
                self.line += 1;
                true
            }
            Some('\r') => {
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek() == Some(&'\n') {
                    self.chars.next();
                    self.chars.next();
                    self.line += 1;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn quoted(&mut self, field: &mut String) -> Option<DiagnosticKind> {
        loop {
            match self.chars.next() {
                None => return Some(DiagnosticKind::MissingQuotes),
                Some(QUOTE) if self.chars.peek() == Some(&QUOTE) => {
                    self.chars.next();
                    field.push(QUOTE);
                }
                Some(QUOTE) => return None,
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    field.push(c);
                }
            }
        }
    }

    /// Read unquoted text up to the next delimiter or terminator
    fn bare(&mut self, field: &mut String) -> bool {
        let mut any = false;
        loop {
            match self.chars.peek().copied() {
                None => return any,
                Some(c) if c == DELIMITER || c == '\n' => return any,
                Some('\r') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead.peek() == Some(&'\n') {
                        return any;
                    }
                }
                Some(_) => {}
            }
            if let Some(c) = self.chars.next() {
                field.push(c);
                any = true;
            }
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        self.chars.peek()?;
        let line = self.line;
        let mut fields = Vec::new();
        let mut blank = true;
        let mut problem = None;

        loop {
            let mut field = String::new();
            if self.chars.peek() == Some(&QUOTE) {
                self.chars.next();
                blank = false;
                if let Some(kind) = self.quoted(&mut field) {
                    problem.get_or_insert(kind);
                } else if self.bare(&mut field) {
                    problem.get_or_insert(DiagnosticKind::InvalidQuotes);
                }
            } else if self.bare(&mut field) {
                blank = false;
            }
            fields.push(field);

            if self.chars.peek() == Some(&DELIMITER) {
                self.chars.next();
                blank = false;
                continue;
            }
            if self.eat_newline() || self.chars.peek().is_none() {
                break;
            }
        }

        Some(RawRecord {
            line,
            fields,
            blank,
            problem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn fields(t: &Table) -> Vec<&str> {
        t.fields().collect()
    }

    #[test]
    fn parses_header_and_rows() {
        let parsed = parse("Author,TotalPosts\nalice,10\nbob,3\n", ParseMode::Literal).unwrap();
        assert!(parsed.is_clean());
        assert_eq!(fields(&parsed.table), vec!["Author", "TotalPosts"]);
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.table.get(0, "TotalPosts"), Some(&Value::from("10")));
    }

    #[test]
    fn typed_mode_coerces_metrics() {
        let parsed = parse("Author,TotalPosts,Active\nalice,10,TRUE", ParseMode::Typed).unwrap();
        assert_eq!(parsed.table.get(0, "TotalPosts"), Some(&Value::Number(10.0)));
        assert_eq!(parsed.table.get(0, "Active"), Some(&Value::Bool(true)));
        assert_eq!(parsed.table.get(0, "Author"), Some(&Value::from("alice")));
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_newlines() {
        let text = "title,selftext\n\"Hello, world\",\"line one\nline \"\"two\"\"\"\nplain,x";
        let parsed = parse(text, ParseMode::Literal).unwrap();
        assert!(parsed.is_clean());
        assert_eq!(parsed.table.get(0, "title"), Some(&Value::from("Hello, world")));
        assert_eq!(
            parsed.table.get(0, "selftext"),
            Some(&Value::from("line one\nline \"two\""))
        );
        assert_eq!(parsed.table.get(1, "title"), Some(&Value::from("plain")));
    }

    #[test]
    fn skips_empty_lines_and_accepts_crlf() {
        let parsed = parse("a,b\r\n\r\n1,2\r\n\n3,4\n", ParseMode::Literal).unwrap();
        assert!(parsed.is_clean());
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.table.get(1, "b"), Some(&Value::from("4")));
    }

    #[test]
    fn mismatched_rows_are_dropped_with_diagnostics() {
        let parsed = parse("a,b\n1,2\n3\n4,5,6\n7,8", ParseMode::Literal).unwrap();
        assert_eq!(parsed.table.len(), 2);
        let kinds: Vec<_> = parsed.diagnostics.iter().map(|d| (d.line, d.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (3, DiagnosticKind::TooFewFields),
                (4, DiagnosticKind::TooManyFields)
            ]
        );
    }

    #[test]
    fn malformed_quotes_are_reported() {
        let parsed = parse("a,b\n\"x\"y,1\nok,2\n\"open,3", ParseMode::Literal).unwrap();
        assert_eq!(parsed.table.len(), 1);
        let kinds: Vec<_> = parsed.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::InvalidQuotes, DiagnosticKind::MissingQuotes]
        );
        assert!(parsed.into_strict().is_err());
    }

    #[test]
    fn duplicate_header_is_renamed() {
        let parsed = parse("a,a,b\n1,2,3", ParseMode::Literal).unwrap();
        assert_eq!(fields(&parsed.table), vec!["a", "a_1", "b"]);
        assert_eq!(parsed.table.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::DuplicateHeader);
    }

    #[test]
    fn broken_header_is_fatal() {
        assert!(matches!(
            parse("\"a,b\n1,2", ParseMode::Literal),
            Err(ParseError::MalformedHeader(_))
        ));
    }

    #[test]
    fn empty_input_is_empty_table() {
        let parsed = parse("", ParseMode::Literal).unwrap();
        assert_eq!(parsed.table.field_count(), 0);
        assert!(parsed.table.is_empty());
    }

    #[test]
    fn header_only() {
        let parsed = parse("Author,Notes_bob\n", ParseMode::Literal).unwrap();
        assert_eq!(parsed.table.field_count(), 2);
        assert!(parsed.table.is_empty());
    }

    #[test]
    fn strips_byte_order_mark() {
        let parsed = parse("\u{feff}Author\nalice", ParseMode::Literal).unwrap();
        assert_eq!(fields(&parsed.table), vec!["Author"]);
    }

    #[test]
    fn serialize_quotes_only_when_needed() {
        let mut t = Table::new(["Author", "Notes_bob"]).unwrap();
        t.push_record([("Author", "alice"), ("Notes_bob", "a, \"b\"")]).unwrap();
        t.push_record([("Author", " padded")]).unwrap();
        assert_eq!(
            serialize(&t),
            "Author,Notes_bob\nalice,\"a, \"\"b\"\"\"\n\" padded\","
        );
    }

    #[test]
    fn single_empty_cell_survives() {
        let mut t = Table::new(["Notes"]).unwrap();
        t.push_record([("Notes", "")]).unwrap();
        let back = parse(&serialize(&t), ParseMode::Literal).unwrap();
        assert_eq!(back.table, t);
    }

    #[test]
    fn typed_values_serialize_in_storage_form() {
        let parsed = parse("n,b\n10,true\n-2.5,FALSE", ParseMode::Typed).unwrap();
        assert_eq!(serialize(&parsed.table), "n,b\n10,true\n-2.5,false");
    }

    fn cell() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[a-z0-9 ,\"\n\r\t_]{0,8}").unwrap()
    }

    fn table() -> impl Strategy<Value = Table> {
        proptest::collection::vec(cell(), 1..5)
            .prop_flat_map(|names| {
                let width = names.len();
                (
                    Just(names),
                    proptest::collection::vec(proptest::collection::vec(cell(), width), 0..6),
                )
            })
            .prop_filter_map("unique header", |(names, rows)| {
                let mut t = Table::new(names).ok()?;
                for row in rows {
                    t.push_row(row.into_iter().map(Value::Text).collect()).ok()?;
                }
                Some(t)
            })
    }

    proptest! {
        #[test]
        fn literal_round_trip(t in table()) {
            let parsed = parse(&serialize(&t), ParseMode::Literal).unwrap();
            prop_assert!(parsed.is_clean());
            prop_assert_eq!(parsed.table, t);
        }

        #[test]
        fn typed_reparse_is_stable(t in table()) {
            let once = parse(&serialize(&t), ParseMode::Typed).unwrap().table;
            let twice = parse(&serialize(&once), ParseMode::Typed).unwrap().table;
            prop_assert_eq!(once, twice);
        }
    }
}
