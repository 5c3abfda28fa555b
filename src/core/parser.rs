use crate::domain::model::Record;
use regex::Regex;
use std::io::BufRead;
use std::sync::LazyLock;

// `key=value` 或 `key="quoted value"`，不處理跳脫字元；key 僅限 ASCII
static KEY_VALUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([0-9A-Za-z_]+)=(".*?"|\S+)"#).expect("key/value pattern is valid")
});

/// Best-effort `key=value` extractor.
///
/// Every non-empty line produces exactly one [`Record`], even when no token
/// matched, so records keep a line-for-line correspondence with the input.
/// Fragments that do not fit the token grammar are ignored, never reported.
pub struct KeyValueParser<R> {
    reader: R,
}

impl<R: BufRead> KeyValueParser<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Only I/O failures of the underlying reader surface as errors.
    pub fn parse(self) -> std::io::Result<Vec<Record>> {
        let mut records = Vec::new();

        for (index, line) in self.reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            records.push(parse_line(index + 1, &line));
        }

        tracing::debug!("Parsed {} key/value record(s)", records.len());
        Ok(records)
    }
}

pub fn parse_str(input: &str) -> Vec<Record> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(index, line)| parse_line(index + 1, line))
        .collect()
}

pub fn parse_line(line_number: usize, line: &str) -> Record {
    let mut record = Record::new(line_number);

    for caps in KEY_VALUE_PATTERN.captures_iter(line) {
        let key = caps[1].to_string();
        let value = caps[2].trim_matches('"').to_string();
        record.data.insert(key, value);
    }

    record
}
