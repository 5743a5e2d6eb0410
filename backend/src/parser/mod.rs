//! Delimited-text reader with encoding and delimiter auto-detection.
//!
//! Converts spreadsheet exports into JSON objects keyed by column header.
//! No VOC-specific logic here; the same reader loads the code tables, the
//! directory export and the VOC data file.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{CsvError, CsvResult};

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed records as JSON objects (header -> trimmed cell)
    pub records: Vec<Value>,
    /// Line each record starts on (header is line 1); empty lines are
    /// skipped by the reader but still counted
    pub lines: Vec<usize>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

impl ParseResult {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

/// Detect the encoding of raw bytes.
///
/// Valid UTF-8 always wins; otherwise chardet decides. Korean spreadsheet
/// exports are usually EUC-KR / CP949.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "euc-kr" | "cp949" | "uhc" | "ks_c_5601-1987" | "iso-2022-kr" => "euc-kr".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "euc-kr" | "cp949" => {
            let (text, _, had_errors) = encoding_rs::EUC_KR.decode(bytes);
            if had_errors {
                return Err(CsvError::Encoding(encoding.to_string()));
            }
            text.into_owned()
        }
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded CSV text with an explicit delimiter.
///
/// Every record becomes a JSON object with one string per header; short
/// records are padded with empty strings.
pub fn parse_str(content: &str, delimiter: char, encoding: String) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::InvalidDelimiter(delimiter));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::Malformed { line: 1, message: e.to_string() })?
        .iter()
        .map(|h| h.trim_matches('"').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();
    let mut lines = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| CsvError::Malformed {
            line: e.position().map_or(0, |p| p.line() as usize),
            message: e.to_string(),
        })?;

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let value = record.get(i).unwrap_or("");
            obj.insert(header.clone(), Value::String(value.to_string()));
        }

        lines.push(record.position().map_or(records.len() + 2, |p| p.line() as usize));
        records.push(Value::Object(obj));
    }

    Ok(ParseResult {
        records,
        lines,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    parse_str(&content, delimiter, encoding)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file_auto("data/voc.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// ```
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CsvError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv: &str) -> ParseResult {
        parse_bytes_auto(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_simple_csv() {
        let result = parse("name,code\nA,10\nB,20");

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0]["name"], "A");
        assert_eq!(result.records[1]["code"], "20");
        assert_eq!(result.headers, vec!["name", "code"]);
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let result = parse("제기자,VOC내용\nKim,\"printer broken, again\"");
        assert_eq!(result.records[0]["VOC내용"], "printer broken, again");
    }

    #[test]
    fn test_missing_values_are_empty_strings() {
        let result = parse("a;b;c\n1;;3\n4");

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records[0]["b"], "");
        assert_eq!(result.records[1]["c"], "");
    }

    #[test]
    fn test_cells_are_trimmed() {
        let result = parse("a,b\n  x , y ");
        assert_eq!(result.records[0]["a"], "x");
        assert_eq!(result.records[0]["b"], "y");
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_bytes_auto(b"").unwrap_err();
        assert!(matches!(err, CsvError::EmptyFile));
    }

    #[test]
    fn test_record_lines_count_empty_lines() {
        let result = parse("제기자,접수유형\nKim,A\n\nLee,B\n");

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.lines, vec![2, 4]);
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let err = parse_str("a§b\n1§2", '§', "utf-8".to_string()).unwrap_err();
        assert!(matches!(err, CsvError::InvalidDelimiter('§')));
    }

    #[test]
    fn test_header_only_has_no_records() {
        let result = parse("name,code\n");
        assert!(result.records.is_empty());
        assert!(result.has_column("code"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("제기자,접수유형\nKim,A".as_bytes());
        let result = parse_bytes_auto(&bytes).unwrap();

        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.headers[0], "제기자");
    }

    #[test]
    fn test_euc_kr_decoding() {
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("제기자,소분류\n김철수,메일");
        let decoded = decode_content(&encoded, "euc-kr").unwrap();
        assert!(decoded.starts_with("제기자"));
        assert!(decoded.contains("김철수"));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.contains("Soci"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = parse_csv_file_auto("/nonexistent/voc.csv").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/voc.csv"));
    }
}
