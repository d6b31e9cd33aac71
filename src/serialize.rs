use crate::converter::ConverterRegistry;
use crate::record::{DataItem, ErrorValue, LogRecord};

/// Diagnostic logged in place of a record's data when the record cannot be
/// encoded.
pub const ENCODE_FAILURE_MESSAGE: &str = "Unable to serialize log message";

/// Encode `record` as one JSON line terminated by `\n`.
///
/// If encoding fails the data items are replaced by a diagnostic pair (the
/// message above and the encoding error) and encoding is retried once.
///
/// # Panics
///
/// Panics when the retry fails as well: the record cannot describe its own
/// failure and nothing sensible can be written.
pub fn encode(record: LogRecord, converters: &ConverterRegistry) -> Vec<u8> {
    encode_with(record, converters, |r| serde_json::to_vec(r))
}

pub(crate) fn encode_with<F>(mut record: LogRecord, converters: &ConverterRegistry, to_json: F) -> Vec<u8>
where
    F: Fn(&LogRecord) -> serde_json::Result<Vec<u8>>,
{
    let mut line = match to_json(&record) {
        Ok(line) => line,
        Err(err) => {
            record.data = vec![
                DataItem::new(&ENCODE_FAILURE_MESSAGE, converters),
                DataItem::new(&ErrorValue::from(err), converters),
            ];
            match to_json(&record) {
                Ok(line) => line,
                Err(err) => panic!("unable to encode fallback log record: {}", err),
            }
        }
    };
    line.push(b'\n');
    line
}
