//! Line-delimited record reader

use std::io::{self, BufRead};

/// One line of input: a candidate JSON document, terminator excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    number: u64,
    bytes: Vec<u8>,
}

impl Record {
    /// 1-based position of the record in the stream
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Raw bytes of the record
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the line was empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Take ownership of the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Splits a buffered byte stream into records on `\n`
///
/// There is no maximum record length; a line grows the buffer as far as it
/// needs to. Only the `\n` byte is the terminator, so a `\r` before it stays
/// in the record. A last line without terminator is still a record.
pub struct RecordReader<R> {
    inner: R,
    bytes_read: u64,
    records_read: u64,
}

impl<R: BufRead> RecordReader<R> {
    /// Wrap a buffered source
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
            records_read: 0,
        }
    }

    /// Read the next record
    ///
    /// Returns `Ok(None)` at end of input. Any other I/O failure is returned
    /// as an error.
    pub fn next_record(&mut self) -> io::Result<Option<Record>> {
        let mut bytes = Vec::new();
        let n = self.inner.read_until(b'\n', &mut bytes)?;
        if n == 0 {
            return Ok(None);
        }

        self.bytes_read += n as u64;
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
        }

        self.records_read += 1;
        Ok(Some(Record {
            number: self.records_read,
            bytes,
        }))
    }

    /// Bytes consumed so far, terminators included
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Records produced so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Unwrap the underlying source
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    fn read_all(input: &[u8]) -> Vec<Vec<u8>> {
        RecordReader::new(Cursor::new(input.to_vec()))
            .map(|r| r.unwrap().into_bytes())
            .collect()
    }

    #[test]
    fn test_splits_lines() {
        let records = read_all(b"{\"a\":1}\n[1,2]\n\"x\"\n");
        assert_eq!(
            records,
            vec![b"{\"a\":1}".to_vec(), b"[1,2]".to_vec(), b"\"x\"".to_vec()]
        );
    }

    #[test]
    fn test_empty_input() {
        let mut reader = RecordReader::new(Cursor::new(Vec::new()));
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 0);
    }

    #[test]
    fn test_trailing_record_without_newline() {
        let records = read_all(b"1\n2");
        assert_eq!(records, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn test_carriage_return_kept() {
        let records = read_all(b"{}\r\n[]\r\n");
        assert_eq!(records, vec![b"{}\r".to_vec(), b"[]\r".to_vec()]);
    }

    #[test]
    fn test_blank_lines_are_records() {
        let records = read_all(b"1\n\n2\n");
        assert_eq!(records, vec![b"1".to_vec(), Vec::new(), b"2".to_vec()]);
    }

    #[test]
    fn test_numbers_and_byte_count() {
        let mut reader = RecordReader::new(Cursor::new(b"ab\ncd\r\nef".to_vec()));
        let first = reader.next_record().unwrap().unwrap();
        let second = reader.next_record().unwrap().unwrap();
        let third = reader.next_record().unwrap().unwrap();
        assert!(reader.next_record().unwrap().is_none());

        assert_eq!(first.number(), 1);
        assert_eq!(second.number(), 2);
        assert_eq!(third.number(), 3);
        assert_eq!(reader.bytes_read(), 9);
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_record_longer_than_buffer() {
        let mut line = vec![b'"'];
        line.extend(std::iter::repeat_n(b'a', 1 << 20));
        line.push(b'"');
        let mut input = line.clone();
        input.push(b'\n');

        // Buffer far smaller than the record
        let source = BufReader::with_capacity(64, Cursor::new(input));
        let mut reader = RecordReader::new(source);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.len(), line.len());
        assert_eq!(record.as_bytes(), line.as_slice());
    }

    struct FailingSource;

    impl Read for FailingSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }
    }

    #[test]
    fn test_io_error_propagates() {
        let mut reader = RecordReader::new(BufReader::new(FailingSource));
        let err = reader.next_record().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
