use crate::types::{error::XBaseError, record::Record};

pub trait Scanner {
    fn scan(&mut self) -> Result<Option<Record>, XBaseError>;
    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<Record>, XBaseError>;
    fn reset(&mut self) -> Result<(), XBaseError>;
}

pub struct ScanIterator<'a, S: Scanner> {
    scanner: &'a mut S,
}

impl<'a, S: Scanner> ScanIterator<'a, S> {
    pub fn new(scanner: &'a mut S) -> Self {
        Self { scanner }
    }
}

impl<S: Scanner> Iterator for ScanIterator<'_, S> {
    type Item = Result<Record, XBaseError>;
    fn next(&mut self) -> Option<Self::Item> {
        match self.scanner.scan() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
