//! FASTA/FASTQ sequence source
//!
//! Parsing is done by needletail; gzipped inputs are recognised by their
//! `.gz` extension and decoded through flate2. The file is opened afresh on
//! every scan and closed when the scan returns.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use needletail::errors::ParseErrorKind;
use needletail::parse_fastx_reader;

use super::SequenceSource;
use crate::count::{CountError, CountResult};

/// A FASTA or FASTQ file on disk
#[derive(Debug, Clone)]
pub struct FastxSource {
    path: PathBuf,
}

impl FastxSource {
    /// Point at a sequence file, failing early if it cannot be opened
    pub fn new<P: AsRef<Path>>(path: P) -> CountResult<Self> {
        let path = path.as_ref().to_path_buf();
        File::open(&path).map_err(|e| CountError::SourceUnavailable {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_gzipped(&self) -> bool {
        self.path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"))
    }

    fn scan_reader<R: Read + Send>(
        &self,
        reader: R,
        visit: &mut dyn FnMut(&[u8]) -> CountResult<()>,
    ) -> CountResult<()> {
        let mut fastx = match parse_fastx_reader(reader) {
            Ok(fastx) => fastx,
            // A zero-byte file simply has no records
            Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => return Ok(()),
            Err(e) if matches!(e.kind, ParseErrorKind::Io) => {
                return Err(CountError::SourceUnavailable {
                    name: self.name(),
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(CountError::Parse(format!("{}: {}", self.name(), e))),
        };

        while let Some(record) = fastx.next() {
            let record = record.map_err(|e| CountError::Parse(format!("{}: {}", self.name(), e)))?;
            visit(&record.seq())?;
        }
        Ok(())
    }
}

impl SequenceSource for FastxSource {
    fn for_each_sequence(&self, visit: &mut dyn FnMut(&[u8]) -> CountResult<()>) -> CountResult<()> {
        let file = File::open(&self.path).map_err(|e| CountError::SourceUnavailable {
            name: self.name(),
            reason: e.to_string(),
        })?;

        if self.is_gzipped() {
            self.scan_reader(BufReader::new(GzDecoder::new(file)), visit)
        } else {
            self.scan_reader(file, visit)
        }
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}
