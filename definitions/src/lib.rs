//! Definitions -- the data model of the MALBAC amplification simulator.
//! Genomic fragments, the amplicons copied from them, and the compact error records describing
//! how an amplicon differs from its template all live here. Algorithms working on these types are in the `malbac` crate.
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
mod config;
pub use config::*;

/// Length of every primer in the reaction.
pub const PRIMER_LENGTH: usize = 8;
/// Largest value an offset, a length, or a GC count of an amplicon can take (17 bits).
pub const MAX_FIELD: u32 = (1 << 17) - 1;
/// Largest number of primers assigned to a single template in a cycle (12 bits).
pub const MAX_PRIMERS: u16 = (1 << 12) - 1;
/// Largest position recorded by an error (27 bits).
pub const MAX_ERROR_POSITION: u32 = (1 << 27) - 1;
/// Largest alternative base index (3 bits). The alphabet should be strictly smaller than this + 1,
/// as the alphabet size itself is used as the terminator of an error list.
pub const MAX_ALT_INDEX: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The source base was skipped.
    Dropout,
    /// The source base was replaced by another base.
    Substitution,
}

/// One amplification error, packed into 4 bytes.
/// Bits: kind(2), position(27), alt(3), from the most significant bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorRecord(u32);

impl ErrorRecord {
    pub fn new(kind: ErrorKind, position: u32, alt: u8) -> Self {
        assert!(position <= MAX_ERROR_POSITION, "{} is too far", position);
        assert!(alt <= MAX_ALT_INDEX, "{} is not a base index", alt);
        let kind: u32 = match kind {
            ErrorKind::Dropout => 0,
            ErrorKind::Substitution => 1,
        };
        Self(kind << 30 | position << 3 | alt as u32)
    }
    pub fn substitution(position: u32, alt: u8) -> Self {
        Self::new(ErrorKind::Substitution, position, alt)
    }
    pub fn dropout(position: u32) -> Self {
        Self::new(ErrorKind::Dropout, position, 0)
    }
    /// The terminator of an error list over an alphabet of `alphabet_size` bases.
    pub fn sentinel(alphabet_size: usize) -> Self {
        assert!(alphabet_size <= MAX_ALT_INDEX as usize);
        Self::new(ErrorKind::Dropout, 0, alphabet_size as u8)
    }
    pub fn kind(&self) -> ErrorKind {
        match self.0 >> 30 {
            0 => ErrorKind::Dropout,
            _ => ErrorKind::Substitution,
        }
    }
    pub fn position(&self) -> u32 {
        (self.0 >> 3) & MAX_ERROR_POSITION
    }
    pub fn alt(&self) -> u8 {
        (self.0 & 0b111) as u8
    }
    pub fn is_sentinel(&self, alphabet_size: usize) -> bool {
        self.alt() as usize == alphabet_size
    }
}

impl std::fmt::Debug for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}@{}:{}", self.kind(), self.position(), self.alt())
    }
}

/// Errors of an amplicon, always terminated by exactly one sentinel.
/// Positions are offsets from the start of the amplicon on its template, strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorList {
    records: Box<[ErrorRecord]>,
}

impl ErrorList {
    pub fn new(mut errors: Vec<ErrorRecord>, alphabet_size: usize) -> Self {
        assert!(
            errors.windows(2).all(|w| w[0].position() < w[1].position()),
            "Error positions should be strictly increasing:{:?}",
            errors
        );
        assert!(errors.iter().all(|e| (e.alt() as usize) < alphabet_size));
        errors.push(ErrorRecord::sentinel(alphabet_size));
        Self {
            records: errors.into_boxed_slice(),
        }
    }
    pub fn empty(alphabet_size: usize) -> Self {
        Self::new(vec![], alphabet_size)
    }
    /// The errors, without the sentinel.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.records[..self.records.len() - 1]
    }
    /// The errors followed by the sentinel.
    pub fn terminated(&self) -> &[ErrorRecord] {
        &self.records
    }
    pub fn alphabet_size(&self) -> usize {
        self.records[self.records.len() - 1].alt() as usize
    }
    pub fn len(&self) -> usize {
        self.records.len() - 1
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn dropouts(&self) -> usize {
        self.errors()
            .iter()
            .filter(|e| e.kind() == ErrorKind::Dropout)
            .count()
    }
}

/// Fixed-size part of an amplicon, packed into 8 bytes.
/// Bits: is_semi(1), start(17), length(17), gc(17), primers(12), from the most significant bit.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct AmpliconHeader(u64);

const START_SHIFT: u32 = 46;
const LENGTH_SHIFT: u32 = 29;
const GC_SHIFT: u32 = 12;

impl AmpliconHeader {
    pub fn new(is_semi: bool, start: u32, length: u32, gc: u32) -> Self {
        assert!(start <= MAX_FIELD, "Start {} overflows", start);
        assert!(length <= MAX_FIELD, "Length {} overflows", length);
        assert!(gc <= length, "GC {} exceeds the length {}", gc, length);
        let semi = (is_semi as u64) << 63;
        let start = (start as u64) << START_SHIFT;
        let length = (length as u64) << LENGTH_SHIFT;
        let gc = (gc as u64) << GC_SHIFT;
        Self(semi | start | length | gc)
    }
    pub fn is_semi(&self) -> bool {
        self.0 >> 63 == 1
    }
    pub fn start(&self) -> u32 {
        ((self.0 >> START_SHIFT) & MAX_FIELD as u64) as u32
    }
    pub fn length(&self) -> u32 {
        ((self.0 >> LENGTH_SHIFT) & MAX_FIELD as u64) as u32
    }
    pub fn gc(&self) -> u32 {
        ((self.0 >> GC_SHIFT) & MAX_FIELD as u64) as u32
    }
    pub fn primers(&self) -> u16 {
        (self.0 & MAX_PRIMERS as u64) as u16
    }
    pub fn set_primers(&mut self, primers: u16) {
        assert!(primers <= MAX_PRIMERS);
        self.0 = (self.0 & !(MAX_PRIMERS as u64)) | primers as u64;
    }
}

impl std::fmt::Debug for AmpliconHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let semi = if self.is_semi() { "Semi" } else { "Full" };
        write!(
            f,
            "{}[{},+{}) GC:{} P:{}",
            semi,
            self.start(),
            self.length(),
            self.gc(),
            self.primers()
        )
    }
}

/// A product of amplification.
/// A semi amplicon is a single strand copied from a [Fragment](Fragment),
/// and a full amplicon is the double strand copied from a semi amplicon.
/// The template is referred by its index in the pool it lives.
#[derive(Debug, Clone)]
pub struct Amplicon {
    header: AmpliconHeader,
    template: usize,
    errors: ErrorList,
    sequence: OnceLock<Box<[u8]>>,
}

impl Amplicon {
    pub fn new(
        is_semi: bool,
        template: usize,
        errors: ErrorList,
        start: u32,
        length: u32,
        gc: u32,
    ) -> Self {
        let header = AmpliconHeader::new(is_semi, start, length, gc);
        Self {
            header,
            template,
            errors,
            sequence: OnceLock::new(),
        }
    }
    pub fn is_semi(&self) -> bool {
        self.header.is_semi()
    }
    /// The index of the template. A fragment if this is a semi amplicon, otherwise a semi amplicon.
    pub fn template(&self) -> usize {
        self.template
    }
    pub fn start(&self) -> usize {
        self.header.start() as usize
    }
    pub fn length(&self) -> usize {
        self.header.length() as usize
    }
    /// The number of template bases this amplicon was copied from.
    /// Equal to the length unless some bases were dropped.
    pub fn span(&self) -> usize {
        self.length() + self.errors.dropouts()
    }
    pub fn gc_count(&self) -> usize {
        self.header.gc() as usize
    }
    /// GC content in percent, rounded.
    pub fn gc_percent(&self) -> usize {
        match self.length() {
            0 => 0,
            len => (100 * self.gc_count() + len / 2) / len,
        }
    }
    pub fn primers(&self) -> u16 {
        self.header.primers()
    }
    pub fn set_primers(&mut self, primers: u16) {
        self.header.set_primers(primers);
    }
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }
    pub fn cached_sequence(&self) -> Option<&[u8]> {
        self.sequence.get().map(|x| x.as_ref())
    }
    /// Return the cached sequence, filling the cache by `f` if it is empty.
    pub fn sequence_or_init<F: FnOnce() -> Vec<u8>>(&self, f: F) -> &[u8] {
        self.sequence.get_or_init(|| f().into_boxed_slice())
    }
    /// Drop the cached sequence, if any.
    pub fn release_sequence(&mut self) {
        self.sequence.take();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn sign(&self) -> i8 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }
}

/// A double stranded genomic fragment. The sequence is read 5' to 3' on its own strand.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub chromosome: String,
    /// 1-based start position on the forward strand of the chromosome.
    pub start_pos: u64,
    pub strand: Strand,
    gc_content: usize,
    primers: u16,
    sequence: Vec<u8>,
}

impl Fragment {
    pub fn new(chromosome: &str, start_pos: u64, strand: Strand, sequence: Vec<u8>) -> Self {
        assert!(
            sequence.len() <= MAX_FIELD as usize,
            "Fragment {}:{} is too long",
            chromosome,
            start_pos
        );
        let gc_content = sequence
            .iter()
            .filter(|&&b| b == b'G' || b == b'C')
            .count();
        Self {
            chromosome: chromosome.to_string(),
            start_pos,
            strand,
            gc_content,
            primers: 0,
            sequence,
        }
    }
    pub fn length(&self) -> usize {
        self.sequence.len()
    }
    pub fn gc_content(&self) -> usize {
        self.gc_content
    }
    pub fn primers(&self) -> u16 {
        self.primers
    }
    pub fn set_primers(&mut self, primers: u16) {
        assert!(primers <= MAX_PRIMERS);
        self.primers = primers;
    }
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}:{}\t{}\t{}",
            self.chromosome,
            self.start_pos,
            self.length(),
            self.strand.sign()
        )
    }
}
