//! Rebuild the sequence of an amplicon from its template and its error list.
use crate::seq::complement_base;
use definitions::{Amplicon, ErrorKind, ErrorList, Fragment};

/// The pools an amplicon can refer to as its template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateStore<'a> {
    fragments: &'a [Fragment],
    semi_amplicons: &'a [Amplicon],
    bases: &'a [u8],
}

impl<'a> TemplateStore<'a> {
    pub fn new(fragments: &'a [Fragment], semi_amplicons: &'a [Amplicon], bases: &'a [u8]) -> Self {
        Self {
            fragments,
            semi_amplicons,
            bases,
        }
    }
    /// The sequence of the amplicon. Memoized in the amplicon.
    /// Panics if the template does not exist, as it means the pools are corrupted.
    pub fn sequence_of<'b>(&self, amplicon: &'b Amplicon) -> &'b [u8] {
        amplicon.sequence_or_init(|| {
            let template = amplicon.template();
            let source = if amplicon.is_semi() {
                match self.fragments.get(template) {
                    Some(fragment) => fragment.sequence(),
                    None => panic!("Fragment {} does not exist", template),
                }
            } else {
                match self.semi_amplicons.get(template) {
                    Some(semi) if semi.is_semi() => self.sequence_of(semi),
                    Some(_) => panic!("Template {} is not a semi amplicon", template),
                    None => panic!("Semi amplicon {} does not exist", template),
                }
            };
            replay(source, amplicon.start(), amplicon.length(), amplicon.errors(), self.bases)
        })
    }
}

/// Copy `length` bases of the complement of `source` from `start`, applying the errors.
/// A dropout skips a source base, and a substitution emits the recorded base instead.
pub fn replay(source: &[u8], start: usize, length: usize, errors: &ErrorList, bases: &[u8]) -> Vec<u8> {
    let span = length + errors.dropouts();
    assert!(
        start + span <= source.len(),
        "[{},{}) is out of the template of length {}",
        start,
        start + span,
        source.len()
    );
    let mut seq = Vec::with_capacity(length);
    let mut pos = start;
    for error in errors.errors() {
        let target = start + error.position() as usize;
        while pos < target {
            seq.push(complement_base(source[pos]));
            pos += 1;
        }
        if error.kind() == ErrorKind::Substitution {
            seq.push(bases[error.alt() as usize]);
        }
        pos += 1;
    }
    while seq.len() < length {
        seq.push(complement_base(source[pos]));
        pos += 1;
    }
    assert_eq!(seq.len(), length);
    seq
}
