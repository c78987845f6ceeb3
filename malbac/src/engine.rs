//! Copy a template by the primers attached on it.
//! Each copy is a single strand synthesized on the complement of the template.
//! Its first `PRIMER_LENGTH` bases are the primer itself and never contain errors.
use crate::primer_pool::PrimerPool;
use crate::reconstruct::TemplateStore;
use crate::seq::{complement, gc_count, is_gc};
use definitions::{Amplicon, ErrorKind, ErrorList, ErrorModel, ErrorRecord, Fragment, MalbacConfig, PRIMER_LENGTH};
use rand::Rng;

/// How many times a primer tries to bind before the template is given up.
pub const PRIMER_RETRY: usize = 50;

/// Something an amplicon can be copied from.
pub trait Template {
    fn length(&self) -> usize;
    fn primers(&self) -> u16;
    /// Whether the copies of this template are semi amplicons.
    fn yields_semi(&self) -> bool;
    fn template_sequence<'a>(&'a self, store: &TemplateStore<'_>) -> &'a [u8];
}

impl Template for Fragment {
    fn length(&self) -> usize {
        Fragment::length(self)
    }
    fn primers(&self) -> u16 {
        Fragment::primers(self)
    }
    fn yields_semi(&self) -> bool {
        true
    }
    fn template_sequence<'a>(&'a self, _: &TemplateStore<'_>) -> &'a [u8] {
        self.sequence()
    }
}

impl Template for Amplicon {
    fn length(&self) -> usize {
        Amplicon::length(self)
    }
    fn primers(&self) -> u16 {
        Amplicon::primers(self)
    }
    fn yields_semi(&self) -> bool {
        assert!(self.is_semi(), "Full amplicons are not templates");
        false
    }
    fn template_sequence<'a>(&'a self, store: &TemplateStore<'_>) -> &'a [u8] {
        store.sequence_of(self)
    }
}

/// Attach the primers assigned to the template and copy it once per attached primer.
/// `index` is the index of the template in its own pool.
pub fn amplify<T: Template, R: Rng>(
    template: &T,
    index: usize,
    store: &TemplateStore<'_>,
    primers: &PrimerPool,
    config: &MalbacConfig,
    rng: &mut R,
) -> Vec<Amplicon> {
    let length = template.length();
    let (min_len, max_len) = (config.amplicon_min_len, config.amplicon_max_len);
    if template.primers() == 0 || length < min_len + PRIMER_LENGTH {
        return vec![];
    }
    let strand = complement(template.template_sequence(store));
    let mut attached = vec![false; length];
    let mut amplicons = Vec::with_capacity(template.primers() as usize);
    'primer: for _ in 0..template.primers() {
        let mut retry = 0;
        let (start, amplicon_len) = loop {
            if PRIMER_RETRY <= retry {
                break 'primer;
            }
            retry += 1;
            let start = rng.gen_range(PRIMER_LENGTH - 1..length);
            let amplicon_len = rng.gen_range(min_len..=max_len);
            if length < start + amplicon_len || attached[start] {
                continue;
            }
            if primers.try_consume(&strand[start..start + PRIMER_LENGTH]) {
                break (start, amplicon_len);
            }
        };
        attached[start] = true;
        let window = &strand[start..start + amplicon_len];
        amplicons.push(copy_window(window, start, index, template.yields_semi(), config, rng));
    }
    trace!(
        "AMPLIFY\t{}\t{}\t{}\t{}",
        index,
        length,
        template.primers(),
        amplicons.len()
    );
    amplicons
}

/// Copy the window of the complement strand, introducing errors after the primer.
fn copy_window<R: Rng>(
    window: &[u8],
    start: usize,
    template: usize,
    is_semi: bool,
    config: &MalbacConfig,
    rng: &mut R,
) -> Amplicon {
    let bases = config.bases();
    let mut gc = gc_count(window) as i64;
    let mut errors = vec![];
    for (position, &base) in window.iter().enumerate().skip(PRIMER_LENGTH) {
        let kind = match config.error_model {
            ErrorModel::Substitution { ber } => rng.gen_bool(ber).then_some(ErrorKind::Substitution),
            ErrorModel::DropoutAndFalsePositive { ador, fpr } => {
                if rng.gen_bool(ador) {
                    Some(ErrorKind::Dropout)
                } else {
                    rng.gen_bool(fpr).then_some(ErrorKind::Substitution)
                }
            }
        };
        let position = position as u32;
        match kind {
            Some(ErrorKind::Dropout) => {
                gc -= is_gc(base) as i64;
                errors.push(ErrorRecord::dropout(position));
            }
            Some(ErrorKind::Substitution) => {
                let alt = pick_alt(bases, base, rng);
                gc += is_gc(bases[alt]) as i64 - is_gc(base) as i64;
                errors.push(ErrorRecord::substitution(position, alt as u8));
            }
            None => {}
        }
    }
    let errors = ErrorList::new(errors, bases.len());
    let length = (window.len() - errors.dropouts()) as i64;
    let gc = gc.clamp(0, length) as u32;
    Amplicon::new(is_semi, template, errors, start as u32, length as u32, gc)
}

/// Index of a base chosen uniformly from the alphabet except `base`.
fn pick_alt<R: Rng>(bases: &[u8], base: u8, rng: &mut R) -> usize {
    match bases.iter().position(|&b| b == base) {
        Some(own) => {
            let alt = rng.gen_range(0..bases.len() - 1);
            if own <= alt {
                alt + 1
            } else {
                alt
            }
        }
        None => rng.gen_range(0..bases.len()),
    }
}
