//! Simulation of the MALBAC whole genome amplification of a single cell, and of the sequencing of its products.
//! The genome is broken into fragments, copied by random primers into semi amplicons,
//! which are in turn copied into full amplicons. Reads are sampled from the full amplicons.
//! An amplicon only keeps where it was copied from and how it differs from the template;
//! its sequence is rebuilt on demand.
#[macro_use]
extern crate log;
pub mod amplicon_pool;
pub mod cycle;
pub mod engine;
pub mod genome;
pub mod primer_pool;
pub mod profile;
pub mod read_sampler;
pub mod reconstruct;
pub mod seq;
pub mod stats;
pub mod workers;
pub mod writer;

pub use cycle::Malbac;
pub use genome::{FragmentSource, Genome};
pub use profile::{Profile, SequencingProfile};
pub use stats::Stats;
pub use writer::{ReadSink, SeqWriter};
