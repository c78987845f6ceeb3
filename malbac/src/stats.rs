use crate::cycle::Malbac;
use definitions::{Amplicon, ErrorKind};

pub trait Stats {
    fn stats<W: std::io::Write>(&self, wtr: W) -> std::io::Result<()>;
}

impl Stats for Malbac {
    fn stats<W: std::io::Write>(&self, mut wtr: W) -> std::io::Result<()> {
        // Fragments
        if !self.fragments().is_empty() {
            let lens = self.fragments().iter().map(|f| f.length());
            let sum = lens.clone().sum::<usize>();
            let min = lens.clone().min().unwrap_or(0);
            let max = lens.clone().max().unwrap_or(0);
            let len = self.fragments().len();
            let ave = sum / len;
            writeln!(&mut wtr, "Fragments")?;
            writeln!(
                &mut wtr,
                "Total Length:{}\n# of Fragments:{}\nMean Length:{}",
                sum, len, ave
            )?;
            writeln!(&mut wtr, "Max Length:{}\nMin Length:{}", max, min)?;
        }
        amplicon_stats(&mut wtr, "Semi Amplicons", self.semi_amplicons())?;
        amplicon_stats(&mut wtr, "Full Amplicons", self.full_amplicons())?;
        let pool = self.primer_pool();
        writeln!(&mut wtr, "Primers")?;
        writeln!(
            &mut wtr,
            "Initial:{}\nRemaining:{}\nDistinct:{}",
            pool.initial(),
            pool.remaining(),
            pool.distinct()
        )?;
        Ok(())
    }
}

fn amplicon_stats<W: std::io::Write>(mut wtr: W, name: &str, amplicons: &[Amplicon]) -> std::io::Result<()> {
    if amplicons.is_empty() {
        return Ok(());
    }
    let len = amplicons.len();
    let sum = amplicons.iter().map(|a| a.length()).sum::<usize>();
    let gc = amplicons.iter().map(|a| a.gc_count()).sum::<usize>();
    let errors = amplicons.iter().flat_map(|a| a.errors().errors());
    let dropouts = errors.clone().filter(|e| e.kind() == ErrorKind::Dropout).count();
    let substitutions = errors.filter(|e| e.kind() == ErrorKind::Substitution).count();
    writeln!(&mut wtr, "{}", name)?;
    writeln!(
        &mut wtr,
        "Total Length:{}\n# of Amplicons:{}\nMean Length:{}",
        sum,
        len,
        sum / len
    )?;
    let gc_rate = gc as f64 / sum.max(1) as f64;
    writeln!(&mut wtr, "GC:{:.3}", gc_rate)?;
    writeln!(
        &mut wtr,
        "Substitutions:{}\nDropouts:{}",
        substitutions, dropouts
    )?;
    Ok(())
}
