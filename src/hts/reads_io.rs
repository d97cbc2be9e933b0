use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{anyhow, Context, Error};

use super::{
    header::{HeaderRecord, ReadsHeader},
    AlignedRead,
};

/// Reads a JSON-lines reads file: the first line is the header, every other line one read.
pub(crate) fn read_reads_file(path: impl AsRef<Path>) -> Result<(ReadsHeader, Vec<AlignedRead>), Error> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("Failed to open reads file {:?}", path))?;

    read_reads(BufReader::new(f)).with_context(|| format!("Failed to parse reads file {:?}", path))
}

pub(crate) fn read_reads(input: impl BufRead) -> Result<(ReadsHeader, Vec<AlignedRead>), Error> {
    let mut lines = input.lines().enumerate();

    let header_line = match lines.next() {
        Some((_, line)) => line?,
        None => Err(anyhow!("Reads input is empty; expected a header line."))?,
    };
    let header = ReadsHeader::from(serde_json::from_str::<HeaderRecord>(&header_line)?);

    let mut reads = Vec::new();
    for (i, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let read = serde_json::from_str::<AlignedRead>(&line)
            .with_context(|| format!("line {}", i + 1))?;
        reads.push(read);
    }

    Ok((header, reads))
}

pub(crate) fn write_reads_file(
    path: impl AsRef<Path>,
    header: &ReadsHeader,
    reads: &[AlignedRead],
) -> Result<(), Error> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;

    write_reads(BufWriter::new(f), header, reads)
}

pub(crate) fn write_reads(
    mut out: impl Write,
    header: &ReadsHeader,
    reads: &[AlignedRead],
) -> Result<(), Error> {
    serde_json::to_writer(&mut out, header.record())?;
    writeln!(out)?;

    for read in reads {
        serde_json::to_writer(&mut out, read)?;
        writeln!(out)?;
    }

    out.flush()?;

    Ok(())
}
