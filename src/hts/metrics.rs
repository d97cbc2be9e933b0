use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Error};

/// A row type that can be written into a metrics file.
pub(crate) trait MetricBean {
    /// Name written after `## METRICS CLASS`.
    fn type_name() -> &'static str;

    fn column_names() -> &'static [&'static str];

    /// Formatted cell values, in `column_names()` order.
    fn values(&self) -> Vec<String>;
}

pub(crate) struct MetricsFile<B> {
    metrics: Vec<B>,
    headers: Vec<MetricsHeader>,
}

impl<B> Default for MetricsFile<B> {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            headers: Vec::new(),
        }
    }
}

impl<B> MetricsFile<B>
where
    B: MetricBean,
{
    pub(crate) const MAJOR_HEADER_PREFIX: &'static str = "## ";
    pub(crate) const MINOR_HEADER_PREFIX: &'static str = "# ";

    const SEPARATOR: &'static str = "\t";
    const METRIC_HEADER: &'static str = "## METRICS CLASS\t";

    pub(crate) fn new() -> Self {
        Self::default()
    }

    /** Adds a bean to the collection of metrics. */
    pub(crate) fn add_metric(&mut self, bean: B) {
        self.metrics.push(bean)
    }

    pub(crate) fn get_metrics(&self) -> &[B] {
        &self.metrics
    }

    /** Adds a header to the collection of metrics. */
    pub(crate) fn add_header(&mut self, h: MetricsHeader) {
        self.headers.push(h)
    }

    /// Writes headers first, then metrics.
    pub(crate) fn write(&self, f: impl AsRef<Path>) -> Result<(), Error> {
        let path = f.as_ref();
        let w = File::create(path).with_context(|| format!("Failed to create metrics file {:?}", path))?;

        self.write_to(BufWriter::new(w))
    }

    pub(crate) fn write_to(&self, mut out: impl Write) -> Result<(), Error> {
        self.print_header(&mut out)?;
        writeln!(out)?;

        self.print_bean_metrics(&mut out)?;
        out.flush()?;

        Ok(())
    }

    /** Prints the headers into the provided writer. */
    fn print_header(&self, out: &mut impl Write) -> Result<(), std::io::Error> {
        for h in self.headers.iter() {
            write!(
                out,
                "{}{}\n{}{}\n",
                Self::MAJOR_HEADER_PREFIX,
                h.class_name(),
                Self::MINOR_HEADER_PREFIX,
                h,
            )?;
        }

        Ok(())
    }

    /** Prints each of the metrics entries into the provided writer. */
    fn print_bean_metrics(&self, out: &mut impl Write) -> Result<(), Error> {
        if self.metrics.is_empty() {
            return Ok(());
        }

        // Write out a header row with the type of the metric class
        writeln!(out, "{}{}", Self::METRIC_HEADER, B::type_name())?;
        writeln!(out, "{}", B::column_names().join(Self::SEPARATOR))?;

        for bean in self.metrics.iter() {
            writeln!(out, "{}", bean.values().join(Self::SEPARATOR))?;
        }

        writeln!(out)?;

        Ok(())
    }
}

#[derive(Clone, Debug)]
pub(crate) enum MetricsHeader {
    StringHeader(String),
}

impl MetricsHeader {
    pub(crate) fn class_name(&self) -> &'static str {
        match self {
            MetricsHeader::StringHeader(_) => "htsjdk.samtools.metrics.StringHeader",
        }
    }
}

impl Display for MetricsHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsHeader::StringHeader(v) => write!(f, "{}", v),
        }
    }
}

/// Formats a double the way metrics files carry them: at most six fraction digits, no trailing
/// zeros, `NaN` kept explicit.
pub(crate) fn format_metric_f64(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }

    let s = format!("{:.6}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');

    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
