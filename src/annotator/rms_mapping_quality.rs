use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use anyhow::Error as AnyError;
use macro_sup::set_mlog;

use crate::{
    cmdline::cli::CombineMappingQualityArgs,
    hts::MAPPING_QUALITY_UNAVAILABLE,
    utils::errors::Error,
};

set_mlog!(stringify!(RMSMappingQuality));

pub(crate) const RAW_MAPPING_QUALITY_WITH_DEPTH_KEY: &str = "RAW_MQandDP";
pub(crate) const RMS_MAPPING_QUALITY_KEY: &str = "MQ";
pub(crate) const DEPTH_KEY: &str = "DP";

/// Sum of squared mapping qualities and the number of reads that contributed, for one site.
///
/// Written as `"<sumOfSquares>,<count>"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RawMappingQuality {
    sum_of_squares: u64,
    count: u64,
}

impl RawMappingQuality {
    pub(crate) fn new(sum_of_squares: u64, count: u64) -> Self {
        Self {
            sum_of_squares,
            count,
        }
    }

    /// Accumulates the mapping qualities of the reads at a site. Unavailable qualities are
    /// skipped, not averaged in as zero.
    pub(crate) fn from_mapping_qualities(mapping_qualities: impl IntoIterator<Item = u8>) -> Self {
        let mut raw = Self::default();
        mapping_qualities.into_iter().for_each(|mq| raw.add_read(mq));
        raw
    }

    pub(crate) fn add_read(&mut self, mapping_quality: u8) {
        if mapping_quality != MAPPING_QUALITY_UNAVAILABLE {
            self.sum_of_squares = self.sum_of_squares.saturating_add((mapping_quality as u64).pow(2));
            self.count = self.count.saturating_add(1);
        }
    }

    pub(crate) fn sum_of_squares(&self) -> u64 {
        self.sum_of_squares
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

impl FromStr for RawMappingQuality {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedRawAnnotation {
            key: RAW_MAPPING_QUALITY_WITH_DEPTH_KEY,
            raw: raw.to_string(),
        };

        let mut fields = raw.split(',').map(|f| f.trim().parse::<u64>());

        match (fields.next(), fields.next(), fields.next()) {
            (Some(Ok(sum_of_squares)), Some(Ok(count)), None) => Ok(Self::new(sum_of_squares, count)),
            _ => Err(malformed()),
        }
    }
}

impl Display for RawMappingQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.sum_of_squares, self.count)
    }
}

/// Raw values merged across shards. Merging is field-wise addition, so shard order never
/// changes the result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CombinedMappingQuality(RawMappingQuality);

impl From<RawMappingQuality> for CombinedMappingQuality {
    fn from(raw: RawMappingQuality) -> Self {
        Self(raw)
    }
}

impl CombinedMappingQuality {
    /// # Errors
    ///
    /// `MalformedRawAnnotation` quoting `other` when either sum no longer fits.
    pub(crate) fn combine(self, other: impl Into<CombinedMappingQuality>) -> Result<Self, Error> {
        let other = other.into().0;

        let sum_of_squares = self.0.sum_of_squares.checked_add(other.sum_of_squares);
        let count = self.0.count.checked_add(other.count);

        match (sum_of_squares, count) {
            (Some(sum_of_squares), Some(count)) => Ok(Self(RawMappingQuality {
                sum_of_squares,
                count,
            })),
            _ => Err(Error::MalformedRawAnnotation {
                key: RAW_MAPPING_QUALITY_WITH_DEPTH_KEY,
                raw: other.to_string(),
            }),
        }
    }

    pub(crate) fn combine_all(raws: impl IntoIterator<Item = RawMappingQuality>) -> Result<Self, Error> {
        raws.into_iter()
            .try_fold(Self::default(), |acc, raw| acc.combine(raw))
    }

    /// The combined value in raw form, for storing back on a site.
    pub(crate) fn raw(&self) -> RawMappingQuality {
        self.0
    }

    /// `sqrt(sumOfSquares / depth)`. `site_depth` wins over the combined read count; a
    /// non-positive depth finalizes to NaN.
    pub(crate) fn finalize(self, site_depth: Option<i64>) -> FinalizedMappingQuality {
        let depth = match site_depth {
            Some(depth) => depth as f64,
            None => self.0.count as f64,
        };

        let rms = if depth <= 0.0 {
            f64::NAN
        } else {
            (self.0.sum_of_squares as f64 / depth).sqrt()
        };

        FinalizedMappingQuality { rms }
    }
}

/// Terminal value. Displays with two fraction digits, `NaN` when undefined.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FinalizedMappingQuality {
    rms: f64,
}

impl FinalizedMappingQuality {
    pub(crate) fn rms(&self) -> f64 {
        self.rms
    }
}

impl Display for FinalizedMappingQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.rms)
    }
}

/// Depth of one sample at a site.
#[derive(Clone, Debug, Default)]
pub(crate) struct GenotypeDepth {
    pub(crate) is_hom_ref: bool,
    pub(crate) min_dp: Option<i64>,
    pub(crate) dp: Option<i64>,
}

/// The attributes of one site and its per-sample depths.
#[derive(Clone, Debug, Default)]
pub(crate) struct SiteAnnotations {
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) genotypes: Vec<GenotypeDepth>,
}

impl SiteAnnotations {
    /// `DP` minus the depth of hom-ref samples (their `MIN_DP`, else `DP`). `None` without `DP`.
    pub(crate) fn site_depth(&self) -> Result<Option<i64>, Error> {
        let Some(dp) = self.attributes.get(DEPTH_KEY) else {
            return Ok(None);
        };

        let mut depth = dp.trim().parse::<i64>().map_err(|_| Error::MalformedRawAnnotation {
            key: DEPTH_KEY,
            raw: dp.clone(),
        })?;

        for gt in self.genotypes.iter().filter(|gt| gt.is_hom_ref) {
            depth = depth.saturating_sub(gt.min_dp.or(gt.dp).unwrap_or(0));
        }

        Ok(Some(depth))
    }

    /// Replaces the raw attribute with the finalized `MQ` value. Sites without a raw value are
    /// left alone.
    pub(crate) fn finalize_raw_mq(&mut self) -> Result<(), Error> {
        let Some(raw) = self.attributes.get(RAW_MAPPING_QUALITY_WITH_DEPTH_KEY) else {
            return Ok(());
        };

        let combined = CombinedMappingQuality::from(raw.parse::<RawMappingQuality>()?);
        let finalized = combined.finalize(self.site_depth()?);
        if finalized.rms().is_nan() {
            mlog::warn!("No reads or no positive depth at site; {} is NaN.", RMS_MAPPING_QUALITY_KEY);
        }

        self.attributes.remove(RAW_MAPPING_QUALITY_WITH_DEPTH_KEY);
        self.attributes
            .insert(RMS_MAPPING_QUALITY_KEY.to_string(), finalized.to_string());

        Ok(())
    }
}

/// Accumulates the given mapping qualities into one more raw value, combines it with the raw
/// shard values, and finalizes the result on a site carrying the given depths.
///
/// Returns the combined raw value and the finalized site.
pub(crate) fn combine_site(args: &CombineMappingQualityArgs) -> Result<(RawMappingQuality, SiteAnnotations), Error> {
    let mut raws = args
        .RAW
        .iter()
        .map(|r| r.parse::<RawMappingQuality>())
        .collect::<Result<Vec<_>, _>>()?;

    if !args.MAPPING_QUALITY.is_empty() {
        raws.push(RawMappingQuality::from_mapping_qualities(
            args.MAPPING_QUALITY.iter().copied(),
        ));
    }

    mlog::info!("Combining {} raw {} values.", raws.len(), RAW_MAPPING_QUALITY_WITH_DEPTH_KEY);

    let combined = CombinedMappingQuality::combine_all(raws)?.raw();
    mlog::debug!(
        "Combined {} reads with squared mapping quality sum {}.",
        combined.count(),
        combined.sum_of_squares()
    );

    let mut site = SiteAnnotations::default();
    site.attributes
        .insert(RAW_MAPPING_QUALITY_WITH_DEPTH_KEY.to_string(), combined.to_string());
    if let Some(dp) = args.DEPTH {
        site.attributes.insert(DEPTH_KEY.to_string(), dp.to_string());
    }
    site.genotypes = args
        .HOM_REF_DEPTH
        .iter()
        .map(|d| GenotypeDepth {
            is_hom_ref: true,
            min_dp: None,
            dp: Some(*d),
        })
        .collect();

    site.finalize_raw_mq()?;

    Ok((combined, site))
}

/// Prints the combined raw value followed by the finalized site attributes.
pub(crate) fn run(args: &CombineMappingQualityArgs) -> Result<(), AnyError> {
    let (combined, site) = combine_site(args)?;

    println!("{}={}", RAW_MAPPING_QUALITY_WITH_DEPTH_KEY, combined);
    for (key, value) in site.attributes.iter() {
        println!("{}={}", key, value);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw(s: &str) -> RawMappingQuality {
        s.parse().unwrap()
    }

    #[test]
    fn unavailable_mapping_quality_is_skipped() {
        let r = RawMappingQuality::from_mapping_qualities([60, MAPPING_QUALITY_UNAVAILABLE, 20]);

        assert_eq!(r, RawMappingQuality::new(3600 + 400, 2));
        assert_eq!(r.to_string(), "4000,2");
    }

    #[test]
    fn combine_and_finalize() {
        let combined = CombinedMappingQuality::from(raw("100,4")).combine(raw("50,2")).unwrap();

        assert_eq!(combined.raw().to_string(), "150,6");
        assert_eq!(combined.finalize(Some(6)).to_string(), "5.00");
        assert_eq!(combined.finalize(None).to_string(), "5.00");
    }

    #[test]
    fn combine_is_associative_and_commutative() {
        let shards = [raw("100,4"), raw("50,2"), raw("3600,1"), raw("0,0")];

        let forward = CombinedMappingQuality::combine_all(shards).unwrap();
        let backward = CombinedMappingQuality::combine_all(shards.iter().rev().copied()).unwrap();
        let grouped = CombinedMappingQuality::from(shards[0])
            .combine(CombinedMappingQuality::from(shards[1]).combine(shards[2]).unwrap())
            .and_then(|c| c.combine(shards[3]))
            .unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, grouped);
        assert_eq!(forward.finalize(None).to_string(), backward.finalize(None).to_string());
    }

    #[test]
    fn combining_with_itself_doubles_both_fields() {
        let r = raw("1234,7");
        let doubled = CombinedMappingQuality::from(r).combine(r).unwrap().raw();

        assert_eq!(doubled.to_string().parse::<RawMappingQuality>().unwrap(), RawMappingQuality::new(2468, 14));
        assert_eq!(doubled.sum_of_squares(), 2 * r.sum_of_squares());
        assert_eq!(doubled.count(), 2 * r.count());
    }

    #[test]
    fn overflowing_combination_is_an_error() {
        let err = CombinedMappingQuality::from(raw("18446744073709551615,1"))
            .combine(raw("1,1"))
            .unwrap_err();

        assert_eq!(
            err,
            Error::MalformedRawAnnotation {
                key: RAW_MAPPING_QUALITY_WITH_DEPTH_KEY,
                raw: "1,1".to_string()
            }
        );

        assert!(CombinedMappingQuality::combine_all([raw("1,18446744073709551615"), raw("4,1")]).is_err());
    }

    #[test]
    fn huge_counts_finalize_to_a_number() {
        let f = CombinedMappingQuality::from(raw("18446744073709551615,18446744073709551615")).finalize(None);

        assert_eq!(f.to_string(), "1.00");
    }

    #[test]
    fn zero_reads_finalize_to_nan() {
        let f = CombinedMappingQuality::from(raw("0,0")).finalize(None);
        assert!(f.rms().is_nan());
        assert_eq!(f.to_string(), "NaN");

        let f = CombinedMappingQuality::from(raw("100,4")).finalize(Some(0));
        assert!(f.rms().is_nan());
    }

    #[test]
    fn malformed_raw_values_are_fatal_and_quoted() {
        for bad in ["", "100", "abc,4", "100,x", "100,4,5", "-1,2"] {
            let err = bad.parse::<RawMappingQuality>().unwrap_err();

            assert_eq!(
                err,
                Error::MalformedRawAnnotation {
                    key: RAW_MAPPING_QUALITY_WITH_DEPTH_KEY,
                    raw: bad.to_string()
                }
            );
            assert_eq!(err.to_string(), format!("malformed RAW_MQandDP annotation: {}", bad));
        }
    }

    #[test]
    fn finalize_site_uses_depth_minus_hom_ref() {
        let mut site = SiteAnnotations::default();
        site.attributes
            .insert(RAW_MAPPING_QUALITY_WITH_DEPTH_KEY.into(), "150,9".into());
        site.attributes.insert(DEPTH_KEY.into(), "10".into());
        site.genotypes = vec![
            GenotypeDepth {
                is_hom_ref: true,
                min_dp: Some(3),
                dp: Some(5),
            },
            GenotypeDepth {
                is_hom_ref: true,
                min_dp: None,
                dp: Some(1),
            },
            GenotypeDepth {
                is_hom_ref: false,
                min_dp: None,
                dp: Some(6),
            },
        ];

        assert_eq!(site.site_depth().unwrap(), Some(6));

        site.finalize_raw_mq().unwrap();

        assert!(!site.attributes.contains_key(RAW_MAPPING_QUALITY_WITH_DEPTH_KEY));
        assert_eq!(site.attributes[RMS_MAPPING_QUALITY_KEY], "5.00");
    }

    #[test]
    fn finalize_site_without_raw_is_a_no_op() {
        let mut site = SiteAnnotations::default();
        site.attributes.insert(DEPTH_KEY.into(), "10".into());

        site.finalize_raw_mq().unwrap();

        assert_eq!(site.attributes.len(), 1);
    }

    #[test]
    fn finalize_site_with_malformed_raw_keeps_the_site() {
        let mut site = SiteAnnotations::default();
        site.attributes
            .insert(RAW_MAPPING_QUALITY_WITH_DEPTH_KEY.into(), "1.5e3".into());

        let err = site.finalize_raw_mq().unwrap_err();

        assert!(err.to_string().contains("1.5e3"));
        assert!(site.attributes.contains_key(RAW_MAPPING_QUALITY_WITH_DEPTH_KEY));
    }

    fn combine_args(args: &[&str]) -> CombineMappingQualityArgs {
        use crate::cmdline::cli::{Cli, Command};
        use clap::Parser;

        let argv = ["markdup_dist", "combine-mapping-quality"]
            .into_iter()
            .chain(args.iter().copied());

        match Cli::try_parse_from(argv).unwrap().command {
            Command::CombineMappingQuality(args) => args,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn command_accumulates_combines_and_finalizes_the_site() {
        let args = combine_args(&[
            "--RAW",
            "100,4",
            "--MAPPING_QUALITY",
            "5,5,255",
            "--DEPTH",
            "10",
            "--HOM_REF_DEPTH",
            "3,1",
        ]);

        let (combined, site) = combine_site(&args).unwrap();

        assert_eq!(combined.to_string(), "150,6");
        assert!(!site.attributes.contains_key(RAW_MAPPING_QUALITY_WITH_DEPTH_KEY));
        assert_eq!(site.attributes[RMS_MAPPING_QUALITY_KEY], "5.00");
        assert_eq!(site.attributes[DEPTH_KEY], "10");
    }

    #[test]
    fn command_without_depth_uses_the_read_count() {
        let (combined, site) = combine_site(&combine_args(&["--RAW", "100,4", "--RAW", "50,2"])).unwrap();

        assert_eq!(combined.to_string(), "150,6");
        assert_eq!(site.attributes[RMS_MAPPING_QUALITY_KEY], "5.00");
        assert!(!site.attributes.contains_key(DEPTH_KEY));
    }

    #[test]
    fn command_rejects_malformed_and_overflowing_raw_values() {
        assert!(combine_site(&combine_args(&["--RAW", "100"])).is_err());
        assert!(combine_site(&combine_args(&["--RAW", "18446744073709551615,1", "--MAPPING_QUALITY", "1"])).is_err());
    }
}
