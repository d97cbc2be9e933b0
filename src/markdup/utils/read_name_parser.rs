use anyhow::{anyhow, Error};
use macro_sup::set_mlog;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::physical_location::{PhysicalLocation, PhysicalLocationInt};

set_mlog!(stringify!(ReadNameParser));

pub(crate) const DEFAULT_READ_NAME_REGEX: &str =
    "<optimized capture of last three ':' separated fields as numeric values>";

/// Extracts tile/x/y from read names.
///
/// With the default regex the last three `:`-separated fields of names with 5 or 7 fields are
/// parsed directly; any other regex must capture tile, x and y as groups 1 to 3. Without a regex
/// no location is ever produced.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct ReadNameParser {
    read_name_regex: Option<String>,
    use_optimized_default_parsing: bool,

    read_name_stored: String,
    physical_location_stored: PhysicalLocationInt,

    #[serde(skip)]
    read_name_pattern: Option<Regex>,

    warned_about_regex_not_matching: bool,
}

impl Default for ReadNameParser {
    fn default() -> Self {
        Self::with_regex(Some(DEFAULT_READ_NAME_REGEX.to_string()))
    }
}

impl ReadNameParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `None` never parses location information.
    pub(crate) fn with_regex(read_name_regex: Option<String>) -> Self {
        let use_optimized_default_parsing =
            read_name_regex.as_deref() == Some(DEFAULT_READ_NAME_REGEX);

        Self {
            read_name_regex,
            use_optimized_default_parsing,
            read_name_stored: String::new(),
            physical_location_stored: PhysicalLocationInt::default(),
            read_name_pattern: None,
            warned_about_regex_not_matching: false,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.read_name_regex.is_some()
    }

    /**
     * Very specialized method to rapidly parse a sequence of digits from a String up until the first
     * non-digit character.
     */
    pub(crate) fn rapid_parse_i32(input: &str) -> Result<i32, Error> {
        let bytes = input.as_bytes();

        let (is_negative, digits) = match bytes.first() {
            Some(b'-') => (true, &bytes[1..]),
            _ => (false, bytes),
        };

        let mut val = 0_i32;
        let mut has_digits = false;

        for b in digits.iter().take_while(|b| b.is_ascii_digit()) {
            val = val.wrapping_mul(10).wrapping_add((b - b'0') as i32);
            has_digits = true;
        }

        if !has_digits {
            return Err(anyhow!(
                "String '{}' did not start with a parsable number.",
                input
            ));
        }

        Ok(if is_negative { val.wrapping_neg() } else { val })
    }

    /**
     * Given a string, splits the string by the delimiter, and returns the the last three fields parsed as integers.  Parsing a field
     * considers only a sequence of digits up until the first non-digit character.  The three values are stored in the passed-in array.
     *
     * Returns the number of fields, or -1 (and all tokens -1) when there are fewer than three.
     */
    pub(crate) fn get_last_three_fields(
        read_name: &str,
        delim: char,
        tokens: &mut [i32; 3],
    ) -> Result<i32, Error> {
        let num_fields = read_name.split(delim).count();

        if num_fields < 3 {
            *tokens = [-1; 3];
            return Ok(-1);
        }

        for (slot, field) in tokens.iter_mut().rev().zip(read_name.rsplit(delim)) {
            *slot = Self::rapid_parse_i32(field)?;
        }

        Ok(num_fields as i32)
    }

    /**
     * Method used to extract tile/x/y from the read name and add it to the PhysicalLocation so that it
     * can be used later to determine optical duplication
     *
     * Returns true if the read name contained the information in parsable form, false otherwise.
     */
    pub(crate) fn add_location_information(
        &mut self,
        read_name: &str,
        loc: &mut impl PhysicalLocation,
    ) -> bool {
        if read_name != self.read_name_stored {
            if self.read_location_information(read_name, loc) {
                self.read_name_stored.clear();
                self.read_name_stored.push_str(read_name);
                self.physical_location_stored.set_x(loc.get_x());
                self.physical_location_stored.set_y(loc.get_y());
                self.physical_location_stored.set_tile(loc.get_tile());
                return true;
            }
            // return false if read name cannot be parsed
            false
        } else {
            loc.set_tile(self.physical_location_stored.get_tile());
            loc.set_x(self.physical_location_stored.get_x());
            loc.set_y(self.physical_location_stored.get_y());
            true
        }
    }

    fn read_location_information(&mut self, read_name: &str, loc: &mut impl PhysicalLocation) -> bool {
        match self.try_read_location_information(read_name, loc) {
            Ok(b) => b,
            Err(err) => {
                self.warn_once(format_args!(
                    "A field parsed out of a read name was expected to contain an integer and did not. \
                    Read name: {}. Cause: {}",
                    read_name, err
                ));
                false
            }
        }
    }

    fn try_read_location_information(
        &mut self,
        read_name: &str,
        loc: &mut impl PhysicalLocation,
    ) -> Result<bool, Error> {
        let Some(read_name_regex) = self.read_name_regex.as_deref() else {
            return Ok(false);
        };

        // Optimized version if using the default read name regex
        if self.use_optimized_default_parsing {
            let mut fields = [-1_i32; 3];
            let num_fields = Self::get_last_three_fields(read_name, ':', &mut fields)?;

            if !(num_fields == 5 || num_fields == 7) {
                let msg = format!(
                    "Default READ_NAME_REGEX '{}' did not match read name '{}'.  \
                    You may need to specify a READ_NAME_REGEX in order to correctly identify optical duplicates.  \
                    Note that this message will not be emitted again even if other read names do not match the regex.",
                    read_name_regex, read_name
                );
                self.warn_once(format_args!("{}", msg));

                return Ok(false);
            }

            loc.set_tile(fields[0] as i16);
            loc.set_x(fields[1]);
            loc.set_y(fields[2]);
            return Ok(true);
        }

        // Standard version that will use the regex
        if self.read_name_pattern.is_none() {
            self.read_name_pattern = Some(Regex::new(read_name_regex)?);
        }

        let captures = self
            .read_name_pattern
            .as_ref()
            .and_then(|p| p.captures(read_name));

        match captures {
            Some(m) => {
                let group = |i: usize| {
                    m.get(i)
                        .map(|g| g.as_str())
                        .ok_or_else(|| anyhow!("READ_NAME_REGEX has no capture group {}", i))
                };

                loc.set_tile(group(1)?.parse::<i16>()?);
                loc.set_x(group(2)?.parse::<i32>()?);
                loc.set_y(group(3)?.parse::<i32>()?);

                Ok(true)
            }
            None => {
                let msg = format!(
                    "READ_NAME_REGEX '{}' did not match read name '{}'.  Your regex may not be correct.  \
                    Note that this message will not be emitted again even if other read names do not match the regex.",
                    read_name_regex, read_name
                );
                self.warn_once(format_args!("{}", msg));

                Ok(false)
            }
        }
    }

    fn warn_once(&mut self, msg: std::fmt::Arguments) {
        if !self.warned_about_regex_not_matching {
            mlog::warn!("{}", msg);
            self.warned_about_regex_not_matching = true;
        }
    }
}
