pub(crate) mod errors;
pub(crate) mod logging;

use std::sync::{atomic::AtomicUsize, OnceLock};

use anyhow::anyhow;

pub(crate) struct MemoryStatsRecord {
    pub(crate) allocated: usize,
    pub(crate) resident: usize,
}

pub(crate) struct MemoryStats {
    allocated: AtomicUsize,
    resident: AtomicUsize,
}

impl MemoryStats {
    /// Get memory usage, `(allocated, resident)`.
    pub(crate) fn record(&self) -> MemoryStatsRecord {
        let r = match Self::get_allocated_and_resident_mem_of_app() {
            Ok(r) => r,
            Err(_) => {
                // if failed to get mem stats, just load previous value.
                return MemoryStatsRecord {
                    allocated: self.allocated.load(std::sync::atomic::Ordering::Relaxed),
                    resident: self.resident.load(std::sync::atomic::Ordering::Relaxed),
                };
            }
        };

        // save mem stats
        self.allocated
            .store(r.allocated, std::sync::atomic::Ordering::Relaxed);
        self.resident
            .store(r.resident, std::sync::atomic::Ordering::Relaxed);

        r
    }

    fn get_allocated_and_resident_mem_of_app() -> Result<MemoryStatsRecord, anyhow::Error> {
        let e = tikv_jemalloc_ctl::epoch::mib().map_err(|err| anyhow!("{:?}", err))?;

        let allocated =
            tikv_jemalloc_ctl::stats::allocated::mib().map_err(|err| anyhow!("{:?}", err))?;

        let resident =
            tikv_jemalloc_ctl::stats::resident::mib().map_err(|err| anyhow!("{:?}", err))?;

        e.advance().map_err(|err| anyhow!("{:?}", err))?;

        Ok(MemoryStatsRecord {
            allocated: allocated.read().map_err(|err| anyhow!("{:?}", err))?,
            resident: resident.read().map_err(|err| anyhow!("{:?}", err))?,
        })
    }
}

pub(crate) fn mem_stats() -> &'static MemoryStats {
    static MEM_STATS: OnceLock<MemoryStats> = OnceLock::new();

    MEM_STATS.get_or_init(|| MemoryStats {
        allocated: AtomicUsize::new(0),
        resident: AtomicUsize::new(0),
    })
}

#[inline]
pub(crate) fn human_readable_byte_count(bytes: usize) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let exp = (((bytes as f64).ln() / 1024_f64.ln()) as usize).min(6);

    format!(
        "{:.1} {}B",
        bytes as f64 / 1024_f64.powi(exp as i32),
        &"kMGTPE"[(exp - 1)..exp]
    )
}

#[cfg(test)]
mod test {
    use super::{human_readable_byte_count, mem_stats};

    #[test]
    fn byte_counts() {
        assert_eq!(human_readable_byte_count(512), "512 B");
        assert_eq!(human_readable_byte_count(2048), "2.0 kB");
        assert_eq!(human_readable_byte_count(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn get_mem_sizes() {
        let b = Vec::<i8>::with_capacity(1024_usize.pow(2));

        let r = mem_stats().record();

        println!("allocated:{}", r.allocated);
        println!("resident:{}", r.resident);

        drop(b);
    }
}
