//! Poll-count statistics for solve runs.
//!
//! The channel reports how many status checks each command needed. These
//! counts stand in for accelerator latency when running against the
//! simulator, where wall-clock time says little about the protocol.

/// Number of histogram buckets; the last one collects everything above.
const BUCKETS: usize = 16;

/// Tracks the distribution of status checks per completed command.
pub struct PollStats {
    pub min: u32,
    pub max: u32,
    pub sum: u64,
    pub count: u64,
    pub buckets: [u64; BUCKETS],
    bucket_width: u32,
}

impl PollStats {
    /// Creates an empty tracker whose histogram buckets span
    /// `bucket_width` polls each.
    pub fn new(bucket_width: u32) -> Self {
        Self {
            min: u32::MAX,
            max: 0,
            sum: 0,
            count: 0,
            buckets: [0; BUCKETS],
            bucket_width: bucket_width.max(1),
        }
    }

    pub fn update(&mut self, polls: u32) {
        self.min = self.min.min(polls);
        self.max = self.max.max(polls);
        self.sum += u64::from(polls);
        self.count += 1;

        let idx = ((polls / self.bucket_width) as usize).min(BUCKETS - 1);
        self.buckets[idx] += 1;
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    pub fn print_report(&self) {
        println!("\nStatus Checks per Command");
        println!("Count: {}", self.count);
        if self.count == 0 {
            return;
        }
        println!("Min:   {}", self.min);
        println!("Avg:   {:.2}", self.avg());
        println!("Max:   {}", self.max);

        println!("Distribution ({} poll buckets):", self.bucket_width);
        for (i, &count) in self.buckets.iter().enumerate() {
            if count > 0 {
                let lower = i as u32 * self.bucket_width;
                let upper = lower + self.bucket_width;
                let open = if i == BUCKETS - 1 { "+" } else { "" };
                println!("[{:6}-{:6}{}]: {}", lower, upper, open, count);
            }
        }
    }
}
