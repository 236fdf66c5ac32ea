use crate::prelude::*;

/// Fixed-size ring of the most recent live data samples, one per poll cycle.
pub struct History {
    samples: Vec<LiveDataSample>,
    // slot the next push writes to
    next: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![LiveDataSample::invalid(); capacity.max(1)],
            next: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn push(&mut self, sample: LiveDataSample) {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % self.capacity();
    }

    /// Most recent `window` slots, newest first.
    fn recent(&self, window: usize) -> impl Iterator<Item = &LiveDataSample> + '_ {
        let capacity = self.capacity();
        let window = window.clamp(1, capacity);
        (1..=window).map(move |back| &self.samples[(self.next + capacity - back) % capacity])
    }

    /// Smoothed view over the last `window` slots. Invalid slots are skipped;
    /// with no valid slot at all the result is all zeros.
    ///
    /// Instantaneous readings are averaged over the valid slots; the energy
    /// counters, runtime and status take the maximum; error bits are OR-ed.
    pub fn average(&self, window: usize) -> LiveData {
        let mut r = LiveData::default();
        let mut valid = 0u32;

        for sample in self.recent(window).filter(|s| s.valid) {
            let d = &sample.data;
            valid += 1;

            r.temperature += d.temperature;
            r.dc1_voltage += d.dc1_voltage;
            r.dc2_voltage += d.dc2_voltage;
            r.dc1_current += d.dc1_current;
            r.dc2_current += d.dc2_current;
            r.ac_current += d.ac_current;
            r.ac_voltage += d.ac_voltage;
            r.frequency += d.frequency;
            r.power += d.power;

            r.energy_today = r.energy_today.max(d.energy_today);
            r.energy_total = r.energy_total.max(d.energy_total);
            r.runtime_total = r.runtime_total.max(d.runtime_total);
            r.status = r.status.max(d.status);

            r.error_bits |= d.error_bits;
        }

        if valid > 0 {
            let n = f64::from(valid);
            r.temperature /= n;
            r.dc1_voltage /= n;
            r.dc2_voltage /= n;
            r.dc1_current /= n;
            r.dc2_current /= n;
            r.ac_current /= n;
            r.ac_voltage /= n;
            r.frequency /= n;
            r.power /= n;
        }

        r
    }

    /// Share of valid slots across the whole ring. Slots never written count
    /// as invalid.
    pub fn quality_of_service(&self) -> f64 {
        let valid = self.samples.iter().filter(|s| s.valid).count();
        valid as f64 / self.capacity() as f64
    }
}
