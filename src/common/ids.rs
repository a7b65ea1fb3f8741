//! Fingerprints for tables read by the pipeline.

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over a sequence of delimited fields and records.
#[derive(Copy, Clone, Debug)]
pub struct SimpleHash(u32);

impl SimpleHash {
    pub fn new() -> Self {
        Self(FNV_OFFSET)
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 ^ u32::from(b)).wrapping_mul(FNV_PRIME);
        }
    }

    /// Hash one field followed by the `;` separator.
    pub fn field(&mut self, value: &str) {
        self.update(value.as_bytes());
        self.update(b";");
    }

    /// Close the current record.
    pub fn end_record(&mut self) {
        self.update(b"\n");
    }

    pub fn finish32(&self) -> u32 {
        self.0
    }
}

impl Default for SimpleHash {
    fn default() -> Self {
        Self::new()
    }
}
