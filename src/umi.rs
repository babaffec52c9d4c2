use crate::sequence::Sequence;

/// A UMI region at a fixed offset within a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UmiConfig {
    position: usize,
    length: usize,
}

impl UmiConfig {
    pub fn new(position: usize, length: usize) -> Self {
        Self { position, length }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// First base after the UMI, or `None` if that offset overflows.
    pub fn end(&self) -> Option<usize> {
        self.position.checked_add(self.length)
    }
}

/// Recovers the UMI of a read from the regions it was configured with.
pub trait UmiExtractor {
    fn umi_configs(&self) -> &[UmiConfig];

    /// Return the UMI bases, or `None` if the read cannot carry the
    /// configured regions.
    fn extract_umi(&self, read: &Sequence) -> Option<Vec<u8>>;
}

/// Reads each configured region straight out of the read and concatenates
/// them in configuration order.
#[derive(Debug, Clone)]
pub struct FixedUmiExtractor {
    configs: Vec<UmiConfig>,
}

impl FixedUmiExtractor {
    pub fn new(configs: Vec<UmiConfig>) -> Self {
        Self { configs }
    }
}

impl UmiExtractor for FixedUmiExtractor {
    fn umi_configs(&self) -> &[UmiConfig] {
        &self.configs
    }

    fn extract_umi(&self, read: &Sequence) -> Option<Vec<u8>> {
        let mut umi = Vec::with_capacity(self.configs.iter().map(UmiConfig::length).sum());
        for cfg in &self.configs {
            let region = read.sub_read(cfg.position(), cfg.length())?;
            umi.extend_from_slice(region.forward_seq());
        }
        Some(umi)
    }
}
