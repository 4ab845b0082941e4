//! Per-class word storage
//!
//! Zero-based, auto-growing array of 16-bit cells indexed by offset from a
//! fixed base. Reads past the extent return zeros; writes past the extent grow
//! the backing buffer geometrically and zero-fill the gap.

use parking_lot::RwLock;

use crate::error::{Result, SlaveSimError};

/// Word store for one register class
///
/// All access goes through an internal `RwLock`, so the protocol listener and
/// the control layer can share one instance behind an `Arc`.
#[derive(Debug)]
pub struct RegisterStore {
    label: String,
    base: u32,
    cells: RwLock<Vec<u16>>,
}

impl RegisterStore {
    pub fn new(label: impl Into<String>, base: u32) -> Self {
        Self::with_capacity(label, base, 0)
    }

    /// Store pre-sized to `initial` zeroed cells
    pub fn with_capacity(label: impl Into<String>, base: u32, initial: usize) -> Self {
        Self {
            label: label.into(),
            base,
            cells: RwLock::new(vec![0; initial]),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Number of cells currently backed by storage
    pub fn extent(&self) -> usize {
        self.cells.read().len()
    }

    fn offset(&self, address: u32) -> Result<usize> {
        if address < self.base {
            return Err(SlaveSimError::AddressBelowBase {
                class: self.label.clone(),
                address,
                base: self.base,
            });
        }
        Ok((address - self.base) as usize)
    }

    /// Read `count` words starting at `address`
    ///
    /// The uncovered tail of the range reads as zero.
    pub fn read(&self, address: u32, count: usize) -> Result<Vec<u16>> {
        let start = self.offset(address)?;
        let cells = self.cells.read();

        let mut out = vec![0u16; count];
        if start < cells.len() {
            let end = cells.len().min(start.saturating_add(count));
            out[..end - start].copy_from_slice(&cells[start..end]);
        }
        Ok(out)
    }

    /// Write `values` starting at `address`, growing the store when needed
    ///
    /// The whole slice is written under one lock, so a concurrent reader sees
    /// either none or all of it.
    pub fn write(&self, address: u32, values: &[u16]) -> Result<()> {
        let start = self.offset(address)?;
        let end = start
            .checked_add(values.len())
            .ok_or_else(|| SlaveSimError::internal(format!("{}: address overflow", self.label)))?;

        let mut cells = self.cells.write();
        if end > cells.len() {
            grow(&mut cells, end);
        }
        cells[start..end].copy_from_slice(values);
        Ok(())
    }

    /// Read-modify-write one cell under a single write lock
    ///
    /// Returns the stored word. A cell past the extent starts from zero.
    pub fn update(&self, address: u32, f: impl FnOnce(u16) -> u16) -> Result<u16> {
        let index = self.offset(address)?;

        let mut cells = self.cells.write();
        if index >= cells.len() {
            grow(&mut cells, index + 1);
        }
        cells[index] = f(cells[index]);
        Ok(cells[index])
    }

    /// Zero every cell while keeping the extent
    pub fn clear(&self) {
        self.cells.write().fill(0);
    }
}

/// Extend to `len` cells with amortised doubling
fn grow(cells: &mut Vec<u16>, len: usize) {
    if len > cells.capacity() {
        let target = len.max(cells.capacity().saturating_mul(2));
        cells.reserve_exact(target - cells.len());
    }
    cells.resize(len, 0);
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_reads_zero() {
        let store = RegisterStore::new("HR", 0);
        assert_eq!(store.read(0, 5).unwrap(), vec![0; 5]);
        assert_eq!(store.extent(), 0);
    }

    #[test]
    fn test_write_beyond_extent_zero_fills_gap() {
        let store = RegisterStore::new("HR", 0);
        store.write(100, &[7, 8, 9]).unwrap();

        let words = store.read(0, 103).unwrap();
        assert_eq!(words.len(), 103);
        assert!(words[..100].iter().all(|&w| w == 0));
        assert_eq!(&words[100..], &[7, 8, 9]);
        assert_eq!(store.extent(), 103);
    }

    #[test]
    fn test_read_straddling_extent() {
        let store = RegisterStore::new("IR", 0);
        store.write(0, &[1, 2]).unwrap();
        assert_eq!(store.read(1, 4).unwrap(), vec![2, 0, 0, 0]);
        assert_eq!(store.read(50, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_below_base_fails() {
        let store = RegisterStore::new("HR", 1);
        assert!(matches!(
            store.read(0, 1),
            Err(SlaveSimError::AddressBelowBase {
                address: 0,
                base: 1,
                ..
            })
        ));
        assert!(store.write(0, &[1]).is_err());
        // Base itself is the first cell
        store.write(1, &[5]).unwrap();
        assert_eq!(store.read(1, 1).unwrap(), vec![5]);
    }

    #[test]
    fn test_overwrite_in_place() {
        let store = RegisterStore::with_capacity("HR", 0, 10);
        assert_eq!(store.extent(), 10);
        store.write(3, &[1, 2, 3]).unwrap();
        store.write(4, &[9]).unwrap();
        assert_eq!(store.read(3, 3).unwrap(), vec![1, 9, 3]);
        assert_eq!(store.extent(), 10);
    }

    #[test]
    fn test_growth_is_geometric() {
        let mut cells = Vec::new();
        grow(&mut cells, 10);
        let first = cells.capacity();
        grow(&mut cells, first + 1);
        assert!(cells.capacity() >= first * 2);
        assert_eq!(cells.len(), first + 1);
    }

    #[test]
    fn test_zero_length_access() {
        let store = RegisterStore::new("CO", 0);
        assert!(store.read(1000, 0).unwrap().is_empty());
        store.write(1000, &[]).unwrap();
        assert_eq!(store.extent(), 1000);
    }

    #[test]
    fn test_update_in_place() {
        let store = RegisterStore::new("HR", 0);
        store.write(2, &[0x00F0]).unwrap();
        assert_eq!(store.update(2, |w| w | 0x000F).unwrap(), 0x00FF);
        assert_eq!(store.read(2, 1).unwrap(), vec![0x00FF]);

        // Past the extent the closure sees zero and the store grows
        assert_eq!(store.update(9, |w| w + 1).unwrap(), 1);
        assert_eq!(store.extent(), 10);
        assert!(store.update(0, |w| w).is_ok());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let store = std::sync::Arc::new(RegisterStore::new("HR", 0));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        store.update(0, |w| w + 1).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(store.read(0, 1).unwrap(), vec![4000]);
    }

    #[test]
    fn test_clear() {
        let store = RegisterStore::new("HR", 0);
        store.write(0, &[4, 5]).unwrap();
        store.clear();
        assert_eq!(store.read(0, 2).unwrap(), vec![0, 0]);
    }
}
