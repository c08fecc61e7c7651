/*++

Licensed under the Apache-2.0 license.

File Name:

    ram.rs

Abstract:

    File contains implementation of RAM backing the emulated memories.

--*/

use crate::BusError;

/// Byte addressable memory.
pub struct Ram {
    data: Vec<u8>,
}

impl Ram {
    /// Create new RAM
    ///
    /// # Arguments
    ///
    /// * `data` - Initial contents of the RAM
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Create a zero filled RAM of `size` bytes
    pub fn zeroed(size: usize) -> Self {
        Self::new(vec![0u8; size])
    }

    /// Size of the memory in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Immutable reference to data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable reference to data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns true if `len` bytes starting at `addr` are inside the RAM.
    pub fn contains(&self, addr: u64, len: usize) -> bool {
        addr.checked_add(len as u64)
            .is_some_and(|end| end <= self.data.len() as u64)
    }

    /// Copy `buf.len()` bytes starting at `addr` into `buf`.
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` - the range is outside the RAM
    pub fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), BusError> {
        if !self.contains(addr, buf.len()) {
            return Err(BusError::LoadAccessFault);
        }
        let start = addr as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    /// Write the bytes of `buf` whose bit in `strb` is set, starting at
    /// `addr`. Bit `i` of `strb` enables byte `i`.
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` - the range is outside the RAM
    pub fn write_strobed(&mut self, addr: u64, buf: &[u8], strb: u64) -> Result<(), BusError> {
        if buf.len() > 64 || !self.contains(addr, buf.len()) {
            return Err(BusError::StoreAccessFault);
        }
        let start = addr as usize;
        for (i, byte) in buf.iter().enumerate() {
            if strb & (1 << i) != 0 {
                self.data[start + i] = *byte;
            }
        }
        Ok(())
    }

    /// Write all of `buf` starting at `addr`.
    pub fn write(&mut self, addr: u64, buf: &[u8]) -> Result<(), BusError> {
        if !self.contains(addr, buf.len()) {
            return Err(BusError::StoreAccessFault);
        }
        let start = addr as usize;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut ram = Ram::zeroed(256);
        assert_eq!(ram.len(), 256);
        assert_eq!(ram.write(0x10, &[1, 2, 3, 4]), Ok(()));
        let mut buf = [0u8; 4];
        assert_eq!(ram.read(0x10, &mut buf), Ok(()));
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(ram.data()[0x12], 3);
    }

    #[test]
    fn test_out_of_range() {
        let mut ram = Ram::zeroed(128);
        let mut buf = [0u8; 64];
        assert_eq!(ram.read(64, &mut buf), Ok(()));
        assert_eq!(ram.read(65, &mut buf), Err(BusError::LoadAccessFault));
        assert_eq!(ram.read(u64::MAX, &mut buf), Err(BusError::LoadAccessFault));
        assert_eq!(ram.write(128, &[0]), Err(BusError::StoreAccessFault));
    }

    #[test]
    fn test_write_strobed() {
        let mut ram = Ram::new(vec![0xaa; 64]);
        let line = [0x55u8; 64];
        assert_eq!(ram.write_strobed(0, &line, 0x8000_0000_0000_0001), Ok(()));
        assert_eq!(ram.data()[0], 0x55);
        assert_eq!(ram.data()[1], 0xaa);
        assert_eq!(ram.data()[62], 0xaa);
        assert_eq!(ram.data()[63], 0x55);
        ram.data_mut()[1] = 0x11;
        assert_eq!(ram.data()[1], 0x11);
    }
}
