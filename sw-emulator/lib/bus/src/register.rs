/*++

Licensed under the Apache-2.0 license.

File Name:

    register.rs

Abstract:

    File contains implementation of the 64-bit register types used by the
    DMA engine CSR block.

--*/

use crate::BusError;
use dma_emu_types::{CsrData, CsrSize};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::InMemoryRegister;
use tock_registers::{LocalRegisterCopy, RegisterLongName};

pub trait Register {
    /// Size of the register in bytes.
    const SIZE: usize;

    /// Read data of specified size
    ///
    /// # Error
    ///
    /// * `BusError` - `BusError::LoadAccessFault` for any size other than the
    ///   register width
    fn read(&self, size: CsrSize) -> Result<CsrData, BusError>;

    /// Write data of specified size
    ///
    /// # Error
    ///
    /// * `BusError` - `BusError::StoreAccessFault` for any size other than the
    ///   register width
    fn write(&mut self, size: CsrSize, val: CsrData) -> Result<(), BusError>;
}

impl Register for u64 {
    const SIZE: usize = std::mem::size_of::<Self>();

    fn read(&self, size: CsrSize) -> Result<CsrData, BusError> {
        match size {
            CsrSize::DoubleWord => Ok(*self),
            _ => Err(BusError::LoadAccessFault),
        }
    }

    fn write(&mut self, size: CsrSize, val: CsrData) -> Result<(), BusError> {
        match size {
            CsrSize::DoubleWord => {
                *self = val;
                Ok(())
            }
            _ => Err(BusError::StoreAccessFault),
        }
    }
}

impl<R: RegisterLongName> Register for LocalRegisterCopy<u64, R> {
    const SIZE: usize = u64::SIZE;

    fn read(&self, size: CsrSize) -> Result<CsrData, BusError> {
        Register::read(&self.get(), size)
    }

    fn write(&mut self, size: CsrSize, val: CsrData) -> Result<(), BusError> {
        let mut tmp = 0u64;
        Register::write(&mut tmp, size, val)?;
        self.set(tmp);
        Ok(())
    }
}

/// Read Write Register
pub struct ReadWriteRegister<R: RegisterLongName = ()> {
    /// Register
    pub reg: InMemoryRegister<u64, R>,
}

impl<R: RegisterLongName> ReadWriteRegister<R> {
    /// Create an instance of Read Write Register
    pub fn new(val: u64) -> Self {
        Self {
            reg: InMemoryRegister::new(val),
        }
    }
}

impl<R: RegisterLongName> Register for ReadWriteRegister<R> {
    const SIZE: usize = u64::SIZE;

    fn read(&self, size: CsrSize) -> Result<CsrData, BusError> {
        Register::read(&self.reg.get(), size)
    }

    fn write(&mut self, size: CsrSize, val: CsrData) -> Result<(), BusError> {
        let mut tmp = 0u64;
        Register::write(&mut tmp, size, val)?;
        self.reg.set(tmp);
        Ok(())
    }
}

/// Read Only Register
pub struct ReadOnlyRegister<R: RegisterLongName = ()> {
    /// Register
    pub reg: InMemoryRegister<u64, R>,
}

impl<R: RegisterLongName> ReadOnlyRegister<R> {
    /// Create an instance of Read Only Register
    pub fn new(val: u64) -> Self {
        Self {
            reg: InMemoryRegister::new(val),
        }
    }
}

impl<R: RegisterLongName> Register for ReadOnlyRegister<R> {
    const SIZE: usize = u64::SIZE;

    fn read(&self, size: CsrSize) -> Result<CsrData, BusError> {
        Register::read(&self.reg.get(), size)
    }

    fn write(&mut self, _size: CsrSize, _val: CsrData) -> Result<(), BusError> {
        Err(BusError::StoreAccessFault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tock_registers::register_bitfields;

    register_bitfields! [
        u64,
        Control [
            RESET OFFSET(1) NUMBITS(1) [],
            STOP OFFSET(5) NUMBITS(1) [],
        ],
    ];

    #[test]
    fn test_u64() {
        let mut reg = 0u64;
        assert_eq!(reg.write(CsrSize::DoubleWord, 0xdead_beef_cafe_f00d), Ok(()));
        assert_eq!(reg.read(CsrSize::DoubleWord), Ok(0xdead_beef_cafe_f00d));
        assert_eq!(reg.read(CsrSize::Word), Err(BusError::LoadAccessFault));
        assert_eq!(reg.write(CsrSize::Word, 0), Err(BusError::StoreAccessFault));
        assert_eq!(<u64 as Register>::SIZE, 8);
    }

    #[test]
    fn test_read_write_register() {
        let mut reg = ReadWriteRegister::<Control::Register>::new(0);
        assert_eq!(reg.write(CsrSize::DoubleWord, 0x22), Ok(()));
        assert!(reg.reg.is_set(Control::RESET));
        assert!(reg.reg.is_set(Control::STOP));
        assert_eq!(reg.read(CsrSize::DoubleWord), Ok(0x22));
        assert_eq!(reg.write(CsrSize::Word, 0), Err(BusError::StoreAccessFault));
        assert_eq!(reg.read(CsrSize::DoubleWord), Ok(0x22));
    }

    #[test]
    fn test_read_only_register() {
        let mut reg = ReadOnlyRegister::<Control::Register>::new(0x20);
        assert_eq!(reg.read(CsrSize::DoubleWord), Ok(0x20));
        assert_eq!(
            reg.write(CsrSize::DoubleWord, 0),
            Err(BusError::StoreAccessFault)
        );
        assert!(reg.reg.is_set(Control::STOP));
    }

    #[test]
    fn test_local_register_copy() {
        let mut reg = LocalRegisterCopy::<u64, Control::Register>::new(0);
        assert_eq!(Register::write(&mut reg, CsrSize::DoubleWord, 2), Ok(()));
        assert!(reg.is_set(Control::RESET));
        assert_eq!(Register::read(&reg, CsrSize::DoubleWord), Ok(2));
    }
}
