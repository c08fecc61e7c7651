/*++

Licensed under the Apache-2.0 license.

File Name:

    csr.rs

Abstract:

    File contains the register map of the DMA engine CSR block: offsets,
    bit layouts and the constant identification registers.

--*/

use bitfield::bitfield;
use dma_emu_types::{emu_enum, CsrAddr, CsrData};
use tock_registers::register_bitfields;
use uuid::{uuid, Uuid};

emu_enum!(
    /// CSR index. The byte offset of a register is eight times its index.
    #[derive(Debug, Eq, PartialEq, Copy, Clone)]
    pub CsrIndex;
    u32;
    {
        Dfh = 0,
        GuidL = 1,
        GuidH = 2,
        Rsvd1 = 3,
        Rsvd2 = 4,
        SrcAddr = 5,
        DestAddr = 6,
        Length = 7,
        DescriptorControl = 8,
        Status = 9,
        Control = 10,
        WrReFillLevel = 11,
        RespFillLevel = 12,
        WrReSeqNum = 13,
        Config1 = 14,
        Config2 = 15,
        TypeVersion = 16,
        RdSrcPerfCntr = 17,
        WrDestPerfCntr = 18,
    };
    Invalid
);

impl CsrIndex {
    /// Every register in map order.
    pub const ALL: [CsrIndex; 19] = [
        CsrIndex::Dfh,
        CsrIndex::GuidL,
        CsrIndex::GuidH,
        CsrIndex::Rsvd1,
        CsrIndex::Rsvd2,
        CsrIndex::SrcAddr,
        CsrIndex::DestAddr,
        CsrIndex::Length,
        CsrIndex::DescriptorControl,
        CsrIndex::Status,
        CsrIndex::Control,
        CsrIndex::WrReFillLevel,
        CsrIndex::RespFillLevel,
        CsrIndex::WrReSeqNum,
        CsrIndex::Config1,
        CsrIndex::Config2,
        CsrIndex::TypeVersion,
        CsrIndex::RdSrcPerfCntr,
        CsrIndex::WrDestPerfCntr,
    ];

    pub fn offset(self) -> CsrAddr {
        self as CsrAddr * 8
    }

    /// Register at byte offset `addr`. The offset must be 64-bit aligned.
    pub fn from_offset(addr: CsrAddr) -> Self {
        CsrIndex::from(addr / 8)
    }

    /// Host software may write this register.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            CsrIndex::SrcAddr
                | CsrIndex::DestAddr
                | CsrIndex::Length
                | CsrIndex::DescriptorControl
                | CsrIndex::Control
        )
    }
}

register_bitfields! [
    u64,

    /// Status
    pub Status [
        BUSY OFFSET(0) NUMBITS(1) [],
        DESCRIPTOR_BUFFER_EMPTY OFFSET(1) NUMBITS(1) [],
        DESCRIPTOR_BUFFER_FULL OFFSET(2) NUMBITS(1) [],
        RESPONSE_BUFFER_EMPTY OFFSET(3) NUMBITS(1) [],
        RESPONSE_BUFFER_FULL OFFSET(4) NUMBITS(1) [],
        STOPPED OFFSET(5) NUMBITS(1) [],
        RESETTING OFFSET(6) NUMBITS(1) [],
        STOPPED_ON_ERROR OFFSET(7) NUMBITS(1) [],
        RD_ERROR OFFSET(16) NUMBITS(1) [],
        WR_ERROR OFFSET(17) NUMBITS(1) [],
        DESCRIPTOR_INVALID OFFSET(18) NUMBITS(1) [],
    ],

    /// Control
    pub Control [
        RESET_DISPATCHER OFFSET(1) NUMBITS(1) [],
        STOP_DESCRIPTORS OFFSET(5) NUMBITS(1) [],
    ],
];

/// DFH: feature type AFU, end of list.
pub const DFH_VALUE: CsrData = (1 << 60) | (1 << 40);

pub const DMA_GUID: Uuid = uuid!("7c5e31b6-82f3-4c0a-9d47-2e6f0b8a4d19");

pub const RSVD_1_VALUE: CsrData = 0x0000_0000_0000_0000;
pub const RSVD_2_VALUE: CsrData = 0xffff_ffff_ffff_ffff;

pub const DMA_VERSION: u64 = 1;

/// Memory-copy DMA
pub const DMA_TYPE: u64 = 1;

/// GUID_L and GUID_H
pub fn guid_halves() -> (CsrData, CsrData) {
    let guid = DMA_GUID.as_u128();
    (guid as u64, (guid >> 64) as u64)
}

bitfield! {
    /// WR_RE_FILL_LEVEL
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FillLevelWord(u64);
    impl Debug;

    /// Descriptors waiting in the queue
    pub u64, descriptors, set_descriptors: 15, 0;

    /// Beats waiting in the transfer buffer
    pub u64, beats, set_beats: 31, 16;
}

bitfield! {
    /// WR_RE_SEQ_NUM
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SeqNumWord(u64);
    impl Debug;

    pub u64, rd_seq, set_rd_seq: 15, 0;
    pub u64, wr_seq, set_wr_seq: 31, 16;
}

bitfield! {
    /// CONFIG_1
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Config1Word(u64);
    impl Debug;

    pub u64, buffer_depth, set_buffer_depth: 15, 0;
    pub u64, queue_depth, set_queue_depth: 31, 16;

    /// Longest burst in beats, minus one
    pub u64, max_burst_len, set_max_burst_len: 39, 32;

    /// AxSIZE of one beat
    pub u64, size, set_size: 42, 40;

    pub incr, set_incr: 48;
    pub wrap, set_wrap: 49;
    pub fixed, set_fixed: 50;
}

bitfield! {
    /// CONFIG_2
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Config2Word(u64);
    impl Debug;

    pub u64, banks, set_banks: 7, 0;
    pub u64, bank_lines, set_bank_lines: 39, 8;
}

bitfield! {
    /// TYPE_VERSION
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct TypeVersionWord(u64);
    impl Debug;

    pub u64, version, set_version: 7, 0;
    pub u64, afu_type, set_afu_type: 15, 8;
}

impl TypeVersionWord {
    pub fn current() -> Self {
        let mut word = TypeVersionWord(0);
        word.set_version(DMA_VERSION);
        word.set_afu_type(DMA_TYPE);
        word
    }
}
